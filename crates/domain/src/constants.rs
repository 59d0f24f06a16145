//! Application constants
//!
//! Local-store key names and provider defaults shared by every crate.

// Local store keys
pub const LOCAL_KEY_VERIFIER: &str = "verifier";
pub const LOCAL_KEY_ACCESS_TOKEN: &str = "accessToken";
pub const LOCAL_KEY_REFRESH_TOKEN: &str = "refreshToken";
pub const LOCAL_KEY_EXPIRY_TIME: &str = "expiryTime";
pub const LOCAL_KEY_TOKEN_GENERATION_TIME: &str = "tokenGenerationTime";
pub const LOCAL_KEY_USER_ID: &str = "spotifyUserId";

/// Keys holding raw tokens before migration to the remote store.
pub const LOCAL_TOKEN_KEYS: [&str; 4] = [
    LOCAL_KEY_ACCESS_TOKEN,
    LOCAL_KEY_REFRESH_TOKEN,
    LOCAL_KEY_EXPIRY_TIME,
    LOCAL_KEY_TOKEN_GENERATION_TIME,
];

/// Keys removed on logout. The user id pointer survives.
pub const LOGOUT_KEYS: [&str; 5] = [
    LOCAL_KEY_ACCESS_TOKEN,
    LOCAL_KEY_REFRESH_TOKEN,
    LOCAL_KEY_EXPIRY_TIME,
    LOCAL_KEY_TOKEN_GENERATION_TIME,
    LOCAL_KEY_VERIFIER,
];

// Provider defaults
pub const DEFAULT_ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com";
pub const DEFAULT_CLIENT_ID: &str = "8f9b61a91f38474d80dbf57d9d857408";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:5173/test/";
pub const DEFAULT_SCOPES: [&str; 11] = [
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "streaming",
    "playlist-read-private",
    "playlist-read-collaborative",
    "user-library-modify",
    "user-library-read",
    "user-follow-read",
    "user-read-private",
    "user-read-email",
];

// PKCE verifier bounds (RFC 7636)
pub const VERIFIER_MIN_LENGTH: usize = 43;
pub const VERIFIER_MAX_LENGTH: usize = 128;
pub const DEFAULT_VERIFIER_LENGTH: usize = 128;

// Session
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "CleanPlayer";
pub const DEFAULT_SESSION_RESET_DELAY_MS: u64 = 1000;

// Remote store
pub const DEFAULT_CREDENTIAL_TABLE: &str = "users";
pub const DEFAULT_SQLITE_PATH: &str = "cleanplayer.db";
