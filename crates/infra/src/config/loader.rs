//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Start from built-in defaults
//! 2. Overlay the first config file found (JSON or TOML), if any
//! 3. Overlay environment variables
//! 4. Validate the result
//!
//! ## Environment Variables
//! - `CLEANPLAYER_SPOTIFY_CLIENT_ID`: OAuth client id
//! - `CLEANPLAYER_SPOTIFY_REDIRECT_URI`: Registered redirect URI
//! - `CLEANPLAYER_SPOTIFY_SCOPES`: Space- or comma-separated scope list
//! - `CLEANPLAYER_ACCOUNTS_BASE_URL`: Accounts service base URL
//! - `CLEANPLAYER_API_BASE_URL`: Web API base URL
//! - `CLEANPLAYER_STORE_BACKEND`: `rest` or `sqlite`
//! - `CLEANPLAYER_STORE_URL`: REST store base URL
//! - `CLEANPLAYER_STORE_API_KEY`: REST store API key
//! - `CLEANPLAYER_STORE_TABLE`: Credential table name
//! - `CLEANPLAYER_STORE_SQLITE_PATH`: SQLite file path
//! - `CLEANPLAYER_KEYCHAIN_SERVICE`: Keychain service name
//! - `CLEANPLAYER_VERIFIER_LENGTH`: PKCE verifier length (43..=128)
//! - `CLEANPLAYER_SESSION_RESET_DELAY_MS`: Delay before `SessionReset`
//! - `CLEANPLAYER_LOG_LEVEL`: Log filter directive
//! - `CLEANPLAYER_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes `config.{json,toml}` and `cleanplayer.{json,toml}` in
//! the working directory, its two parents, and next to the executable.

use std::path::{Path, PathBuf};

use cleanplayer_domain::{CleanPlayerError, Config, Result};

/// Load configuration from defaults, an optional file and the environment
///
/// # Errors
/// Returns `CleanPlayerError::Config` if a found file cannot be parsed, an
/// environment variable has an invalid value, or validation fails.
pub fn load() -> Result<Config> {
    let base = match probe_config_paths() {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("No config file found, starting from defaults");
            Config::default()
        }
    };

    let config = apply_env_overrides(base)?;
    config.validate()?;
    tracing::info!(
        backend = ?config.store.backend,
        redirect_uri = %config.spotify.redirect_uri,
        "Configuration loaded"
    );
    Ok(config)
}

/// Load configuration from defaults and environment variables only
///
/// # Errors
/// Returns `CleanPlayerError::Config` if a variable has an invalid value or
/// validation fails.
pub fn load_from_env() -> Result<Config> {
    let config = apply_env_overrides(Config::default())?;
    config.validate()?;
    Ok(config)
}

/// Overlay `CLEANPLAYER_*` environment variables on `config`
///
/// Unset variables leave the corresponding field untouched.
///
/// # Errors
/// Returns `CleanPlayerError::Config` if a numeric or enum variable cannot
/// be parsed.
pub fn apply_env_overrides(mut config: Config) -> Result<Config> {
    if let Some(client_id) = env_opt("CLEANPLAYER_SPOTIFY_CLIENT_ID") {
        config.spotify.client_id = client_id;
    }
    if let Some(redirect_uri) = env_opt("CLEANPLAYER_SPOTIFY_REDIRECT_URI") {
        config.spotify.redirect_uri = redirect_uri;
    }
    if let Some(scopes) = env_opt("CLEANPLAYER_SPOTIFY_SCOPES") {
        config.spotify.scopes = scopes
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect();
    }
    if let Some(url) = env_opt("CLEANPLAYER_ACCOUNTS_BASE_URL") {
        config.spotify.accounts_base_url = url;
    }
    if let Some(url) = env_opt("CLEANPLAYER_API_BASE_URL") {
        config.spotify.api_base_url = url;
    }

    if let Some(backend) = env_opt("CLEANPLAYER_STORE_BACKEND") {
        config.store.backend = backend.parse()?;
    }
    if let Some(url) = env_opt("CLEANPLAYER_STORE_URL") {
        config.store.rest_url = Some(url);
    }
    if let Some(key) = env_opt("CLEANPLAYER_STORE_API_KEY") {
        config.store.rest_api_key = Some(key);
    }
    if let Some(table) = env_opt("CLEANPLAYER_STORE_TABLE") {
        config.store.table = table;
    }
    if let Some(path) = env_opt("CLEANPLAYER_STORE_SQLITE_PATH") {
        config.store.sqlite_path = path;
    }

    if let Some(service) = env_opt("CLEANPLAYER_KEYCHAIN_SERVICE") {
        config.session.keychain_service = service;
    }
    if let Some(length) = env_parse::<usize>("CLEANPLAYER_VERIFIER_LENGTH", "verifier length")? {
        config.session.verifier_length = length;
    }
    if let Some(delay) =
        env_parse::<u64>("CLEANPLAYER_SESSION_RESET_DELAY_MS", "session reset delay")?
    {
        config.session.session_reset_delay_ms = delay;
    }

    if let Some(level) = env_opt("CLEANPLAYER_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("CLEANPLAYER_LOG_JSON", config.logging.json);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Missing sections and
/// fields take their defaults.
///
/// # Errors
/// Returns `CleanPlayerError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CleanPlayerError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CleanPlayerError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CleanPlayerError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CleanPlayerError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CleanPlayerError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CleanPlayerError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// Returns the first existing candidate.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["config.json", "config.toml", "cleanplayer.json", "cleanplayer.toml"];

    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd.clone());
        roots.push(cwd.join(".."));
        roots.push(cwd.join("../.."));
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str, what: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| CleanPlayerError::Config(format!("Invalid {what} in {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use cleanplayer_domain::StoreBackend;
    use once_cell::sync::Lazy;
    use tempfile::{Builder, NamedTempFile};

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 7] = [
        "CLEANPLAYER_SPOTIFY_CLIENT_ID",
        "CLEANPLAYER_SPOTIFY_SCOPES",
        "CLEANPLAYER_STORE_BACKEND",
        "CLEANPLAYER_STORE_SQLITE_PATH",
        "CLEANPLAYER_VERIFIER_LENGTH",
        "CLEANPLAYER_LOG_JSON",
        "CLEANPLAYER_SESSION_RESET_DELAY_MS",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    fn temp_config(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("CP_TEST_BOOL_ON", "On");
        std::env::set_var("CP_TEST_BOOL_OFF", "0");
        std::env::remove_var("CP_TEST_BOOL_MISSING");

        assert!(env_bool("CP_TEST_BOOL_ON", false));
        assert!(!env_bool("CP_TEST_BOOL_OFF", true));
        assert!(env_bool("CP_TEST_BOOL_MISSING", true));

        std::env::remove_var("CP_TEST_BOOL_ON");
        std::env::remove_var("CP_TEST_BOOL_OFF");
    }

    #[test]
    fn test_env_overrides_apply_on_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CLEANPLAYER_SPOTIFY_CLIENT_ID", "my-client");
        std::env::set_var("CLEANPLAYER_SPOTIFY_SCOPES", "streaming, user-read-email");
        std::env::set_var("CLEANPLAYER_STORE_BACKEND", "SQLite");
        std::env::set_var("CLEANPLAYER_STORE_SQLITE_PATH", "/tmp/cp.db");
        std::env::set_var("CLEANPLAYER_VERIFIER_LENGTH", "64");
        std::env::set_var("CLEANPLAYER_LOG_JSON", "true");

        let config = load_from_env().expect("config from env");

        assert_eq!(config.spotify.client_id, "my-client");
        assert_eq!(config.spotify.scopes, vec!["streaming", "user-read-email"]);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.sqlite_path, "/tmp/cp.db");
        assert_eq!(config.session.verifier_length, 64);
        assert!(config.logging.json);
        assert_eq!(config.spotify.redirect_uri, "http://localhost:5173/test/");

        clear_env();
    }

    #[test]
    fn test_invalid_numeric_env_is_config_error() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CLEANPLAYER_SESSION_RESET_DELAY_MS", "soon");
        let result = apply_env_overrides(Config::default());
        assert!(matches!(result, Err(CleanPlayerError::Config(_))));

        clear_env();
    }

    #[test]
    fn test_out_of_range_verifier_length_fails_validation() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CLEANPLAYER_VERIFIER_LENGTH", "200");
        let result = load_from_env();
        assert!(matches!(result, Err(CleanPlayerError::Config(msg)) if msg.contains("verifier")));

        clear_env();
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CLEANPLAYER_STORE_BACKEND", "postgres");
        assert!(load_from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_load_from_file_toml_partial() {
        let file = temp_config(
            ".toml",
            r#"
[spotify]
client_id = "toml-client"

[store]
backend = "sqlite"
sqlite_path = "creds.db"
"#,
        );

        let config = load_from_file(Some(file.path().to_path_buf())).expect("toml config");

        assert_eq!(config.spotify.client_id, "toml-client");
        assert_eq!(config.spotify.scopes.len(), 11);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.table, "users");
    }

    #[test]
    fn test_load_from_file_json() {
        let file = temp_config(
            ".json",
            r#"{
                "store": { "backend": "rest", "rest_url": "https://db.example.com" },
                "session": { "session_reset_delay_ms": 250 }
            }"#,
        );

        let config = load_from_file(Some(file.path().to_path_buf())).expect("json config");

        assert_eq!(config.store.rest_url.as_deref(), Some("https://db.example.com"));
        assert_eq!(config.session.session_reset_delay_ms, 250);
        assert_eq!(config.session.verifier_length, 128);
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/config.json")));
        assert!(matches!(result, Err(CleanPlayerError::Config(_))));
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let file = temp_config(".json", r#"{ "this is": "not valid json" "#);
        assert!(load_from_file(Some(file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", Path::new("test.yaml"));
        assert!(matches!(result, Err(CleanPlayerError::Config(msg)) if msg.contains("yaml")));
    }
}
