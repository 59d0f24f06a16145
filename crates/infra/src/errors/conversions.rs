//! Conversions from external infrastructure errors into domain errors.

use cleanplayer_domain::CleanPlayerError;
use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use reqwest::StatusCode;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CleanPlayerError);

impl From<InfraError> for CleanPlayerError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CleanPlayerError> for InfraError {
    fn from(value: CleanPlayerError) -> Self {
        InfraError(value)
    }
}

trait IntoCleanPlayerError {
    fn into_cleanplayer(self) -> CleanPlayerError;
}

/// Map a non-success HTTP status onto the domain error taxonomy.
///
/// `context` names the endpoint, `body` is appended when non-empty.
#[must_use]
pub fn status_error(context: &str, status: StatusCode, body: &str) -> CleanPlayerError {
    let mut message = format!(
        "{context} returned HTTP {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("unknown status")
    );
    let body = body.trim();
    if !body.is_empty() {
        message.push_str(": ");
        message.push_str(body);
    }

    match status.as_u16() {
        401 | 403 => CleanPlayerError::Auth(message),
        404 => CleanPlayerError::NotFound(message),
        429 => CleanPlayerError::Network(message),
        400..=499 => CleanPlayerError::InvalidInput(message),
        _ => CleanPlayerError::Network(message),
    }
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CleanPlayerError */
/* -------------------------------------------------------------------------- */

impl IntoCleanPlayerError for SqlError {
    fn into_cleanplayer(self) -> CleanPlayerError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        CleanPlayerError::Storage("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        CleanPlayerError::Storage("database is locked".into())
                    }
                    (ErrorCode::CannotOpen, _) => {
                        CleanPlayerError::Storage(format!("unable to open database: {message}"))
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        CleanPlayerError::Storage("unique constraint violation".into())
                    }
                    _ => CleanPlayerError::Storage(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                CleanPlayerError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                CleanPlayerError::Storage(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CleanPlayerError::Storage(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => CleanPlayerError::Config(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => CleanPlayerError::Storage(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_cleanplayer())
    }
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → CleanPlayerError */
/* -------------------------------------------------------------------------- */

impl IntoCleanPlayerError for KeyringError {
    fn into_cleanplayer(self) -> CleanPlayerError {
        use KeyringError::*;

        let description = self.to_string();

        match self {
            NoEntry => CleanPlayerError::NotFound("keychain entry not found".into()),
            BadEncoding(_) => {
                CleanPlayerError::Storage("keychain value is not valid UTF-8".into())
            }
            TooLong(name, limit) => CleanPlayerError::InvalidInput(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            Invalid(attr, reason) => CleanPlayerError::InvalidInput(format!(
                "keychain attribute '{attr}' is invalid: {reason}"
            )),
            PlatformFailure(err) => {
                CleanPlayerError::Storage(format!("keychain platform error: {err}"))
            }
            NoStorageAccess(err) => {
                CleanPlayerError::Storage(format!("unable to access secure storage: {err}"))
            }
            _ => CleanPlayerError::Storage(description),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_cleanplayer())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CleanPlayerError */
/* -------------------------------------------------------------------------- */

impl IntoCleanPlayerError for HttpError {
    fn into_cleanplayer(self) -> CleanPlayerError {
        if self.is_timeout() {
            return CleanPlayerError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return CleanPlayerError::Network("HTTP connection failure".into());
        }

        if self.is_decode() {
            return CleanPlayerError::InvalidInput(format!("malformed response body: {self}"));
        }

        if let Some(status) = self.status() {
            return status_error("HTTP request", status, "");
        }

        CleanPlayerError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_cleanplayer())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Client;
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_storage_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: CleanPlayerError = InfraError::from(err).into();
        match mapped {
            CleanPlayerError::Storage(msg) => assert!(msg.contains("busy")),
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[test]
    fn keyring_no_entry_maps_to_not_found() {
        let mapped: CleanPlayerError = InfraError::from(KeyringError::NoEntry).into();
        match mapped {
            CleanPlayerError::NotFound(msg) => assert!(msg.contains("keychain")),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn status_error_classifies_by_code() {
        assert!(matches!(
            status_error("profile", StatusCode::UNAUTHORIZED, ""),
            CleanPlayerError::Auth(_)
        ));
        assert!(matches!(
            status_error("profile", StatusCode::NOT_FOUND, ""),
            CleanPlayerError::NotFound(_)
        ));
        assert!(matches!(
            status_error("profile", StatusCode::TOO_MANY_REQUESTS, ""),
            CleanPlayerError::Network(_)
        ));
        assert!(matches!(
            status_error("profile", StatusCode::BAD_REQUEST, ""),
            CleanPlayerError::InvalidInput(_)
        ));

        let err = status_error("users table", StatusCode::BAD_GATEWAY, " upstream down ");
        assert_eq!(
            err,
            CleanPlayerError::Network(
                "users table returned HTTP 502 Bad Gateway: upstream down".to_string()
            )
        );
    }

    #[tokio::test]
    async fn http_status_401_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: CleanPlayerError = InfraError::from(error).into();
        match mapped {
            CleanPlayerError::Auth(msg) => assert!(msg.contains("401")),
            other => panic!("expected auth error, got {other:?}"),
        }
    }
}
