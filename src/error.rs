use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppVaultError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Graph API error (HTTP {status}): {message}")]
    GraphApi { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Interactive prompt error: {0}")]
    DialoguerError(#[from] dialoguer::Error),

    #[error("No access token available. Pass --token, set APPVAULT_ACCESS_TOKEN, or sign in with an external tool")]
    TokenNotFound,

    #[error("Access token for tenant '{0}' has expired")]
    TokenExpired(String),

    #[error("Tenant '{0}' not found")]
    TenantNotFound(String),

    #[error("Backup schema version {found} is newer than the supported version {supported}")]
    UnsupportedSchemaVersion { found: u32, supported: u32 },

    #[error("Nothing to restore: the backup contains no applications")]
    NothingToRestore,

    #[error("Operation cancelled")]
    Cancelled,
}

impl AppVaultError {
    /// True for a Graph 404, i.e. the object does not exist (yet) in the directory
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppVaultError::GraphApi { status: 404, .. })
    }

    /// True for failures worth retrying on an idempotent request
    pub fn is_transient(&self) -> bool {
        match self {
            AppVaultError::GraphApi { status, .. } => *status == 429 || *status >= 500,
            AppVaultError::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppVaultError>;

pub use AppVaultError as Error;

/// Parse Graph API error response and provide helpful context
pub fn enhance_graph_error(error_response: &str) -> String {
    if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(error_response) {
        if let Some(error_obj) = error_json.get("error") {
            let code = error_obj
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or("Unknown");
            let message = error_obj
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("No message");

            let hint = match code {
                "Unauthorized" | "InvalidAuthenticationToken" => {
                    "\n💡 Hint: The access token may have expired. Acquire a fresh token and retry."
                }
                "Forbidden" | "Authorization_RequestDenied" | "InsufficientPrivileges" => {
                    "\n💡 Hint: Application.ReadWrite.All (or Directory.ReadWrite.All) with admin consent is required."
                }
                "Request_BadRequest" | "BadRequest" => {
                    if message.contains("already exists") || message.contains("already in use") {
                        "\n💡 Hint: An object with the same identifier already exists. Try --skip-existing."
                    } else if message.contains("identifierUris") {
                        "\n💡 Hint: Identifier URIs must use a verified domain of the destination tenant."
                    } else {
                        "\n💡 Hint: The request body was rejected. Check the backed-up object for fields the destination tenant does not accept."
                    }
                }
                "Request_ResourceNotFound" | "NotFound" => {
                    "\n💡 Hint: The object does not exist or has not replicated yet."
                }
                "TooManyRequests" => "\n💡 Hint: API rate limit exceeded. Lower --workers and retry.",
                _ => "",
            };

            return format!("{}: {}{}", code, message, hint);
        }
    }

    error_response.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhance_graph_error_extracts_code_and_message() {
        let body = r#"{"error":{"code":"Request_ResourceNotFound","message":"Resource 'x' does not exist"}}"#;
        let enhanced = enhance_graph_error(body);
        assert!(enhanced.starts_with("Request_ResourceNotFound: Resource 'x' does not exist"));
        assert!(enhanced.contains("replicated"));
    }

    #[test]
    fn test_enhance_graph_error_passes_through_plain_text() {
        assert_eq!(enhance_graph_error("upstream timeout"), "upstream timeout");
    }

    #[test]
    fn test_not_found_and_transient_classification() {
        let not_found = AppVaultError::GraphApi {
            status: 404,
            message: "gone".into(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_transient());

        let throttled = AppVaultError::GraphApi {
            status: 429,
            message: "slow down".into(),
        };
        assert!(throttled.is_transient());
        assert!(!AppVaultError::NothingToRestore.is_transient());
    }
}
