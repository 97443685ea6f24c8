//! Access token supply
//!
//! Signing in is handled outside this tool. A token is either passed in
//! directly (`--token` / `APPVAULT_ACCESS_TOKEN`) or read from the tenant's
//! token cache file written by an external login helper.

use crate::config::ConfigManager;
use crate::error::{AppVaultError, Result};

pub const ACCESS_TOKEN_ENV: &str = "APPVAULT_ACCESS_TOKEN";

/// Required Microsoft Graph application permissions
pub const REQUIRED_SCOPES: &[&str] = &["Application.ReadWrite.All", "Directory.Read.All"];

pub trait TokenSource {
    fn access_token(&self) -> Result<String>;
}

/// A token handed to us verbatim
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    fn access_token(&self) -> Result<String> {
        if self.0.trim().is_empty() {
            return Err(AppVaultError::TokenNotFound);
        }
        Ok(self.0.trim().to_string())
    }
}

/// A token read from `cache/<tenant>.token`
pub struct CachedToken {
    config: ConfigManager,
    tenant_name: String,
}

impl CachedToken {
    pub fn new(config: ConfigManager, tenant_name: impl Into<String>) -> Self {
        Self {
            config,
            tenant_name: tenant_name.into(),
        }
    }
}

impl TokenSource for CachedToken {
    fn access_token(&self) -> Result<String> {
        Ok(self.config.load_token(&self.tenant_name)?.access_token)
    }
}

/// Pick a token: explicit value first, then the named (or active) tenant's cache
pub fn resolve_token(
    config: &ConfigManager,
    explicit: Option<&str>,
    tenant: Option<&str>,
) -> Result<String> {
    if let Some(token) = explicit {
        return StaticToken(token.to_string()).access_token();
    }

    let tenant_name = match tenant {
        Some(name) => config.get_tenant(name)?.name,
        None => config
            .get_active_tenant()?
            .map(|t| t.name)
            .ok_or(AppVaultError::TokenNotFound)?,
    };

    CachedToken::new(config.clone(), tenant_name).access_token()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TenantConfig, TokenCache};

    #[test]
    fn test_explicit_token_wins() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigManager::with_dir(dir.path()).unwrap();
        assert_eq!(
            resolve_token(&config, Some(" eyJ0 "), None).unwrap(),
            "eyJ0"
        );
        assert!(matches!(
            resolve_token(&config, Some("  "), None),
            Err(AppVaultError::TokenNotFound)
        ));
    }

    #[test]
    fn test_active_tenant_cache_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigManager::with_dir(dir.path()).unwrap();
        assert!(matches!(
            resolve_token(&config, None, None),
            Err(AppVaultError::TokenNotFound)
        ));

        config
            .add_tenant(TenantConfig {
                name: "CONTOSO".into(),
                tenant_id: "tid".into(),
                description: None,
            })
            .unwrap();
        config.set_active_tenant("CONTOSO").unwrap();
        config
            .save_token(
                "CONTOSO",
                &TokenCache {
                    access_token: "cached-token".into(),
                    expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
                    tenant_id: "tid".into(),
                },
            )
            .unwrap();

        assert_eq!(resolve_token(&config, None, None).unwrap(), "cached-token");
        assert_eq!(
            resolve_token(&config, None, Some("contoso")).unwrap(),
            "cached-token"
        );
    }
}
