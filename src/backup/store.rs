//! JSON persistence for backup bundles
//!
//! A backup file is one pretty-printed JSON array of bundles. Writes go to a
//! sibling temporary file first and are renamed into place, so an interrupted
//! backup never leaves a truncated file behind.

use crate::backup::{BackupBundle, CURRENT_SCHEMA_VERSION};
use crate::error::{AppVaultError, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct BackupStore;

impl BackupStore {
    pub fn write(bundles: &[BackupBundle], path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(bundles)?;
        let tmp = temp_path(path);
        fs::write(&tmp, content)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!("Wrote {} bundle(s) to {}", bundles.len(), path.display());
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Vec<BackupBundle>> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a backup document, rejecting bundles from a newer schema
    pub fn parse(content: &str) -> Result<Vec<BackupBundle>> {
        let raw: Vec<Value> = serde_json::from_str(content)?;

        // Check versions before typed parsing so a newer layout reports the
        // version rather than an arbitrary field error
        for value in &raw {
            let version = value
                .get("schemaVersion")
                .and_then(Value::as_u64)
                .unwrap_or(1);
            if version > u64::from(CURRENT_SCHEMA_VERSION) {
                return Err(AppVaultError::UnsupportedSchemaVersion {
                    found: u32::try_from(version).unwrap_or(u32::MAX),
                    supported: CURRENT_SCHEMA_VERSION,
                });
            }
        }

        raw.into_iter()
            .map(|value| serde_json::from_value(value).map_err(AppVaultError::from))
            .collect()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::applications::{
        ApplicationRegistration, KeyCredential, PasswordCredential, ServicePrincipal,
    };
    use chrono::{DateTime, TimeZone, Utc};

    fn bundle(name: &str) -> BackupBundle {
        let mut bundle = BackupBundle::new(
            ApplicationRegistration {
                id: Some(format!("obj-{}", name)),
                app_id: Some(format!("app-{}", name)),
                display_name: name.to_string(),
                ..Default::default()
            },
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        );
        bundle.service_principal = Some(ServicePrincipal {
            id: Some(format!("sp-{}", name)),
            app_id: Some(format!("app-{}", name)),
            ..Default::default()
        });
        bundle.secrets = vec![PasswordCredential {
            display_name: Some("ci".into()),
            ..Default::default()
        }];
        bundle.certificates = vec![KeyCredential {
            display_name: Some("signing".into()),
            key: Some("TUlJQw==".into()),
            ..Default::default()
        }];
        bundle
    }

    #[test]
    fn test_write_then_read_preserves_bundles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/backup.json");
        let bundles = vec![bundle("Payroll"), bundle("Expenses")];

        BackupStore::write(&bundles, &path).unwrap();
        let read = BackupStore::read(&path).unwrap();

        assert_eq!(read, bundles);
        assert!(!path.with_file_name("backup.json.tmp").exists());
    }

    #[test]
    fn test_absent_values_are_omitted_not_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        let mut bare = bundle("Legacy");
        bare.service_principal = None;

        BackupStore::write(&[bare], &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();

        assert!(!text.contains("null"));
        assert!(!text.contains("servicePrincipal\""));
        assert!(text.contains("\"schemaVersion\": 1"));
        assert!(text.contains("\"capturedAt\""));
    }

    #[test]
    fn test_empty_array_reads_as_no_bundles() {
        assert!(BackupStore::parse("[]").unwrap().is_empty());
    }

    #[test]
    fn test_legacy_bundle_without_version_or_lists() {
        let bundles = BackupStore::parse(
            r#"[{
                "application": { "appId": "a1", "displayName": "Payroll" },
                "servicePrincipal": null,
                "secrets": null,
                "capturedAt": "2023-11-02T08:30:00Z"
            }]"#,
        )
        .unwrap();

        assert_eq!(bundles[0].schema_version, 1);
        assert!(bundles[0].service_principal.is_none());
        assert!(bundles[0].secrets.is_empty());
        assert!(bundles[0].certificates.is_empty());
        assert!(bundles[0].owners.is_empty());
    }

    #[test]
    fn test_bundle_missing_application_and_capture_time() {
        let bundles = BackupStore::parse(
            r##"[
                { "application": { "appId": "a1", "displayName": "Payroll" } },
                {
                    "capturedAt": "2023-11-02T08:30:00Z",
                    "owners": [{ "@odata.type": "#microsoft.graph.user" }]
                },
                {
                    "application": {
                        "displayName": "Expenses",
                        "requiredResourceAccess": [{ "resourceAccess": [{}] }]
                    }
                }
            ]"##,
        )
        .unwrap();

        assert_eq!(bundles.len(), 3);
        assert_eq!(bundles[0].display_name(), "Payroll");
        assert_eq!(bundles[0].captured_at, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(bundles[1].display_name(), "");
        assert_eq!(bundles[1].application.app_id(), "");
        assert_eq!(bundles[1].owners[0].id, "");
        let access = &bundles[2].application.required_resource_access[0];
        assert_eq!(access.resource_app_id, "");
        assert_eq!(access.resource_access[0].id, "");
        assert_eq!(access.resource_access[0].access_type, "");
    }

    #[test]
    fn test_newer_schema_version_is_rejected() {
        let err = BackupStore::parse(
            r#"[{ "schemaVersion": 7, "application": {}, "somethingNew": true }]"#,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            AppVaultError::UnsupportedSchemaVersion {
                found: 7,
                supported: 1
            }
        ));
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        assert!(BackupStore::parse(r#"{"application": {}}"#).is_err());
    }
}
