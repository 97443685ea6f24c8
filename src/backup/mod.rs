//! Application backup bundles
//!
//! A [`BackupBundle`] is the self-contained snapshot of one application: the
//! registration, its service principal (when the directory has one), the
//! principal's credentials and optional provisioning metadata.

pub mod collector;
pub mod store;

use crate::graph::applications::{
    null_as_default, ApplicationRegistration, DirectoryObjectRef, KeyCredential,
    PasswordCredential, ServicePrincipal, SynchronizationJob, SynchronizationTemplate,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version written into every new bundle
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

fn legacy_schema_version() -> u32 {
    1
}

/// Stands in for a capture time the file never recorded
fn unknown_capture_time() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupBundle {
    /// Files written before versioning existed are read as version 1
    #[serde(default = "legacy_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub application: ApplicationRegistration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_principal: Option<ServicePrincipal>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub secrets: Vec<PasswordCredential>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub certificates: Vec<KeyCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronization_job: Option<SynchronizationJob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronization_template: Option<SynchronizationTemplate>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub owners: Vec<DirectoryObjectRef>,
    #[serde(default = "unknown_capture_time")]
    pub captured_at: DateTime<Utc>,
}

impl BackupBundle {
    pub fn new(application: ApplicationRegistration, captured_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            application,
            service_principal: None,
            secrets: Vec::new(),
            certificates: Vec::new(),
            synchronization_job: None,
            synchronization_template: None,
            owners: Vec::new(),
            captured_at,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.application.display_name
    }

    pub fn has_service_principal(&self) -> bool {
        self.service_principal.is_some()
    }
}
