//! Restore outcomes and the aggregate report

use crate::backup::BackupBundle;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Per-bundle restore stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RestoreStage {
    DuplicateCheck,
    CreateRegistration,
    WaitPropagation,
    CreateServicePrincipal,
    RestoreCredentials,
    Done,
}

impl fmt::Display for RestoreStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RestoreStage::DuplicateCheck => "duplicate check",
            RestoreStage::CreateRegistration => "create registration",
            RestoreStage::WaitPropagation => "wait for propagation",
            RestoreStage::CreateServicePrincipal => "create service principal",
            RestoreStage::RestoreCredentials => "restore credentials",
            RestoreStage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleStatus {
    /// Registration and service principal exist; credential errors may still be listed
    Succeeded,
    /// Registration exists but the service principal could not be created
    Partial,
    Failed,
    /// An application with the same display name already existed
    Skipped,
    /// Never started because the batch was cancelled
    Cancelled,
}

impl fmt::Display for BundleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleStatus::Succeeded => write!(f, "succeeded"),
            BundleStatus::Partial => write!(f, "partial"),
            BundleStatus::Failed => write!(f, "failed"),
            BundleStatus::Skipped => write!(f, "skipped"),
            BundleStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A secret issued by the destination tenant during restore
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSecret {
    pub application: String,
    pub app_id: String,
    pub service_principal_id: String,
    pub credential: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    pub secret_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date_time: Option<DateTime<Utc>>,
}

impl fmt::Debug for IssuedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedSecret")
            .field("application", &self.application)
            .field("app_id", &self.app_id)
            .field("credential", &self.credential)
            .field("secret_text", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BundleOutcome {
    pub display_name: String,
    pub source_app_id: Option<String>,
    pub status: BundleStatus,
    /// Last stage entered
    pub stage: RestoreStage,
    pub new_object_id: Option<String>,
    pub new_app_id: Option<String>,
    pub new_service_principal_id: Option<String>,
    /// Formatted `[<display name>] <stage>: <message>`
    pub errors: Vec<String>,
    /// Informational messages that are not failures
    pub notes: Vec<String>,
    pub issued_secrets: Vec<IssuedSecret>,
}

impl BundleOutcome {
    pub(crate) fn start(bundle: &BackupBundle) -> Self {
        Self {
            display_name: bundle.display_name().to_string(),
            source_app_id: bundle.application.app_id.clone(),
            status: BundleStatus::Failed,
            stage: RestoreStage::DuplicateCheck,
            new_object_id: None,
            new_app_id: None,
            new_service_principal_id: None,
            errors: Vec::new(),
            notes: Vec::new(),
            issued_secrets: Vec::new(),
        }
    }

    pub(crate) fn cancelled(bundle: &BackupBundle) -> Self {
        Self {
            status: BundleStatus::Cancelled,
            ..Self::start(bundle)
        }
    }

    pub(crate) fn record_error(&mut self, message: impl fmt::Display) {
        self.errors
            .push(format!("[{}] {}: {}", self.display_name, self.stage, message));
    }
}

/// Aggregate result of one restore batch
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    /// One entry per failure cause, in input order
    pub errors: Vec<String>,
    /// One entry per input bundle, in input order
    pub outcomes: Vec<BundleOutcome>,
}

impl RestoreReport {
    pub fn from_outcomes(outcomes: Vec<BundleOutcome>) -> Self {
        let mut report = RestoreReport::default();
        for outcome in &outcomes {
            match outcome.status {
                BundleStatus::Succeeded => report.succeeded += 1,
                BundleStatus::Partial => report.partial += 1,
                BundleStatus::Failed => report.failed += 1,
                BundleStatus::Skipped => report.skipped += 1,
                BundleStatus::Cancelled => report.cancelled += 1,
            }
            report.errors.extend(outcome.errors.iter().cloned());
        }
        report.outcomes = outcomes;
        report
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn issued_secrets(&self) -> Vec<&IssuedSecret> {
        self.outcomes
            .iter()
            .flat_map(|o| o.issued_secrets.iter())
            .collect()
    }

    /// True when every bundle fully succeeded or was skipped, with no errors
    pub fn is_clean(&self) -> bool {
        self.partial == 0 && self.failed == 0 && self.cancelled == 0 && self.errors.is_empty()
    }
}
