//! Recreates backed-up applications in a destination tenant
//!
//! Each bundle moves through a fixed sequence of stages:
//!
//! ```text
//! create registration -> wait for propagation -> create service principal
//!     -> restore credentials -> done
//! ```
//!
//! A failed registration create ends the bundle as [`BundleStatus::Failed`].
//! A failed service principal create leaves the registration in place and
//! ends as [`BundleStatus::Partial`]. Credential failures are recorded but
//! never change the outcome. Bundles are independent and run on a bounded
//! pool of workers; the stages within one bundle always run in order.

pub mod report;

pub use report::{BundleOutcome, BundleStatus, IssuedSecret, RestoreReport, RestoreStage};

use crate::backup::BackupBundle;
use crate::config::RestoreSettings;
use crate::error::{AppVaultError, Result};
use crate::graph::applications::{
    ApplicationCreateRequest, KeyCredential, ServicePrincipalCreateRequest,
};
use crate::graph::directory::{DirectoryApi, ObjectKind};
use crate::progress::{NoProgress, ProgressSink, ProgressUpdate};
use crate::resolver::DirectoryNameResolver;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Pause between registration create and service principal create
    pub propagation_delay: Duration,
    /// Bundles restored concurrently
    pub workers: usize,
    /// Skip bundles whose display name already exists in the destination
    pub skip_existing: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            propagation_delay: Duration::from_secs(2),
            workers: 4,
            skip_existing: false,
        }
    }
}

impl From<&RestoreSettings> for RestoreOptions {
    fn from(settings: &RestoreSettings) -> Self {
        Self {
            propagation_delay: Duration::from_secs(settings.propagation_delay_secs),
            workers: settings.workers.max(1),
            skip_existing: false,
        }
    }
}

pub struct RestoreOrchestrator {
    api: Arc<dyn DirectoryApi>,
    options: RestoreOptions,
    resolver: Option<Arc<DirectoryNameResolver>>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl RestoreOrchestrator {
    pub fn new(api: Arc<dyn DirectoryApi>, options: RestoreOptions) -> Self {
        Self {
            api,
            options,
            resolver: None,
            progress: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
        }
    }

    /// Name resource APIs in progress messages
    pub fn with_resolver(mut self, resolver: Arc<DirectoryNameResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Checked before each bundle starts, never mid-bundle
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &RestoreOptions {
        &self.options
    }

    pub async fn restore(&self, bundles: Vec<BackupBundle>) -> Result<RestoreReport> {
        if bundles.is_empty() {
            return Err(AppVaultError::NothingToRestore);
        }

        let total = bundles.len();
        let workers = self.options.workers.max(1);
        let completed = AtomicUsize::new(0);
        info!("Restoring {} application(s) with {} worker(s)", total, workers);

        let mut indexed: Vec<(usize, BundleOutcome)> = stream::iter(bundles.iter().enumerate())
            .map(|(index, bundle)| {
                let completed = &completed;
                async move {
                    let outcome = if self.cancel.is_cancelled() {
                        debug!("Not starting '{}': restore cancelled", bundle.display_name());
                        BundleOutcome::cancelled(bundle)
                    } else {
                        self.restore_bundle(bundle).await
                    };
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    self.report_progress(done, total, bundle, &outcome).await;
                    (index, outcome)
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        let report =
            RestoreReport::from_outcomes(indexed.into_iter().map(|(_, outcome)| outcome).collect());

        info!(
            "Restore finished: {} succeeded, {} partial, {} failed, {} skipped, {} cancelled",
            report.succeeded, report.partial, report.failed, report.skipped, report.cancelled
        );
        Ok(report)
    }

    async fn restore_bundle(&self, bundle: &BackupBundle) -> BundleOutcome {
        let mut outcome = BundleOutcome::start(bundle);
        let name = bundle.display_name();

        if self.options.skip_existing {
            match self.api.find_applications_by_display_name(name).await {
                Ok(existing) if !existing.is_empty() => {
                    outcome.status = BundleStatus::Skipped;
                    outcome.notes.push(format!(
                        "'{}' already exists (appId {})",
                        name,
                        existing[0].app_id()
                    ));
                    return outcome;
                }
                Ok(_) => {}
                Err(e) => {
                    // Creating without a completed duplicate check could duplicate the app
                    outcome.record_error(e);
                    return outcome;
                }
            }
        }

        outcome.stage = RestoreStage::CreateRegistration;
        let request = ApplicationCreateRequest::from(&bundle.application);
        let created = match self.api.create_application(&request).await {
            Ok(app) => app,
            Err(e) => {
                warn!("Could not create registration '{}': {}", name, e);
                outcome.record_error(e);
                return outcome;
            }
        };
        outcome.new_object_id = created.id.clone();
        outcome.new_app_id = created.app_id.clone();
        debug!("Created registration '{}' as {}", name, created.app_id());

        // From here on the registration exists and is never rolled back
        outcome.status = BundleStatus::Partial;

        outcome.stage = RestoreStage::WaitPropagation;
        if !self.options.propagation_delay.is_zero() {
            tokio::time::sleep(self.options.propagation_delay).await;
        }

        outcome.stage = RestoreStage::CreateServicePrincipal;
        if created.app_id().is_empty() {
            outcome.record_error("created registration returned no appId");
            return outcome;
        }
        if bundle.service_principal.is_none() {
            outcome.notes.push(format!(
                "'{}' had no service principal in the backup; created one with default settings",
                name
            ));
        }
        let request = ServicePrincipalCreateRequest::for_app(
            created.app_id(),
            bundle.service_principal.as_ref(),
        );
        let principal = match self.api.create_service_principal(&request).await {
            Ok(sp) => sp,
            Err(e) => {
                warn!("Could not create service principal for '{}': {}", name, e);
                outcome.record_error(e);
                return outcome;
            }
        };
        outcome.status = BundleStatus::Succeeded;

        outcome.stage = RestoreStage::RestoreCredentials;
        let Some(sp_id) = principal.id else {
            // The principal exists; only its credentials cannot be addressed
            outcome.record_error(
                "created service principal returned no id; credentials not restored",
            );
            return outcome;
        };
        outcome.new_service_principal_id = Some(sp_id.clone());
        for secret in &bundle.secrets {
            match self.api.add_secret(&sp_id, secret).await {
                Ok(issued) => {
                    if let Some(secret_text) = issued.secret_text {
                        outcome.issued_secrets.push(IssuedSecret {
                            application: name.to_string(),
                            app_id: created.app_id().to_string(),
                            service_principal_id: sp_id.clone(),
                            credential: secret.label().to_string(),
                            key_id: issued.key_id,
                            secret_text,
                            end_date_time: issued.end_date_time,
                        });
                    }
                }
                Err(e) => {
                    warn!("Secret '{}' on '{}' not restored: {}", secret.label(), name, e);
                    outcome.record_error(format!("secret '{}': {}", secret.label(), e));
                }
            }
        }

        let mut added: Vec<KeyCredential> = Vec::new();
        for certificate in &bundle.certificates {
            match self.api.add_certificate(&sp_id, certificate, &added).await {
                Ok(()) => added.push(certificate.clone()),
                Err(e) => {
                    warn!(
                        "Certificate '{}' on '{}' not restored: {}",
                        certificate.label(),
                        name,
                        e
                    );
                    outcome
                        .record_error(format!("certificate '{}': {}", certificate.label(), e));
                }
            }
        }

        outcome.stage = RestoreStage::Done;
        outcome
    }

    async fn report_progress(
        &self,
        completed: usize,
        total: usize,
        bundle: &BackupBundle,
        outcome: &BundleOutcome,
    ) {
        for note in &outcome.notes {
            self.progress.report(ProgressUpdate {
                completed: completed.saturating_sub(1),
                total,
                message: note.clone(),
            });
        }

        let mut message = format!(
            "Restored {} of {} applications ({}: {})",
            completed,
            total,
            outcome.display_name,
            outcome.status
        );
        if let Some(resolver) = &self.resolver {
            if matches!(
                outcome.status,
                BundleStatus::Succeeded | BundleStatus::Partial
            ) {
                let resource_ids: Vec<String> = bundle
                    .application
                    .required_resource_access
                    .iter()
                    .map(|r| r.resource_app_id.clone())
                    .collect();
                if !resource_ids.is_empty() {
                    let names = resolver
                        .resolve_all(ObjectKind::Application, &resource_ids)
                        .await;
                    message.push_str(&format!(", permissions on {}", names.join(", ")));
                }
            }
        }

        self.progress.report(ProgressUpdate {
            completed,
            total,
            message,
        });
    }
}
