//! Captures applications and their related objects into backup bundles

use crate::backup::BackupBundle;
use crate::error::{AppVaultError, Result};
use crate::graph::applications::{ApplicationRegistration, APPLICATION_LIST_SELECT};
use crate::graph::directory::DirectoryApi;
use crate::graph::pagination::{odata_literal, ListQuery, MAX_PAGE_SIZE};
use crate::progress::{NoProgress, ProgressSink, ProgressUpdate};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of collecting one application
#[derive(Debug, Clone)]
pub enum CollectionOutcome {
    Captured(BackupBundle),
    Failed {
        app_id: String,
        display_name: String,
        error: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct CollectionReport {
    /// One entry per input application, in input order
    pub outcomes: Vec<CollectionOutcome>,
}

impl CollectionReport {
    pub fn bundles(&self) -> Vec<&BackupBundle> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                CollectionOutcome::Captured(bundle) => Some(bundle),
                CollectionOutcome::Failed { .. } => None,
            })
            .collect()
    }

    pub fn into_bundles(self) -> Vec<BackupBundle> {
        self.outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                CollectionOutcome::Captured(bundle) => Some(bundle),
                CollectionOutcome::Failed { .. } => None,
            })
            .collect()
    }

    /// `(display name, error)` for every application that could not be captured
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                CollectionOutcome::Failed {
                    display_name,
                    error,
                    ..
                } => Some((display_name.as_str(), error.as_str())),
                CollectionOutcome::Captured(_) => None,
            })
            .collect()
    }
}

pub struct EntityGraphCollector {
    api: Arc<dyn DirectoryApi>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl EntityGraphCollector {
    pub fn new(api: Arc<dyn DirectoryApi>) -> Self {
        Self {
            api,
            progress: Arc::new(NoProgress),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// List registrations eligible for backup.
    ///
    /// `prefix` narrows by display name (`startswith`); `app_ids`, when not
    /// empty, keeps only those client ids.
    pub async fn select_applications(
        &self,
        prefix: Option<&str>,
        app_ids: &[String],
    ) -> Result<Vec<ApplicationRegistration>> {
        let mut query = ListQuery::new("applications")
            .select(APPLICATION_LIST_SELECT)
            .order_by("displayName")
            .top(MAX_PAGE_SIZE)
            .eventual_consistency();
        if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
            query = query.filter(format!(
                "startswith(displayName,'{}')",
                odata_literal(prefix)
            ));
        }

        let mut apps = self.api.list_applications(&query).await?;
        if !app_ids.is_empty() {
            apps.retain(|app| app_ids.iter().any(|id| id.eq_ignore_ascii_case(app.app_id())));
        }
        debug!("Selected {} application(s) for backup", apps.len());
        Ok(apps)
    }

    /// Capture a bundle for each application, in order.
    ///
    /// A failure on one application never stops the others.
    pub async fn collect(&self, applications: &[ApplicationRegistration]) -> CollectionReport {
        let total = applications.len();
        let mut report = CollectionReport {
            outcomes: Vec::with_capacity(total),
        };

        for (index, app) in applications.iter().enumerate() {
            let outcome = if self.cancel.is_cancelled() {
                CollectionOutcome::Failed {
                    app_id: app.app_id().to_string(),
                    display_name: app.display_name.clone(),
                    error: AppVaultError::Cancelled.to_string(),
                }
            } else {
                match self.collect_one(app).await {
                    Ok(bundle) => CollectionOutcome::Captured(bundle),
                    Err(e) => {
                        warn!("Could not back up '{}': {}", app.display_name, e);
                        CollectionOutcome::Failed {
                            app_id: app.app_id().to_string(),
                            display_name: app.display_name.clone(),
                            error: e.to_string(),
                        }
                    }
                }
            };
            report.outcomes.push(outcome);

            self.progress.report(ProgressUpdate {
                completed: index + 1,
                total,
                message: format!("Backed up {} of {} applications", index + 1, total),
            });
        }

        info!(
            "Collected {} of {} application(s)",
            report.bundles().len(),
            total
        );
        report
    }

    async fn collect_one(&self, listed: &ApplicationRegistration) -> Result<BackupBundle> {
        let app_id = listed.app_id();
        if app_id.is_empty() {
            return Err(AppVaultError::GraphApi {
                status: 400,
                message: format!("application '{}' has no appId", listed.display_name),
            });
        }

        // The listing only carries a narrow $select
        let application = self
            .api
            .find_application_by_app_id(app_id)
            .await?
            .ok_or_else(|| AppVaultError::GraphApi {
                status: 404,
                message: format!("application {} no longer exists", app_id),
            })?;

        let mut bundle = BackupBundle::new(application, Utc::now());

        let principal = match self.api.find_service_principal_by_app_id(app_id).await {
            Ok(Some(sp)) => Some(sp),
            Ok(None) => {
                warn!(
                    "'{}' has no service principal; backing up the registration only",
                    listed.display_name
                );
                None
            }
            Err(e) => {
                warn!(
                    "Service principal lookup for '{}' failed: {}",
                    listed.display_name, e
                );
                None
            }
        };

        if let Some(sp) = &principal {
            bundle.secrets = sp.password_credentials.clone();
            bundle.certificates = sp.key_credentials.clone();

            if let Some(sp_id) = sp.id.as_deref() {
                bundle.synchronization_job = self
                    .api
                    .get_synchronization_job(sp_id)
                    .await
                    .unwrap_or_else(|e| {
                        debug!("No synchronization job for '{}': {}", listed.display_name, e);
                        None
                    });
                bundle.synchronization_template = self
                    .api
                    .get_synchronization_template(sp_id)
                    .await
                    .unwrap_or_else(|e| {
                        debug!(
                            "No synchronization template for '{}': {}",
                            listed.display_name, e
                        );
                        None
                    });
            }
        }
        bundle.service_principal = principal;

        if let Some(object_id) = bundle.application.id.clone() {
            bundle.owners = self.api.list_owners(&object_id).await.unwrap_or_else(|e| {
                debug!("Owners of '{}' unavailable: {}", listed.display_name, e);
                Vec::new()
            });
        }

        bundle.captured_at = Utc::now();
        Ok(bundle)
    }
}
