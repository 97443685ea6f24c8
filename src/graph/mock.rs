//! In-memory directory for pipeline tests

use crate::error::{AppVaultError, Result};
use crate::graph::applications::{
    ApplicationCreateRequest, ApplicationRegistration, DirectoryObjectRef, KeyCredential,
    PasswordCredential, ServicePrincipal, ServicePrincipalCreateRequest, SynchronizationJob,
    SynchronizationTemplate,
};
use crate::graph::directory::{DirectoryApi, ObjectKind};
use crate::graph::pagination::ListQuery;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub(crate) struct MockState {
    pub applications: Vec<ApplicationRegistration>,
    pub service_principals: Vec<ServicePrincipal>,
    /// Keyed by service principal id
    pub sync_jobs: HashMap<String, SynchronizationJob>,
    /// Keyed by application object id
    pub owners: HashMap<String, Vec<DirectoryObjectRef>>,
    /// Keyed by object id (users, groups) or appId (applications)
    pub display_names: HashMap<String, String>,

    /// appIds whose registration lookup errors out
    pub fail_application_lookup: HashSet<String>,
    /// Display names whose duplicate lookup errors out
    pub fail_display_name_lookup: HashSet<String>,
    /// appIds whose service principal lookup errors out
    pub fail_service_principal_lookup: HashSet<String>,
    /// Display names whose registration create is rejected
    pub fail_create_application: HashSet<String>,
    /// Display names whose service principal create is rejected
    pub fail_create_service_principal: HashSet<String>,
    /// Display names whose created service principal comes back without an id
    pub principals_without_id: HashSet<String>,
    /// Credential display names whose add call is rejected
    pub fail_credentials: HashSet<String>,

    pub application_lookups: Vec<String>,
    pub list_endpoints: Vec<String>,
    pub created_applications: Vec<ApplicationCreateRequest>,
    pub created_service_principals: Vec<ServicePrincipalCreateRequest>,
    pub secret_calls: Vec<(String, String)>,
    pub certificate_calls: Vec<(String, String, usize)>,
    pub display_name_calls: usize,
    next_id: usize,
}

#[derive(Default)]
pub(crate) struct MockDirectory {
    state: Mutex<MockState>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Seed a registration and, optionally, its service principal
    pub fn seed_app(&self, app_id: &str, display_name: &str, with_principal: bool) {
        let mut state = self.state();
        state.applications.push(ApplicationRegistration {
            id: Some(format!("obj-{}", app_id)),
            app_id: Some(app_id.to_string()),
            display_name: display_name.to_string(),
            ..Default::default()
        });
        if with_principal {
            state.service_principals.push(ServicePrincipal {
                id: Some(format!("sp-{}", app_id)),
                app_id: Some(app_id.to_string()),
                display_name: Some(display_name.to_string()),
                password_credentials: vec![PasswordCredential {
                    display_name: Some(format!("{} secret", display_name)),
                    ..Default::default()
                }],
                ..Default::default()
            });
        }
    }

    fn rejected(message: String) -> AppVaultError {
        AppVaultError::GraphApi {
            status: 400,
            message,
        }
    }
}

#[async_trait]
impl DirectoryApi for MockDirectory {
    /// Honors a `startswith(displayName,...)` filter, case-insensitively like Graph
    async fn list_applications(&self, query: &ListQuery) -> Result<Vec<ApplicationRegistration>> {
        let mut state = self.state();
        state.list_endpoints.push(query.to_endpoint());

        let prefix = query
            .filter_expression()
            .and_then(|f| f.strip_prefix("startswith(displayName,'"))
            .and_then(|rest| rest.strip_suffix("')"))
            .map(|p| p.replace("''", "'").to_lowercase());
        Ok(state
            .applications
            .iter()
            .filter(|a| match &prefix {
                Some(p) => a.display_name.to_lowercase().starts_with(p.as_str()),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn find_application_by_app_id(
        &self,
        app_id: &str,
    ) -> Result<Option<ApplicationRegistration>> {
        let mut state = self.state();
        state.application_lookups.push(app_id.to_string());
        if state.fail_application_lookup.contains(app_id) {
            return Err(AppVaultError::GraphApi {
                status: 503,
                message: format!("lookup of {} failed", app_id),
            });
        }
        Ok(state
            .applications
            .iter()
            .find(|a| a.app_id() == app_id)
            .cloned())
    }

    async fn find_applications_by_display_name(
        &self,
        display_name: &str,
    ) -> Result<Vec<ApplicationRegistration>> {
        let state = self.state();
        if state.fail_display_name_lookup.contains(display_name) {
            return Err(AppVaultError::GraphApi {
                status: 503,
                message: format!("lookup of '{}' failed", display_name),
            });
        }
        Ok(state
            .applications
            .iter()
            .filter(|a| a.display_name == display_name)
            .cloned()
            .collect())
    }

    async fn find_service_principal_by_app_id(
        &self,
        app_id: &str,
    ) -> Result<Option<ServicePrincipal>> {
        let state = self.state();
        if state.fail_service_principal_lookup.contains(app_id) {
            return Err(AppVaultError::GraphApi {
                status: 500,
                message: "service principal lookup failed".into(),
            });
        }
        Ok(state
            .service_principals
            .iter()
            .find(|sp| sp.app_id.as_deref() == Some(app_id))
            .cloned())
    }

    async fn list_owners(&self, application_id: &str) -> Result<Vec<DirectoryObjectRef>> {
        Ok(self
            .state()
            .owners
            .get(application_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_synchronization_job(
        &self,
        service_principal_id: &str,
    ) -> Result<Option<SynchronizationJob>> {
        match self.state().sync_jobs.get(service_principal_id) {
            Some(job) => Ok(Some(job.clone())),
            // Graph answers apps without provisioning with an error, not an empty list
            None => Err(AppVaultError::GraphApi {
                status: 404,
                message: "synchronization not applicable".into(),
            }),
        }
    }

    async fn get_synchronization_template(
        &self,
        _service_principal_id: &str,
    ) -> Result<Option<SynchronizationTemplate>> {
        Ok(None)
    }

    async fn create_application(
        &self,
        request: &ApplicationCreateRequest,
    ) -> Result<ApplicationRegistration> {
        let mut state = self.state();
        if state.fail_create_application.contains(&request.display_name) {
            return Err(Self::rejected(format!(
                "cannot create '{}'",
                request.display_name
            )));
        }

        state.next_id += 1;
        let created = ApplicationRegistration {
            id: Some(format!("new-obj-{}", state.next_id)),
            app_id: Some(format!("new-app-{}", state.next_id)),
            display_name: request.display_name.clone(),
            ..Default::default()
        };
        state.created_applications.push(request.clone());
        state.applications.push(created.clone());
        Ok(created)
    }

    async fn create_service_principal(
        &self,
        request: &ServicePrincipalCreateRequest,
    ) -> Result<ServicePrincipal> {
        let mut state = self.state();
        state.created_service_principals.push(request.clone());

        let display_name = state
            .applications
            .iter()
            .find(|a| a.app_id() == request.app_id)
            .map(|a| a.display_name.clone())
            .unwrap_or_default();
        if state.fail_create_service_principal.contains(&display_name) {
            return Err(Self::rejected(format!(
                "service principal for '{}' rejected",
                display_name
            )));
        }

        state.next_id += 1;
        let id = if state.principals_without_id.contains(&display_name) {
            None
        } else {
            Some(format!("new-sp-{}", state.next_id))
        };
        Ok(ServicePrincipal {
            id,
            app_id: Some(request.app_id.clone()),
            display_name: Some(display_name),
            account_enabled: Some(request.account_enabled),
            ..Default::default()
        })
    }

    async fn add_secret(
        &self,
        service_principal_id: &str,
        secret: &PasswordCredential,
    ) -> Result<PasswordCredential> {
        let mut state = self.state();
        state
            .secret_calls
            .push((service_principal_id.to_string(), secret.label().to_string()));
        if state.fail_credentials.contains(secret.label()) {
            return Err(Self::rejected(format!(
                "secret '{}' rejected",
                secret.label()
            )));
        }
        Ok(PasswordCredential {
            display_name: secret.display_name.clone(),
            key_id: Some(format!("key-{}", state.secret_calls.len())),
            secret_text: Some(format!("issued-{}", secret.label())),
            ..Default::default()
        })
    }

    async fn add_certificate(
        &self,
        service_principal_id: &str,
        certificate: &KeyCredential,
        previously_added: &[KeyCredential],
    ) -> Result<()> {
        let mut state = self.state();
        state.certificate_calls.push((
            service_principal_id.to_string(),
            certificate.label().to_string(),
            previously_added.len(),
        ));
        if state.fail_credentials.contains(certificate.label()) {
            return Err(Self::rejected(format!(
                "certificate '{}' rejected",
                certificate.label()
            )));
        }
        Ok(())
    }

    async fn display_name(&self, _kind: ObjectKind, id: &str) -> Result<String> {
        let mut state = self.state();
        state.display_name_calls += 1;
        state
            .display_names
            .get(id)
            .cloned()
            .ok_or_else(|| AppVaultError::GraphApi {
                status: 404,
                message: format!("{} not found", id),
            })
    }
}
