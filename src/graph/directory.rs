//! Directory operations used by the backup/restore pipeline
//!
//! [`DirectoryApi`] is the seam between the pipeline and Microsoft Graph.
//! [`GraphDirectory`] is the production implementation; tests substitute an
//! in-memory directory.

use crate::error::{AppVaultError, Result};
use crate::graph::applications::{
    AddPasswordRequest, ApplicationCreateRequest, ApplicationRegistration, DirectoryObjectRef,
    KeyCredential, PasswordCredential, ServicePrincipal, ServicePrincipalCreateRequest,
    SynchronizationJob, SynchronizationTemplate, APPLICATION_LIST_SELECT, APPLICATION_SELECT,
    SERVICE_PRINCIPAL_SELECT,
};
use crate::graph::pagination::{odata_literal, ListQuery, MAX_PAGE_SIZE};
use crate::graph::GraphClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of directory object whose display names can be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Keyed by user object id
    User,
    /// Keyed by group object id
    Group,
    /// Keyed by client id (appId)
    Application,
}

impl ObjectKind {
    /// Map an `@odata.type` such as `#microsoft.graph.user`
    pub fn from_odata_type(odata_type: &str) -> Option<Self> {
        match odata_type.trim_start_matches("#microsoft.graph.") {
            "user" => Some(ObjectKind::User),
            "group" => Some(ObjectKind::Group),
            "servicePrincipal" | "application" => Some(ObjectKind::Application),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::User => write!(f, "user"),
            ObjectKind::Group => write!(f, "group"),
            ObjectKind::Application => write!(f, "application"),
        }
    }
}

#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// Complete listing of application registrations matching `query`
    async fn list_applications(&self, query: &ListQuery) -> Result<Vec<ApplicationRegistration>>;

    /// Full registration (all of [`APPLICATION_SELECT`]) by client id
    async fn find_application_by_app_id(
        &self,
        app_id: &str,
    ) -> Result<Option<ApplicationRegistration>>;

    async fn find_applications_by_display_name(
        &self,
        display_name: &str,
    ) -> Result<Vec<ApplicationRegistration>>;

    async fn find_service_principal_by_app_id(
        &self,
        app_id: &str,
    ) -> Result<Option<ServicePrincipal>>;

    /// Owners of an application, by the application's object id
    async fn list_owners(&self, application_id: &str) -> Result<Vec<DirectoryObjectRef>>;

    async fn get_synchronization_job(
        &self,
        service_principal_id: &str,
    ) -> Result<Option<SynchronizationJob>>;

    async fn get_synchronization_template(
        &self,
        service_principal_id: &str,
    ) -> Result<Option<SynchronizationTemplate>>;

    async fn create_application(
        &self,
        request: &ApplicationCreateRequest,
    ) -> Result<ApplicationRegistration>;

    async fn create_service_principal(
        &self,
        request: &ServicePrincipalCreateRequest,
    ) -> Result<ServicePrincipal>;

    /// Ask the directory to issue a new secret shaped like `secret`
    async fn add_secret(
        &self,
        service_principal_id: &str,
        secret: &PasswordCredential,
    ) -> Result<PasswordCredential>;

    /// Add one certificate. `keyCredentials` is replaced as a whole by Graph,
    /// so the certificates already restored on this principal are passed along.
    async fn add_certificate(
        &self,
        service_principal_id: &str,
        certificate: &KeyCredential,
        previously_added: &[KeyCredential],
    ) -> Result<()>;

    async fn display_name(&self, kind: ObjectKind, id: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamedObject {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyCredentialsPatch {
    key_credentials: Vec<KeyCredential>,
}

/// [`DirectoryApi`] over Microsoft Graph
pub struct GraphDirectory {
    client: GraphClient,
    page_size: u32,
}

impl GraphDirectory {
    pub fn new(client: GraphClient) -> Self {
        Self {
            client,
            page_size: MAX_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    fn by_app_id(&self, resource: &str, app_id: &str, select: &[&str]) -> ListQuery {
        ListQuery::new(resource)
            .filter(format!("appId eq '{}'", odata_literal(app_id)))
            .select(select)
            .top(self.page_size)
            .eventual_consistency()
    }
}

#[async_trait]
impl DirectoryApi for GraphDirectory {
    async fn list_applications(&self, query: &ListQuery) -> Result<Vec<ApplicationRegistration>> {
        self.client.get_all(query).await
    }

    async fn find_application_by_app_id(
        &self,
        app_id: &str,
    ) -> Result<Option<ApplicationRegistration>> {
        let query = self.by_app_id("applications", app_id, APPLICATION_SELECT);
        let apps: Vec<ApplicationRegistration> = self.client.get_all(&query).await?;
        Ok(apps.into_iter().next())
    }

    async fn find_applications_by_display_name(
        &self,
        display_name: &str,
    ) -> Result<Vec<ApplicationRegistration>> {
        let query = ListQuery::new("applications")
            .filter(format!("displayName eq '{}'", odata_literal(display_name)))
            .select(APPLICATION_LIST_SELECT)
            .top(self.page_size)
            .eventual_consistency();
        self.client.get_all(&query).await
    }

    async fn find_service_principal_by_app_id(
        &self,
        app_id: &str,
    ) -> Result<Option<ServicePrincipal>> {
        let query = self.by_app_id("servicePrincipals", app_id, SERVICE_PRINCIPAL_SELECT);
        let principals: Vec<ServicePrincipal> = self.client.get_all(&query).await?;
        Ok(principals.into_iter().next())
    }

    async fn list_owners(&self, application_id: &str) -> Result<Vec<DirectoryObjectRef>> {
        let query = ListQuery::new(format!("applications/{}/owners", application_id));
        self.client.get_all(&query).await
    }

    async fn get_synchronization_job(
        &self,
        service_principal_id: &str,
    ) -> Result<Option<SynchronizationJob>> {
        let query = ListQuery::new(format!(
            "servicePrincipals/{}/synchronization/jobs",
            service_principal_id
        ));
        let jobs: Vec<SynchronizationJob> = self.client.get_all(&query).await?;
        Ok(jobs.into_iter().next())
    }

    async fn get_synchronization_template(
        &self,
        service_principal_id: &str,
    ) -> Result<Option<SynchronizationTemplate>> {
        let query = ListQuery::new(format!(
            "servicePrincipals/{}/synchronization/templates",
            service_principal_id
        ));
        let templates: Vec<SynchronizationTemplate> = self.client.get_all(&query).await?;
        Ok(templates.into_iter().next())
    }

    async fn create_application(
        &self,
        request: &ApplicationCreateRequest,
    ) -> Result<ApplicationRegistration> {
        self.client.post("applications", request).await
    }

    async fn create_service_principal(
        &self,
        request: &ServicePrincipalCreateRequest,
    ) -> Result<ServicePrincipal> {
        self.client.post("servicePrincipals", request).await
    }

    async fn add_secret(
        &self,
        service_principal_id: &str,
        secret: &PasswordCredential,
    ) -> Result<PasswordCredential> {
        self.client
            .post(
                &format!("servicePrincipals/{}/addPassword", service_principal_id),
                &AddPasswordRequest::from_source(secret),
            )
            .await
    }

    async fn add_certificate(
        &self,
        service_principal_id: &str,
        certificate: &KeyCredential,
        previously_added: &[KeyCredential],
    ) -> Result<()> {
        if certificate.key.is_none() {
            return Err(AppVaultError::GraphApi {
                status: 400,
                message: format!(
                    "certificate '{}' has no key material in the backup",
                    certificate.label()
                ),
            });
        }

        let key_credentials = previously_added
            .iter()
            .chain(std::iter::once(certificate))
            .map(KeyCredential::for_upload)
            .collect();

        self.client
            .patch(
                &format!("servicePrincipals/{}", service_principal_id),
                &KeyCredentialsPatch { key_credentials },
            )
            .await
    }

    async fn display_name(&self, kind: ObjectKind, id: &str) -> Result<String> {
        let named: NamedObject = match kind {
            ObjectKind::User => {
                self.client
                    .get(&format!("users/{}?$select=displayName", id))
                    .await?
            }
            ObjectKind::Group => {
                self.client
                    .get(&format!("groups/{}?$select=displayName", id))
                    .await?
            }
            ObjectKind::Application => {
                let query = self.by_app_id("servicePrincipals", id, &["displayName"]);
                let mut found: Vec<NamedObject> = self.client.get_all(&query).await?;
                if found.is_empty() {
                    return Err(AppVaultError::GraphApi {
                        status: 404,
                        message: format!("no service principal with appId '{}'", id),
                    });
                }
                found.swap_remove(0)
            }
        };

        Ok(named.display_name.unwrap_or_else(|| id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_kind_from_odata_type() {
        assert_eq!(
            ObjectKind::from_odata_type("#microsoft.graph.user"),
            Some(ObjectKind::User)
        );
        assert_eq!(
            ObjectKind::from_odata_type("#microsoft.graph.servicePrincipal"),
            Some(ObjectKind::Application)
        );
        assert_eq!(ObjectKind::from_odata_type("#microsoft.graph.device"), None);
    }
}
