//! Application registrations, service principals and their credentials
//!
//! Typed snapshots of the Entra ID objects that make up a backup bundle, plus
//! the request bodies used to recreate them. Deeply nested settings that the
//! pipeline never inspects (`api`, `optionalClaims`, ...) stay as raw JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Treat an explicit JSON `null` the same as a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Full field superset requested when backing up a registration
pub const APPLICATION_SELECT: &[&str] = &[
    "id",
    "appId",
    "displayName",
    "description",
    "notes",
    "signInAudience",
    "identifierUris",
    "tags",
    "requiredResourceAccess",
    "appRoles",
    "info",
    "web",
    "spa",
    "publicClient",
    "api",
    "optionalClaims",
    "parentalControlSettings",
    "verifiedPublisher",
    "servicePrincipalLockConfiguration",
    "isFallbackPublicClient",
    "isDeviceOnlyAuthSupported",
    "oauth2RequirePostResponse",
    "groupMembershipClaims",
    "passwordCredentials",
    "keyCredentials",
    "createdDateTime",
];

/// Narrow field set for listing and selection
pub const APPLICATION_LIST_SELECT: &[&str] = &[
    "id",
    "appId",
    "displayName",
    "signInAudience",
    "createdDateTime",
];

pub const SERVICE_PRINCIPAL_SELECT: &[&str] = &[
    "id",
    "appId",
    "displayName",
    "servicePrincipalType",
    "accountEnabled",
    "appRoleAssignmentRequired",
    "preferredSingleSignOnMode",
    "loginUrl",
    "samlSingleSignOnSettings",
    "notificationEmailAddresses",
    "tags",
    "passwordCredentials",
    "keyCredentials",
];

/// Application registration snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRegistration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_in_audience: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub identifier_uris: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub required_resource_access: Vec<RequiredResourceAccess>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub app_roles: Vec<AppRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<InformationalUrls>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebApplication>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spa: Option<RedirectConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_client: Option<RedirectConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_claims: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parental_control_settings: Option<ParentalControlSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_publisher: Option<VerifiedPublisher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_principal_lock_configuration: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_fallback_public_client: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_device_only_auth_supported: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth2_require_post_response: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_membership_claims: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub password_credentials: Vec<PasswordCredential>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_credentials: Vec<KeyCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<DateTime<Utc>>,
}

impl ApplicationRegistration {
    /// Client id, or an empty string when the snapshot has none
    pub fn app_id(&self) -> &str {
        self.app_id.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredResourceAccess {
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource_app_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource_access: Vec<ResourceAccess>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAccess {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// `Scope` (delegated) or `Role` (application)
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub access_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRole {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub allowed_member_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InformationalUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_statement_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_of_service_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebApplication {
    #[serde(default, deserialize_with = "null_as_default")]
    pub redirect_uris: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implicit_grant_settings: Option<Value>,
}

/// Redirect URIs for the `spa` and `publicClient` platforms
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectConfiguration {
    #[serde(default, deserialize_with = "null_as_default")]
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentalControlSettings {
    #[serde(default, deserialize_with = "null_as_default")]
    pub countries_blocked_for_minors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_age_group_rule: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPublisher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_publisher_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_date_time: Option<DateTime<Utc>>,
}

/// Service principal snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_principal_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_role_assignment_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_single_sign_on_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saml_single_sign_on_settings: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notification_email_addresses: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub password_credentials: Vec<PasswordCredential>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_credentials: Vec<KeyCredential>,
}

/// Password credential (client secret)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_key_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date_time: Option<DateTime<Utc>>,
    /// Only populated on the response to `addPassword`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_text: Option<String>,
}

impl PasswordCredential {
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.key_id.as_deref())
            .unwrap_or("<unnamed secret>")
    }
}

/// Key credential (certificate)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_key_identifier: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    /// Base64 certificate material; Graph omits it on reads unless selected explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date_time: Option<DateTime<Utc>>,
}

impl KeyCredential {
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.key_id.as_deref())
            .unwrap_or("<unnamed certificate>")
    }

    /// Strip server-assigned fields so the credential can be re-added
    pub fn for_upload(&self) -> Self {
        Self {
            key_id: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynchronizationJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynchronizationTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discoverable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Reference to a directory object (e.g. an application owner)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryObjectRef {
    #[serde(rename = "@odata.type", default, skip_serializing_if = "Option::is_none")]
    pub odata_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "appId", default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

// ============================================================================
// Create requests
// ============================================================================

/// Restorable subset of an application registration.
///
/// Server-assigned fields (`id`, `appId`, timestamps, credentials, verified
/// publisher) are never sent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCreateRequest {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_in_audience: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identifier_uris: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_resource_access: Vec<RequiredResourceAccess>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub app_roles: Vec<AppRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<InformationalUrls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web: Option<WebApplication>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spa: Option<RedirectConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_client: Option<RedirectConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional_claims: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parental_control_settings: Option<ParentalControlSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_principal_lock_configuration: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_fallback_public_client: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_device_only_auth_supported: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth2_require_post_response: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_membership_claims: Option<String>,
}

impl From<&ApplicationRegistration> for ApplicationCreateRequest {
    fn from(app: &ApplicationRegistration) -> Self {
        Self {
            display_name: app.display_name.clone(),
            description: app.description.clone(),
            notes: app.notes.clone(),
            sign_in_audience: app.sign_in_audience.clone(),
            identifier_uris: app.identifier_uris.clone(),
            tags: app.tags.clone(),
            required_resource_access: app.required_resource_access.clone(),
            app_roles: app.app_roles.clone(),
            info: app.info.clone(),
            web: app.web.clone(),
            spa: app.spa.clone(),
            public_client: app.public_client.clone(),
            api: app.api.clone(),
            optional_claims: app.optional_claims.clone(),
            parental_control_settings: app.parental_control_settings.clone(),
            service_principal_lock_configuration: app.service_principal_lock_configuration.clone(),
            is_fallback_public_client: app.is_fallback_public_client,
            is_device_only_auth_supported: app.is_device_only_auth_supported,
            oauth2_require_post_response: app.oauth2_require_post_response,
            group_membership_claims: app.group_membership_claims.clone(),
        }
    }
}

/// Service principal create body, keyed by the destination registration's appId
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipalCreateRequest {
    pub app_id: String,
    pub account_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_role_assignment_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_single_sign_on_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saml_single_sign_on_settings: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notification_email_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ServicePrincipalCreateRequest {
    /// Build from the source principal (if any) for a newly created appId
    pub fn for_app(new_app_id: &str, source: Option<&ServicePrincipal>) -> Self {
        match source {
            Some(sp) => Self {
                app_id: new_app_id.to_string(),
                account_enabled: sp.account_enabled.unwrap_or(true),
                app_role_assignment_required: sp.app_role_assignment_required,
                preferred_single_sign_on_mode: sp.preferred_single_sign_on_mode.clone(),
                login_url: sp.login_url.clone(),
                saml_single_sign_on_settings: sp.saml_single_sign_on_settings.clone(),
                notification_email_addresses: sp.notification_email_addresses.clone(),
                tags: sp.tags.clone(),
            },
            None => Self {
                app_id: new_app_id.to_string(),
                account_enabled: true,
                app_role_assignment_required: None,
                preferred_single_sign_on_mode: None,
                login_url: None,
                saml_single_sign_on_settings: None,
                notification_email_addresses: Vec::new(),
                tags: Vec::new(),
            },
        }
    }
}

/// Body of `POST servicePrincipals/{id}/addPassword`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPasswordRequest {
    pub password_credential: PasswordCredential,
}

impl AddPasswordRequest {
    /// Only the descriptive fields and validity window are sent; Graph issues the secret
    pub fn from_source(secret: &PasswordCredential) -> Self {
        Self {
            password_credential: PasswordCredential {
                display_name: secret.display_name.clone(),
                start_date_time: secret.start_date_time,
                end_date_time: secret.end_date_time,
                ..Default::default()
            },
        }
    }
}
