//! Managed-identity token acquisition.
//!
//! The credential is an explicit capability handed to the secret provider;
//! nothing here is a process-wide singleton. Endpoint selection follows the
//! hosting environment: an App Service / container identity endpoint when
//! `IDENTITY_ENDPOINT` and `IDENTITY_HEADER` are set, otherwise the instance
//! metadata service.

use std::fmt;
use std::time::Duration;

use pipesync_core::SecretValue;
use serde::Deserialize;

use crate::error::UnavailableReason;

/// Token audience for key vault data-plane calls.
pub const KEY_VAULT_RESOURCE: &str = "https://vault.azure.net";

const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const IDENTITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Supplies bearer tokens for a resource audience.
pub trait TokenCredential {
    fn access_token(&self, resource: &str) -> Result<SecretValue, UnavailableReason>;
}

impl<C: TokenCredential + ?Sized> TokenCredential for &C {
    fn access_token(&self, resource: &str) -> Result<SecretValue, UnavailableReason> {
        (**self).access_token(resource)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum IdentityEndpoint {
    InstanceMetadata { url: String },
    AppService { url: String, header: String },
}

/// Token credential backed by the ambient managed identity.
#[derive(Clone)]
pub struct ManagedIdentityCredential {
    endpoint: IdentityEndpoint,
    client_id: Option<String>,
    agent: ureq::Agent,
}

impl fmt::Debug for ManagedIdentityCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedIdentityCredential")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ManagedIdentityCredential {
    /// Select the endpoint from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Select the endpoint from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let credential = match (lookup("IDENTITY_ENDPOINT"), lookup("IDENTITY_HEADER")) {
            (Some(url), Some(header)) => Self::app_service(url, header),
            _ => Self::instance_metadata(IMDS_TOKEN_URL),
        };
        match lookup("AZURE_CLIENT_ID").filter(|id| !id.is_empty()) {
            Some(client_id) => credential.with_client_id(client_id),
            None => credential,
        }
    }

    pub fn instance_metadata(url: impl Into<String>) -> Self {
        Self::with_endpoint(IdentityEndpoint::InstanceMetadata { url: url.into() })
    }

    pub fn app_service(url: impl Into<String>, header: impl Into<String>) -> Self {
        Self::with_endpoint(IdentityEndpoint::AppService {
            url: url.into(),
            header: header.into(),
        })
    }

    /// Request a token for a user-assigned identity.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    fn with_endpoint(endpoint: IdentityEndpoint) -> Self {
        Self {
            endpoint,
            client_id: None,
            agent: ureq::AgentBuilder::new().timeout(IDENTITY_TIMEOUT).build(),
        }
    }
}

impl TokenCredential for ManagedIdentityCredential {
    fn access_token(&self, resource: &str) -> Result<SecretValue, UnavailableReason> {
        let request = match &self.endpoint {
            IdentityEndpoint::InstanceMetadata { url } => self
                .agent
                .get(url)
                .set("Metadata", "true")
                .query("api-version", IMDS_API_VERSION),
            IdentityEndpoint::AppService { url, header } => self
                .agent
                .get(url)
                .set("X-IDENTITY-HEADER", header)
                .query("api-version", APP_SERVICE_API_VERSION),
        };
        let request = request.query("resource", resource);
        let request = match &self.client_id {
            Some(client_id) => request.query("client_id", client_id),
            None => request,
        };

        let response = request
            .call()
            .map_err(|err| UnavailableReason::Identity(Box::new(err.into())))?;
        let token: TokenResponse = response.into_json().map_err(|err| {
            UnavailableReason::Identity(Box::new(UnavailableReason::Malformed(err.to_string())))
        })?;
        tracing::debug!(resource, "acquired managed identity token");
        Ok(SecretValue::new(token.access_token))
    }
}
