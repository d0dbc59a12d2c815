//! Key vault secret lookup over the data-plane REST API.

use std::fmt;
use std::time::Duration;

use pipesync_core::{SecretName, SecretValue};
use serde::Deserialize;

use crate::error::{SecretError, UnavailableReason};
use crate::identity::{TokenCredential, KEY_VAULT_RESOURCE};
use crate::SecretProvider;

/// Vault holding the dashboard secrets.
pub const DEFAULT_VAULT_URL: &str = "https://edgebuildkv.vault.azure.net/";

const KEY_VAULT_API_VERSION: &str = "7.4";
const VAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}

/// [`SecretProvider`] that reads the latest version of a key vault secret.
pub struct KeyVaultSecretProvider<C> {
    vault_url: String,
    credential: C,
    agent: ureq::Agent,
}

impl<C: TokenCredential> KeyVaultSecretProvider<C> {
    pub fn new(vault_url: impl Into<String>, credential: C) -> Self {
        let mut vault_url = vault_url.into();
        while vault_url.ends_with('/') {
            vault_url.pop();
        }
        Self {
            vault_url,
            credential,
            agent: ureq::AgentBuilder::new().timeout(VAULT_TIMEOUT).build(),
        }
    }

    pub fn vault_url(&self) -> &str {
        &self.vault_url
    }

    fn secret_url(&self, name: &SecretName) -> String {
        format!("{}/secrets/{}", self.vault_url, name)
    }

    fn fetch(&self, name: &SecretName) -> Result<SecretValue, UnavailableReason> {
        let token = self.credential.access_token(KEY_VAULT_RESOURCE)?;
        let bundle: SecretBundle = self
            .agent
            .get(&self.secret_url(name))
            .query("api-version", KEY_VAULT_API_VERSION)
            .set("Authorization", &format!("Bearer {}", token.expose()))
            .call()?
            .into_json()
            .map_err(|err| UnavailableReason::Malformed(err.to_string()))?;
        Ok(SecretValue::new(bundle.value))
    }
}

impl<C: TokenCredential> SecretProvider for KeyVaultSecretProvider<C> {
    fn resolve(&self, name: &SecretName) -> Result<SecretValue, SecretError> {
        tracing::info!(secret = %name, vault = %self.vault_url, "getting secret from key vault");
        self.fetch(name).map_err(|reason| {
            tracing::error!(secret = %name, error = %reason, "secret lookup failed");
            SecretError::unavailable(name, reason)
        })
    }
}

impl<C: fmt::Debug> fmt::Debug for KeyVaultSecretProvider<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVaultSecretProvider")
            .field("vault_url", &self.vault_url)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}
