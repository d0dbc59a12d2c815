//! # pipesync-vault
//!
//! Secret resolution against a key vault using an injected identity.
//!
//! [`KeyVaultSecretProvider`] implements [`SecretProvider`]; it never owns
//! credentials itself but asks a [`TokenCredential`] (normally a
//! [`ManagedIdentityCredential`]) for a bearer token on every lookup.

pub mod error;
pub mod identity;
pub mod key_vault;

pub use error::{SecretError, UnavailableReason};
pub use identity::{ManagedIdentityCredential, TokenCredential, KEY_VAULT_RESOURCE};
pub use key_vault::{KeyVaultSecretProvider, DEFAULT_VAULT_URL};

use pipesync_core::{SecretName, SecretValue};

/// Resolves a named secret to its value.
///
/// Lookups are synchronous and are not retried; any failure is reported as
/// [`SecretError::SecretUnavailable`].
pub trait SecretProvider {
    fn resolve(&self, name: &SecretName) -> Result<SecretValue, SecretError>;
}

impl<P: SecretProvider + ?Sized> SecretProvider for &P {
    fn resolve(&self, name: &SecretName) -> Result<SecretValue, SecretError> {
        (**self).resolve(name)
    }
}
