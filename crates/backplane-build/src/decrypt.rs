//! Env var decryption (spec §4.C step 4; spec §1 Non-goals: "cryptographic
//! envelope for secrets beyond 'a decryptor is provided'" — the concrete
//! scheme is out of scope, this crate depends only on the trait).

use async_trait::async_trait;

#[async_trait]
pub trait EnvDecryptor: Send + Sync {
    async fn decrypt(&self, sealed_value: &str) -> Result<String, crate::error::BuildError>;
}

/// Decrypts nothing; the sealed value is the plaintext. Used by tests and by
/// deployments with no sealed-env-var feature enabled.
pub struct IdentityDecryptor;

#[async_trait]
impl EnvDecryptor for IdentityDecryptor {
    async fn decrypt(&self, sealed_value: &str) -> Result<String, crate::error::BuildError> {
        Ok(sealed_value.to_string())
    }
}
