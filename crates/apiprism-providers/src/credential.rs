//! Routing of opaque credential strings into adapters
//!
//! Factories receive one string. Its format is checked only as far as needed
//! to route it: non-empty, and split at the first `:` for vendors that need two
//! values.

use std::fmt;

use crate::error::ProviderError;

/// Reject an empty credential; returns it trimmed
pub fn require<'a>(credential: &'a str, provider: &str) -> Result<&'a str, ProviderError> {
    let trimmed = credential.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::InvalidCredential(format!(
            "{} API key is required",
            provider
        )));
    }
    Ok(trimmed)
}

/// A two-part `"id:secret"` credential
#[derive(Clone, PartialEq, Eq)]
pub struct CompositeCredential {
    pub id: String,
    pub secret: String,
}

impl fmt::Debug for CompositeCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeCredential")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Split `"id:secret"` at the first `:`; the secret may itself contain colons
pub fn split_composite(
    credential: &str,
    provider: &str,
) -> Result<CompositeCredential, ProviderError> {
    let credential = require(credential, provider)?;
    let (id, secret) = credential.split_once(':').ok_or_else(|| {
        ProviderError::InvalidCredential(format!(
            "{} expects a credential of the form <id>:<secret>",
            provider
        ))
    })?;

    if id.is_empty() || secret.is_empty() {
        return Err(ProviderError::InvalidCredential(format!(
            "{} credential has an empty <id> or <secret> part",
            provider
        )));
    }

    Ok(CompositeCredential {
        id: id.to_string(),
        secret: secret.to_string(),
    })
}
