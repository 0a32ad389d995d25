//! Credentials for the model API and the datastore.

use std::fmt;

use dogana_store::BoxFuture;

pub const OPENAI_API_KEY: &str = "DOGANA_OPENAI_API_KEY";
pub const SUPABASE_SERVICE_KEY: &str = "DOGANA_SUPABASE_SERVICE_KEY";

/// Credential value that never shows up in `Debug` output.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Where credentials are read from at startup.
pub trait VaultProvider: Send + Sync {
    /// The credential stored under `key`; blank values count as missing.
    fn get_secret(&self, key: &str) -> BoxFuture<'_, anyhow::Result<Option<Secret>>>;
}

/// Reads `DOGANA_*` credentials from the process environment.
pub struct EnvVaultProvider;

impl VaultProvider for EnvVaultProvider {
    fn get_secret(&self, key: &str) -> BoxFuture<'_, anyhow::Result<Option<Secret>>> {
        let value = std::env::var(key)
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .map(Secret::new);
        Box::pin(async move { Ok(value) })
    }
}

#[cfg(test)]
impl VaultProvider for std::collections::HashMap<&'static str, &'static str> {
    fn get_secret(&self, key: &str) -> BoxFuture<'_, anyhow::Result<Option<Secret>>> {
        let value = self.get(key).copied().map(Secret::new);
        Box::pin(async move { Ok(value) })
    }
}
