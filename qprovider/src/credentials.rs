//! In-memory API key storage keyed by provider name.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::ProviderError;

/// Environment variables consulted per provider, in priority order.
pub fn env_vars_for(provider: &str) -> &'static [&'static str] {
    match provider {
        "openai" => &["OPENAI_API_KEY"],
        "anthropic" => &["ANTHROPIC_API_KEY"],
        "google" => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
        _ => &[],
    }
}

const KNOWN_PROVIDERS: [&str; 3] = ["openai", "anthropic", "google"];

#[derive(Clone, PartialEq, Eq)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn expose(&self) -> &str {
        self.value.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        // SAFETY: zero bytes are valid UTF-8 and the string is never read again.
        unsafe {
            self.value.as_mut_vec().fill(0);
        }
    }
}

#[derive(Default)]
pub struct CredentialStore {
    keys: Mutex<HashMap<String, SecretString>>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let providers = self
            .keys
            .lock()
            .map(|keys| {
                let mut names = keys.keys().cloned().collect::<Vec<_>>();
                names.sort();
                names
            })
            .unwrap_or_default();

        f.debug_struct("CredentialStore")
            .field("providers", &providers)
            .finish()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every known provider key from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads known provider keys through `lookup`; blank values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut keys = HashMap::new();

        for provider in KNOWN_PROVIDERS {
            let value = env_vars_for(provider)
                .iter()
                .filter_map(|name| lookup(name))
                .find(|value| !value.trim().is_empty());

            if let Some(value) = value {
                keys.insert(provider.to_string(), SecretString::new(value.trim()));
            }
        }

        Self {
            keys: Mutex::new(keys),
        }
    }

    pub fn set_api_key(
        &self,
        provider: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<(), ProviderError> {
        let provider = provider.into();
        let api_key = SecretString::new(api_key);
        if api_key.is_empty() {
            return Err(ProviderError::authentication(
                provider,
                "api key must not be empty",
            ));
        }

        self.keys_mut(&provider)?.insert(provider.clone(), api_key);
        Ok(())
    }

    pub fn api_key(&self, provider: &str) -> Result<Option<SecretString>, ProviderError> {
        Ok(self.keys_mut(provider)?.get(provider).cloned())
    }

    /// Returns the key or an `Authentication` error naming where it is expected.
    pub fn require_api_key(&self, provider: &str) -> Result<SecretString, ProviderError> {
        if let Some(key) = self.api_key(provider)? {
            return Ok(key);
        }

        let message = match env_vars_for(provider) {
            [] => "no API key configured".to_string(),
            names => format!("no API key configured; set {}", names.join(" or ")),
        };

        Err(ProviderError::authentication(provider, message))
    }

    pub fn has_api_key(&self, provider: &str) -> Result<bool, ProviderError> {
        Ok(self.keys_mut(provider)?.contains_key(provider))
    }

    pub fn clear(&self, provider: &str) -> Result<bool, ProviderError> {
        Ok(self.keys_mut(provider)?.remove(provider).is_some())
    }

    fn keys_mut(
        &self,
        provider: &str,
    ) -> Result<MutexGuard<'_, HashMap<String, SecretString>>, ProviderError> {
        self.keys.lock().map_err(|_| {
            ProviderError::invalid_request(provider, "credential store lock poisoned")
        })
    }
}
