//! OpenAI credential resolution.

use crate::{CredentialStore, ProviderError};

use super::types::OpenAiAuth;

/// Resolves OpenAI authentication from the stored API key.
pub(crate) fn resolve_openai_auth(
    credentials: &CredentialStore,
) -> Result<OpenAiAuth, ProviderError> {
    credentials
        .require_api_key(super::OPENAI_PROVIDER)
        .map(OpenAiAuth::ApiKey)
}
