//! Registry wiring for the built-in HTTP adapters.

use std::sync::Arc;

use qprovider::{CredentialStore, ProviderError, Providers};
use reqwest::Client;

use crate::config::{ConfigError, QllmConfig};

/// Builds both registries with a lazy factory per enabled adapter.
///
/// Nothing is constructed until a name is first resolved, so a missing API key only
/// surfaces as an `Authentication` error when that provider is requested.
pub fn build_providers(
    config: &QllmConfig,
    credentials: Arc<CredentialStore>,
) -> Result<Providers, ProviderError> {
    let client = Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|err| {
            ProviderError::invalid_request("http", format!("failed to build HTTP client: {err}"))
        })?;

    let mut providers = Providers::new();
    register_openai(&mut providers, config, &credentials, &client);
    register_anthropic(&mut providers, config, &credentials, &client);
    register_google(&mut providers, config, &credentials, &client);
    register_ollama(&mut providers, config, &client);

    tracing::debug!(
        phase = "registry",
        event = "providers_registered",
        llm = ?providers.llm().names(),
        embedding = ?providers.embedding().names(),
    );

    Ok(providers)
}

/// Loads `.env`, then credentials and [`QllmConfig`] from the environment.
pub fn build_providers_from_env() -> Result<Providers, BuildError> {
    crate::load_dotenv();
    let config = QllmConfig::from_env().map_err(BuildError::Config)?;
    let credentials = Arc::new(CredentialStore::from_env());
    build_providers(&config, credentials).map_err(BuildError::Provider)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    Config(ConfigError),
    Provider(ProviderError),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(error) => write!(f, "{error}"),
            Self::Provider(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(error) => Some(error),
            Self::Provider(error) => Some(error),
        }
    }
}

/// Wraps `build` so every caller shares the first successfully built instance.
///
/// Failures are not remembered; the next call builds again.
#[cfg(any(
    feature = "provider-openai",
    feature = "provider-google",
    feature = "provider-ollama"
))]
fn shared_instance<P, F>(
    build: F,
) -> impl Fn() -> Result<Arc<P>, ProviderError> + Clone + Send + Sync + 'static
where
    P: Send + Sync + 'static,
    F: Fn() -> Result<P, ProviderError> + Send + Sync + 'static,
{
    let build = Arc::new(build);
    let instance = Arc::new(std::sync::Mutex::new(None::<Arc<P>>));

    move || {
        let mut slot = instance.lock().map_err(|_| {
            ProviderError::invalid_request("registry", "shared provider lock poisoned")
        })?;
        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }

        let created = Arc::new(build()?);
        *slot = Some(Arc::clone(&created));
        Ok(created)
    }
}

/// Registers one lazily built instance under `name` in both registries.
#[cfg(any(
    feature = "provider-openai",
    feature = "provider-google",
    feature = "provider-ollama"
))]
fn register_chat_and_embedding<P, F>(providers: &mut Providers, name: &str, build: F)
where
    P: qprovider::LlmProvider + qprovider::EmbeddingProvider + 'static,
    F: Fn() -> Result<P, ProviderError> + Send + Sync + 'static,
{
    let instance = shared_instance(build);
    let chat = instance.clone();
    providers.llm_mut().register_factory(name, move || {
        chat().map(|provider| provider as Arc<dyn qprovider::LlmProvider>)
    });
    providers.embedding_mut().register_factory(name, move || {
        instance().map(|provider| provider as Arc<dyn qprovider::EmbeddingProvider>)
    });
}

#[cfg(feature = "provider-openai")]
fn register_openai(
    providers: &mut Providers,
    config: &QllmConfig,
    credentials: &Arc<CredentialStore>,
    client: &Client,
) {
    use qprovider::adapters::openai::{OPENAI_PROVIDER, OpenAiHttpTransport, OpenAiProvider};

    let build = {
        let config = config.clone();
        let credentials = Arc::clone(credentials);
        let client = client.clone();
        move || {
            let mut transport = OpenAiHttpTransport::new(client.clone());
            if let Some(base_url) = &config.openai_base_url {
                transport = transport.with_base_url(base_url.clone());
            }

            let provider = OpenAiProvider::new(&credentials, Arc::new(transport))?;
            Ok::<_, ProviderError>(match config.deadline {
                Some(deadline) => provider.with_deadline(deadline),
                None => provider,
            })
        }
    };

    register_chat_and_embedding(providers, OPENAI_PROVIDER, build);
}

#[cfg(not(feature = "provider-openai"))]
fn register_openai(_: &mut Providers, _: &QllmConfig, _: &Arc<CredentialStore>, _: &Client) {}

#[cfg(feature = "provider-anthropic")]
fn register_anthropic(
    providers: &mut Providers,
    config: &QllmConfig,
    credentials: &Arc<CredentialStore>,
    client: &Client,
) {
    use qprovider::adapters::anthropic::{
        ANTHROPIC_PROVIDER, AnthropicHttpTransport, AnthropicProvider,
    };

    let config = config.clone();
    let credentials = Arc::clone(credentials);
    let client = client.clone();
    providers.llm_mut().register(ANTHROPIC_PROVIDER, move || {
        let mut transport = AnthropicHttpTransport::new(client.clone());
        if let Some(base_url) = &config.anthropic_base_url {
            transport = transport.with_base_url(base_url.clone());
        }

        let provider = AnthropicProvider::new(&credentials, Arc::new(transport))?;
        Ok::<_, ProviderError>(match config.deadline {
            Some(deadline) => provider.with_deadline(deadline),
            None => provider,
        })
    });
}

#[cfg(not(feature = "provider-anthropic"))]
fn register_anthropic(_: &mut Providers, _: &QllmConfig, _: &Arc<CredentialStore>, _: &Client) {}

#[cfg(feature = "provider-google")]
fn register_google(
    providers: &mut Providers,
    config: &QllmConfig,
    credentials: &Arc<CredentialStore>,
    client: &Client,
) {
    use qprovider::adapters::google::{GOOGLE_PROVIDER, GoogleHttpTransport, GoogleProvider};

    let build = {
        let config = config.clone();
        let credentials = Arc::clone(credentials);
        let client = client.clone();
        move || {
            let mut transport = GoogleHttpTransport::new(client.clone());
            if let Some(base_url) = &config.google_base_url {
                transport = transport.with_base_url(base_url.clone());
            }

            let provider = GoogleProvider::new(&credentials, Arc::new(transport))?
                .with_stream_pacing(config.stream_pacing);
            Ok::<_, ProviderError>(match config.deadline {
                Some(deadline) => provider.with_deadline(deadline),
                None => provider,
            })
        }
    };

    register_chat_and_embedding(providers, GOOGLE_PROVIDER, build);
}

#[cfg(not(feature = "provider-google"))]
fn register_google(_: &mut Providers, _: &QllmConfig, _: &Arc<CredentialStore>, _: &Client) {}

#[cfg(feature = "provider-ollama")]
fn register_ollama(providers: &mut Providers, config: &QllmConfig, client: &Client) {
    use qprovider::adapters::ollama::{OLLAMA_HOST_URL, OLLAMA_PROVIDER, OllamaProvider};

    let build = {
        let config = config.clone();
        let client = client.clone();
        move || {
            let host = config.ollama_base_url.as_deref().unwrap_or(OLLAMA_HOST_URL);
            let provider = OllamaProvider::from_host(client.clone(), host);
            Ok::<_, ProviderError>(match config.deadline {
                Some(deadline) => provider.with_deadline(deadline),
                None => provider,
            })
        }
    };

    register_chat_and_embedding(providers, OLLAMA_PROVIDER, build);
}

#[cfg(not(feature = "provider-ollama"))]
fn register_ollama(_: &mut Providers, _: &QllmConfig, _: &Client) {}

#[cfg(test)]
mod tests {
    use qprovider::RegistryErrorKind;

    use super::*;

    #[test]
    fn every_enabled_adapter_is_registered_lazily() {
        let providers = build_providers(&QllmConfig::default(), Arc::new(CredentialStore::new()))
            .expect("registries should build");

        #[cfg(all(
            feature = "provider-openai",
            feature = "provider-anthropic",
            feature = "provider-google",
            feature = "provider-ollama"
        ))]
        {
            assert_eq!(
                providers.llm().names(),
                vec!["anthropic", "google", "ollama", "openai"]
            );
            assert_eq!(
                providers.embedding().names(),
                vec!["google", "ollama", "openai"]
            );
        }

        let error = providers
            .get_llm_provider("bedrock")
            .err()
            .expect("unknown names are not found");
        assert_eq!(error.to_string(), "Provider \"bedrock\" not found.");
    }

    #[cfg(feature = "provider-openai")]
    #[test]
    fn missing_key_surfaces_on_first_lookup() {
        let providers = build_providers(&QllmConfig::default(), Arc::new(CredentialStore::new()))
            .expect("registries should build");

        let error = providers
            .get_llm_provider("openai")
            .err()
            .expect("construction should fail without a key");
        assert_eq!(error.kind, RegistryErrorKind::Construction);
        assert!(
            error
                .provider_error()
                .is_some_and(ProviderError::is_authentication)
        );
    }

    #[cfg(feature = "provider-openai")]
    #[test]
    fn chat_and_embedding_lookups_share_one_instance() {
        let credentials = Arc::new(CredentialStore::new());
        let providers = build_providers(&QllmConfig::default(), Arc::clone(&credentials))
            .expect("registries should build");

        assert!(providers.get_embedding_provider("openai").is_err());

        credentials
            .set_api_key("openai", "sk-test")
            .expect("key should be stored");
        let chat = providers.get_llm_provider("openai").expect("provider should build");
        let embedding = providers
            .get_embedding_provider("openai")
            .expect("provider should build");

        assert_eq!(
            Arc::as_ptr(&chat) as *const (),
            Arc::as_ptr(&embedding) as *const ()
        );
    }

    #[cfg(any(
        feature = "provider-openai",
        feature = "provider-google",
        feature = "provider-ollama"
    ))]
    #[test]
    fn shared_instance_builds_once_and_retries_failures() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let instance = shared_instance(move || {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err(ProviderError::authentication("static", "no key yet")),
                attempt => Ok(attempt),
            }
        });

        assert!(instance().is_err());
        let first = instance().expect("second attempt should build");
        let second = instance().expect("instance should be cached");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[cfg(feature = "provider-anthropic")]
    #[test]
    fn configured_key_constructs_once() {
        let credentials = Arc::new(CredentialStore::new());
        credentials
            .set_api_key("anthropic", "sk-ant-test")
            .expect("key should be stored");
        let providers =
            build_providers(&QllmConfig::default(), credentials).expect("registries should build");

        let first = providers.get_llm_provider("anthropic").expect("provider should build");
        let second = providers.get_llm_provider("anthropic").expect("provider should build");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "anthropic");
    }
}
