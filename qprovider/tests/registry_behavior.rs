use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use qprovider::{
    ChatCompletionRequest, ChatCompletionResponse, ChatProvider, ChunkStream, EmbeddingInput,
    EmbeddingProvider, EmbeddingResponse, FinishReason, Model, ModelCatalog, ProviderError,
    ProviderFuture, ProviderIdentity, Providers, RegistryErrorKind, Usage, VecChunkStream,
};

#[derive(Debug)]
struct StaticProvider {
    name: &'static str,
}

impl ProviderIdentity for StaticProvider {
    fn name(&self) -> &str {
        self.name
    }
}

impl ChatProvider for StaticProvider {
    fn generate_chat_completion<'a>(
        &'a self,
        _request: ChatCompletionRequest,
    ) -> ProviderFuture<'a, Result<ChatCompletionResponse, ProviderError>> {
        Box::pin(async move {
            Ok(ChatCompletionResponse::new(
                self.name,
                "ok",
                FinishReason::Stop,
                Usage::default(),
                Vec::new(),
            ))
        })
    }

    fn stream_chat_completion<'a>(
        &'a self,
        _request: ChatCompletionRequest,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>> {
        Box::pin(async { Ok(Box::pin(VecChunkStream::new(Vec::new())) as ChunkStream<'a>) })
    }
}

impl ModelCatalog for StaticProvider {
    fn list_models<'a>(&'a self) -> ProviderFuture<'a, Result<Vec<Model>, ProviderError>> {
        Box::pin(async move { Ok(vec![Model::new(self.name, self.name)]) })
    }
}

impl EmbeddingProvider for StaticProvider {
    fn generate_embedding<'a>(
        &'a self,
        _input: EmbeddingInput,
        _model: Option<String>,
    ) -> ProviderFuture<'a, Result<EmbeddingResponse, ProviderError>> {
        Box::pin(async { EmbeddingResponse::from_vectors("static", vec![vec![1.0]]) })
    }
}

#[test]
fn factories_run_once_and_instances_are_shared() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut providers = Providers::new();
    let counter = Arc::clone(&calls);
    providers.llm_mut().register("static", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(StaticProvider { name: "static" })
    });

    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let first = providers.get_llm_provider("static").expect("provider should resolve");
    let second = providers.get_llm_provider("static").expect("provider should resolve");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.name(), "static");
}

#[test]
fn unknown_and_differently_cased_names_are_not_found() {
    let mut providers = Providers::new();
    providers
        .llm_mut()
        .register("openai", || Ok(StaticProvider { name: "openai" }));

    let error = providers
        .get_llm_provider("OpenAI")
        .err()
        .expect("lookup should be case-sensitive");
    assert_eq!(error.kind, RegistryErrorKind::NotFound);
    assert_eq!(error.to_string(), "Provider \"OpenAI\" not found.");

    let error = providers
        .get_embedding_provider("openai")
        .err()
        .expect("llm registration does not cover embeddings");
    assert_eq!(error.to_string(), "Provider \"openai\" not found.");
}

#[test]
fn failed_construction_is_reported_and_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut providers = Providers::new();
    let counter = Arc::clone(&calls);
    providers.embedding_mut().register("flaky", move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(ProviderError::authentication("flaky", "no API key configured"))
        } else {
            Ok(StaticProvider { name: "flaky" })
        }
    });

    let error = providers
        .get_embedding_provider("flaky")
        .err()
        .expect("first construction should fail");
    assert_eq!(error.kind, RegistryErrorKind::Construction);
    assert!(
        error
            .provider_error()
            .is_some_and(ProviderError::is_authentication)
    );

    providers
        .get_embedding_provider("flaky")
        .expect("second construction should succeed");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn registration_replaces_and_removal_forgets() {
    let mut providers = Providers::new();
    providers
        .llm_mut()
        .register("local", || Ok(StaticProvider { name: "first" }));
    providers
        .llm_mut()
        .register_instance("local", Arc::new(StaticProvider { name: "second" }));
    providers
        .llm_mut()
        .register("alpha", || Ok(StaticProvider { name: "alpha" }));

    assert_eq!(providers.llm().names(), vec!["alpha", "local"]);
    let local = providers.get_llm_provider("local").expect("provider should resolve");
    assert_eq!(local.name(), "second");

    assert!(providers.llm_mut().remove("local"));
    assert!(!providers.llm().contains("local"));
    assert_eq!(providers.llm().len(), 1);
}

#[tokio::test]
async fn resolved_providers_answer_through_the_trait_objects() {
    let mut providers = Providers::new();
    providers
        .llm_mut()
        .register("static", || Ok(StaticProvider { name: "static" }));
    providers
        .embedding_mut()
        .register("static", || Ok(StaticProvider { name: "static" }));

    let llm = providers.get_llm_provider("static").expect("llm should resolve");
    let models = llm.list_models().await.expect("models should list");
    assert_eq!(models[0].id, "static");

    let embedder = providers
        .get_embedding_provider("static")
        .expect("embedding provider should resolve");
    let embedding = embedder
        .generate_embedding(EmbeddingInput::from("x"), None)
        .await
        .expect("embedding should succeed");
    assert_eq!(embedding.embedding, vec![1.0]);
}
