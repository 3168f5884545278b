#[cfg(any(
    feature = "provider-openai",
    feature = "provider-anthropic",
    feature = "provider-google"
))]
pub(crate) mod http;

#[cfg(feature = "provider-openai")]
pub mod openai;

#[cfg(feature = "provider-anthropic")]
pub mod anthropic;

#[cfg(feature = "provider-google")]
pub mod google;

#[cfg(feature = "provider-ollama")]
pub mod ollama;
