mod provider;
mod transport;
mod types;

pub const ANTHROPIC_PROVIDER: &str = "anthropic";

pub use provider::{
    AnthropicProvider, DEFAULT_ANTHROPIC_MAX_TOKENS, DEFAULT_ANTHROPIC_MODEL,
    default_anthropic_models,
};
pub use transport::{
    ANTHROPIC_BASE_URL, ANTHROPIC_VERSION, AnthropicEventStream, AnthropicHttpTransport,
    AnthropicTransport,
};
pub use types::{
    AnthropicApiError, AnthropicContentBlock, AnthropicDelta, AnthropicMessage,
    AnthropicMessageDelta, AnthropicModel, AnthropicRequest, AnthropicResponse,
    AnthropicStreamEvent, AnthropicStreamMessage, AnthropicTool, AnthropicUsage,
};
