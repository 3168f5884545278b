mod provider;
mod transport;
mod types;

pub const GOOGLE_PROVIDER: &str = "google";

pub use provider::{
    DEFAULT_GOOGLE_EMBEDDING_MODEL, DEFAULT_GOOGLE_MODEL, GoogleProvider, default_google_models,
};
pub use transport::{GOOGLE_BASE_URL, GoogleHttpTransport, GoogleTransport};
pub use types::{
    GoogleCandidate, GoogleContent, GoogleFunctionCall, GoogleFunctionDeclaration,
    GoogleGenerationConfig, GoogleModel, GooglePart, GooglePromptFeedback, GoogleRequest,
    GoogleResponse, GoogleToolSet, GoogleUsage,
};
