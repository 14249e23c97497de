use crate::core::state::Stage;
use thiserror::Error;

/// Errors surfaced by the request executor and the pipeline controller.
///
/// Provider and transport failures travel as `anyhow::Error` inside
/// `AllCandidatesFailed` so the provider's own message reaches the user.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No API key configured for {provider}. Open the API key settings and add at least one key.")]
    MissingCredential { provider: String },

    #[error("{last}")]
    AllCandidatesFailed {
        attempts: usize,
        #[source]
        last: anyhow::Error,
    },

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Could not read the model response: {message}")]
    ResponseDecode { message: String },

    #[error("{0}")]
    PreconditionNotMet(String),

    #[error("{0}")]
    Validation(String),

    #[error("Stage '{0}' is already running")]
    StageBusy(Stage),
}

impl GenerationError {
    /// True for the decode class (empty or malformed model output).
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::EmptyResponse | Self::ResponseDecode { .. })
    }
}

pub type GenerationResult<T> = std::result::Result<T, GenerationError>;
