//! Question generation failures.

use quizduel_protocol::ErrorKind;

/// Why a question set could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The generator could not be reached or answered with an error status.
    #[error("generator request failed: {0}")]
    Upstream(String),

    /// The generator answered, but not with a question list we can read.
    #[error("generator returned malformed output: {0}")]
    Malformed(String),

    /// Fewer valid questions than requested survived validation.
    #[error("generator produced {got} valid questions, {wanted} needed")]
    TooFewQuestions { wanted: usize, got: usize },

    /// The generator is not configured with a credential.
    #[error("generator credential is missing")]
    MissingCredential,
}

impl GenerationError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::MissingCredential)
    }

    /// Wire classification; always [`ErrorKind::GenerationError`].
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::GenerationError
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}
