//! The question set provider: asks a generator, validates, retries.

use std::future::Future;
use std::time::Duration;

use quizduel_protocol::Difficulty;

use crate::GenerationError;
use crate::question::{Question, RawQuestion, ValidationRules};

/// Anything that can produce raw questions.
///
/// Implementations: [`crate::OpenAiSource`] (remote model),
/// [`crate::QuestionBank`] (built-in set), and scripted doubles in tests.
///
/// The returned future is `Send` so the provider can run inside a spawned
/// task.
pub trait QuestionSource: Send + Sync + 'static {
    /// Produces up to `count` questions of the given difficulty. Returning
    /// more is allowed; the provider keeps the first valid `count`.
    fn generate(
        &self,
        difficulty: Difficulty,
        count: usize,
    ) -> impl Future<Output = Result<Vec<RawQuestion>, GenerationError>> + Send;
}

/// Longest a single generator call may take before it counts as failed.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Total generator calls per fetch, including the first. At least 1.
    pub max_attempts: u32,
    /// Per-call limit. A call that runs over is a retryable upstream failure.
    pub attempt_timeout: Duration,
    pub rules: ValidationRules,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            rules: ValidationRules::default(),
        }
    }
}

impl ProviderConfig {
    /// Returns a copy with out-of-range values clamped.
    pub fn validated(mut self) -> Self {
        if self.max_attempts == 0 {
            tracing::warn!("max_attempts 0 is invalid, using 1");
            self.max_attempts = 1;
        }
        if self.attempt_timeout.is_zero() {
            tracing::warn!("attempt_timeout 0 is invalid, using default");
            self.attempt_timeout = DEFAULT_ATTEMPT_TIMEOUT;
        }
        self
    }
}

/// Turns a [`QuestionSource`] into exactly-`count` validated questions.
pub struct QuestionSetProvider<Q> {
    source: Q,
    config: ProviderConfig,
}

impl<Q: QuestionSource> QuestionSetProvider<Q> {
    pub fn new(source: Q) -> Self {
        Self::with_config(source, ProviderConfig::default())
    }

    pub fn with_config(source: Q, config: ProviderConfig) -> Self {
        Self {
            source,
            config: config.validated(),
        }
    }

    pub fn source(&self) -> &Q {
        &self.source
    }

    /// Fetches `count` questions.
    ///
    /// Invalid items are dropped. A short batch, a malformed answer, a call
    /// that exceeds `attempt_timeout` or an upstream failure is retried
    /// until `max_attempts` calls were made, so a fetch always ends.
    ///
    /// # Errors
    /// The last attempt's error, or the first non-retryable one.
    pub async fn fetch(&self, difficulty: Difficulty, count: usize) -> Result<Vec<Question>, GenerationError> {
        let mut attempt = 1;
        loop {
            match self.attempt(difficulty, count).await {
                Ok(questions) => {
                    tracing::debug!(%difficulty, count, attempt, "question set ready");
                    return Ok(questions);
                }
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    tracing::warn!(%difficulty, attempt, error = %err, "question generation failed, retrying");
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(%difficulty, attempt, error = %err, "question generation failed");
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(&self, difficulty: Difficulty, count: usize) -> Result<Vec<Question>, GenerationError> {
        let limit = self.config.attempt_timeout;
        let raw = tokio::time::timeout(limit, self.source.generate(difficulty, count))
            .await
            .map_err(|_| GenerationError::Upstream(format!("no answer within {}s", limit.as_secs_f32())))??;

        let mut questions = Vec::with_capacity(count);
        for item in raw {
            if questions.len() == count {
                break;
            }
            match item.validate(self.config.rules) {
                Ok(question) => questions.push(question),
                Err(reason) => tracing::debug!(%reason, "dropping invalid question"),
            }
        }

        if questions.len() < count {
            return Err(GenerationError::TooFewQuestions {
                wanted: count,
                got: questions.len(),
            });
        }
        Ok(questions)
    }
}
