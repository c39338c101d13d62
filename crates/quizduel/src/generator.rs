//! The question source the binary runs with, chosen at startup.

use quizduel_protocol::Difficulty;
use quizduel_questions::{GenerationError, OpenAiConfig, OpenAiSource, QuestionBank, QuestionSource, RawQuestion};

/// Either the remote model or the built-in bank. Picked once from
/// configuration; a failing remote never falls back to the bank.
pub enum Generator {
    OpenAi(OpenAiSource),
    Bank(QuestionBank),
}

impl Generator {
    /// # Errors
    /// The remote client could not be constructed.
    pub fn from_config(openai: Option<OpenAiConfig>) -> Result<Self, GenerationError> {
        match openai {
            Some(config) => {
                tracing::info!(
                    model = %config.model,
                    base_url = %config.base_url,
                    timeout_ms = quizduel_protocol::millis(config.request_timeout),
                    "using remote question generator"
                );
                Ok(Self::OpenAi(OpenAiSource::new(config)?))
            }
            None => {
                tracing::info!("no generator credential configured, using built-in question bank");
                Ok(Self::Bank(QuestionBank::new()))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai",
            Self::Bank(_) => "bank",
        }
    }
}

impl QuestionSource for Generator {
    async fn generate(&self, difficulty: Difficulty, count: usize) -> Result<Vec<RawQuestion>, GenerationError> {
        match self {
            Self::OpenAi(source) => source.generate(difficulty, count).await,
            Self::Bank(bank) => bank.generate(difficulty, count).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_without_key_uses_bank() {
        assert_eq!(Generator::from_config(None).unwrap().name(), "bank");
    }

    #[test]
    fn test_from_config_with_key_uses_openai() {
        let generator = Generator::from_config(Some(OpenAiConfig::new("sk-test"))).unwrap();
        assert_eq!(generator.name(), "openai");
    }

    #[tokio::test]
    async fn test_bank_generator_produces_questions() {
        let questions = Generator::from_config(None)
            .unwrap()
            .generate(Difficulty::Easy, 3)
            .await
            .unwrap();
        assert_eq!(questions.len(), 3);
    }
}
