//! Questions for quizduel rooms.
//!
//! A room asks for its question set once, when the host starts the game:
//!
//! ```text
//! QuestionSource::generate  →  RawQuestion (loose JSON shape)
//!            │
//!            ▼
//! QuestionSetProvider::fetch  →  validate + normalize, retry  →  Vec<Question>
//! ```
//!
//! Two sources ship with the crate: [`OpenAiSource`] talks to an
//! OpenAI-compatible chat completions endpoint, and [`QuestionBank`] serves
//! a small built-in set so the server can run without credentials.

mod bank;
mod error;
mod openai;
mod provider;
mod question;

pub use bank::QuestionBank;
pub use error::GenerationError;
pub use openai::{DEFAULT_API_BASE, DEFAULT_MODEL, OpenAiConfig, OpenAiSource};
pub use provider::{ProviderConfig, QuestionSetProvider, QuestionSource};
pub use question::{OneOrMany, Question, RawQuestion, ValidationRules, normalize};
