//! # quizduel
//!
//! Two-player trivia duel server.
//!
//! Clients connect over one WebSocket that carries both a request/response
//! channel and a push channel. Anonymous users create a room, invite an
//! opponent with its code, and play timed rounds of generated questions.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quizduel::{Generator, QuizduelServerBuilder, ServerConfig};
//!
//! # async fn run() -> Result<(), quizduel::QuizduelError> {
//! let config = ServerConfig::from_env()?;
//! let generator = Generator::from_config(config.openai.clone())?;
//! let server = QuizduelServerBuilder::new()
//!     .config(&config)
//!     .build(generator)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod generator;
mod handler;
mod server;

pub use config::{ConfigError, DEFAULT_BIND, DEFAULT_IDLE_TIMEOUT, ServerConfig};
pub use error::QuizduelError;
pub use generator::Generator;
pub use server::{QuizduelServer, QuizduelServerBuilder};

/// Re-exports for embedding the server or writing a client.
pub mod prelude {
    pub use quizduel_protocol::{
        Difficulty, Envelope, ErrorBody, ErrorKind, Operation, Payload, Reply, Request, Response, RoomCode,
        RoomSnapshot, RoomStatus, ServerEvent, Submission, UserId,
    };
    pub use quizduel_questions::{ProviderConfig, QuestionBank, QuestionSource};
    pub use quizduel_room::RoomConfig;

    pub use crate::{Generator, QuizduelError, QuizduelServer, QuizduelServerBuilder, ServerConfig};
}
