//! Anonymous identity and connection tracking for quizduel.
//!
//! This crate owns the process-lifetime table of users:
//!
//! 1. **Identity**: minting opaque user ids and display names
//!    ([`UserRegistry::register`]).
//! 2. **Connection tracking**: which live connection belongs to which
//!    user, in both directions ([`UserRegistry::attach`],
//!    [`UserRegistry::detach`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Room layer (above)   ← told which user went away when a socket closes
//!     ↕
//! Session layer (this crate)  ← user ids, display names, live connection
//!     ↕
//! Transport / Protocol (below) ← ConnectionId, UserId
//! ```

mod error;
mod registry;
mod user;

pub use error::SessionError;
pub use registry::UserRegistry;
pub use user::{MAX_USERNAME_LEN, MIN_USERNAME_LEN, User, validate_username};
