//! Parley: adaptive conversation client for chat backends.
//!
//! Drives a bounded, multi-turn dialogue against a chat backend on behalf of
//! a synthetic user. A language model plays the user; each backend reply is
//! reduced to the answer text with a layered extraction pipeline; the
//! session ends on an end signal, the turn limit, repeated failures,
//! cancellation or a deadline.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use parley::prelude::*;
//!
//! # async fn example() -> parley::error::Result<()> {
//! let config = ParleyConfig::load()?;
//! let backend = Arc::new(config.require_backend()?.clone());
//! let service = ChatCompletionsService::new(config.generation.clone())?;
//! let generator = TurnGenerator::new(Arc::new(service)).with_config(&config.generation);
//!
//! let scenario = Scenario::new("Expense report").with_goal("find out the receipt deadline");
//! let persona = Persona::new("accountant").with_style("direct");
//! let transcript = run_session(backend, &generator, &scenario, &persona, 3).await?;
//! for turn in transcript.into_turns()? {
//!     println!("{} -> {}", turn.outgoing_message, turn.extracted_answer);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod continuity;
pub mod error;
pub mod extract;
pub mod generation;
pub mod prelude;
pub mod session;
pub mod stream;
pub mod types;
pub mod util;
