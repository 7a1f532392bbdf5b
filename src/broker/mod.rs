//! Server turn broker
//!
//! Turns one HTTP request into one upstream live session and folds the
//! streamed reply into a single `VoiceTurnResult`:
//! - `TurnBroker::run` - open, send, collect, close, all under one deadline
//! - `TurnAccumulator` - arrival-ordered audio and transcript collection
//! - `TurnError` - failures, with timeout kept distinct from partial results

mod accumulator;
mod error;
mod turn;

pub use accumulator::{Completion, TurnAccumulator, TurnOutcome, VoiceTurnResult};
pub use error::TurnError;
pub use turn::{BrokerSettings, TurnBroker};
