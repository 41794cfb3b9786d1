//! The chat turn runtime.
//!
//! [`TurnOrchestrator`] drives one user-message-to-reply cycle: it streams
//! the model response, assembles tool calls with the [`accumulator`],
//! executes them through the tool provider, and keeps the local store and
//! the transcript cache in step.

pub mod accumulator;
pub mod cancel;
pub mod events;
pub mod history;
pub mod realtime;
pub mod turn;

pub use accumulator::{FinalizedCall, ToolCallAccumulator};
pub use cancel::{CancelSlot, CancelToken};
pub use events::{TurnEvent, TurnOutcome, TurnStatus};
pub use turn::{OrchestratorDeps, TurnOptions, TurnOrchestrator};
