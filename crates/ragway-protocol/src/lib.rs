//! Client-facing wire protocol shared by the gateway and its consumers.
//!
//! A response body is a sequence of newline-terminated frames:
//! `0:<json string>` text deltas, then one `2:<json object>` usage summary
//! (or one `3:<json string>` error), then end of stream.

pub mod accumulator;
pub mod decoder;
pub mod frame;
pub mod message;

pub use accumulator::{read_turn, ChatAccumulator, TurnOutcome};
pub use decoder::FrameDecoder;
pub use frame::{StreamFrame, UsageSummary};
pub use message::{ChatMessage, Role};
