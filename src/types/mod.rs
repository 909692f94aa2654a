//! Core types: turns, engine messages, tool calls, generation settings.

pub mod generation;
pub mod message;
pub mod turn;

pub use generation::{Generation, GenerationSettings, ServerTool};
pub use message::{Message, Part, ToolCall, ToolResult};
pub use turn::{NewTurn, Role, Turn, TurnContent};
