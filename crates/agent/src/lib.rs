//! The tool-call loop and everything it drives.
//!
//! A run follows an **Ask → Act → Observe** cycle:
//!
//! 1. **Seed** a conversation with the system prompt and the user query
//! 2. **Ask** the engine, with the action descriptors attached
//! 3. **If an action is requested**: validate it, dispatch it through the
//!    [`ActionRegistry`], append the result, loop back to step 2
//! 4. **If text is returned**: that text is the answer
//!
//! The loop ends on a text reply or once the iteration bound is reached, in
//! which case one last request without actions produces the answer.

pub mod condenser;
pub mod engine;
pub mod loop_runner;
pub mod prompts;
pub mod registry;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use condenser::Condenser;
pub use engine::Engine;
pub use loop_runner::{LoopOutcome, LoopState, ToolCallLoop};
pub use registry::ActionRegistry;
pub use token::{HeuristicCounter, TiktokenCounter, TokenCounter};
