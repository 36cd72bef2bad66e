//! The tool-calling orchestration loop.
//!
//! A request flows through a **call model → run tools → call model** cycle:
//!
//! 1. **Select** a backend and resolve the requested tools
//! 2. **Seed** the conversation (plus a tool-describing system prompt)
//! 3. **Call** the backend with the conversation and the tool catalog
//! 4. **If tool calls**: execute them concurrently, append the results, go to 3
//! 5. **If an answer**: return it with the tool history and summed usage
//!
//! The loop ends on an answer or when the backend-call ceiling is reached.

pub mod executor;
pub mod orchestrator;
pub mod prompt;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use executor::ToolExecutor;
pub use orchestrator::{DEFAULT_MAX_ITERATIONS, Orchestrator};
pub use prompt::build_system_prompt;
