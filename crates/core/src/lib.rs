//! # toolrelay core
//!
//! Domain types, traits, and error definitions for the toolrelay
//! tool-calling orchestration engine. This crate has **no framework
//! dependencies**: it defines the model that every other crate implements
//! against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here ([`Tool`], [`ModelBackend`]). Implementations
//! live in their own crates, which enables:
//! - Selecting backends per request from configuration
//! - Testing the orchestration loop with scripted backends
//! - A clean dependency graph (all crates depend inward on core)

pub mod backend;
pub mod chat;
pub mod error;
pub mod message;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use backend::{BackendRequest, BackendResponse, ModelBackend, ToolCallMode, Usage};
pub use chat::{ChatRequest, ChatResponse, Outcome};
pub use error::{BackendError, Error, PartialRun, Result, ToolError};
pub use message::{Conversation, Message, Role};
pub use tool::{
    ParamType, RegisteredTool, Tool, ToolCallRequest, ToolCallResult, ToolDescriptor, ToolOutput,
    ToolParameter, ToolRegistry,
};
