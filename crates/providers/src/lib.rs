//! Model backends for toolrelay.
//!
//! Every backend implements `toolrelay_core::ModelBackend`. The router
//! picks one per request based on configuration.

pub mod openai_compat;
pub mod prompted;
pub mod router;

pub use openai_compat::OpenAiCompatBackend;
pub use router::{BackendRouter, ProviderInfo, SelectedBackend};
