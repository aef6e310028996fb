pub mod openrouter;
pub mod traits;

pub use openrouter::OpenRouterClient;
pub use traits::{BackendError, ChatBackend, ChatMessage, ChatRequest, ResponseFormat, Role};
