//! Chat completions, streaming and conversation sessions

pub mod models;
pub mod prompt;
pub mod service;
pub mod session;
pub mod streaming;

pub use models::{
    ChatCompletionOptions, ChatCompletionResult, ChatMessage, Role, StreamEntry, TokenUsage,
};
pub use prompt::{PromptTemplate, DEFAULT_SALES_TEMPLATE};
pub use service::ChatService;
pub use session::ConversationSession;
pub use streaming::{ChatStream, StreamingChatResult, UsageFuture};
