//! Stateful conversations over [`ChatService`]

use super::models::*;
use super::prompt::PromptTemplate;
use super::service::ChatService;
use super::streaming::StreamingChatResult;
use crate::error::{GatewayError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as TurnLock, OwnedMutexGuard};
use tracing::debug;

/// A system message plus the ordered turn history of one conversation
///
/// History is never trimmed; call [`clear_history`](Self::clear_history) to
/// reset it.
///
/// Exchanges are serialized: a second `send` waits until the first one has
/// recorded its reply or failed. A streamed exchange holds its turn until the
/// stream reaches its terminal entry or is dropped.
pub struct ConversationSession {
    chat: Arc<ChatService>,
    template: PromptTemplate,
    context: HashMap<String, String>,
    system: ChatMessage,
    history: Arc<Mutex<Vec<ChatMessage>>>,
    turn: Arc<TurnLock<()>>,
    options: Option<ChatCompletionOptions>,
}

/// The user turn an in-flight exchange appended
struct PendingTurn {
    messages: Vec<ChatMessage>,
    index: usize,
    _guard: OwnedMutexGuard<()>,
}

impl ConversationSession {
    pub fn new(chat: Arc<ChatService>, template: PromptTemplate) -> Self {
        let context = HashMap::new();
        let system = ChatMessage::system(template.render(&context));

        Self {
            chat,
            template,
            context,
            system,
            history: Arc::new(Mutex::new(Vec::new())),
            turn: Arc::new(TurnLock::new(())),
            options: None,
        }
    }

    pub fn with_context(mut self, fields: HashMap<String, String>) -> Self {
        self.update_context(fields);
        self
    }

    /// Generation options for this session instead of the service defaults
    pub fn with_options(mut self, options: ChatCompletionOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Merge `fields` into the context and re-render the system message
    pub fn update_context(&mut self, fields: HashMap<String, String>) {
        self.context.extend(fields);
        self.system = ChatMessage::system(self.template.render(&self.context));
        debug!("System message re-rendered with {} context fields", self.context.len());
    }

    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    pub fn system_message(&self) -> &ChatMessage {
        &self.system
    }

    /// Snapshot of the turn history
    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().clone()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Drop every turn; the system message and context are kept
    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    /// Send a user turn and record the assistant's reply
    ///
    /// On failure the user turn is removed again, so history only ever holds
    /// completed exchanges.
    pub async fn send(&self, text: &str) -> Result<ChatCompletionResult> {
        let pending = self.begin_turn(text).await?;

        let result = match &self.options {
            Some(options) => self.chat.complete_with_options(&pending.messages, options).await,
            None => self.chat.complete(&pending.messages).await,
        };

        match result {
            Ok(result) => {
                self.history.lock().push(ChatMessage::assistant(result.message.clone()));
                Ok(result)
            }
            Err(e) => {
                self.rollback_turn(&pending);
                Err(e)
            }
        }
    }

    /// Send a user turn and stream the reply
    ///
    /// The assistant turn is recorded once the stream reaches its terminal
    /// entry. A stream abandoned or failing before that leaves only the user
    /// turn in history.
    pub async fn send_streaming(&self, text: &str) -> Result<StreamingChatResult> {
        let pending = self.begin_turn(text).await?;

        let result = match &self.options {
            Some(options) => {
                self.chat
                    .stream_complete_with_options(&pending.messages, options)
                    .await
            }
            None => self.chat.stream_complete(&pending.messages).await,
        };

        match result {
            Ok(streaming) => {
                let history = self.history.clone();
                Ok(streaming.on_complete(move |reply, _usage| {
                    history.lock().push(ChatMessage::assistant(reply));
                    drop(pending);
                }))
            }
            Err(e) => {
                self.rollback_turn(&pending);
                Err(e)
            }
        }
    }

    /// Wait for our turn, append the user message and build the request
    async fn begin_turn(&self, text: &str) -> Result<PendingTurn> {
        if text.trim().is_empty() {
            return Err(GatewayError::Validation("Message cannot be empty".to_string()));
        }

        let guard = self.turn.clone().lock_owned().await;

        let mut history = self.history.lock();
        let index = history.len();
        history.push(ChatMessage::user(text));

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(self.system.clone());
        messages.extend(history.iter().cloned());

        Ok(PendingTurn {
            messages,
            index,
            _guard: guard,
        })
    }

    /// Remove the user message `pending` appended, if it is still there
    fn rollback_turn(&self, pending: &PendingTurn) {
        let mut history = self.history.lock();
        if history.get(pending.index) == pending.messages.last() {
            history.remove(pending.index);
        }
    }
}
