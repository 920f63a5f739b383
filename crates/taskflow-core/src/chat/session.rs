use std::future::Future;

use super::{
    conversation_title, ChatBackend, ChatMessage, ChatReply, Conversation, Role, SaveMessage,
    DEFAULT_MODEL, ERROR_REPLY, GREETING, HISTORY_LIMIT, STOPPED_REPLY,
};
use crate::error::ApiError;
use crate::storage::ChatConfig;
use crate::task::{TaskBackend, TaskCache};

/// Result of one [`ChatSession::send`].
#[derive(Debug)]
pub enum SendOutcome {
    /// Blank input; nothing was sent.
    Ignored,
    Replied(ChatReply),
    /// The caller's stop signal won the race with the backend.
    Stopped,
    Failed(ApiError),
}

/// One chat window: transcript, conversation list and the active
/// conversation. Taking `&mut self` for sends keeps at most one request in
/// flight.
pub struct ChatSession<C> {
    backend: C,
    model: String,
    history_limit: u32,
    messages: Vec<ChatMessage>,
    conversations: Vec<Conversation>,
    active: Option<i64>,
}

impl<C: ChatBackend> ChatSession<C> {
    pub fn new(backend: C) -> Self {
        let mut session = Self {
            backend,
            model: DEFAULT_MODEL.to_string(),
            history_limit: HISTORY_LIMIT,
            messages: Vec::new(),
            conversations: Vec::new(),
            active: None,
        };
        session.new_chat();
        session
    }

    pub fn with_config(backend: C, config: &ChatConfig) -> Self {
        let mut session = Self::new(backend);
        session.model = config.model.clone();
        session.history_limit = config.history_limit;
        session
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_conversation(&self) -> Option<i64> {
        self.active
    }

    pub fn backend(&self) -> &C {
        &self.backend
    }

    /// Forget the active conversation and show the greeting.
    pub fn new_chat(&mut self) {
        self.active = None;
        self.messages = vec![ChatMessage::assistant(GREETING)];
    }

    /// Send one user turn.
    ///
    /// `stop` cancels the request when it resolves first. On a reply the
    /// task cache is invalidated, since the assistant may have changed tasks.
    pub async fn send<B, F>(&mut self, input: &str, stop: F, tasks: &mut TaskCache<B>) -> SendOutcome
    where
        B: TaskBackend,
        F: Future<Output = ()>,
    {
        if input.trim().is_empty() {
            return SendOutcome::Ignored;
        }

        self.messages.push(ChatMessage::user(input));

        if self.active.is_none() {
            match self.backend.create_conversation(&conversation_title(input)).await {
                Ok(conversation) => {
                    self.active = Some(conversation.id);
                    self.conversations.insert(0, conversation);
                }
                Err(e) => tracing::warn!(error = %e, "failed to create conversation"),
            }
        }

        self.save(Role::User, input, None).await;

        let request = self.backend.send_chat(&self.messages, &self.model);
        let result = tokio::select! {
            result = request => result,
            _ = stop => Err(ApiError::Cancelled),
        };

        match result {
            Ok(reply) => {
                if let Some(ref source) = reply.source {
                    tracing::info!(source = %source, "AI model used");
                }
                self.messages.push(ChatMessage::assistant(&reply.response));
                let content = reply.response.clone();
                self.save(Role::Assistant, &content, reply.source.clone()).await;
                tasks.invalidate();
                SendOutcome::Replied(reply)
            }
            Err(ApiError::Cancelled) => {
                self.messages.push(ChatMessage::assistant(STOPPED_REPLY));
                SendOutcome::Stopped
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat request failed");
                self.messages.push(ChatMessage::assistant(ERROR_REPLY));
                SendOutcome::Failed(e)
            }
        }
    }

    async fn save(&self, role: Role, content: &str, source: Option<String>) {
        let message = SaveMessage {
            role,
            content: content.to_string(),
            source,
            conversation_id: self.active,
        };
        if let Err(e) = self.backend.save_message(&message).await {
            tracing::warn!(error = %e, "failed to save message");
        }
    }

    /// Refresh the conversation list. With nothing active, the most recent
    /// conversation is opened.
    ///
    /// # Errors
    /// Returns the backend error when listing or loading history fails.
    pub async fn load_conversations(&mut self) -> Result<(), ApiError> {
        self.conversations = self.backend.list_conversations().await?;
        if self.active.is_none() {
            if let Some(id) = self.conversations.first().map(|c| c.id) {
                self.select(id).await?;
            }
        }
        Ok(())
    }

    /// Make `id` active and replace the transcript with its history.
    ///
    /// # Errors
    /// Returns the backend error when the history cannot be loaded.
    pub async fn select(&mut self, id: i64) -> Result<(), ApiError> {
        self.active = Some(id);
        self.messages = self.backend.chat_history(id, self.history_limit).await?;
        Ok(())
    }

    /// # Errors
    /// Returns the backend error; the local list is left unchanged.
    pub async fn rename(&mut self, id: i64, title: &str) -> Result<(), ApiError> {
        let updated = self.backend.rename_conversation(id, title).await?;
        if let Some(slot) = self.conversations.iter_mut().find(|c| c.id == id) {
            *slot = updated;
        }
        Ok(())
    }

    /// Delete a conversation. Deleting the active one starts a new chat.
    ///
    /// # Errors
    /// Returns the backend error; the local list is left unchanged.
    pub async fn delete(&mut self, id: i64) -> Result<(), ApiError> {
        self.backend.delete_conversation(id).await?;
        self.conversations.retain(|c| c.id != id);
        if self.active == Some(id) {
            self.new_chat();
        }
        Ok(())
    }
}
