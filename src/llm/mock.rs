//! Scripted chat model for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatMessage, ChatModel, LlmError};

/// Replies with a fixed answer (or error) and records every request.
pub struct ScriptedChat {
    reply: Result<String, String>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn answering(answer: &str) -> Self {
        Self {
            reply: Ok(answer.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every message list passed to [`ChatModel::chat`], oldest first.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        match &self.reply {
            Ok(answer) => Ok(answer.clone()),
            Err(message) => Err(LlmError::Request {
                url: "scripted://chat".to_string(),
                message: message.clone(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
