use serde::{Deserialize, Serialize};

use crate::api::ChatService;
use crate::error::ApiError;
use crate::session::Session;

pub const EXCHANGE_ERROR: &str = "Error: Unable to get response.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    User,
    Bot,
}

/// One line of the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
        }
    }
}

/// A request that has been recorded in the transcript but not yet answered.
#[derive(Debug, Clone)]
pub struct PendingExchange {
    pub message: String,
    token: Option<String>,
}

impl PendingExchange {
    pub fn has_credentials(&self) -> bool {
        self.token.is_some()
    }

    /// Run the remote half of the exchange.
    pub async fn run(self, service: &dyn ChatService) -> Result<String, ApiError> {
        let token = self.token.ok_or(ApiError::NoSession)?;
        service.send_message(&token, &self.message).await
    }
}

/// The transcript plus the input line that feeds it.
#[derive(Debug, Default)]
pub struct Conversation {
    transcript: Vec<Message>,
    pub input: String,
    pending: usize,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Number of exchanges still waiting for a reply.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Record the current input as a user message and prepare the request.
    ///
    /// Blank input is ignored. The user message is appended before anything
    /// is sent and is never taken back.
    pub fn begin_exchange(&mut self, session: &Session) -> Option<PendingExchange> {
        let raw = std::mem::take(&mut self.input);
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.input = raw;
            return None;
        }

        let message = trimmed.to_string();
        self.transcript.push(Message::user(raw));
        self.pending += 1;

        Some(PendingExchange {
            message,
            token: session.current_token(),
        })
    }

    /// Append the bot's side of an exchange started by [`begin_exchange`].
    ///
    /// [`begin_exchange`]: Conversation::begin_exchange
    pub fn complete_exchange(&mut self, result: Result<String, ApiError>) {
        self.pending = self.pending.saturating_sub(1);
        match result {
            Ok(reply) => self.transcript.push(Message::bot(reply)),
            Err(e) => {
                tracing::error!("Chat exchange failed: {}", e);
                self.transcript.push(Message::bot(EXCHANGE_ERROR));
            }
        }
    }

    /// Send `raw_input` and wait for the reply.
    pub async fn send_message(
        &mut self,
        raw_input: &str,
        service: &dyn ChatService,
        session: &Session,
    ) {
        self.input = raw_input.to_string();
        if let Some(exchange) = self.begin_exchange(session) {
            let result = exchange.run(service).await;
            self.complete_exchange(result);
        }
    }

    pub fn logout(&self, session: &Session) {
        session.remove_token();
    }
}
