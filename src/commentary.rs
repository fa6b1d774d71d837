use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4-turbo";
const MODEL_TEMPERATURE: f32 = 0.0;

const SYSTEM_PROMPT: &str = "You are commentating a chess game. \
You will receive information from the user about the state of the board, new moves, engine evaluation \
and the identity of the players. Do your best to comment on the game giving insightful commentary in \
a way that is casual. When the provided evaluation changes by a lot, point it out and emphasize how \
one of the players has made a mistake. Do not make up names of the players, stick with names that you \
are specifically told. You will slowly get told more information. Keep messages short, do not invent \
continuations of the game. Always trust what the user says, it will give you correct information about \
the game. Good commentary should comment on the last move made and say what it is achieving. Reference \
the evaluation of the engines (if available) when commenting.";

/// Structured context for one commentary utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentaryRequest {
    /// First position seen in this session.
    Startup {
        fen_position: String,
        last_move: String,
        white_name: String,
        black_name: String,
    },
    /// A legal continuation of the current game.
    Move { fen_position: String, last_move: String },
    /// The position stream jumped; a new game started.
    NewGame {
        fen_position: String,
        white_name: String,
        black_name: String,
    },
    Eval {
        engine_name: String,
        evaluation: String,
        best_line: String,
    },
}

impl CommentaryRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            CommentaryRequest::Startup { .. } => "startup",
            CommentaryRequest::Move { .. } => "move",
            CommentaryRequest::NewGame { .. } => "new game",
            CommentaryRequest::Eval { .. } => "eval",
        }
    }

    /// Renders the user message sent to the language model.
    pub fn prompt(&self) -> String {
        match self {
            CommentaryRequest::Startup {
                fen_position,
                last_move,
                white_name,
                black_name,
            } => format!(
                "We are now starting the commentary for the first time. Current game is between {white_name} \
                 (with the white pieces) and {black_name} (with the black pieces). The last move was {last_move}. \
                 The current position is {fen_position}. Just commentate on the position. Do not make up moves. \
                 Repeat the names of the players."
            ),
            CommentaryRequest::Move {
                fen_position,
                last_move,
            } => format!(
                "Another move has been made. Last move is {last_move}. Current board position is {fen_position}"
            ),
            CommentaryRequest::NewGame {
                fen_position,
                white_name,
                black_name,
            } => format!(
                "The previous game is over and a new one is starting. Current game is between {white_name} \
                 (with the white pieces) and {black_name} (with the black pieces). The current position is {fen_position}"
            ),
            CommentaryRequest::Eval {
                engine_name,
                evaluation,
                best_line,
            } => format!(
                "This is the opinion of a chess engine on the current position. The evaluating engine is \
                 {engine_name}. They believe that the current position evaluation is {evaluation}. \
                 They believe that the best line is {best_line}"
            ),
        }
    }
}

/// Turns structured game context into a short line of commentary.
///
/// Implementations keep conversational history across calls within one
/// session, which is why generation takes `&mut self`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommentaryGenerator: Send {
    async fn generate(&mut self, request: &CommentaryRequest) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct LlmResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Chat-completions client that accumulates the whole commentary session.
pub struct ChatCommentator {
    client: Client,
    api_key: SecretString,
    model: String,
    url: String,
    history: Vec<ChatMessage>,
}

impl ChatCommentator {
    pub fn new(api_key: SecretString, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            url: CHAT_COMPLETIONS_URL.to_string(),
            history: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    fn request_body(&self) -> serde_json::Value {
        let mut messages = vec![ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT.to_string(),
        }];
        messages.extend(self.history.iter().cloned());
        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": MODEL_TEMPERATURE,
        })
    }
}

#[async_trait]
impl CommentaryGenerator for ChatCommentator {
    async fn generate(&mut self, request: &CommentaryRequest) -> Result<String> {
        // Kept even when the call below fails.
        self.history.push(ChatMessage {
            role: "user",
            content: request.prompt(),
        });

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body())
            .send()
            .await
            .context("Failed to reach the chat completions endpoint")?
            .error_for_status()?
            .json::<LlmResponse>()
            .await
            .context("Failed to decode the chat completions response")?;

        let answer = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No response from LLM"))?
            .message
            .content
            .trim()
            .to_string();

        self.history.push(ChatMessage {
            role: "assistant",
            content: answer.clone(),
        });
        Ok(answer)
    }
}
