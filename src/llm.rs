//! Language model port and its OpenAI-compatible chat-completion adapter.

use crate::config::Config;
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Framing instructions
    System,
    /// The request itself
    User,
}

/// One message of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Who is speaking
    pub role: Role,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sends chat requests to a language model.
pub trait LanguageModel {
    /// Returns the text of the first reply to `messages`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Llm`] if the request fails (network, auth, rate-limit, etc.).
    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Blocking client for an OpenAI-style `/chat/completions` endpoint.
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl OpenAiClient {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredential`] without an API key, or a
    /// configuration error if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::missing_credential(crate::config::API_KEY_VAR))?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
        })
    }
}

impl LanguageModel for OpenAiClient {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages,
        };

        debug!("POST {} ({} messages)", self.endpoint, messages.len());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| Error::llm(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| Error::llm(format!("failed to read response: {e}")))?;

        parse_response(status.as_u16(), &text)
    }
}

/// Stand-in for runs that must never reach a model.
pub(crate) struct DisabledModel;

impl LanguageModel for DisabledModel {
    fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        Err(Error::llm("language model disabled in dry run mode"))
    }
}

/// Extracts the first choice's content, or the API's error message.
pub(crate) fn parse_response(status: u16, body: &str) -> Result<String> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ApiError>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        return Err(Error::llm(format!("API error ({status}): {message}")));
    }

    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::llm(format!("failed to parse response: {e}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::llm("response contained no message content"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[test]
    fn test_messages_serialize_with_lowercase_roles() {
        let messages = [ChatMessage::system("be terse"), ChatMessage::user("hi")];
        let json = serde_json::to_value(ChatRequest {
            model: "gpt-4",
            messages: &messages,
        })
        .unwrap();

        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_parse_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"first"}},
                                  {"message":{"role":"assistant","content":"second"}}]}"#;
        assert_eq!(parse_response(200, body).unwrap(), "first");
    }

    #[test]
    fn test_parse_api_error_message() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
        let err = parse_response(429, body).unwrap_err();

        assert!(matches!(err, Error::Llm { .. }));
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Rate limit reached"));
    }

    #[test]
    fn test_parse_non_json_error_body() {
        let err = parse_response(502, "Bad Gateway").unwrap_err();
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[test]
    fn test_parse_empty_choices() {
        assert!(parse_response(200, r#"{"choices":[]}"#).is_err());
        assert!(parse_response(200, r#"{"choices":[{"message":{"content":null}}]}"#).is_err());
    }

    #[test]
    fn test_disabled_model_always_fails() {
        let err = DisabledModel.complete(&[ChatMessage::user("hi")]).unwrap_err();
        assert!(matches!(err, Error::Llm { .. }));
    }

    #[test]
    fn test_client_requires_credential() {
        let temp = TempDir::new().unwrap();
        let config = Config::builder()
            .root_dir(temp.path())
            .dry_run(true)
            .build()
            .unwrap();

        assert!(matches!(
            OpenAiClient::new(&config),
            Err(Error::MissingCredential { .. })
        ));
    }

    #[test]
    fn test_client_endpoint_joins_base() {
        let temp = TempDir::new().unwrap();
        let config = Config::builder()
            .root_dir(temp.path())
            .api_key("sk-test")
            .api_base("http://localhost:8080/v1/")
            .build()
            .unwrap();

        let client = OpenAiClient::new(&config).unwrap();
        assert_eq!(client.endpoint, "http://localhost:8080/v1/chat/completions");
    }
}
