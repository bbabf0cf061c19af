//! Minimal Discord REST API client.
//!
//! This crate provides a focused client for the handful of Discord
//! endpoints a report bot needs:
//! - Sending and editing channel messages
//! - Fetching a single message
//! - Retrieving recent channel history
//! - Identifying the bot's own user
//!
//! It deliberately omits the gateway (websocket) API; callers that need
//! inbound messages can poll channel history instead.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const API_BASE: &str = "https://discord.com/api/v10";

/// Errors that can occur when using the Discord client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Bot token not configured")]
    NoToken,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Message or channel not found")]
    NotFound,

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Discord REST API client.
#[derive(Clone)]
pub struct Discord {
    client: reqwest::Client,
    token: String,
}

impl Discord {
    /// Create a new client with the given bot token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            token: token.into(),
        }
    }

    /// Create a client from the `DISCORD_BOT_TOKEN` environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let token = std::env::var("DISCORD_BOT_TOKEN").map_err(|_| Error::NoToken)?;
        Ok(Self::new(token))
    }

    /// Fetch the bot's own user record.
    pub async fn current_user(&self) -> Result<User, Error> {
        let response = self
            .client
            .get(format!("{API_BASE}/users/@me"))
            .headers(self.build_headers()?)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Self::check_status(&response)?;
        response.json().await.map_err(|e| Error::Parse(e.to_string()))
    }

    /// Post a new message to a channel.
    pub async fn create_message(&self, channel_id: u64, content: &str) -> Result<Message, Error> {
        let body = MessagePayload { content };
        let response = self
            .client
            .post(format!("{API_BASE}/channels/{channel_id}/messages"))
            .headers(self.build_headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Self::check_status(&response)?;
        response.json().await.map_err(|e| Error::Parse(e.to_string()))
    }

    /// Edit an existing message in place.
    pub async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        content: &str,
    ) -> Result<Message, Error> {
        let body = MessagePayload { content };
        let response = self
            .client
            .patch(format!(
                "{API_BASE}/channels/{channel_id}/messages/{message_id}"
            ))
            .headers(self.build_headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Self::check_status(&response)?;
        response.json().await.map_err(|e| Error::Parse(e.to_string()))
    }

    /// Fetch a single message by id.
    pub async fn get_message(&self, channel_id: u64, message_id: u64) -> Result<Message, Error> {
        let response = self
            .client
            .get(format!(
                "{API_BASE}/channels/{channel_id}/messages/{message_id}"
            ))
            .headers(self.build_headers()?)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Self::check_status(&response)?;
        response.json().await.map_err(|e| Error::Parse(e.to_string()))
    }

    /// Fetch the most recent messages in a channel, newest first.
    ///
    /// Discord caps `limit` at 100.
    pub async fn get_channel_messages(
        &self,
        channel_id: u64,
        limit: usize,
    ) -> Result<Vec<Message>, Error> {
        let limit = limit.min(100);
        let response = self
            .client
            .get(format!(
                "{API_BASE}/channels/{channel_id}/messages?limit={limit}"
            ))
            .headers(self.build_headers()?)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Self::check_status(&response)?;
        response.json().await.map_err(|e| Error::Parse(e.to_string()))
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bot {}", self.token))
                .map_err(|_| Error::Config("Invalid token characters".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn check_status(response: &reqwest::Response) -> Result<(), Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 404 {
            return Err(Error::NotFound);
        }
        Err(Error::Api {
            status: status.as_u16(),
            message: status.canonical_reason().unwrap_or("unknown").to_string(),
        })
    }
}

/// Payload for message create/edit requests.
#[derive(Debug, Serialize)]
struct MessagePayload<'a> {
    content: &'a str,
}

/// A Discord user, as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// Snowflake id (delivered as a decimal string).
    pub id: String,
    pub username: String,
    /// True for bot accounts. Absent for regular users.
    #[serde(default)]
    pub bot: bool,
}

/// A Discord channel message, as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub content: String,
    /// ISO 8601 creation timestamp.
    pub timestamp: String,
    pub author: User,
}

impl Message {
    /// Parse the snowflake id into a u64, if well-formed.
    pub fn id_u64(&self) -> Option<u64> {
        self.id.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_parsing() {
        let json = r#"{
            "id": "1381601141959295082",
            "channel_id": "1370328553933115453",
            "content": "F70 Frioo",
            "timestamp": "2025-06-09T16:45:03.000000+00:00",
            "author": {"id": "42", "username": "observer", "bot": false}
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.id_u64(), Some(1381601141959295082));
        assert_eq!(message.content, "F70 Frioo");
        assert!(!message.author.bot);
    }

    #[test]
    fn test_bot_flag_defaults_false() {
        let json = r#"{"id": "1", "username": "someone"}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert!(!user.bot);
    }

    #[test]
    fn test_error_display() {
        let err = Error::Api {
            status: 403,
            message: "Forbidden".to_string(),
        };
        assert_eq!(err.to_string(), "API error (status 403): Forbidden");
        assert_eq!(Error::NotFound.to_string(), "Message or channel not found");
    }
}
