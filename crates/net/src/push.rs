//! Push notification delivery through the Expo push service

use std::env;
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};

pub const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";
const ACCESS_TOKEN_VAR: &str = "EXPO_ACCESS_TOKEN";
const PUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// A notification addressed to one device token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    pub sound: &'static str,
}

impl PushMessage {
    pub fn new(to: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            title: title.into(),
            body: body.into(),
            sound: "default",
        }
    }

    /// The notification a nudged member receives
    pub fn nudge(to: impl Into<String>, from_username: &str, group_name: &str) -> Self {
        Self::new(
            to,
            format!("{from_username} nudged you!"),
            format!("Your group \"{group_name}\" is waiting on you. Go finish a task!"),
        )
    }
}

/// Delivers push notifications
pub trait PushSender {
    fn send(&self, message: &PushMessage) -> impl Future<Output = Result<()>> + Send;
}

/// Client for the Expo push endpoint
pub struct ExpoPushClient {
    http: Client,
    url: String,
    access_token: Option<String>,
}

impl ExpoPushClient {
    pub fn new(access_token: Option<String>) -> Result<Self> {
        Self::with_url(EXPO_PUSH_URL, access_token)
    }

    /// Build with `EXPO_ACCESS_TOKEN` from the environment if present
    pub fn from_env() -> Result<Self> {
        let token = env::var(ACCESS_TOKEN_VAR)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::new(token)
    }

    pub fn with_url(url: impl Into<String>, access_token: Option<String>) -> Result<Self> {
        let http = Client::builder().timeout(PUSH_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.into(),
            access_token,
        })
    }
}

impl PushSender for ExpoPushClient {
    #[instrument(skip(self, message), fields(to = %message.to))]
    async fn send(&self, message: &PushMessage) -> Result<()> {
        let mut request = self.http.post(&self.url).json(message);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited { retry_after: None });
        }
        if !status.is_success() {
            return Err(Error::Provider(format!("HTTP {status} from Expo push")));
        }

        let receipt: PushResponse = response.json().await?;
        check_ticket(receipt.data)?;
        debug!("Push notification accepted");
        Ok(())
    }
}

fn check_ticket(ticket: PushTicket) -> Result<()> {
    if ticket.status == "ok" {
        return Ok(());
    }
    let message = ticket.message.unwrap_or_else(|| "push rejected".into());
    warn!(status = %ticket.status, %message, "Push ticket not ok");
    Err(Error::Provider(message))
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    data: PushTicket,
}

#[derive(Debug, Deserialize)]
struct PushTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let msg = PushMessage::new("ExponentPushToken[abc]", "Hi", "There");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "to": "ExponentPushToken[abc]",
                "title": "Hi",
                "body": "There",
                "sound": "default",
            })
        );
    }

    #[test]
    fn test_nudge_message() {
        let msg = PushMessage::nudge("tok", "alice", "Gym Rats");
        assert_eq!(msg.to, "tok");
        assert_eq!(msg.title, "alice nudged you!");
        assert!(msg.body.contains("Gym Rats"));
    }

    #[test]
    fn test_ticket_status() {
        let ok: PushResponse = serde_json::from_str(r#"{"data":{"status":"ok","id":"x"}}"#).unwrap();
        assert!(check_ticket(ok.data).is_ok());

        let err: PushResponse = serde_json::from_str(
            r#"{"data":{"status":"error","message":"DeviceNotRegistered"}}"#,
        )
        .unwrap();
        match check_ticket(err.data) {
            Err(Error::Provider(m)) => assert_eq!(m, "DeviceNotRegistered"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
