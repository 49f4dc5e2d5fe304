//! Generative task suggestions
//!
//! [`GeminiSuggester`] calls the Gemini `generateContent` REST endpoint when
//! `GEMINI_API_KEY` is set and otherwise answers from a fixed list of general
//! wellness tasks.

use std::env;
use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};

const API_KEY_VAR: &str = "GEMINI_API_KEY";
const MODEL_VAR: &str = "GEMINI_MODEL";
const BASE_URL_VAR: &str = "GEMINI_BASE_URL";
const TIMEOUT_VAR: &str = "GEMINI_TIMEOUT_SECS";

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Most tasks taken from a single suggestion
pub const MAX_SUGGESTIONS: usize = 4;

const RANDOM_PROMPT: &str = "I don't have any specific problems, just give me some general wellness tasks to improve my week";

const FALLBACK_TASKS: [&str; MAX_SUGGESTIONS] = [
    "Go for a 20 minute walk outside",
    "Drink a full glass of water with every meal today",
    "Cook yourself a healthy meal",
    "Call or meet up with a friend",
];

/// Produces short task descriptions from what the user shares
pub trait TaskSuggester {
    fn suggest(&self, prompt: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Suggestions for a user with nothing specific in mind
    fn suggest_random(&self) -> impl Future<Output = Result<Vec<String>>> + Send {
        self.suggest(RANDOM_PROMPT)
    }
}

/// Gemini connection settings
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Read settings from the environment; `None` without an API key
    pub fn from_env() -> Option<Self> {
        let api_key = env::var(API_KEY_VAR).ok().filter(|k| !k.trim().is_empty())?;
        let model = env::var(MODEL_VAR)
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = env::var(BASE_URL_VAR)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout = env::var(TIMEOUT_VAR)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Some(Self {
            api_key,
            model,
            base_url,
            timeout: Duration::from_secs(timeout),
        })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Task suggester backed by Gemini
pub struct GeminiSuggester {
    mode: SuggesterMode,
}

enum SuggesterMode {
    Live(LiveClient),
    Fallback,
}

impl GeminiSuggester {
    /// Configure from the environment, falling back to local suggestions
    pub fn from_env() -> Self {
        match GeminiConfig::from_env() {
            Some(config) => Self::with_config(config),
            None => {
                warn!("{API_KEY_VAR} not set; task suggestions use local fallback list");
                Self::fallback()
            }
        }
    }

    pub fn with_config(config: GeminiConfig) -> Self {
        match LiveClient::new(config) {
            Ok(client) => {
                info!(model = %client.config.model, "Gemini suggester ready");
                Self {
                    mode: SuggesterMode::Live(client),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to build HTTP client; using fallback suggestions");
                Self::fallback()
            }
        }
    }

    /// Suggester that never leaves the machine
    pub fn fallback() -> Self {
        Self {
            mode: SuggesterMode::Fallback,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.mode, SuggesterMode::Live(_))
    }
}

impl TaskSuggester for GeminiSuggester {
    async fn suggest(&self, prompt: &str) -> Result<Vec<String>> {
        match &self.mode {
            SuggesterMode::Live(client) => client.generate(prompt).await,
            SuggesterMode::Fallback => Ok(fallback_tasks()),
        }
    }
}

struct LiveClient {
    http: Client,
    config: GeminiConfig,
}

impl LiveClient {
    fn new(config: GeminiConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    #[instrument(skip(self, prompt))]
    async fn generate(&self, prompt: &str) -> Result<Vec<String>> {
        let payload = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(prompt),
                }],
            }],
        };

        let response = self
            .http
            .post(self.config.generate_url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers());
            return Err(Error::RateLimited { retry_after });
        }

        if !status.is_success() {
            if let Ok(body) = response.json::<ErrorResponse>().await {
                return Err(Error::Provider(format!(
                    "{} (status: {})",
                    body.error.message, body.error.status
                )));
            }
            return Err(Error::Provider(format!("HTTP {status} from Gemini")));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .flat_map(|c| c.content.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        debug!(len = text.len(), "Received suggestion text");
        parse_task_list(&text)
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

/// Wrap the user's words in the coaching instructions
pub fn build_prompt(user_input: &str) -> String {
    format!(
        r#"You are a supportive wellness coach. Based on what the user shares, generate 3-4 specific, actionable tasks they can complete this week to address their situation.

Rules:
- Tasks should be concrete and achievable (something they can take a photo of as proof)
- Each task should be completable in a single session
- Be encouraging but practical
- If the user says nothing is wrong or wants random tasks, give general wellness tasks (exercise, hydration, sleep, social connection, etc.)

User's input: "{}"

Return ONLY a JSON array of task strings, nothing else:
["task1", "task2", "task3", "task4"]"#,
        user_input.trim()
    )
}

/// Extract the task list from model output.
///
/// Takes the span from the first `[` to the last `]`, so prose or code
/// fences around the array are ignored.
pub fn parse_task_list(text: &str) -> Result<Vec<String>> {
    let start = text
        .find('[')
        .ok_or_else(|| Error::Parse("no JSON array in response".into()))?;
    let end = text
        .rfind(']')
        .filter(|&end| end > start)
        .ok_or_else(|| Error::Parse("unterminated JSON array in response".into()))?;

    let items: Vec<String> = serde_json::from_str(&text[start..=end])
        .map_err(|e| Error::Parse(e.to_string()))?;

    let tasks: Vec<String> = items
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .take(MAX_SUGGESTIONS)
        .collect();

    if tasks.is_empty() {
        return Err(Error::Parse("response contained no tasks".into()));
    }
    Ok(tasks)
}

fn fallback_tasks() -> Vec<String> {
    FALLBACK_TASKS.iter().map(|t| t.to_string()).collect()
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_parse_plain_array() {
        let tasks = parse_task_list(r#"["Walk", "Stretch", "Read"]"#).unwrap();
        assert_eq!(tasks, vec!["Walk", "Stretch", "Read"]);
    }

    #[test]
    fn test_parse_array_inside_prose() {
        let text = "Sure! Here you go:\n```json\n[\"Drink water\", \"Sleep by 11\"]\n```\nGood luck.";
        let tasks = parse_task_list(text).unwrap();
        assert_eq!(tasks, vec!["Drink water", "Sleep by 11"]);
    }

    #[test]
    fn test_parse_trims_drops_blanks_and_caps() {
        let text = r#"[" Walk ", "", "  ", "Run", "Swim", "Bike", "Climb"]"#;
        let tasks = parse_task_list(text).unwrap();
        assert_eq!(tasks, vec!["Walk", "Run", "Swim", "Bike"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_task_list("no list here"), Err(Error::Parse(_))));
        assert!(matches!(parse_task_list("] backwards ["), Err(Error::Parse(_))));
        assert!(matches!(parse_task_list("[1, 2]"), Err(Error::Parse(_))));
        assert!(matches!(parse_task_list(r#"["", " "]"#), Err(Error::Parse(_))));
    }

    #[test]
    fn test_prompt_embeds_input() {
        let prompt = build_prompt("  I feel tired  ");
        assert!(prompt.contains(r#"User's input: "I feel tired""#));
        assert!(prompt.contains("JSON array"));
    }

    #[test]
    fn test_generate_url() {
        let config = GeminiConfig {
            api_key: "k".into(),
            model: DEFAULT_MODEL.into(),
            base_url: "http://localhost:9999/".into(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(
            config.generate_url(),
            "http://localhost:9999/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(parse_retry_after(&headers), Some(12));
    }

    #[tokio::test]
    async fn test_fallback_suggestions() {
        let suggester = GeminiSuggester::fallback();
        assert!(!suggester.is_live());

        let tasks = suggester.suggest("anything").await.unwrap();
        assert_eq!(tasks.len(), MAX_SUGGESTIONS);

        let random = suggester.suggest_random().await.unwrap();
        assert_eq!(random, tasks);
    }
}
