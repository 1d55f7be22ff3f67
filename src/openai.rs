//! Minimal OpenAI client for the three generative features: lesson generation,
//! pronunciation feedback, and exercise hints.
//!
//! We only call chat.completions and request either plain text or a strict JSON object.
//! Calls are instrumented and log model names, latencies and token usage (not contents).
//!
//! NOTE: We never log the API key.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::util::fill_template;

/// Stored when the model leaves the title out.
pub const DEFAULT_AI_LESSON_TITLE: &str = "AI Lesson";

/// Pronunciation attempts at or above this score count as correct.
pub const PRONUNCIATION_PASS_SCORE: f64 = 70.0;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

/// Generated lesson as returned by the model; `content` is kept verbatim.
#[derive(Debug)]
pub struct GeneratedLesson {
  pub title: String,
  pub content: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PronunciationFeedback {
  pub score: f64,
  pub feedback: String,
  pub is_correct: bool,
}

impl PronunciationFeedback {
  /// Clamp the model's score into 0..=100 and derive the pass flag from it.
  pub fn from_raw_score(score: f64, feedback: String) -> Self {
    let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 100.0) };
    Self { score, feedback, is_correct: score >= PRONUNCIATION_PASS_SCORE }
  }
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }

  async fn send(&self, req: &ChatCompletionRequest) -> Result<String, String> {
    let url = format!("{}/chat/completions", self.base_url);
    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "lingo-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      error!(elapsed = ?start.elapsed(), %status, "OpenAI call failed");
      return Err(format!("OpenAI HTTP {}: {}", status, msg));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(elapsed = ?start.elapsed(), prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    Ok(body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default())
  }

  /// Plain-text chat completion.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_plain(&self, system: &str, user: &str) -> Result<String, String> {
    let req = ChatCompletionRequest::new(&self.model, system, user, None);
    Ok(self.send(&req).await?.trim().to_string())
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(&self, system: &str, user: &str) -> Result<T, String> {
    let req = ChatCompletionRequest::new(
      &self.model,
      system,
      user,
      Some(ResponseFormat { r#type: "json_object".into() }),
    );
    let text = self.send(&req).await?;
    serde_json::from_str::<T>(&text).map_err(|e| format!("JSON parse error: {}", e))
  }

  // --- High-level helpers (domain-specialized) ---

  #[instrument(level = "info", skip(self, prompts, topics, exercise_types), fields(topic_count = topics.len()))]
  pub async fn generate_lesson(
    &self,
    prompts: &Prompts,
    level: &str,
    topics: &[String],
    exercise_types: &[String],
  ) -> Result<GeneratedLesson, String> {
    let topics = topics.join(", ");
    let exercise_types = exercise_types.join(", ");
    let user = fill_template(
      &prompts.lesson_user_template,
      &[("level", level), ("topics", topics.as_str()), ("exercise_types", exercise_types.as_str())],
    );
    let content: serde_json::Value = self.chat_json(&prompts.lesson_system, &user).await?;
    let title = lesson_title(&content);
    info!(%title, "AI lesson generated");
    Ok(GeneratedLesson { title, content })
  }

  #[instrument(level = "info", skip(self, prompts, original, spoken), fields(original_len = original.len(), spoken_len = spoken.len()))]
  pub async fn validate_pronunciation(
    &self,
    prompts: &Prompts,
    original: &str,
    spoken: &str,
  ) -> Result<PronunciationFeedback, String> {
    #[derive(Deserialize)]
    struct Raw { score: f64, #[serde(default)] feedback: String }

    let user = fill_template(&prompts.pronunciation_user_template, &[("original", original), ("spoken", spoken)]);
    let raw: Raw = self.chat_json(&prompts.pronunciation_system, &user).await?;
    Ok(PronunciationFeedback::from_raw_score(raw.score, raw.feedback))
  }

  #[instrument(level = "info", skip(self, prompts, question, croatian, english), fields(%exercise_type, question_len = question.len()))]
  pub async fn generate_hint(
    &self,
    prompts: &Prompts,
    exercise_type: &str,
    question: &str,
    croatian: Option<&str>,
    english: Option<&str>,
  ) -> Result<String, String> {
    let mut context = Vec::new();
    if let Some(c) = croatian.filter(|c| !c.is_empty()) { context.push(format!("Croatian text: {c}")); }
    if let Some(e) = english.filter(|e| !e.is_empty()) { context.push(format!("English text: {e}")); }
    let context = context.join("\n");
    let user = fill_template(
      &prompts.hint_user_template,
      &[("exercise_type", exercise_type), ("question", question), ("context", context.as_str())],
    );
    self.chat_plain(&prompts.hint_system, &user).await
  }
}

fn lesson_title(content: &serde_json::Value) -> String {
  content
    .get("title")
    .and_then(|t| t.as_str())
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .unwrap_or(DEFAULT_AI_LESSON_TITLE)
    .to_string()
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}

impl ChatCompletionRequest {
  fn new(model: &str, system: &str, user: &str, response_format: Option<ResponseFormat>) -> Self {
    Self {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      response_format,
    }
  }
}

#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pronunciation_score_is_clamped() {
    let high = PronunciationFeedback::from_raw_score(140.0, "great".into());
    assert_eq!((high.score, high.is_correct), (100.0, true));
    let low = PronunciationFeedback::from_raw_score(-5.0, "try again".into());
    assert_eq!((low.score, low.is_correct), (0.0, false));
  }

  #[test]
  fn pass_threshold_is_inclusive() {
    assert!(PronunciationFeedback::from_raw_score(70.0, String::new()).is_correct);
    assert!(!PronunciationFeedback::from_raw_score(69.9, String::new()).is_correct);
  }

  #[test]
  fn untitled_lessons_get_default_title() {
    use serde_json::json;
    assert_eq!(lesson_title(&json!({ "title": "Na tržnici", "exercises": [] })), "Na tržnici");
    assert_eq!(lesson_title(&json!({ "exercises": [] })), DEFAULT_AI_LESSON_TITLE);
    assert_eq!(lesson_title(&json!({ "title": "  " })), DEFAULT_AI_LESSON_TITLE);
    assert_eq!(lesson_title(&json!({ "title": 7 })), DEFAULT_AI_LESSON_TITLE);
  }

  #[test]
  fn openai_error_body_is_unwrapped() {
    let body = r#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Invalid API key"));
    assert_eq!(extract_openai_error("gateway timeout"), None);
  }
}
