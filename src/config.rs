//! Loading application configuration (server, storage backend, prompts) from TOML,
//! with environment variables taking precedence over the file.
//!
//! See `AppConfig` and `Prompts` for the expected schema.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub prompts: Prompts,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_port")]
  pub port: u16,
  #[serde(default = "default_static_dir")]
  pub static_dir: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self { port: default_port(), static_dir: default_static_dir() }
  }
}

fn default_port() -> u16 { 5000 }
fn default_static_dir() -> String { "./static".into() }

#[derive(Clone, Copy, Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
  #[default]
  Memory,
  Firestore,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct StorageConfig {
  #[serde(default)]
  pub backend: BackendKind,
  #[serde(default)]
  pub firestore: Option<FirestoreConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FirestoreConfig {
  #[serde(default)]
  pub project_id: String,
  #[serde(default = "default_database")]
  pub database: String,
  #[serde(default)]
  pub emulator_host: Option<String>,
  /// Only ever read from the environment.
  #[serde(skip)]
  pub access_token: Option<String>,
}

impl Default for FirestoreConfig {
  fn default() -> Self {
    Self { project_id: String::new(), database: default_database(), emulator_host: None, access_token: None }
  }
}

fn default_database() -> String { "(default)".into() }

/// Prompts used by the OpenAI client. `{placeholders}` are filled per request.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub lesson_system: String,
  pub lesson_user_template: String,
  pub pronunciation_system: String,
  pub pronunciation_user_template: String,
  pub hint_system: String,
  pub hint_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      lesson_system: "You are an expert Croatian language teacher creating engaging lessons for American teenagers. Focus on practical, everyday Croatian that builds confidence.".into(),
      lesson_user_template: "Create a Croatian language lesson for a {level} level 13-year-old American student.\n\nPreviously completed topics: {topics}\nPreferred exercise types: {exercise_types}\n\nGenerate a lesson with:\n- A creative title and description\n- 4-5 exercises of varying types (translation, multiple-choice, word-bank, speaking)\n- Croatian phrases appropriate for beginners/intermediate level\n- Include everyday vocabulary and practical phrases\n- Ensure exercises build on each other progressively\n\nReturn JSON: {\"title\": string, \"description\": string, \"exercises\": [{\"type\": \"translation|multiple-choice|word-bank|speaking\", \"question\": string, \"croatianText\": string, \"englishText\": string, \"options\": [string], \"correctAnswer\": string, \"hints\": [string]}]}".into(),
      pronunciation_system: "You are a Croatian pronunciation expert providing encouraging feedback to young learners.".into(),
      pronunciation_user_template: "Compare the spoken Croatian text with the original and provide pronunciation feedback.\n\nOriginal Croatian: \"{original}\"\nSpoken text (approximation): \"{spoken}\"\n\nEvaluate pronunciation accuracy on a scale of 0-100 and give constructive feedback for a 13-year-old learner, considering common challenges for American English speakers.\n\nReturn JSON: {\"score\": number, \"feedback\": string, \"isCorrect\": boolean}".into(),
      hint_system: "You are a supportive Croatian language tutor providing helpful hints to young learners.".into(),
      hint_user_template: "Provide a helpful hint for this Croatian language exercise:\n\nExercise Type: {exercise_type}\nQuestion: {question}\n{context}\n\nGenerate an encouraging hint that guides the student without giving away the answer. Make it age-appropriate for a 13-year-old.".into(),
    }
  }
}

impl AppConfig {
  /// File (APP_CONFIG_PATH) first, then environment overrides. Never fails:
  /// a broken file is logged and defaults are used instead.
  pub fn load() -> Self {
    let mut cfg = std::env::var("APP_CONFIG_PATH")
      .ok()
      .and_then(|path| load_file(Path::new(&path)))
      .unwrap_or_default();
    cfg.apply_env(|key| std::env::var(key).ok());
    cfg
  }

  /// Overlay environment values. `lookup` is injectable so tests don't touch the process env.
  pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(port) = lookup("PORT") {
      match port.parse::<u16>() {
        Ok(p) => self.server.port = p,
        Err(_) => warn!(target: "lingo_backend", %port, "Ignoring unparsable PORT"),
      }
    }
    if let Some(dir) = lookup("STATIC_DIR") {
      self.server.static_dir = dir;
    }

    match lookup("STORAGE_BACKEND").as_deref() {
      Some("firestore") => self.storage.backend = BackendKind::Firestore,
      Some("memory") => self.storage.backend = BackendKind::Memory,
      Some(other) => warn!(target: "lingo_backend", backend = %other, "Unknown STORAGE_BACKEND; keeping configured backend"),
      None => {
        if lookup("USE_FIREBASE").as_deref() == Some("true") {
          self.storage.backend = BackendKind::Firestore;
        }
      }
    }

    let project = lookup("FIREBASE_PROJECT_ID");
    let emulator = lookup("FIRESTORE_EMULATOR_HOST");
    let token = lookup("FIREBASE_ACCESS_TOKEN");
    if project.is_some() || emulator.is_some() || token.is_some() || self.storage.backend == BackendKind::Firestore {
      let fs = self.storage.firestore.get_or_insert_with(FirestoreConfig::default);
      if let Some(p) = project { fs.project_id = p; }
      if let Some(h) = emulator { fs.emulator_host = Some(h); }
      if let Some(t) = token { fs.access_token = Some(t); }
    }
  }
}

/// Read and parse a TOML config file. On any IO/parse error, logs and returns None.
pub fn load_file(path: &Path) -> Option<AppConfig> {
  let shown = path.display().to_string();
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "lingo_backend", path = %shown, "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "lingo_backend", path = %shown, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "lingo_backend", path = %shown, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;
  use std::io::Write;

  fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |k| map.get(k).cloned()
  }

  #[test]
  fn defaults_use_memory_backend() {
    let mut cfg = AppConfig::default();
    cfg.apply_env(env(&[]));
    assert_eq!(cfg.storage.backend, BackendKind::Memory);
    assert_eq!(cfg.server.port, 5000);
    assert!(cfg.storage.firestore.is_none());
  }

  #[test]
  fn use_firebase_flag_selects_firestore() {
    let mut cfg = AppConfig::default();
    cfg.apply_env(env(&[("USE_FIREBASE", "true"), ("FIREBASE_PROJECT_ID", "lingo-prod"), ("FIREBASE_ACCESS_TOKEN", "t")]));
    assert_eq!(cfg.storage.backend, BackendKind::Firestore);
    let fs = cfg.storage.firestore.unwrap();
    assert_eq!(fs.project_id, "lingo-prod");
    assert_eq!(fs.access_token.as_deref(), Some("t"));
    assert_eq!(fs.database, "(default)");
  }

  #[test]
  fn explicit_backend_wins_over_legacy_flag() {
    let mut cfg = AppConfig::default();
    cfg.apply_env(env(&[("STORAGE_BACKEND", "memory"), ("USE_FIREBASE", "true")]));
    assert_eq!(cfg.storage.backend, BackendKind::Memory);
  }

  #[test]
  fn bad_port_is_ignored() {
    let mut cfg = AppConfig::default();
    cfg.apply_env(env(&[("PORT", "http")]));
    assert_eq!(cfg.server.port, 5000);
  }

  #[test]
  fn toml_file_is_parsed() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
      file,
      r#"
[server]
port = 8081

[storage]
backend = "firestore"

[storage.firestore]
project_id = "demo"
emulator_host = "localhost:8080"

[prompts]
hint_system = "Be brief."
"#
    )
    .unwrap();
    let cfg = load_file(file.path()).unwrap();
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.server.static_dir, "./static");
    assert_eq!(cfg.storage.backend, BackendKind::Firestore);
    assert_eq!(cfg.storage.firestore.unwrap().emulator_host.as_deref(), Some("localhost:8080"));
    assert_eq!(cfg.prompts.hint_system, "Be brief.");
    assert!(cfg.prompts.lesson_user_template.contains("{level}"));
  }

  #[test]
  fn missing_file_falls_back_to_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_file(&dir.path().join("absent.toml")).is_none());
  }

  #[test]
  fn broken_toml_falls_back_to_none() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server\nport = ").unwrap();
    assert!(load_file(file.path()).is_none());
  }
}
