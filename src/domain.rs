//! Domain models used by the backend: learners, the lesson/exercise catalog,
//! progress records, generated lessons and the learner field mask.
//!
//! Field names on the wire are camelCase to stay compatible with the web client.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub const MAX_HEARTS: u8 = 5;
pub const STARTING_GEMS: u64 = 500;
pub const FIRST_LESSON_ID: u32 = 1;

/// Persisted per-user progression record (`User` in the web API).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Learner {
  pub id: String,
  pub username: String,
  pub email: String,
  pub hearts: u8,
  pub xp: u64,
  pub streak: u32,
  pub gems: u64,
  #[serde(default)]
  pub last_activity_date: Option<String>,
  #[serde(default = "first_lesson_id", deserialize_with = "lesson_id_or_first")]
  pub current_lesson_id: u32,
  #[serde(default, deserialize_with = "null_as_default")]
  pub completed_lessons: BTreeSet<u32>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub achievements: BTreeSet<String>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

impl Learner {
  /// Fresh learner with the starting balance: full hearts, 500 gems, lesson 1.
  pub fn new(id: impl Into<String>, username: impl Into<String>, email: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      username: username.into(),
      email: email.into(),
      hearts: MAX_HEARTS,
      xp: 0,
      streak: 0,
      gems: STARTING_GEMS,
      last_activity_date: None,
      current_lesson_id: FIRST_LESSON_ID,
      completed_lessons: BTreeSet::new(),
      achievements: BTreeSet::new(),
      created_at: Some(Utc::now()),
    }
  }
}

/// Input for creating a learner; everything else starts from defaults.
#[derive(Clone, Debug, Deserialize)]
pub struct NewLearner {
  pub username: String,
  pub email: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LessonKind {
  Base,
  AiGenerated,
}

/// Immutable catalog entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
  pub id: u32,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  pub unit: u32,
  pub order: u32,
  /// Static hint for the lesson map; the real gate is `progression::unlock_state`.
  pub is_locked: bool,
  pub xp_reward: u64,
  #[serde(rename = "type")]
  pub kind: LessonKind,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ExerciseKind {
  Translation,
  MultipleChoice,
  Listening,
  Speaking,
  WordBank,
}

/// Immutable catalog entry belonging to exactly one lesson.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
  pub id: String,
  pub lesson_id: u32,
  #[serde(rename = "type")]
  pub kind: ExerciseKind,
  pub question: String,
  #[serde(default)]
  pub croatian_text: Option<String>,
  #[serde(default)]
  pub english_text: Option<String>,
  #[serde(default)]
  pub audio_url: Option<String>,
  #[serde(default)]
  pub options: Option<Vec<String>>,
  pub correct_answer: String,
  #[serde(default)]
  pub hints: Option<Vec<String>>,
  pub order: u32,
}

/// Append-only log entry of a learner working through an exercise.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
  pub id: String,
  #[serde(default)]
  pub user_id: Option<String>,
  #[serde(default)]
  pub lesson_id: Option<u32>,
  #[serde(default)]
  pub exercise_id: Option<String>,
  pub is_completed: bool,
  pub attempts: u32,
  pub correct_attempts: u32,
  #[serde(default)]
  pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProgress {
  #[serde(default)]
  pub user_id: Option<String>,
  #[serde(default)]
  pub lesson_id: Option<u32>,
  #[serde(default)]
  pub exercise_id: Option<String>,
  #[serde(default)]
  pub is_completed: bool,
  #[serde(default)]
  pub attempts: u32,
  #[serde(default)]
  pub correct_attempts: u32,
}

impl NewProgress {
  pub fn into_record(self, id: String) -> UserProgress {
    let completed_at = self.is_completed.then(Utc::now);
    UserProgress {
      id,
      user_id: self.user_id,
      lesson_id: self.lesson_id,
      exercise_id: self.exercise_id,
      is_completed: self.is_completed,
      attempts: self.attempts,
      correct_attempts: self.correct_attempts,
      completed_at,
    }
  }
}

/// A lesson produced by the AI collaborator, kept per learner.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiLesson {
  pub id: String,
  #[serde(default)]
  pub user_id: Option<String>,
  pub title: String,
  #[serde(default)]
  pub content: serde_json::Value,
  pub difficulty: String,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct NewAiLesson {
  pub user_id: Option<String>,
  pub title: String,
  pub content: serde_json::Value,
  pub difficulty: String,
}

/// Partial learner update.
///
/// Merge rule: an absent field is preserved, a present value overwrites, and an
/// explicit `null` clears `lastActivityDate` but is rejected on every other field.
/// Unknown fields (including `id` and `createdAt`) are rejected.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LearnerUpdate {
  #[serde(default, deserialize_with = "present")]
  pub username: Option<Option<String>>,
  #[serde(default, deserialize_with = "present")]
  pub email: Option<Option<String>>,
  #[serde(default, deserialize_with = "present")]
  pub hearts: Option<Option<u8>>,
  #[serde(default, deserialize_with = "present")]
  pub xp: Option<Option<u64>>,
  #[serde(default, deserialize_with = "present")]
  pub streak: Option<Option<u32>>,
  #[serde(default, deserialize_with = "present")]
  pub gems: Option<Option<u64>>,
  #[serde(default, deserialize_with = "present")]
  pub last_activity_date: Option<Option<String>>,
  #[serde(default, deserialize_with = "present")]
  pub current_lesson_id: Option<Option<u32>>,
  #[serde(default, deserialize_with = "present")]
  pub completed_lessons: Option<Option<BTreeSet<u32>>>,
  #[serde(default, deserialize_with = "present")]
  pub achievements: Option<Option<BTreeSet<String>>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpdateError {
  #[error("field '{0}' cannot be null")]
  NullField(&'static str),
  #[error("hearts must be between 0 and 5, got {got}")]
  HeartsOutOfRange { got: u8 },
  #[error("xp cannot decrease (from {from} to {to})")]
  XpDecrease { from: u64, to: u64 },
}

impl LearnerUpdate {
  /// Apply the mask to a snapshot and return the merged learner.
  pub fn apply(self, learner: &Learner) -> Result<Learner, UpdateError> {
    let mut next = learner.clone();

    if let Some(v) = self.username { next.username = required("username", v)?; }
    if let Some(v) = self.email { next.email = required("email", v)?; }
    if let Some(v) = self.hearts {
      let hearts = required("hearts", v)?;
      if hearts > MAX_HEARTS {
        return Err(UpdateError::HeartsOutOfRange { got: hearts });
      }
      next.hearts = hearts;
    }
    if let Some(v) = self.xp {
      let xp = required("xp", v)?;
      if xp < learner.xp {
        return Err(UpdateError::XpDecrease { from: learner.xp, to: xp });
      }
      next.xp = xp;
    }
    if let Some(v) = self.streak { next.streak = required("streak", v)?; }
    if let Some(v) = self.gems { next.gems = required("gems", v)?; }
    if let Some(v) = self.last_activity_date { next.last_activity_date = v; }
    if let Some(v) = self.current_lesson_id { next.current_lesson_id = required("currentLessonId", v)?; }
    if let Some(v) = self.completed_lessons { next.completed_lessons = required("completedLessons", v)?; }
    if let Some(v) = self.achievements { next.achievements = required("achievements", v)?; }

    Ok(next)
  }
}

fn required<T>(field: &'static str, v: Option<T>) -> Result<T, UpdateError> {
  v.ok_or(UpdateError::NullField(field))
}

// Distinguishes `null` (Some(None)) from an absent field (None, via `default`).
fn present<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(d).map(Some)
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de> + Default,
{
  Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

fn lesson_id_or_first<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
  Option::<u32>::deserialize(d).map(|v| v.unwrap_or(FIRST_LESSON_ID))
}

fn first_lesson_id() -> u32 { FIRST_LESSON_ID }

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn learner() -> Learner {
    let mut l = Learner::new("u1", "ana", "ana@example.com");
    l.xp = 100;
    l.last_activity_date = Some("2024-05-01".into());
    l
  }

  fn mask(v: serde_json::Value) -> LearnerUpdate {
    serde_json::from_value(v).unwrap()
  }

  #[test]
  fn absent_fields_are_preserved() {
    let before = learner();
    let after = mask(json!({ "gems": 150 })).apply(&before).unwrap();
    assert_eq!(after.gems, 150);
    assert_eq!(after.hearts, before.hearts);
    assert_eq!(after.xp, before.xp);
    assert_eq!(after.last_activity_date, before.last_activity_date);
  }

  #[test]
  fn null_clears_nullable_field_only() {
    let before = learner();
    let after = mask(json!({ "lastActivityDate": null })).apply(&before).unwrap();
    assert_eq!(after.last_activity_date, None);

    let err = mask(json!({ "hearts": null })).apply(&before).unwrap_err();
    assert_eq!(err, UpdateError::NullField("hearts"));
  }

  #[test]
  fn hearts_above_max_are_rejected() {
    let err = mask(json!({ "hearts": 6 })).apply(&learner()).unwrap_err();
    assert_eq!(err, UpdateError::HeartsOutOfRange { got: 6 });
  }

  #[test]
  fn xp_cannot_go_down() {
    let err = mask(json!({ "xp": 99 })).apply(&learner()).unwrap_err();
    assert_eq!(err, UpdateError::XpDecrease { from: 100, to: 99 });
    let ok = mask(json!({ "xp": 110 })).apply(&learner()).unwrap();
    assert_eq!(ok.xp, 110);
  }

  #[test]
  fn unknown_and_identity_fields_are_rejected() {
    assert!(serde_json::from_value::<LearnerUpdate>(json!({ "id": "other" })).is_err());
    assert!(serde_json::from_value::<LearnerUpdate>(json!({ "coins": 3 })).is_err());
  }

  #[test]
  fn learner_reads_null_collections_as_empty() {
    let l: Learner = serde_json::from_value(json!({
      "id": "x", "username": "x", "email": "x@x", "hearts": 5, "xp": 0, "streak": 0, "gems": 0,
      "currentLessonId": null, "completedLessons": null, "achievements": null
    }))
    .unwrap();
    assert!(l.completed_lessons.is_empty());
    assert!(l.achievements.is_empty());
    assert_eq!(l.current_lesson_id, FIRST_LESSON_ID);
  }

  #[test]
  fn exercise_kind_uses_wire_names() {
    assert_eq!(serde_json::to_value(ExerciseKind::WordBank).unwrap(), json!("word-bank"));
    assert_eq!(serde_json::to_value(LessonKind::AiGenerated).unwrap(), json!("ai-generated"));
  }
}
