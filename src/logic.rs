//! Core behaviors behind the HTTP handlers.
//!
//! Each flow loads what it needs from storage, runs the pure progression rules,
//! and writes the resulting learner snapshot back. Existence checks live here so
//! the progression functions only ever see valid entities.

use tracing::{debug, error, info, instrument, warn};

use crate::domain::{AiLesson, Exercise, ExerciseKind, Learner, Lesson, NewAiLesson, NewLearner};
use crate::error::AppError;
use crate::openai::PronunciationFeedback;
use crate::progression::{self, find_shop_item};
use crate::protocol::{AttemptIn, AttemptOut, GenerateLessonIn, HintIn, LessonMapEntry, PronunciationIn};
use crate::state::AppState;
use crate::util::trunc_for_log;

pub const HINT_FALLBACK: &str = "Try your best! You can do this!";
pub const HINT_EMPTY_FALLBACK: &str = "Try breaking down the sentence word by word!";

pub async fn load_user(state: &AppState, id: &str) -> Result<Learner, AppError> {
  state
    .storage
    .get_user(id)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn load_lesson(state: &AppState, id: u32) -> Result<Lesson, AppError> {
  state
    .storage
    .get_lesson(id)
    .await?
    .ok_or_else(|| AppError::NotFound("Lesson not found".into()))
}

async fn load_exercise(state: &AppState, id: &str) -> Result<Exercise, AppError> {
  state
    .storage
    .get_exercise(id)
    .await?
    .ok_or_else(|| AppError::NotFound("Exercise not found".into()))
}

#[instrument(level = "info", skip(state, new), fields(username = %new.username))]
pub async fn create_learner(state: &AppState, new: NewLearner) -> Result<Learner, AppError> {
  let username = new.username.trim().to_string();
  let email = new.email.trim().to_string();
  if username.is_empty() || email.is_empty() {
    return Err(AppError::InvalidInput("username and email are required".into()));
  }
  if state.storage.get_user_by_username(&username).await?.is_some() {
    return Err(AppError::InvalidInput(format!("Username '{username}' is already taken")));
  }
  let learner = state.storage.create_user(NewLearner { username, email }).await?;
  info!(target: "progression", id = %learner.id, "Learner created");
  Ok(learner)
}

/// Grade an answer and persist the learner's new hearts/XP.
#[instrument(level = "info", skip(state, input), fields(%exercise_id, user_id = %input.user_id))]
pub async fn submit_attempt(state: &AppState, exercise_id: &str, input: AttemptIn) -> Result<AttemptOut, AppError> {
  let learner = load_user(state, &input.user_id).await?;
  let exercise = load_exercise(state, exercise_id).await?;

  let submitted = submitted_answer(&exercise, input.answer, input.selected_words)
    .ok_or_else(|| AppError::InvalidInput("answer or selectedWords is required".into()))?;
  debug!(target: "progression", answer = %trunc_for_log(&submitted, 40), "Attempt received");

  let (verdict, next) = progression::evaluate_attempt(&exercise, &submitted, &learner);
  state.storage.put_user(&next).await?;
  info!(target: "progression", %exercise_id, ?verdict, hearts = next.hearts, xp = next.xp, "Attempt persisted");

  Ok(AttemptOut {
    verdict,
    correct: verdict.is_correct(),
    correct_answer: exercise.correct_answer,
    user: next,
  })
}

/// Word-bank exercises prefer the selected words; everything else prefers the typed answer.
fn submitted_answer(exercise: &Exercise, answer: Option<String>, selected: Option<Vec<String>>) -> Option<String> {
  let joined = selected.map(|words| progression::join_word_bank(&words));
  match exercise.kind {
    ExerciseKind::WordBank => joined.or(answer),
    _ => answer.or(joined),
  }
}

#[instrument(level = "info", skip(state), fields(%lesson_id, %user_id))]
pub async fn finish_lesson(state: &AppState, lesson_id: u32, user_id: &str) -> Result<Learner, AppError> {
  let learner = load_user(state, user_id).await?;
  let lesson = load_lesson(state, lesson_id).await?;

  if learner.completed_lessons.contains(&lesson.id) {
    warn!(target: "progression", %lesson_id, %user_id, "Lesson completed again; XP is awarded again");
  }
  let next = progression::complete_lesson(&lesson, &learner);
  state.storage.put_user(&next).await?;
  info!(target: "progression", %lesson_id, xp = next.xp, current = next.current_lesson_id, "Lesson completion persisted");
  Ok(next)
}

/// Every lesson with its locked/unlocked/completed state, derived fresh on each call.
pub async fn lesson_map(state: &AppState, user_id: &str) -> Result<Vec<LessonMapEntry>, AppError> {
  let learner = load_user(state, user_id).await?;
  let lessons = state.storage.get_all_lessons().await?;
  Ok(lessons
    .into_iter()
    .map(|lesson| {
      let lesson_state = progression::lesson_state(&lesson, &learner);
      LessonMapEntry { lesson, state: lesson_state }
    })
    .collect())
}

#[instrument(level = "info", skip(state), fields(%user_id, %item_id))]
pub async fn buy_item(state: &AppState, user_id: &str, item_id: &str) -> Result<Learner, AppError> {
  let learner = load_user(state, user_id).await?;
  let item = find_shop_item(item_id).ok_or_else(|| AppError::NotFound("Shop item not found".into()))?;
  let next = progression::purchase(item, &learner)?;
  state.storage.put_user(&next).await?;
  info!(target: "progression", %item_id, gems = next.gems, "Purchase persisted");
  Ok(next)
}

#[instrument(level = "info", skip(state, input), fields(level = %input.user_level))]
pub async fn generate_ai_lesson(state: &AppState, input: GenerateLessonIn) -> Result<AiLesson, AppError> {
  let oa = state
    .openai
    .as_ref()
    .ok_or_else(|| AppError::Upstream("Failed to generate AI lesson: OpenAI is not configured".into()))?;

  let generated = oa
    .generate_lesson(&state.prompts, &input.user_level, &input.completed_topics, &input.preferred_exercise_types)
    .await
    .map_err(|e| {
      error!(target: "lingo_backend", error = %e, "AI lesson generation failed");
      AppError::Upstream(format!("Failed to generate AI lesson: {e}"))
    })?;

  let stored = state
    .storage
    .create_ai_lesson(NewAiLesson {
      user_id: input.user_id,
      title: generated.title,
      content: generated.content,
      difficulty: input.user_level,
    })
    .await?;
  Ok(stored)
}

#[instrument(level = "info", skip(state, input), fields(original_len = input.original_text.len()))]
pub async fn validate_pronunciation(state: &AppState, input: PronunciationIn) -> Result<PronunciationFeedback, AppError> {
  let oa = state
    .openai
    .as_ref()
    .ok_or_else(|| AppError::Upstream("Failed to validate pronunciation: OpenAI is not configured".into()))?;

  oa.validate_pronunciation(&state.prompts, &input.original_text, &input.spoken_text)
    .await
    .map_err(|e| {
      error!(target: "lingo_backend", error = %e, "Pronunciation validation failed");
      AppError::Upstream(format!("Failed to validate pronunciation: {e}"))
    })
}

/// Never fails: upstream errors and a missing client both produce the fixed fallback.
#[instrument(level = "info", skip(state, input), fields(exercise_type = %input.exercise_type))]
pub async fn hint_text(state: &AppState, input: HintIn) -> String {
  let Some(oa) = &state.openai else {
    debug!(target: "lingo_backend", "Hint via fallback (OpenAI disabled).");
    return HINT_FALLBACK.into();
  };
  match oa
    .generate_hint(
      &state.prompts,
      &input.exercise_type,
      &input.question,
      input.croatian_text.as_deref(),
      input.english_text.as_deref(),
    )
    .await
  {
    Ok(text) if text.trim().is_empty() => HINT_EMPTY_FALLBACK.into(),
    Ok(text) => text,
    Err(e) => {
      error!(target: "lingo_backend", error = %e, "OpenAI hint failed; using fallback.");
      HINT_FALLBACK.into()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seeds::base_exercises;

  #[test]
  fn word_bank_prefers_selection() {
    let wb = base_exercises().into_iter().find(|e| e.kind == ExerciseKind::WordBank).unwrap();
    let got = submitted_answer(&wb, Some("typed".into()), Some(vec!["Kako".into(), "ste?".into()]));
    assert_eq!(got.as_deref(), Some("Kako ste?"));
  }

  #[test]
  fn other_kinds_prefer_typed_answer() {
    let tr = base_exercises().remove(0);
    let got = submitted_answer(&tr, Some("good morning".into()), Some(vec!["x".into()]));
    assert_eq!(got.as_deref(), Some("good morning"));
    assert_eq!(submitted_answer(&tr, None, None), None);
  }
}
