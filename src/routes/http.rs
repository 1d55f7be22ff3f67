//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; failures are `AppError`s rendered as `{ "message" }`.

use std::sync::Arc;

use axum::{
  extract::{
    rejection::{JsonRejection, PathRejection, QueryRejection},
    Path, Query, State,
  },
  Json,
};
use tracing::{info, instrument};

use crate::domain::{AiLesson, Exercise, Learner, LearnerUpdate, Lesson, NewLearner, NewProgress, UserProgress};
use crate::error::AppError;
use crate::logic;
use crate::openai::PronunciationFeedback;
use crate::progression::{ShopItem, SHOP_ITEMS};
use crate::protocol::*;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, AppError>;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
  Json(HealthOut { ok: true, storage: state.storage.backend_name(), ai: state.openai.is_some() })
}

// ---------- Learners ----------

#[instrument(level = "info", skip_all)]
pub async fn http_create_user(
  State(state): State<Arc<AppState>>,
  body: Result<Json<NewLearner>, JsonRejection>,
) -> ApiResult<Learner> {
  let Json(body) = body?;
  Ok(Json(logic::create_learner(&state, body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_user(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Learner> {
  Ok(Json(logic::load_user(&state, &id).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_update_user(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  body: Result<Json<LearnerUpdate>, JsonRejection>,
) -> ApiResult<Learner> {
  let Json(update) = body?;
  let updated = state
    .storage
    .update_user(&id, update)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".into()))?;
  info!(target: "progression", %id, "Learner updated via field mask");
  Ok(Json(updated))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_lesson_map(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<Vec<LessonMapEntry>> {
  Ok(Json(logic::lesson_map(&state, &id).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_purchase(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  body: Result<Json<PurchaseIn>, JsonRejection>,
) -> ApiResult<Learner> {
  let Json(body) = body?;
  Ok(Json(logic::buy_item(&state, &id, &body.item_id).await?))
}

#[instrument(level = "info")]
pub async fn http_shop_items() -> Json<Vec<ShopItem>> {
  Json(SHOP_ITEMS.to_vec())
}

// ---------- Catalog ----------

#[instrument(level = "info", skip_all)]
pub async fn http_get_lessons(
  State(state): State<Arc<AppState>>,
  query: Result<Query<LessonsQuery>, QueryRejection>,
) -> ApiResult<Vec<Lesson>> {
  let Query(q) = query?;
  let lessons = match q.unit {
    Some(unit) => state.storage.get_lessons_by_unit(unit).await?,
    None => state.storage.get_all_lessons().await?,
  };
  Ok(Json(lessons))
}

#[instrument(level = "info", skip_all)]
pub async fn http_get_lesson(
  State(state): State<Arc<AppState>>,
  id: Result<Path<u32>, PathRejection>,
) -> ApiResult<Lesson> {
  let Path(id) = id?;
  Ok(Json(logic::load_lesson(&state, id).await?))
}

#[instrument(level = "info", skip_all)]
pub async fn http_get_lesson_exercises(
  State(state): State<Arc<AppState>>,
  id: Result<Path<u32>, PathRejection>,
) -> ApiResult<Vec<Exercise>> {
  let Path(id) = id?;
  Ok(Json(state.storage.get_exercises_by_lesson_id(id).await?))
}

// ---------- Progression ----------

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_attempt(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  body: Result<Json<AttemptIn>, JsonRejection>,
) -> ApiResult<AttemptOut> {
  let Json(body) = body?;
  Ok(Json(logic::submit_attempt(&state, &id, body).await?))
}

#[instrument(level = "info", skip_all)]
pub async fn http_complete_lesson(
  State(state): State<Arc<AppState>>,
  id: Result<Path<u32>, PathRejection>,
  body: Result<Json<CompleteLessonIn>, JsonRejection>,
) -> ApiResult<Learner> {
  let Path(lesson_id) = id?;
  let Json(body) = body?;
  Ok(Json(logic::finish_lesson(&state, lesson_id, &body.user_id).await?))
}

#[instrument(level = "info", skip_all)]
pub async fn http_post_progress(
  State(state): State<Arc<AppState>>,
  body: Result<Json<NewProgress>, JsonRejection>,
) -> ApiResult<UserProgress> {
  let Json(body) = body.map_err(|_| AppError::InvalidInput("Invalid progress data".into()))?;
  Ok(Json(state.storage.update_progress(body).await?))
}

#[instrument(level = "info", skip_all)]
pub async fn http_get_progress(
  State(state): State<Arc<AppState>>,
  ids: Result<Path<(String, u32)>, PathRejection>,
) -> ApiResult<Vec<UserProgress>> {
  let Path((user_id, lesson_id)) = ids?;
  Ok(Json(state.storage.get_user_progress(&user_id, lesson_id).await?))
}

// ---------- AI collaborator ----------

#[instrument(level = "info", skip_all)]
pub async fn http_generate_ai_lesson(
  State(state): State<Arc<AppState>>,
  body: Result<Json<GenerateLessonIn>, JsonRejection>,
) -> ApiResult<AiLesson> {
  let Json(body) = body?;
  Ok(Json(logic::generate_ai_lesson(&state, body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_ai_lessons(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<Vec<AiLesson>> {
  Ok(Json(state.storage.get_user_ai_lessons(&id).await?))
}

#[instrument(level = "info", skip_all)]
pub async fn http_validate_pronunciation(
  State(state): State<Arc<AppState>>,
  body: Result<Json<PronunciationIn>, JsonRejection>,
) -> ApiResult<PronunciationFeedback> {
  let Json(body) = body?;
  Ok(Json(logic::validate_pronunciation(&state, body).await?))
}

#[instrument(level = "info", skip_all)]
pub async fn http_generate_hint(
  State(state): State<Arc<AppState>>,
  body: Result<Json<HintIn>, JsonRejection>,
) -> ApiResult<HintOut> {
  let Json(body) = body?;
  let hint = logic::hint_text(&state, body).await;
  Ok(Json(HintOut { hint }))
}
