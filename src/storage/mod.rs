//! Storage capability shared by the two backends.
//!
//! `MemStorage` keeps everything in process memory; `FirestoreStorage` talks to
//! a Cloud Firestore database over its REST API. One of them is chosen at
//! startup from configuration and shared as `Arc<dyn Storage>`.
//!
//! Learner writes are whole-record snapshots: concurrent read-modify-write
//! cycles on the same learner are last-write-wins.

use async_trait::async_trait;

use crate::domain::{
  AiLesson, Exercise, Learner, LearnerUpdate, Lesson, NewAiLesson, NewLearner, NewProgress, UserProgress,
};
use crate::error::{AppError, StorageError};

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStorage;
pub use memory::MemStorage;

#[async_trait]
pub trait Storage: Send + Sync {
  /// Short backend name for health output and logs.
  fn backend_name(&self) -> &'static str;

  // Learners
  async fn get_user(&self, id: &str) -> Result<Option<Learner>, StorageError>;
  async fn get_user_by_username(&self, username: &str) -> Result<Option<Learner>, StorageError>;
  async fn create_user(&self, new: NewLearner) -> Result<Learner, StorageError>;
  /// Write the full learner snapshot, replacing whatever is stored under its id.
  async fn put_user(&self, learner: &Learner) -> Result<(), StorageError>;

  // Catalog
  async fn get_all_lessons(&self) -> Result<Vec<Lesson>, StorageError>;
  async fn get_lesson(&self, id: u32) -> Result<Option<Lesson>, StorageError>;
  async fn get_lessons_by_unit(&self, unit: u32) -> Result<Vec<Lesson>, StorageError>;
  async fn create_lesson(&self, lesson: Lesson) -> Result<Lesson, StorageError>;
  async fn get_exercises_by_lesson_id(&self, lesson_id: u32) -> Result<Vec<Exercise>, StorageError>;
  async fn get_exercise(&self, id: &str) -> Result<Option<Exercise>, StorageError>;
  async fn create_exercise(&self, exercise: Exercise) -> Result<Exercise, StorageError>;

  // Progress log
  async fn get_user_progress(&self, user_id: &str, lesson_id: u32) -> Result<Vec<UserProgress>, StorageError>;
  async fn update_progress(&self, progress: NewProgress) -> Result<UserProgress, StorageError>;

  // Generated lessons
  async fn get_user_ai_lessons(&self, user_id: &str) -> Result<Vec<AiLesson>, StorageError>;
  async fn create_ai_lesson(&self, lesson: NewAiLesson) -> Result<AiLesson, StorageError>;

  /// Merge a field mask into the stored learner. `Ok(None)` when the learner is unknown.
  async fn update_user(&self, id: &str, update: LearnerUpdate) -> Result<Option<Learner>, AppError> {
    let Some(current) = self.get_user(id).await? else {
      return Ok(None);
    };
    let next = update.apply(&current)?;
    self.put_user(&next).await?;
    Ok(Some(next))
  }
}

/// Lessons sorted the way the lesson map shows them.
pub(crate) fn sort_lessons(lessons: &mut [Lesson]) {
  lessons.sort_by_key(|l| (l.order, l.id));
}

pub(crate) fn sort_exercises(exercises: &mut [Exercise]) {
  exercises.sort_by_key(|e| e.order);
}

/// Newest first; undated entries last.
pub(crate) fn sort_ai_lessons(lessons: &mut [AiLesson]) {
  lessons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
