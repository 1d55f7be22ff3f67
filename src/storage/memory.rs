//! In-process backend: one `RwLock`ed map per collection, lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{sort_ai_lessons, sort_exercises, sort_lessons, Storage};
use crate::domain::{
  AiLesson, Exercise, Learner, Lesson, NewAiLesson, NewLearner, NewProgress, UserProgress,
};
use crate::error::StorageError;

#[derive(Default)]
pub struct MemStorage {
  users: RwLock<HashMap<String, Learner>>,
  lessons: RwLock<HashMap<u32, Lesson>>,
  exercises: RwLock<HashMap<String, Exercise>>,
  progress: RwLock<HashMap<String, UserProgress>>,
  ai_lessons: RwLock<HashMap<String, AiLesson>>,
}

impl MemStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Storage for MemStorage {
  fn backend_name(&self) -> &'static str { "memory" }

  async fn get_user(&self, id: &str) -> Result<Option<Learner>, StorageError> {
    Ok(self.users.read().await.get(id).cloned())
  }

  async fn get_user_by_username(&self, username: &str) -> Result<Option<Learner>, StorageError> {
    Ok(self.users.read().await.values().find(|u| u.username == username).cloned())
  }

  #[instrument(level = "debug", skip(self, new), fields(username = %new.username))]
  async fn create_user(&self, new: NewLearner) -> Result<Learner, StorageError> {
    let learner = Learner::new(Uuid::new_v4().to_string(), new.username, new.email);
    self.users.write().await.insert(learner.id.clone(), learner.clone());
    debug!(target: "storage", id = %learner.id, "Learner created (memory)");
    Ok(learner)
  }

  async fn put_user(&self, learner: &Learner) -> Result<(), StorageError> {
    self.users.write().await.insert(learner.id.clone(), learner.clone());
    Ok(())
  }

  async fn get_all_lessons(&self) -> Result<Vec<Lesson>, StorageError> {
    let mut lessons: Vec<Lesson> = self.lessons.read().await.values().cloned().collect();
    sort_lessons(&mut lessons);
    Ok(lessons)
  }

  async fn get_lesson(&self, id: u32) -> Result<Option<Lesson>, StorageError> {
    Ok(self.lessons.read().await.get(&id).cloned())
  }

  async fn get_lessons_by_unit(&self, unit: u32) -> Result<Vec<Lesson>, StorageError> {
    let mut lessons: Vec<Lesson> = self
      .lessons
      .read()
      .await
      .values()
      .filter(|l| l.unit == unit)
      .cloned()
      .collect();
    sort_lessons(&mut lessons);
    Ok(lessons)
  }

  async fn create_lesson(&self, lesson: Lesson) -> Result<Lesson, StorageError> {
    self.lessons.write().await.insert(lesson.id, lesson.clone());
    Ok(lesson)
  }

  async fn get_exercises_by_lesson_id(&self, lesson_id: u32) -> Result<Vec<Exercise>, StorageError> {
    let mut exercises: Vec<Exercise> = self
      .exercises
      .read()
      .await
      .values()
      .filter(|e| e.lesson_id == lesson_id)
      .cloned()
      .collect();
    sort_exercises(&mut exercises);
    Ok(exercises)
  }

  async fn get_exercise(&self, id: &str) -> Result<Option<Exercise>, StorageError> {
    Ok(self.exercises.read().await.get(id).cloned())
  }

  async fn create_exercise(&self, exercise: Exercise) -> Result<Exercise, StorageError> {
    self.exercises.write().await.insert(exercise.id.clone(), exercise.clone());
    Ok(exercise)
  }

  async fn get_user_progress(&self, user_id: &str, lesson_id: u32) -> Result<Vec<UserProgress>, StorageError> {
    Ok(self
      .progress
      .read()
      .await
      .values()
      .filter(|p| p.user_id.as_deref() == Some(user_id) && p.lesson_id == Some(lesson_id))
      .cloned()
      .collect())
  }

  async fn update_progress(&self, progress: NewProgress) -> Result<UserProgress, StorageError> {
    let record = progress.into_record(Uuid::new_v4().to_string());
    self.progress.write().await.insert(record.id.clone(), record.clone());
    Ok(record)
  }

  async fn get_user_ai_lessons(&self, user_id: &str) -> Result<Vec<AiLesson>, StorageError> {
    let mut lessons: Vec<AiLesson> = self
      .ai_lessons
      .read()
      .await
      .values()
      .filter(|l| l.user_id.as_deref() == Some(user_id))
      .cloned()
      .collect();
    sort_ai_lessons(&mut lessons);
    Ok(lessons)
  }

  async fn create_ai_lesson(&self, lesson: NewAiLesson) -> Result<AiLesson, StorageError> {
    let record = AiLesson {
      id: Uuid::new_v4().to_string(),
      user_id: lesson.user_id,
      title: lesson.title,
      content: lesson.content,
      difficulty: lesson.difficulty,
      created_at: Some(Utc::now()),
    };
    self.ai_lessons.write().await.insert(record.id.clone(), record.clone());
    Ok(record)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::LearnerUpdate;
  use crate::seeds::{base_exercises, base_lessons, default_learner};
  use serde_json::json;

  async fn seeded() -> MemStorage {
    let store = MemStorage::new();
    for l in base_lessons() {
      store.create_lesson(l).await.unwrap();
    }
    for e in base_exercises() {
      store.create_exercise(e).await.unwrap();
    }
    store.put_user(&default_learner()).await.unwrap();
    store
  }

  #[tokio::test]
  async fn lessons_come_back_in_order_and_by_unit() {
    let store = seeded().await;
    let all = store.get_all_lessons().await.unwrap();
    assert_eq!(all.first().map(|l| l.id), Some(1));
    assert_eq!(all.last().map(|l| l.id), Some(50));
    let unit2 = store.get_lessons_by_unit(2).await.unwrap();
    assert_eq!(unit2.iter().map(|l| l.id).collect::<Vec<_>>(), (11..=20).collect::<Vec<_>>());
  }

  #[tokio::test]
  async fn exercises_are_filtered_and_ordered() {
    let store = seeded().await;
    let ex = store.get_exercises_by_lesson_id(1).await.unwrap();
    assert_eq!(ex.iter().map(|e| e.order).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    assert!(store.get_exercises_by_lesson_id(3).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn update_user_merges_and_persists() {
    let store = seeded().await;
    let mask: LearnerUpdate = serde_json::from_value(json!({ "hearts": 5, "gems": 150 })).unwrap();
    let updated = store.update_user("default-user", mask).await.unwrap().unwrap();
    assert_eq!((updated.hearts, updated.gems, updated.xp), (5, 150, 1250));
    let stored = store.get_user("default-user").await.unwrap().unwrap();
    assert_eq!(stored, updated);
  }

  #[tokio::test]
  async fn update_unknown_user_is_none() {
    let store = seeded().await;
    let res = store.update_user("nobody", LearnerUpdate::default()).await.unwrap();
    assert!(res.is_none());
  }

  #[tokio::test]
  async fn created_users_start_from_defaults() {
    let store = MemStorage::new();
    let u = store
      .create_user(NewLearner { username: "mia".into(), email: "mia@example.com".into() })
      .await
      .unwrap();
    assert_eq!((u.hearts, u.xp, u.gems, u.current_lesson_id), (5, 0, 500, 1));
    let found = store.get_user_by_username("mia").await.unwrap();
    assert_eq!(found.map(|f| f.id), Some(u.id));
  }

  #[tokio::test]
  async fn progress_is_scoped_to_user_and_lesson() {
    let store = MemStorage::new();
    let mk = |user: &str, lesson: u32, done: bool| NewProgress {
      user_id: Some(user.into()),
      lesson_id: Some(lesson),
      exercise_id: None,
      is_completed: done,
      attempts: 2,
      correct_attempts: 1,
    };
    store.update_progress(mk("a", 1, true)).await.unwrap();
    store.update_progress(mk("a", 2, false)).await.unwrap();
    store.update_progress(mk("b", 1, false)).await.unwrap();
    let a1 = store.get_user_progress("a", 1).await.unwrap();
    assert_eq!(a1.len(), 1);
    assert!(a1[0].completed_at.is_some());
  }
}
