//! Application state: the selected storage backend, prompts, and the optional OpenAI client.
//!
//! Built once in `main` and shared with every handler as `Arc<AppState>`.
//! Startup seeding writes the base catalog and makes sure the default learner exists.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{AppConfig, BackendKind, Prompts};
use crate::error::StorageError;
use crate::openai::OpenAI;
use crate::seeds::{base_exercises, base_lessons, default_learner, DEFAULT_LEARNER_ID};
use crate::storage::{FirestoreStorage, MemStorage, Storage};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub openai: Option<OpenAI>,
    pub prompts: Prompts,
}

impl AppState {
    /// Build state from config + env: pick the storage backend and init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn from_config(cfg: &AppConfig) -> Result<Self, StorageError> {
        let storage: Arc<dyn Storage> = match cfg.storage.backend {
            BackendKind::Memory => Arc::new(MemStorage::new()),
            BackendKind::Firestore => {
                let fs_cfg = cfg.storage.firestore.clone().unwrap_or_default();
                let store = FirestoreStorage::new(&fs_cfg)?;
                info!(target: "lingo_backend", project = %fs_cfg.project_id, emulator = ?fs_cfg.emulator_host, "Firestore storage selected");
                Arc::new(store)
            }
        };

        let openai = OpenAI::from_env();
        if let Some(oa) = &openai {
            info!(target: "lingo_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
        } else {
            info!(target: "lingo_backend", "OpenAI disabled (no OPENAI_API_KEY). AI lessons and pronunciation checks will fail; hints fall back to a fixed text.");
        }

        Ok(Self::new(storage, openai, cfg.prompts.clone()))
    }

    pub fn new(storage: Arc<dyn Storage>, openai: Option<OpenAI>, prompts: Prompts) -> Self {
        Self { storage, openai, prompts }
    }

    /// Write the base catalog and create the default learner if it is missing.
    /// Safe to run on every start: lesson and exercise ids are stable.
    #[instrument(level = "info", skip(self), fields(backend = self.storage.backend_name()))]
    pub async fn seed(&self) -> Result<(), StorageError> {
        let lessons = base_lessons();
        let exercises = base_exercises();
        let (lesson_count, exercise_count) = (lessons.len(), exercises.len());

        for lesson in lessons {
            self.storage.create_lesson(lesson).await?;
        }
        for exercise in exercises {
            self.storage.create_exercise(exercise).await?;
        }

        let created_default = if self.storage.get_user(DEFAULT_LEARNER_ID).await?.is_none() {
            self.storage.put_user(&default_learner()).await?;
            true
        } else {
            false
        };

        info!(target: "lingo_backend", lessons = lesson_count, exercises = exercise_count, created_default, "Startup catalog seeded");
        Ok(())
    }
}
