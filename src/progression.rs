//! Progression rules: how a learner's state moves in response to attempts,
//! lesson completion and shop purchases.
//!
//! Everything here is pure. Callers load a snapshot from storage, run one of
//! these functions, and write the returned learner back.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::{Exercise, Learner, Lesson, FIRST_LESSON_ID, MAX_HEARTS};

/// XP granted for every correct exercise answer, independent of the lesson reward.
pub const ATTEMPT_XP_REWARD: u64 = 10;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
  Correct,
  Incorrect,
}

impl Verdict {
  pub fn is_correct(self) -> bool { matches!(self, Verdict::Correct) }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LessonState {
  Locked,
  Unlocked,
  Completed,
}

/// Case-insensitive comparison that only ignores surrounding whitespace.
pub fn answers_match(submitted: &str, expected: &str) -> bool {
  submitted.trim().to_lowercase() == expected.trim().to_lowercase()
}

/// Word-bank answers are the selected words joined by single spaces, in selection order.
pub fn join_word_bank<S: AsRef<str>>(selected: &[S]) -> String {
  selected.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ")
}

/// Grade one attempt. A correct answer earns `ATTEMPT_XP_REWARD`; a wrong one
/// costs a heart, floored at zero. Attempts at zero hearts are still graded.
pub fn evaluate_attempt(exercise: &Exercise, submitted: &str, learner: &Learner) -> (Verdict, Learner) {
  let mut next = learner.clone();
  let verdict = if answers_match(submitted, &exercise.correct_answer) {
    next.xp = learner.xp.saturating_add(ATTEMPT_XP_REWARD);
    Verdict::Correct
  } else {
    next.hearts = learner.hearts.saturating_sub(1);
    Verdict::Incorrect
  };
  debug!(target: "progression", exercise = %exercise.id, learner = %learner.id, ?verdict, hearts = next.hearts, xp = next.xp, "Attempt graded");
  (verdict, next)
}

/// Mark a lesson completed. The set insert is idempotent, but the XP reward and
/// the `currentLessonId` bump apply on every call, repeats included.
pub fn complete_lesson(lesson: &Lesson, learner: &Learner) -> Learner {
  let mut next = learner.clone();
  let first_time = next.completed_lessons.insert(lesson.id);
  next.xp = learner.xp.saturating_add(lesson.xp_reward);
  next.current_lesson_id = lesson.id + 1;
  debug!(target: "progression", lesson = lesson.id, learner = %learner.id, first_time, xp = next.xp, "Lesson completed");
  next
}

/// Lesson 1 is always open; any other lesson opens once the lesson with the
/// immediately preceding id is completed. Unit boundaries play no part.
pub fn unlock_state(lesson: &Lesson, learner: &Learner) -> bool {
  lesson.id == FIRST_LESSON_ID
    || lesson.id.checked_sub(1).is_some_and(|prev| learner.completed_lessons.contains(&prev))
}

pub fn lesson_state(lesson: &Lesson, learner: &Learner) -> LessonState {
  if learner.completed_lessons.contains(&lesson.id) {
    LessonState::Completed
  } else if unlock_state(lesson, learner) {
    LessonState::Unlocked
  } else {
    LessonState::Locked
  }
}

// ---------- Shop ----------

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShopEffect {
  RefillHearts,
  RepairStreak,
  /// Bought and paid for, but nothing on the learner record tracks it yet.
  Untracked,
}

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopItem {
  pub id: &'static str,
  pub name: &'static str,
  pub description: &'static str,
  pub price: u64,
  pub effect: ShopEffect,
}

pub const SHOP_ITEMS: [ShopItem; 4] = [
  ShopItem {
    id: "refill-hearts",
    name: "Refill Hearts",
    description: "Restore all your hearts to full",
    price: 350,
    effect: ShopEffect::RefillHearts,
  },
  ShopItem {
    id: "streak-freeze",
    name: "Streak Freeze",
    description: "Protect your streak for one day if you forget to practice",
    price: 200,
    effect: ShopEffect::Untracked,
  },
  ShopItem {
    id: "double-xp",
    name: "Double XP Boost",
    description: "Earn double XP for the next 5 lessons",
    price: 500,
    effect: ShopEffect::Untracked,
  },
  ShopItem {
    id: "streak-repair",
    name: "Streak Repair",
    description: "Repair your broken streak and get back on track",
    price: 450,
    effect: ShopEffect::RepairStreak,
  },
];

pub fn find_shop_item(id: &str) -> Option<&'static ShopItem> {
  SHOP_ITEMS.iter().find(|item| item.id == id)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PurchaseError {
  #[error("Not enough gems: {item} costs {price}, you have {gems}")]
  InsufficientGems { item: &'static str, price: u64, gems: u64 },
  #[error("Hearts are already full")]
  NotNeeded,
}

/// Spend gems on a shop item and apply its effect.
pub fn purchase(item: &ShopItem, learner: &Learner) -> Result<Learner, PurchaseError> {
  if learner.gems < item.price {
    return Err(PurchaseError::InsufficientGems { item: item.id, price: item.price, gems: learner.gems });
  }
  if item.effect == ShopEffect::RefillHearts && learner.hearts >= MAX_HEARTS {
    return Err(PurchaseError::NotNeeded);
  }

  let mut next = learner.clone();
  next.gems = learner.gems - item.price;
  match item.effect {
    ShopEffect::RefillHearts => next.hearts = MAX_HEARTS,
    ShopEffect::RepairStreak => next.streak = learner.streak.saturating_add(1),
    ShopEffect::Untracked => {}
  }
  debug!(target: "progression", item = item.id, learner = %learner.id, gems = next.gems, "Shop purchase applied");
  Ok(next)
}
