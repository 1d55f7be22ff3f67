//! Built-in content: the base lesson catalog, the hand-written exercises, and
//! the default learner that makes the app usable on first start.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::domain::{Exercise, ExerciseKind, Learner, Lesson, LessonKind};

pub const DEFAULT_LEARNER_ID: &str = "default-user";

/// (title, description) per lesson, grouped by unit; ids and order run 1..=50.
const UNITS: [(u64, [(&str, &str); 10]); 5] = [
  // Unit 1: Form basic sentences
  (10, [
    ("Greetings", "Learn basic Croatian greetings"),
    ("Family", "Family members and relationships"),
    ("Food", "Basic food vocabulary"),
    ("Animals", "Common animals"),
    ("Colors", "Basic colors"),
    ("Numbers", "Numbers 1-20"),
    ("Days & Time", "Days of the week and time"),
    ("Weather", "Weather expressions"),
    ("House", "Parts of the house"),
    ("Body Parts", "Basic body vocabulary"),
  ]),
  // Unit 2: Navigate familiar places
  (15, [
    ("Directions", "Basic directions and locations"),
    ("City Places", "Places in the city"),
    ("Transportation", "Ways to travel"),
    ("Shopping", "Shopping vocabulary"),
    ("Restaurant", "Ordering food"),
    ("Hotel", "Hotel situations"),
    ("Post Office", "Postal services"),
    ("Bank", "Banking basics"),
    ("Hospital", "Medical situations"),
    ("School", "School vocabulary"),
  ]),
  // Unit 3: Express yourself
  (20, [
    ("Emotions", "Expressing feelings"),
    ("Hobbies", "Talking about interests"),
    ("Sports", "Sports and activities"),
    ("Music", "Musical terms"),
    ("Art", "Artistic expressions"),
    ("Clothes", "Clothing vocabulary"),
    ("Technology", "Modern technology"),
    ("Nature", "Natural world"),
    ("Seasons", "Seasons and months"),
    ("Holidays", "Croatian holidays"),
  ]),
  // Unit 4: Past and future
  (25, [
    ("Past Tense", "Talking about the past"),
    ("Future Plans", "Discussing future"),
    ("Childhood", "Childhood memories"),
    ("Travel", "Travel experiences"),
    ("Work", "Jobs and careers"),
    ("Goals", "Dreams and ambitions"),
    ("History", "Croatian history"),
    ("Traditions", "Cultural traditions"),
    ("Celebrations", "Special occasions"),
    ("Stories", "Telling stories"),
  ]),
  // Unit 5: Advanced topics
  (30, [
    ("Business", "Business Croatian"),
    ("Politics", "Political discussions"),
    ("Environment", "Environmental topics"),
    ("Science", "Scientific terms"),
    ("Philosophy", "Abstract concepts"),
    ("Literature", "Croatian literature"),
    ("Media", "News and media"),
    ("Internet", "Digital communication"),
    ("Debate", "Expressing opinions"),
    ("Mastery", "Advanced conversation"),
  ]),
];

/// The final lesson pays more than the rest of its unit.
const MASTERY_XP_REWARD: u64 = 50;

pub fn base_lessons() -> Vec<Lesson> {
  let mut lessons = Vec::with_capacity(50);
  for (unit_idx, (xp_reward, entries)) in UNITS.iter().enumerate() {
    for (title, description) in entries {
      let id = lessons.len() as u32 + 1;
      lessons.push(Lesson {
        id,
        title: (*title).into(),
        description: Some((*description).into()),
        unit: unit_idx as u32 + 1,
        order: id,
        is_locked: id > 2,
        xp_reward: if id == 50 { MASTERY_XP_REWARD } else { *xp_reward },
        kind: LessonKind::Base,
      });
    }
  }
  lessons
}

/// Hand-written exercises. Ids are stable so re-seeding a persistent store overwrites
/// instead of duplicating.
pub fn base_exercises() -> Vec<Exercise> {
  vec![
    // Lesson 1: Greetings
    ex(1, 1, ExerciseKind::Translation, "Translate this Croatian greeting to English",
       Some("Dobro jutro"), Some("Good morning"), None, "good morning",
       &["Think about the time of day", "This is a common morning greeting"]),
    ex(1, 2, ExerciseKind::MultipleChoice, "How do you say 'Hello' in Croatian?",
       None, Some("Hello"), Some(&["Bok", "Zbogom", "Molim", "Hvala"]), "Bok",
       &["It's a casual greeting", "Starts with 'B'"]),
    ex(1, 3, ExerciseKind::Speaking, "Say 'Good evening' in Croatian",
       Some("Dobra večer"), Some("Good evening"), None, "dobra večer",
       &["Remember Croatian pronunciation", "Evening = večer"]),
    ex(1, 4, ExerciseKind::WordBank, "Arrange these words to say 'How are you?' in Croatian",
       Some("Kako ste?"), Some("How are you?"), Some(&["Kako", "ste", "?", "dobro"]), "Kako ste?",
       &["Start with 'Kako'", "Formal version uses 'ste'"]),
    ex(1, 5, ExerciseKind::Translation, "Translate 'Thank you' to Croatian",
       Some("Hvala"), Some("Thank you"), None, "hvala",
       &["Starts with 'Hv'", "Very common word"]),
    // Lesson 2: Family
    ex(2, 1, ExerciseKind::Translation, "Translate 'My family' to Croatian",
       Some("Moja obitelj"), Some("My family"), None, "moja obitelj",
       &["Moja = my (feminine)", "Family = obitelj"]),
    ex(2, 2, ExerciseKind::MultipleChoice, "What is 'mother' in Croatian?",
       None, Some("mother"), Some(&["majka", "otac", "sestra", "brat"]), "majka",
       &["Sounds similar to 'mama'", "Starts with 'maj'"]),
    ex(2, 3, ExerciseKind::Speaking, "Say 'I have a brother' in Croatian",
       Some("Imam brata"), Some("I have a brother"), None, "imam brata",
       &["Imam = I have", "Brother = brat (but changes to 'brata')"]),
    ex(2, 4, ExerciseKind::Translation, "Translate this Croatian sentence",
       Some("Moj otac radi"), Some("My father works"), None, "my father works",
       &["Moj = my (masculine)", "otac = father", "radi = works"]),
  ]
}

pub fn exercise_id(lesson_id: u32, order: u32) -> String {
  format!("lesson-{lesson_id}-ex-{order}")
}

#[allow(clippy::too_many_arguments)]
fn ex(
  lesson_id: u32,
  order: u32,
  kind: ExerciseKind,
  question: &str,
  croatian: Option<&str>,
  english: Option<&str>,
  options: Option<&[&str]>,
  correct: &str,
  hints: &[&str],
) -> Exercise {
  Exercise {
    id: exercise_id(lesson_id, order),
    lesson_id,
    kind,
    question: question.into(),
    croatian_text: croatian.map(Into::into),
    english_text: english.map(Into::into),
    audio_url: None,
    options: options.map(|o| o.iter().map(|s| s.to_string()).collect()),
    correct_answer: correct.into(),
    hints: Some(hints.iter().map(|s| s.to_string()).collect()),
    order,
  }
}

/// The learner every fresh install starts with: one lesson done, one heart spent.
pub fn default_learner() -> Learner {
  Learner {
    id: DEFAULT_LEARNER_ID.into(),
    username: "learner".into(),
    email: "learner@example.com".into(),
    hearts: 4,
    xp: 1250,
    streak: 7,
    gems: 500,
    last_activity_date: Some(Utc::now().to_rfc3339()),
    current_lesson_id: 2,
    completed_lessons: BTreeSet::from([1]),
    achievements: BTreeSet::from(["first_lesson".to_string()]),
    created_at: Some(Utc::now()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn catalog_has_fifty_sequential_lessons() {
    let lessons = base_lessons();
    assert_eq!(lessons.len(), 50);
    for (i, l) in lessons.iter().enumerate() {
      assert_eq!(l.id as usize, i + 1);
      assert_eq!(l.order, l.id);
      assert!(l.xp_reward > 0);
    }
    assert_eq!(lessons[10].unit, 2);
    assert_eq!(lessons[10].xp_reward, 15);
    assert_eq!(lessons[49].xp_reward, MASTERY_XP_REWARD);
    assert!(!lessons[1].is_locked && lessons[2].is_locked);
  }

  #[test]
  fn exercises_have_unique_ids_and_answers() {
    let exercises = base_exercises();
    let ids: BTreeSet<_> = exercises.iter().map(|e| e.id.clone()).collect();
    assert_eq!(ids.len(), exercises.len());
    assert!(exercises.iter().all(|e| !e.correct_answer.trim().is_empty()));
  }
}
