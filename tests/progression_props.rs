//! Property tests for the progression rules.
//!
//! Invariants covered:
//! - Hearts stay within 0..=5 and never go below zero on wrong answers
//! - XP never decreases across attempts and completions
//! - Completed lessons only grow; lesson 1 is always unlocked
//! - A lesson other than 1 is unlocked iff its predecessor is completed
//! - Answer matching ignores case and surrounding whitespace only

use std::collections::BTreeSet;

use proptest::prelude::*;

use lingo_backend::domain::{Exercise, ExerciseKind, Learner, Lesson, LessonKind, MAX_HEARTS};
use lingo_backend::progression::{
    answers_match, complete_lesson, evaluate_attempt, lesson_state, purchase, unlock_state, LessonState,
    ATTEMPT_XP_REWARD, SHOP_ITEMS,
};
use lingo_backend::seeds::base_lessons;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_learner() -> impl Strategy<Value = Learner> {
    (
        0u8..=MAX_HEARTS,                                      // hearts
        0u64..100_000,                                         // xp
        0u32..400,                                             // streak
        0u64..2_000,                                           // gems
        proptest::collection::btree_set(1u32..=50, 0..20),     // completed
    )
        .prop_map(|(hearts, xp, streak, gems, completed)| {
            let mut learner = Learner::new("prop-user", "prop", "prop@example.com");
            learner.hearts = hearts;
            learner.xp = xp;
            learner.streak = streak;
            learner.gems = gems;
            learner.completed_lessons = completed;
            learner
        })
}

fn arb_lesson() -> impl Strategy<Value = Lesson> {
    (1u32..=50, 0u64..100).prop_map(|(id, xp_reward)| Lesson {
        id,
        title: format!("Lesson {id}"),
        description: None,
        unit: (id - 1) / 10 + 1,
        order: id,
        is_locked: id > 2,
        xp_reward,
        kind: LessonKind::Base,
    })
}

fn exercise(answer: &str) -> Exercise {
    Exercise {
        id: "prop-ex".into(),
        lesson_id: 1,
        kind: ExerciseKind::Translation,
        question: "Translate".into(),
        croatian_text: None,
        english_text: None,
        audio_url: None,
        options: None,
        correct_answer: answer.into(),
        hints: None,
        order: 1,
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn attempts_keep_hearts_in_range(learner in arb_learner(), answers in proptest::collection::vec("[a-z]{1,6}", 1..20)) {
        let ex = exercise("bok");
        let mut current = learner;
        for answer in &answers {
            let before = current.clone();
            let (verdict, next) = evaluate_attempt(&ex, answer, &current);
            prop_assert!(next.hearts <= MAX_HEARTS);
            prop_assert!(next.xp >= before.xp);
            if verdict.is_correct() {
                prop_assert_eq!(next.xp, before.xp + ATTEMPT_XP_REWARD);
                prop_assert_eq!(next.hearts, before.hearts);
            } else {
                prop_assert_eq!(next.hearts, before.hearts.saturating_sub(1));
                prop_assert_eq!(next.xp, before.xp);
            }
            current = next;
        }
    }

    #[test]
    fn completion_grows_set_and_xp(learner in arb_learner(), lesson in arb_lesson()) {
        let next = complete_lesson(&lesson, &learner);
        prop_assert!(next.completed_lessons.is_superset(&learner.completed_lessons));
        prop_assert!(next.completed_lessons.contains(&lesson.id));
        prop_assert_eq!(next.xp, learner.xp + lesson.xp_reward);
        prop_assert_eq!(next.current_lesson_id, lesson.id + 1);
        prop_assert_eq!(next.hearts, learner.hearts);
        prop_assert_eq!(next.gems, learner.gems);
    }

    #[test]
    fn unlock_follows_predecessor(learner in arb_learner(), lesson in arb_lesson()) {
        let unlocked = unlock_state(&lesson, &learner);
        if lesson.id == 1 {
            prop_assert!(unlocked);
        } else {
            prop_assert_eq!(unlocked, learner.completed_lessons.contains(&(lesson.id - 1)));
        }
        if learner.completed_lessons.contains(&lesson.id) {
            prop_assert_eq!(lesson_state(&lesson, &learner), LessonState::Completed);
        }
    }

    #[test]
    fn matching_ignores_case_and_padding(word in "[a-zA-Z]{1,12}", left in " {0,3}", right in " {0,3}") {
        let padded = format!("{left}{}{right}", word.to_uppercase());
        prop_assert!(answers_match(&padded, &word));
        let inner = format!("{}x{}", &word[..1], &word[1..]);
        prop_assert!(!answers_match(&inner, &word));
    }

    #[test]
    fn purchases_never_overdraw(learner in arb_learner(), idx in 0usize..SHOP_ITEMS.len()) {
        let item = &SHOP_ITEMS[idx];
        match purchase(item, &learner) {
            Ok(next) => {
                prop_assert_eq!(next.gems, learner.gems - item.price);
                prop_assert!(next.hearts <= MAX_HEARTS);
            }
            Err(_) => prop_assert!(learner.gems < item.price || learner.hearts == MAX_HEARTS),
        }
    }
}

#[test]
fn completing_catalog_in_order_unlocks_everything() {
    let lessons = base_lessons();
    let mut learner = Learner::new("walker", "walker", "walker@example.com");
    for lesson in &lessons {
        assert!(unlock_state(lesson, &learner), "lesson {} should be open", lesson.id);
        learner = complete_lesson(lesson, &learner);
    }
    let expected: BTreeSet<u32> = (1..=50).collect();
    assert_eq!(learner.completed_lessons, expected);
    assert_eq!(learner.current_lesson_id, 51);
}
