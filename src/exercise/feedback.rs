//! Encouraging feedback phrases.

use rand::seq::SliceRandom;
use rand::Rng;

use super::ExerciseKind;

fn hit_phrases(kind: ExerciseKind) -> &'static [&'static str] {
    match kind {
        ExerciseKind::Turtle => &[
            "Great! You spoke slowly and fluently. Keep it up!",
            "Awesome slow speech! The turtle loved that pace!",
            "Perfect control! You're mastering slow speech!",
            "Wonderful! Your slow, steady speech was excellent!",
        ],
        ExerciseKind::Snake => &[
            "Smooth prolongation! The snake loved that!",
            "Excellent sustained sound! Keep that smoothness going!",
            "Beautiful! You held that sound perfectly!",
            "Amazing! That was a really smooth prolongation!",
        ],
        ExerciseKind::Balloon => &[
            "Perfect easy onset! The balloon floated high!",
            "Great breath and gentle start! You've got this!",
            "Wonderful! That was a soft, easy beginning!",
            "Excellent! Your easy onset was spot on!",
        ],
        ExerciseKind::OneTap => &[
            "Fluent one-tap! You nailed it!",
            "Perfect! That was smooth and clear!",
            "Awesome! No bumps in that word!",
            "Great job! That word flowed beautifully!",
        ],
    }
}

fn miss_phrase(kind: ExerciseKind) -> &'static str {
    match kind {
        ExerciseKind::Turtle => "Try to keep it smooth and steady, no rush, no bumps!",
        ExerciseKind::Snake => "Try to make it one smooth sound, like a long slide!",
        ExerciseKind::Balloon => "Remember: gentle breath, then soft and easy!",
        ExerciseKind::OneTap => "Almost there! Let's try to make it even smoother!",
    }
}

/// Pick feedback for an attempt: a random cheer on a hit, the coaching line on a miss.
pub fn select_feedback<R: Rng + ?Sized>(kind: ExerciseKind, is_hit: bool, rng: &mut R) -> &'static str {
    if is_hit {
        hit_phrases(kind)
            .choose(rng)
            .copied()
            .unwrap_or("Great job!")
    } else {
        miss_phrase(kind)
    }
}
