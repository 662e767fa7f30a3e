use serde::{Deserialize, Serialize};
use std::fmt;

use crate::position::Color;

/// Centipawn ceiling of the evaluation bar. Mate scores saturate here.
pub const EVAL_BAR_LIMIT: i32 = 1000;

/// Engine score, relative to the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Score {
    #[serde(rename = "cp")]
    Centipawns(i32),
    /// Moves to mate; negative when the side to move is getting mated, 0 when
    /// it already is.
    Mate(i32),
}

impl Score {
    /// Centipawns clamped to the bar range; mates pin to the limit.
    pub fn clamped_cp(self) -> i32 {
        match self {
            Score::Centipawns(cp) => cp.clamp(-EVAL_BAR_LIMIT, EVAL_BAR_LIMIT),
            Score::Mate(n) if n > 0 => EVAL_BAR_LIMIT,
            Score::Mate(_) => -EVAL_BAR_LIMIT,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Centipawns(cp) => write!(f, "{:+.2}", *cp as f64 / 100.0),
            Score::Mate(n) => write!(f, "#{n}"),
        }
    }
}

/// Display model for the vertical evaluation bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalBar {
    /// Clamped score from the user's point of view.
    pub centipawns: i32,
    /// Share of the bar filled in the user's favour, 0.0..=1.0.
    pub fill: f64,
    /// `"0.35"`, `"-1.20"`, or `"M"` / `"-M"` once the bar is pinned.
    pub label: String,
}

impl EvalBar {
    pub fn new(score: Score, side_to_move: Color, viewer: Color) -> Self {
        // Clamp before flipping: `Mate(0)` has no sign of its own.
        let cp = score.clamped_cp();
        let centipawns = if side_to_move == viewer { cp } else { -cp };
        let fill = (centipawns + EVAL_BAR_LIMIT) as f64 / (2 * EVAL_BAR_LIMIT) as f64;
        let label = if centipawns.abs() < EVAL_BAR_LIMIT {
            format!("{:.2}", centipawns as f64 / 100.0)
        } else if centipawns > 0 {
            "M".to_string()
        } else {
            "-M".to_string()
        };
        Self {
            centipawns,
            fill,
            label,
        }
    }
}
