use board_watch_common::config::AcceptancePolicy;
use board_watch_common::position::{detect_mover, Color, MoverDetection, PositionRecord};
use tracing::{debug, info};

use crate::control::Settings;
use crate::rules::PositionValidator;

enum TrackerState {
    /// No board has been observed yet.
    Initial,
    /// The placement seen on the previous observation.
    Tracking { baseline: String },
}

/// What the loop should do with one classified board.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// First observation; recorded as the baseline only.
    Baseline,
    /// No mover could be inferred from the layout diff.
    NoMover(MoverDetection),
    /// A move was detected but the opponent is to move.
    OpponentTurn(PositionRecord),
    /// The assembled FEN failed validation.
    Invalid(String),
    /// Same FEN as the last accepted one.
    Unchanged(String),
    /// A new position to evaluate. Already committed as last accepted.
    Evaluate(PositionRecord),
}

/// Decides when a new board has appeared and whose turn it is.
///
/// The baseline placement is adopted on every observation; the last accepted
/// FEN only changes when a validated, different position is produced.
pub struct BoardTracker {
    state: TrackerState,
    last_accepted: Option<String>,
}

impl Default for BoardTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardTracker {
    pub fn new() -> Self {
        Self {
            state: TrackerState::Initial,
            last_accepted: None,
        }
    }

    pub fn baseline(&self) -> Option<&str> {
        match &self.state {
            TrackerState::Initial => None,
            TrackerState::Tracking { baseline } => Some(baseline),
        }
    }

    pub fn last_accepted(&self) -> Option<&str> {
        self.last_accepted.as_deref()
    }

    /// Feed one raw classifier result.
    pub fn observe(
        &mut self,
        raw: &str,
        settings: &Settings,
        validator: &dyn PositionValidator,
    ) -> Decision {
        let record = PositionRecord::from_raw(raw);
        let next = TrackerState::Tracking {
            baseline: record.placement.clone(),
        };
        let previous = match std::mem::replace(&mut self.state, next) {
            TrackerState::Initial => {
                info!(placement = record.placement, "first board observed, waiting for a move");
                if settings.policy == AcceptancePolicy::Classifier {
                    self.seed(record, settings, validator);
                }
                return Decision::Baseline;
            }
            TrackerState::Tracking { baseline } => baseline,
        };

        let record = match settings.policy {
            AcceptancePolicy::Diff => {
                let detection = detect_mover(&previous, &record.placement);
                let Some(mover) = detection.mover() else {
                    debug!(?detection, "no mover detected");
                    return Decision::NoMover(detection);
                };
                let record = record.with_side_to_move(mover.opposite());
                if settings.skip_opponent_turn && mover == settings.my_color {
                    debug!(%mover, "skipping opponent's turn");
                    return Decision::OpponentTurn(record);
                }
                record
            }
            AcceptancePolicy::Classifier => classified(record, settings),
        };

        self.accept(record, validator)
    }

    /// The first full position is remembered without being evaluated, so
    /// only a later, different position is analysed.
    fn seed(
        &mut self,
        record: PositionRecord,
        settings: &Settings,
        validator: &dyn PositionValidator,
    ) {
        let fen = classified(record, settings).fen();
        if validator.is_valid(&fen) {
            debug!(fen, "first position remembered");
            self.last_accepted = Some(fen);
        }
    }

    fn accept(&mut self, record: PositionRecord, validator: &dyn PositionValidator) -> Decision {
        let fen = record.fen();
        if !validator.is_valid(&fen) {
            debug!(fen, "invalid position");
            return Decision::Invalid(fen);
        }
        if self.last_accepted.as_deref() == Some(fen.as_str()) {
            return Decision::Unchanged(fen);
        }
        info!(fen, "new position accepted");
        self.last_accepted = Some(fen);
        Decision::Evaluate(record)
    }
}

/// Side to move as reported by the classifier, else the user's colour.
fn classified(record: PositionRecord, settings: &Settings) -> PositionRecord {
    let side: Color = record.side_to_move.unwrap_or(settings.my_color);
    record.with_side_to_move(side)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ShakmatyValidator;

    struct AcceptAll;

    impl PositionValidator for AcceptAll {
        fn is_valid(&self, _fen: &str) -> bool {
            true
        }
    }

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";
    const E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR";
    const E4_E5: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR";

    fn settings(policy: AcceptancePolicy) -> Settings {
        Settings {
            my_color: Color::White,
            depth: 15,
            cooldown_secs: 0.0,
            policy,
            skip_opponent_turn: false,
        }
    }

    fn diff() -> Settings {
        settings(AcceptancePolicy::Diff)
    }

    #[test]
    fn first_observation_is_only_a_baseline() {
        let mut tracker = BoardTracker::new();
        let decision = tracker.observe(&format!("{E4} b"), &diff(), &AcceptAll);
        assert_eq!(decision, Decision::Baseline);
        assert_eq!(tracker.baseline(), Some(E4));
        assert_eq!(tracker.last_accepted(), None);
    }

    #[test]
    fn first_observation_is_a_baseline_under_both_policies() {
        for policy in [AcceptancePolicy::Diff, AcceptancePolicy::Classifier] {
            let mut tracker = BoardTracker::new();
            assert_eq!(
                tracker.observe(START, &settings(policy), &AcceptAll),
                Decision::Baseline
            );
        }
    }

    #[test]
    fn white_move_gives_black_to_move() {
        let mut tracker = BoardTracker::new();
        tracker.observe(START, &diff(), &ShakmatyValidator);
        let decision = tracker.observe(E4, &diff(), &ShakmatyValidator);
        let Decision::Evaluate(record) = decision else {
            panic!("expected evaluation, got {decision:?}");
        };
        assert_eq!(record.side_to_move, Some(Color::Black));
        assert_eq!(record.fen(), format!("{E4} b - - 0 1"));
        assert_eq!(tracker.last_accepted(), Some(format!("{E4} b - - 0 1").as_str()));
    }

    #[test]
    fn added_uppercase_piece_on_empty_board() {
        let mut tracker = BoardTracker::new();
        tracker.observe("8/8/8/8/8/8/8/8", &diff(), &AcceptAll);
        let decision = tracker.observe("8/8/8/8/8/8/8/4K3", &diff(), &AcceptAll);
        let Decision::Evaluate(record) = decision else {
            panic!("expected evaluation, got {decision:?}");
        };
        assert_eq!(record.side_to_move, Some(Color::Black));
    }

    #[test]
    fn classifier_side_is_ignored_by_diff_policy() {
        let mut tracker = BoardTracker::new();
        tracker.observe(&format!("{E4} b"), &diff(), &AcceptAll);
        let decision = tracker.observe(&format!("{E4_E5} b"), &diff(), &AcceptAll);
        let Decision::Evaluate(record) = decision else {
            panic!("expected evaluation, got {decision:?}");
        };
        assert_eq!(record.side_to_move, Some(Color::White));
    }

    #[test]
    fn identical_layout_detects_no_mover_and_keeps_baseline() {
        let mut tracker = BoardTracker::new();
        tracker.observe(START, &diff(), &AcceptAll);
        assert_eq!(
            tracker.observe(START, &diff(), &AcceptAll),
            Decision::NoMover(MoverDetection::Unchanged)
        );
        assert_eq!(tracker.baseline(), Some(START));
    }

    #[test]
    fn malformed_layout_is_skipped_but_adopted() {
        let mut tracker = BoardTracker::new();
        tracker.observe(START, &diff(), &AcceptAll);
        let seven_rows = "8/8/8/8/8/8/8";
        let decision = tracker.observe(seven_rows, &diff(), &AcceptAll);
        assert!(matches!(
            decision,
            Decision::NoMover(MoverDetection::Malformed(_))
        ));
        assert_eq!(tracker.baseline(), Some(seven_rows));
        assert_eq!(tracker.last_accepted(), None);
    }

    #[test]
    fn empty_classifier_output_does_not_panic() {
        let mut tracker = BoardTracker::new();
        tracker.observe("", &diff(), &ShakmatyValidator);
        assert!(matches!(
            tracker.observe("", &diff(), &ShakmatyValidator),
            Decision::NoMover(MoverDetection::Malformed(_))
        ));
        assert!(matches!(
            tracker.observe(START, &diff(), &ShakmatyValidator),
            Decision::NoMover(MoverDetection::Malformed(_))
        ));
    }

    #[test]
    fn invalid_position_is_not_accepted_but_baseline_moves() {
        let mut tracker = BoardTracker::new();
        tracker.observe("8/8/8/8/8/8/8/8", &diff(), &ShakmatyValidator);
        let decision = tracker.observe("8/8/8/8/8/8/8/4K3", &diff(), &ShakmatyValidator);
        assert_eq!(decision, Decision::Invalid("8/8/8/8/8/8/8/4K3 b - - 0 1".into()));
        assert_eq!(tracker.baseline(), Some("8/8/8/8/8/8/8/4K3"));
        assert_eq!(tracker.last_accepted(), None);
    }

    #[test]
    fn same_position_is_evaluated_once() {
        let mut tracker = BoardTracker::new();
        tracker.observe(START, &diff(), &ShakmatyValidator);
        assert!(matches!(
            tracker.observe(E4, &diff(), &ShakmatyValidator),
            Decision::Evaluate(_)
        ));

        // A frame misread without the white king, then the real board again.
        let misread = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQ1BNR";
        assert!(matches!(
            tracker.observe(misread, &diff(), &ShakmatyValidator),
            Decision::Invalid(_)
        ));
        assert_eq!(
            tracker.observe(E4, &diff(), &ShakmatyValidator),
            Decision::Unchanged(format!("{E4} b - - 0 1"))
        );
    }

    #[test]
    fn repeated_fen_is_suppressed_under_classifier_policy() {
        let classifier = settings(AcceptancePolicy::Classifier);
        let mut tracker = BoardTracker::new();
        tracker.observe(&format!("{START} w"), &classifier, &ShakmatyValidator);

        let first = tracker.observe(&format!("{E4} b"), &classifier, &ShakmatyValidator);
        assert!(matches!(first, Decision::Evaluate(_)));
        let second = tracker.observe(&format!("{E4} b"), &classifier, &ShakmatyValidator);
        assert_eq!(second, Decision::Unchanged(format!("{E4} b - - 0 1")));
    }

    #[test]
    fn classifier_policy_defaults_side_to_my_color() {
        let mut black = settings(AcceptancePolicy::Classifier);
        black.my_color = Color::Black;
        let mut tracker = BoardTracker::new();
        tracker.observe(START, &black, &AcceptAll);
        let Decision::Evaluate(record) = tracker.observe(E4, &black, &AcceptAll) else {
            panic!("expected evaluation");
        };
        assert_eq!(record.side_to_move, Some(Color::Black));
    }

    #[test]
    fn opponent_turn_is_skipped_when_enabled() {
        let mut me_white = diff();
        me_white.skip_opponent_turn = true;
        let mut tracker = BoardTracker::new();
        tracker.observe(START, &me_white, &AcceptAll);

        // White (me) moved: Black to move, skipped.
        let decision = tracker.observe(E4, &me_white, &AcceptAll);
        let Decision::OpponentTurn(record) = decision else {
            panic!("expected opponent turn, got {decision:?}");
        };
        assert_eq!(record.side_to_move, Some(Color::Black));
        assert_eq!(tracker.last_accepted(), None);

        // Black moved: my turn, evaluated.
        assert!(matches!(
            tracker.observe(E4_E5, &me_white, &AcceptAll),
            Decision::Evaluate(_)
        ));
    }

    #[test]
    fn classifier_policy_does_not_reanalyse_the_first_board() {
        let classifier = settings(AcceptancePolicy::Classifier);
        let mut tracker = BoardTracker::new();
        let start = format!("{START} w");
        assert_eq!(
            tracker.observe(&start, &classifier, &ShakmatyValidator),
            Decision::Baseline
        );
        assert_eq!(tracker.last_accepted(), Some(format!("{START} w - - 0 1").as_str()));
        assert_eq!(
            tracker.observe(&start, &classifier, &ShakmatyValidator),
            Decision::Unchanged(format!("{START} w - - 0 1"))
        );
    }

    #[test]
    fn invalid_first_board_is_not_remembered() {
        let classifier = settings(AcceptancePolicy::Classifier);
        let mut tracker = BoardTracker::new();
        tracker.observe("8/8/8/8/8/8/8/4K3 w", &classifier, &ShakmatyValidator);
        assert_eq!(tracker.last_accepted(), None);
        assert!(matches!(
            tracker.observe(&format!("{START} w"), &classifier, &ShakmatyValidator),
            Decision::Evaluate(_)
        ));
    }

    #[test]
    fn diff_policy_remembers_nothing_on_the_first_board() {
        let mut tracker = BoardTracker::new();
        tracker.observe(&format!("{START} w"), &diff(), &ShakmatyValidator);
        assert_eq!(tracker.last_accepted(), None);
    }
}
