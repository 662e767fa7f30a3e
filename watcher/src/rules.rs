use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess};
use tracing::debug;

/// Last-resort legality filter applied to assembled positions.
pub trait PositionValidator: Send + Sync {
    fn is_valid(&self, fen: &str) -> bool;
}

/// Accepts a FEN when it parses and describes a legal chess setup
/// (both kings present, no pawns on the back ranks, side not to move not in
/// check, ...).
#[derive(Debug, Default, Clone, Copy)]
pub struct ShakmatyValidator;

impl PositionValidator for ShakmatyValidator {
    fn is_valid(&self, fen: &str) -> bool {
        let parsed: Fen = match fen.parse() {
            Ok(f) => f,
            Err(e) => {
                debug!(fen, error = %e, "unparseable FEN");
                return false;
            }
        };
        match parsed.into_position::<Chess>(CastlingMode::Standard) {
            Ok(_) => true,
            Err(e) => {
                debug!(fen, error = %e, "illegal position");
                false
            }
        }
    }
}
