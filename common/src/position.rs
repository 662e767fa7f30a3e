use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker used for an empty square in an expanded layout.
pub const EMPTY_SQUARE: char = '.';

const BOARD_SIZE: usize = 8;

/// Side of the board. Serialized as the FEN letters `w` / `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "w", alias = "white")]
    White,
    #[serde(rename = "b", alias = "black")]
    Black,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn fen_char(self) -> char {
        match self {
            Color::White => 'w',
            Color::Black => 'b',
        }
    }

    pub fn from_fen(field: &str) -> Option<Self> {
        match field {
            "w" => Some(Color::White),
            "b" => Some(Color::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fen_char())
    }
}

/// 8x8 grid of square symbols, rank 8 first, file a first.
pub type Grid = [[char; BOARD_SIZE]; BOARD_SIZE];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("layout has {0} rows, expected 8")]
    RowCount(usize),
    #[error("row {row} expands to {squares} squares, expected 8")]
    RowWidth { row: usize, squares: usize },
}

/// Expand a FEN placement field into an 8x8 grid, turning digit run-lengths
/// into individual [`EMPTY_SQUARE`] markers.
pub fn expand_layout(placement: &str) -> Result<Grid, LayoutError> {
    let rows: Vec<&str> = placement.split('/').collect();
    if rows.len() != BOARD_SIZE {
        return Err(LayoutError::RowCount(rows.len()));
    }

    let mut grid = [[EMPTY_SQUARE; BOARD_SIZE]; BOARD_SIZE];
    for (r, row) in rows.iter().enumerate() {
        let mut squares: Vec<char> = Vec::with_capacity(BOARD_SIZE);
        for ch in row.chars() {
            match ch.to_digit(10) {
                Some(n) => squares.extend(std::iter::repeat(EMPTY_SQUARE).take(n as usize)),
                None => squares.push(ch),
            }
        }
        if squares.len() != BOARD_SIZE {
            return Err(LayoutError::RowWidth {
                row: r,
                squares: squares.len(),
            });
        }
        grid[r].copy_from_slice(&squares);
    }
    Ok(grid)
}

/// Inverse of [`expand_layout`]: collapse runs of empty squares back to digits.
pub fn compress_layout(grid: &Grid) -> String {
    let mut out = String::with_capacity(72);
    for (r, row) in grid.iter().enumerate() {
        if r > 0 {
            out.push('/');
        }
        let mut run = 0u32;
        for &sq in row {
            if sq == EMPTY_SQUARE {
                run += 1;
                continue;
            }
            if run > 0 {
                out.push_str(&run.to_string());
                run = 0;
            }
            out.push(sq);
        }
        if run > 0 {
            out.push_str(&run.to_string());
        }
    }
    out
}

/// Result of comparing two consecutive layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoverDetection {
    /// A piece of this colour was involved in the first differing square.
    Moved(Color),
    /// No square differs (or no differing square carries a piece letter).
    Unchanged,
    /// One of the layouts is not an 8x8 board.
    Malformed(LayoutError),
}

impl MoverDetection {
    pub fn mover(&self) -> Option<Color> {
        match self {
            MoverDetection::Moved(c) => Some(*c),
            _ => None,
        }
    }
}

/// Infer which side just moved by scanning for the first square that differs
/// between `old` and `new` (rank 8 to rank 1, file a to file h).
///
/// Uppercase on either side of the difference means White moved, otherwise
/// lowercase means Black moved. Only the first classified difference counts,
/// so captures, castling and en passant can be attributed to the wrong side.
pub fn detect_mover(old: &str, new: &str) -> MoverDetection {
    let (old_grid, new_grid) = match (expand_layout(old), expand_layout(new)) {
        (Ok(o), Ok(n)) => (o, n),
        (Err(e), _) | (_, Err(e)) => return MoverDetection::Malformed(e),
    };

    for r in 0..BOARD_SIZE {
        for c in 0..BOARD_SIZE {
            let (o, n) = (old_grid[r][c], new_grid[r][c]);
            if o == n {
                continue;
            }
            if o.is_uppercase() || n.is_uppercase() {
                return MoverDetection::Moved(Color::White);
            }
            if o.is_lowercase() || n.is_lowercase() {
                return MoverDetection::Moved(Color::Black);
            }
        }
    }
    MoverDetection::Unchanged
}

/// A complete, evaluable position assembled from classifier output.
///
/// The classifier only sees piece placement, so the remaining FEN fields are
/// whatever it reported or placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub placement: String,
    pub side_to_move: Option<Color>,
    pub castling: String,
    pub en_passant: String,
    pub halfmove_clock: String,
    pub fullmove_number: String,
}

impl PositionRecord {
    /// Split a raw `"<placement> [side] [castling] [ep] [half] [full]"` string,
    /// filling absent fields with placeholders.
    pub fn from_raw(raw: &str) -> Self {
        let mut fields = raw.split_whitespace();
        let placement = fields.next().unwrap_or_default().to_string();
        let side_to_move = fields.next().and_then(Color::from_fen);
        let mut field = |default: &str| {
            fields
                .next()
                .filter(|f| *f != "-" || default == "-")
                .map(str::to_string)
                .unwrap_or_else(|| default.to_string())
        };
        let castling = field("-");
        let en_passant = field("-");
        let halfmove_clock = field("0");
        let fullmove_number = field("1");
        Self {
            placement,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        }
    }

    pub fn with_side_to_move(mut self, side: Color) -> Self {
        self.side_to_move = Some(side);
        self
    }

    /// Six-field FEN. An unknown side to move is rendered as White.
    pub fn fen(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PositionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.placement,
            self.side_to_move.unwrap_or(Color::White),
            self.castling,
            self.en_passant,
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: &str = "8/8/8/8/8/8/8/8";
    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";

    #[test]
    fn expand_and_compress_start_position() {
        let grid = expand_layout(START).unwrap();
        assert_eq!(grid[0][4], 'k');
        assert_eq!(grid[7][3], 'Q');
        assert_eq!(grid[4], [EMPTY_SQUARE; 8]);
        assert_eq!(compress_layout(&grid), START);
    }

    #[test]
    fn expand_rejects_wrong_row_count() {
        assert_eq!(
            expand_layout("8/8/8/8/8/8/8"),
            Err(LayoutError::RowCount(7))
        );
    }

    #[test]
    fn expand_rejects_short_and_long_rows() {
        assert_eq!(
            expand_layout("8/8/7/8/8/8/8/8"),
            Err(LayoutError::RowWidth { row: 2, squares: 7 })
        );
        assert_eq!(
            expand_layout("8/8/8/8/8/8/8/K8"),
            Err(LayoutError::RowWidth { row: 7, squares: 9 })
        );
    }

    #[test]
    fn added_uppercase_piece_means_white_moved() {
        let detection = detect_mover(EMPTY, "8/8/8/8/4P3/8/8/8");
        assert_eq!(detection, MoverDetection::Moved(Color::White));
        assert_eq!(detection.mover().map(Color::opposite), Some(Color::Black));
    }

    #[test]
    fn single_square_difference_follows_piece_case() {
        for piece in "PNBRQKpnbrqk".chars() {
            let expected = if piece.is_uppercase() {
                Color::White
            } else {
                Color::Black
            };
            for square in 0..64usize {
                let mut grid = [[EMPTY_SQUARE; 8]; 8];
                grid[square / 8][square % 8] = piece;
                let new = compress_layout(&grid);
                assert_eq!(
                    detect_mover(EMPTY, &new),
                    MoverDetection::Moved(expected),
                    "piece {piece} on square {square}"
                );
                assert_eq!(detect_mover(&new, EMPTY), MoverDetection::Moved(expected));
            }
        }
    }

    #[test]
    fn pawn_push_is_attributed_to_mover() {
        let after_e4 = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR";
        assert_eq!(detect_mover(START, after_e4).mover(), Some(Color::White));

        let after_e5 = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR";
        assert_eq!(detect_mover(after_e4, after_e5).mover(), Some(Color::Black));
    }

    #[test]
    fn first_difference_wins_even_when_wrong() {
        // Black rook takes the knight on d7: the first differing square still
        // shows a white letter on the old side, so White is reported.
        let before = "8/3N4/8/8/8/8/8/3r4";
        let after = "8/3r4/8/8/8/8/8/8";
        assert_eq!(detect_mover(before, after).mover(), Some(Color::White));
    }

    #[test]
    fn identical_layouts_have_no_mover() {
        assert_eq!(detect_mover(START, START), MoverDetection::Unchanged);
    }

    #[test]
    fn caseless_differences_are_skipped() {
        assert_eq!(
            detect_mover("?7/8/8/8/8/8/8/8", "8/8/8/8/8/8/8/8"),
            MoverDetection::Unchanged
        );
        assert_eq!(
            detect_mover("?7/8/8/8/8/8/8/8", "8/8/8/8/8/8/8/7p"),
            MoverDetection::Moved(Color::Black)
        );
    }

    #[test]
    fn seven_rows_is_undetected_not_a_panic() {
        let detection = detect_mover(EMPTY, "8/8/8/8/8/8/8");
        assert!(matches!(detection, MoverDetection::Malformed(_)));
        assert_eq!(detection.mover(), None);
    }

    #[test]
    fn record_from_bare_placement_uses_placeholders() {
        let record = PositionRecord::from_raw(START);
        assert_eq!(record.side_to_move, None);
        assert_eq!(record.fen(), format!("{START} w - - 0 1"));
    }

    #[test]
    fn record_keeps_reported_fields() {
        let record = PositionRecord::from_raw(&format!("{START} b KQkq - 3 12"));
        assert_eq!(record.side_to_move, Some(Color::Black));
        assert_eq!(record.castling, "KQkq");
        assert_eq!(record.fen(), format!("{START} b KQkq - 3 12"));
    }

    #[test]
    fn record_replaces_dash_counters() {
        let record = PositionRecord::from_raw(&format!("{START} b - - - -"));
        assert_eq!(record.fen(), format!("{START} b - - 0 1"));
    }

    #[test]
    fn splicing_side_to_move() {
        let record = PositionRecord::from_raw(&format!("{START} w")).with_side_to_move(Color::Black);
        assert_eq!(record.fen(), format!("{START} b - - 0 1"));
    }

    #[test]
    fn empty_raw_string_gives_empty_placement() {
        let record = PositionRecord::from_raw("   ");
        assert!(record.placement.is_empty());
        assert!(expand_layout(&record.placement).is_err());
    }
}
