use board_watch_common::position::{compress_layout, Color, Grid, EMPTY_SQUARE};

/// Output classes of the board model, in logit order. Models must be
/// exported with this order: empty first, then white and black FEN letters.
pub const CLASSES: [char; 13] = [
    EMPTY_SQUARE,
    'P',
    'N',
    'B',
    'R',
    'Q',
    'K',
    'p',
    'n',
    'b',
    'r',
    'q',
    'k',
];

/// Per-square class indices as seen on screen (top row first).
pub type LabelGrid = [[usize; 8]; 8];

/// Convert per-square class indices into a FEN placement.
///
/// The screen shows the board from the user's side, so when the user plays
/// Black the grid is rotated 180 degrees to get rank 8 first. Unknown class
/// indices decode as empty squares.
pub fn labels_to_placement(labels: &LabelGrid, viewer: Color) -> String {
    let mut grid: Grid = [[EMPTY_SQUARE; 8]; 8];
    for (r, row) in labels.iter().enumerate() {
        for (c, &label) in row.iter().enumerate() {
            let (rr, cc) = match viewer {
                Color::White => (r, c),
                Color::Black => (7 - r, 7 - c),
            };
            grid[rr][cc] = CLASSES.get(label).copied().unwrap_or(EMPTY_SQUARE);
        }
    }
    compress_layout(&grid)
}

/// Index of the largest value in `scores`.
pub fn argmax(scores: &[f32]) -> usize {
    scores
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        })
        .0
}
