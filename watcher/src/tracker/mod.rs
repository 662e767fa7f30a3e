pub mod state;

pub use state::{BoardTracker, Decision};
