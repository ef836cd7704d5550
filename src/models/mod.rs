//! Core data models for the ranking core.

mod aggregate;
mod game_result;
mod ids;
mod leaderboard;
mod page;
mod profile;
mod stats;

pub use aggregate::*;
pub use game_result::*;
pub use ids::*;
pub use leaderboard::*;
pub use page::*;
pub use profile::*;
pub use stats::*;
