pub mod health;
pub mod leaderboard;
pub mod results;
pub mod stats;
