pub mod leaderboard_model;
pub mod leaderboard_service;
pub mod metrics;
pub mod reconstruction;


pub use leaderboard_model::LeaderboardRow;
pub use leaderboard_service::LeaderboardService;
