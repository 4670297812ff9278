pub mod auth;
pub mod goals;
pub mod health;
pub mod logs;
pub mod progress;
pub mod state;
pub mod ws;
