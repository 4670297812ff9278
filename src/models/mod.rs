pub mod daily_log;
pub mod goal;
pub mod user;
pub mod user_state;
