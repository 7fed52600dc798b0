pub mod constants;
pub mod countdown;
pub mod events;
pub mod generator;
pub mod match_result;
pub mod scheduler;
pub mod state;
pub mod team;
pub mod timers;
