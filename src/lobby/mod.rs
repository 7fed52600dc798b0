//! Arena hosting: rooms with their tick loops and the manager that owns them

pub mod effects;
pub mod manager;
pub mod player;
pub mod room;
