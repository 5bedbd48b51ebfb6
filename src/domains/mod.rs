pub mod core;
pub mod participant;
pub mod sync;
pub mod team;
pub mod user;
