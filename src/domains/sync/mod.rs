pub mod checkpoint;
pub mod engine;
pub mod transport;
pub mod types;
