//! Durable local queue: persisted command shape and retry policy.

pub mod command;

pub use command::{QueueConfig, QueuedCommand};
