pub mod config;
pub mod exchange;
pub mod metrics;
pub mod poller;
pub mod universe;

pub mod error;
pub mod logger;
