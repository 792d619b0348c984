pub mod config;
pub mod logging;

// Download orchestration
pub mod auth;
pub mod control;
pub mod forbidden;
pub mod manifest;
pub mod orchestrator;
pub mod progress;
pub mod queue;
pub mod retry;
pub mod session;
pub mod task;
pub mod transport;
pub mod worker;
