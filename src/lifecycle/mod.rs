//! Daemon lifecycle: shutdown signals and the opt-in demo trigger

mod demo;
mod shutdown;

pub use demo::spawn_demo_trigger;
pub use shutdown::ShutdownSignal;
