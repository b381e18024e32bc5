//! Method channel between the daemon and attached applications
//!
//! Framed JSON calls over a Unix socket. Either side can call the other;
//! every call completes with success, error or not-implemented.

mod codec;
mod invoke;
mod protocol;
mod server;

pub use server::Server;
