//! Outbound fire-and-forget calls to attached applications
//!
//! Calls are fanned out to every connection. Each connection tracks its own
//! pending ids and logs how the application completed the call. Outcomes are
//! terminal: nothing is retried and nothing flows back to the caller.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use super::protocol::MethodResult;

/// A call waiting to be delivered to each attached application
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundCall {
    pub method: String,
    pub arguments: Value,
}

/// Handle for invoking methods on attached applications
#[derive(Debug, Clone)]
pub struct MethodChannel {
    calls_tx: broadcast::Sender<OutboundCall>,
}

impl MethodChannel {
    pub fn new(capacity: usize) -> Self {
        let (calls_tx, _) = broadcast::channel(capacity);
        Self { calls_tx }
    }

    /// Receiver for a newly attached connection
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundCall> {
        self.calls_tx.subscribe()
    }

    /// Number of attached applications
    pub fn attached(&self) -> usize {
        self.calls_tx.receiver_count()
    }

    /// Invoke `method` on every attached application without waiting
    ///
    /// Returns how many applications the call was handed to.
    pub fn invoke_method(&self, method: &str, arguments: Value) -> usize {
        let call = OutboundCall {
            method: method.to_string(),
            arguments,
        };

        match self.calls_tx.send(call) {
            Ok(delivered) => {
                info!(method, delivered, "invoking method on application");
                delivered
            }
            Err(_) => {
                warn!(method, "no application attached");
                log_outcome(method, &MethodResult::NotImplemented);
                0
            }
        }
    }
}

/// Calls sent on one connection that have not been answered yet
#[derive(Debug, Default)]
pub struct PendingCalls {
    next_id: u64,
    pending: HashMap<u64, String>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call and return the id to send it under
    pub fn register(&mut self, method: &str) -> u64 {
        self.next_id += 1;
        self.pending.insert(self.next_id, method.to_string());
        self.next_id
    }

    /// Match a result to its call, log it and return the method name
    pub fn complete(&mut self, id: u64, result: &MethodResult) -> Option<String> {
        match self.pending.remove(&id) {
            Some(method) => {
                log_outcome(&method, result);
                Some(method)
            }
            None => {
                warn!(id, "result for unknown call");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending call, logging each as abandoned
    pub fn abandon_all(&mut self) {
        if self.is_empty() {
            return;
        }
        warn!(count = self.len(), "application disconnected with calls outstanding");
        for (id, method) in self.pending.drain() {
            warn!(id, method = %method, "call abandoned");
        }
    }
}

/// Log how the application completed a call
pub fn log_outcome(method: &str, result: &MethodResult) {
    match result {
        MethodResult::Success { value } => {
            info!(method, ?value, "application responded");
        }
        MethodResult::Error {
            code,
            message,
            details,
        } => {
            error!(method, code = %code, ?message, ?details, "application returned an error");
        }
        MethodResult::NotImplemented => {
            warn!(method, "method not implemented by application");
        }
    }
}
