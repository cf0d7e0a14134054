//! A chat user with plain and request-scoped callbacks.

use callbackgen::Callbacks;
use std::collections::HashMap;
use std::sync::Mutex;

/// Identifies an outstanding request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub version: u64,
}

pub type SnapshotCallback = fn(snapshot: &Snapshot);

#[derive(Callbacks, Default)]
#[callbacks(lock = "mu")]
pub struct User {
    /// Taken while a request-scoped callback is registered.
    mu: Mutex<()>,
    name: String,
    snapshot_callbacks: Vec<SnapshotCallback>,
    message_callbacks: Vec<fn(text: &str)>,
    message_by_request_id_callbacks: HashMap<RequestId, Vec<fn(text: &str)>>,
    patch_callbacks: Vec<fn(a1: i32, b1: i32)>,
    rename_callbacks: Vec<fn(name: String)>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of callbacks registered for `request_id`.
    pub fn pending(&self, request_id: &RequestId) -> usize {
        self.message_by_request_id_callbacks
            .get(request_id)
            .map_or(0, Vec::len)
    }
}

mod user_callbacks {
    include!(concat!(env!("OUT_DIR"), "/user_callbacks.rs"));
}
