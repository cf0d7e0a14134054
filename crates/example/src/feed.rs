//! A download feed using shared callback handles and a lazily created topic map.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Topic(pub String);

pub type ProgressCallback = Arc<dyn Fn(&Path, u64) + Send + Sync>;

#[derive(Default)]
pub struct Feed {
    progress_callbacks: Vec<ProgressCallback>,
    /// Created on the first topic registration.
    post_by_topic_callbacks: Option<BTreeMap<Topic, Vec<Arc<dyn Fn(&str) -> bool + Send + Sync>>>>,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic_count(feed: &Self) -> usize {
        feed.post_by_topic_callbacks
            .as_ref()
            .map_or(0, BTreeMap::len)
    }
}

mod feed_callbacks {
    include!(concat!(env!("OUT_DIR"), "/feed_callbacks.rs"));
}
