//! Part store: holds part bodies by part id and serves them to the renderer.
//!
//! Stands in for a remote mailbox. Bodies are inserted once (by
//! [`parse_remote`](crate::parser::mime::parse_remote) or by a caller that
//! prefetched them) and then handed out through [`DataProvider`].

use std::collections::HashMap;

use tracing::debug;

use crate::model::part::SinglePart;
use crate::render::callback::DataProvider;

/// Bodies of remote parts, keyed by part id.
#[derive(Debug, Default, Clone)]
pub struct PartStore {
    bodies: HashMap<String, Vec<u8>>,
    fetches: usize,
}

impl PartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the body of `part_id`, replacing any previous one.
    pub fn insert(&mut self, part_id: impl Into<String>, bytes: Vec<u8>) {
        self.bodies.insert(part_id.into(), bytes);
    }

    pub fn get(&self, part_id: &str) -> Option<&[u8]> {
        self.bodies.get(part_id).map(Vec::as_slice)
    }

    pub fn contains(&self, part_id: &str) -> bool {
        self.bodies.contains_key(part_id)
    }

    /// Number of stored bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Number of bodies handed out through [`DataProvider::bytes`].
    pub fn fetches(&self) -> usize {
        self.fetches
    }
}

impl DataProvider for PartStore {
    fn bytes(&mut self, folder: Option<&str>, part: &SinglePart) -> Option<Vec<u8>> {
        let bytes = self.bodies.get(&part.part_id).cloned();
        debug!(
            folder = folder.unwrap_or("-"),
            part_id = %part.part_id,
            found = bytes.is_some(),
            "Fetching part body"
        );
        if bytes.is_some() {
            self.fetches += 1;
        }
        bytes
    }
}
