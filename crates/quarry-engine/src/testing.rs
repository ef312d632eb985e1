//! In-memory transport for engine tests.

use std::collections::HashMap;
use std::sync::Mutex;

use quarry_util::error::UtilError;
use quarry_util::transport::{Credentials, Transport};

/// Serves documents from a map and records every requested URL.
#[derive(Debug, Default)]
pub(crate) struct MemoryTransport {
    documents: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

#[allow(clippy::unwrap_used)]
impl MemoryTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, url: &str, body: &str) {
        self.documents
            .lock()
            .unwrap()
            .insert(url.to_owned(), body.as_bytes().to_vec());
    }

    /// How many times `url` was requested.
    pub(crate) fn fetches(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|r| *r == url).count()
    }

    /// How many requests went to URLs starting with `prefix`.
    pub(crate) fn fetches_under(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.starts_with(prefix))
            .count()
    }
}

#[allow(clippy::unwrap_used)]
impl Transport for MemoryTransport {
    fn fetch(&self, url: &str, _credentials: Option<&Credentials>) -> Result<Vec<u8>, UtilError> {
        self.requests.lock().unwrap().push(url.to_owned());
        self.documents
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| UtilError::NotFound {
                url: url.to_owned(),
            })
    }
}
