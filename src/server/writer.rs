//! The response sink handed to handlers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use log::warn;

use crate::server::response::{HttpResponse, StatusCode};

#[derive(Debug, Default)]
struct Pending {
    status: Option<StatusCode>,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

/// A handle to the response being built for one request.
///
/// Clones share the same response. The first status written wins; writing
/// body bytes before any status commits `200 OK`. Headers set after the
/// status is committed are ignored.
#[derive(Debug, Clone, Default)]
pub struct ResponseWriter {
    inner: Arc<Mutex<Pending>>,
}

impl ResponseWriter {
    /// A fresh, uncommitted response.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set a header. Has no effect once the status is committed.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        let mut pending = self.lock();
        let name = name.into();
        if pending.status.is_some() {
            warn!("Ignoring header {name} set after the status was written");
            return;
        }
        pending.headers.insert(name, value.into());
    }

    /// Commit the status code.
    ///
    /// Returns `false` when a status had already been committed, in which
    /// case `status` is discarded.
    pub fn write_header(&self, status: StatusCode) -> bool {
        let mut pending = self.lock();
        match pending.status {
            Some(current) => {
                warn!(
                    "Superfluous status {new} ignored, {current} already written",
                    new = status.as_u16(),
                    current = current.as_u16()
                );
                false
            }
            None => {
                pending.status = Some(status);
                true
            }
        }
    }

    /// Append body bytes, committing `200 OK` if no status was written.
    pub fn write(&self, bytes: &[u8]) -> usize {
        let mut pending = self.lock();
        pending.status.get_or_insert(StatusCode::Ok);
        pending.body.extend_from_slice(bytes);
        bytes.len()
    }

    /// The committed status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.lock().status
    }

    /// Snapshot the response written so far.
    ///
    /// An uncommitted response finishes as `200 OK`.
    pub fn finish(&self) -> HttpResponse {
        let pending = self.lock();
        HttpResponse {
            status: pending.status.unwrap_or(StatusCode::Ok),
            headers: pending.headers.clone(),
            body: pending.body.clone(),
        }
    }
}
