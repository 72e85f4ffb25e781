//! Scoped outgoing cassette sessions

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use tracing::{debug, error, info};

use super::Cassette;
use crate::Result;

thread_local! {
    /// Sessions entered on this thread, innermost last
    static ACTIVE: RefCell<Vec<Rc<RefCell<Cassette>>>> = const { RefCell::new(Vec::new()) };
}

/// Guard holding a cassette active for outgoing calls on the current thread.
///
/// While the guard lives, every request sent through a
/// [`RecordingClient`](super::RecordingClient) on this thread is answered by
/// the cassette. The cassette is saved when the guard is finished or
/// dropped, including during unwinding.
#[derive(Debug)]
pub struct OutgoingSession {
    cassette: Rc<RefCell<Cassette>>,
    released: bool,
}

impl OutgoingSession {
    /// Activate `cassette` for the current thread
    #[must_use = "the session ends as soon as the guard is dropped"]
    pub fn enter(cassette: Cassette) -> Self {
        info!(
            "Entering outgoing session {} (record mode: {})",
            cassette.path().display(),
            cassette.record_mode()
        );

        let cassette = Rc::new(RefCell::new(cassette));
        ACTIVE.with(|active| active.borrow_mut().push(Rc::clone(&cassette)));

        Self {
            cassette,
            released: false,
        }
    }

    /// Borrow the cassette
    ///
    /// # Panics
    ///
    /// Panics if called while the cassette is answering a request
    #[must_use]
    pub fn cassette(&self) -> Ref<'_, Cassette> {
        self.cassette.borrow()
    }

    /// End the session, save the cassette and return its final state
    ///
    /// # Errors
    ///
    /// Returns error if the cassette cannot be saved
    pub fn finish(mut self) -> Result<Cassette> {
        self.release()
    }

    fn release(&mut self) -> Result<Cassette> {
        self.released = true;
        ACTIVE.with(|active| {
            active
                .borrow_mut()
                .retain(|entry| !Rc::ptr_eq(entry, &self.cassette));
        });

        let mut cassette = self.cassette.borrow_mut();
        debug!("Leaving outgoing session {}", cassette.path().display());
        cassette.save(false)?;
        Ok(cassette.clone())
    }
}

impl Drop for OutgoingSession {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if let Err(e) = self.release() {
            error!("Failed to save outgoing cassette: {}", e);
        }
    }
}

/// Run `f` against the innermost active cassette of this thread, if any.
/// A cassette already busy answering a request counts as inactive.
pub(crate) fn with_active<R>(f: impl FnOnce(&mut Cassette) -> R) -> Option<R> {
    let cassette = ACTIVE.with(|active| active.borrow().last().cloned())?;
    let mut guard = cassette.try_borrow_mut().ok()?;
    Some(f(&mut guard))
}

/// Whether an outgoing session is active on this thread
#[must_use]
pub fn session_active() -> bool {
    ACTIVE.with(|active| !active.borrow().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::{RecordMode, RequestRecord, ResponseRecord};
    use tempfile::TempDir;

    #[test]
    fn test_enter_and_finish() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.json");

        let session = OutgoingSession::enter(Cassette::new(&path, RecordMode::All));
        assert!(session_active());

        with_active(|cassette| {
            cassette
                .append(
                    RequestRecord::new("GET", "http://example.com/"),
                    ResponseRecord::new(200, "OK"),
                )
                .unwrap();
        })
        .unwrap();

        let cassette = session.finish().unwrap();
        assert!(!session_active());
        assert_eq!(cassette.len(), 1);
        assert!(path.exists());
    }

    #[test]
    fn test_drop_releases_and_saves() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dropped.json");

        {
            let _session = OutgoingSession::enter(Cassette::new(&path, RecordMode::All));
            with_active(|cassette| {
                cassette
                    .append(
                        RequestRecord::new("GET", "http://example.com/"),
                        ResponseRecord::new(204, "No Content"),
                    )
                    .unwrap();
            });
        }

        assert!(!session_active());
        assert_eq!(Cassette::open(&path, RecordMode::None).unwrap().len(), 1);
    }

    #[test]
    fn test_released_on_panic() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("panicked.json");
        let scope_path = path.clone();

        let result = std::panic::catch_unwind(move || {
            let _session = OutgoingSession::enter(Cassette::new(&scope_path, RecordMode::All));
            with_active(|cassette| {
                cassette
                    .append(
                        RequestRecord::new("GET", "http://example.com/"),
                        ResponseRecord::new(200, "OK"),
                    )
                    .unwrap();
            });
            panic!("handler failed");
        });

        assert!(result.is_err());
        assert!(!session_active());
        assert!(path.exists());
    }

    #[test]
    fn test_nested_sessions_use_innermost() {
        let temp_dir = TempDir::new().unwrap();
        let outer_path = temp_dir.path().join("outer.json");
        let inner_path = temp_dir.path().join("inner.json");
        let outer = OutgoingSession::enter(Cassette::new(&outer_path, RecordMode::None));
        let inner = OutgoingSession::enter(Cassette::new(&inner_path, RecordMode::None));

        let path = with_active(|cassette| cassette.path().to_path_buf()).unwrap();
        assert_eq!(path, inner_path);

        drop(inner);
        let path = with_active(|cassette| cassette.path().to_path_buf()).unwrap();
        assert_eq!(path, outer_path);

        drop(outer);
        assert!(with_active(|_| ()).is_none());
    }
}
