//! Resources that live exactly as long as a wizard stays active.
//!
//! Anything attached here (location watches, timers, recognizer handles) is
//! released on reset, teardown, and drop, error paths included.

use tracing::debug;

pub trait Release: Send {
    fn release(&mut self);

    fn label(&self) -> &str {
        "resource"
    }
}

/// Runs a closure once on release.
pub struct OnRelease<F: FnOnce() + Send> {
    label: String,
    f: Option<F>,
}

impl<F: FnOnce() + Send> OnRelease<F> {
    pub fn new(label: impl Into<String>, f: F) -> Self {
        Self {
            label: label.into(),
            f: Some(f),
        }
    }
}

impl<F: FnOnce() + Send> Release for OnRelease<F> {
    fn release(&mut self) {
        if let Some(f) = self.f.take() {
            f();
        }
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Background loops (polling, tickers) are aborted, not detached.
impl Release for tokio::task::JoinHandle<()> {
    fn release(&mut self) {
        self.abort();
    }

    fn label(&self) -> &str {
        "background task"
    }
}

#[derive(Default)]
pub struct ScopedResources {
    held: Vec<Box<dyn Release>>,
}

impl ScopedResources {
    pub fn attach(&mut self, resource: impl Release + 'static) {
        self.held.push(Box::new(resource));
    }

    /// Release in reverse acquisition order.
    pub fn release_all(&mut self) {
        while let Some(mut r) = self.held.pop() {
            debug!(resource = r.label(), "releasing");
            r.release();
        }
    }
}

impl Drop for ScopedResources {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn releases_in_reverse_order_and_only_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scope = ScopedResources::default();
        for name in ["gps", "timer"] {
            let log = Arc::clone(&log);
            scope.attach(OnRelease::new(name, move || log.lock().unwrap().push(name)));
        }
        scope.release_all();
        scope.release_all();
        assert_eq!(log.lock().unwrap().as_slice(), &["timer", "gps"]);
    }

    #[test]
    fn drop_releases_everything() {
        let hits = Arc::new(Mutex::new(0));
        {
            let mut scope = ScopedResources::default();
            let hits = Arc::clone(&hits);
            scope.attach(OnRelease::new("watch", move || *hits.lock().unwrap() += 1));
        }
        assert_eq!(*hits.lock().unwrap(), 1);
    }
}
