//! Cooperative shutdown signal shared between the command loop and the
//! Ctrl-C handler.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::StopSignal;

    #[test]
    fn clones_observe_a_request() {
        let signal = StopSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_requested());
        signal.request();
        assert!(observer.is_requested());
    }
}
