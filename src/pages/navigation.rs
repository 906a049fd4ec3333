use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Generation counter for page loads.
///
/// Every navigation takes a ticket; starting another navigation (or
/// unmounting the view) invalidates all earlier tickets, so a slow fetch
/// that resolves afterwards is dropped instead of overwriting newer state.
#[derive(Debug, Clone, Default)]
pub struct NavigationGuard {
    generation: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
pub struct NavigationTicket {
    generation: u64,
    guard: NavigationGuard,
}

impl NavigationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> NavigationTicket {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        NavigationTicket {
            generation,
            guard: self.clone(),
        }
    }

    /// Invalidates every outstanding ticket.
    pub fn unmount(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Runs `load` and returns its output only if no newer navigation
    /// started while it was in flight.
    pub async fn load<F, T>(&self, load: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let ticket = self.begin();
        let value = load.await;
        ticket.accept(value)
    }
}

impl NavigationTicket {
    pub fn is_current(&self) -> bool {
        self.guard.generation.load(Ordering::Acquire) == self.generation
    }

    pub fn accept<T>(&self, value: T) -> Option<T> {
        if self.is_current() {
            Some(value)
        } else {
            debug!("dropping stale result of navigation {}", self.generation);
            None
        }
    }
}
