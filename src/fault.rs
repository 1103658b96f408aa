use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

type EscalationHandler = Box<dyn Fn(&str) + Send>;

/// Collects fault reports from every transport path, de-duplicates them by
/// exact message match, and forwards each distinct fault once to the
/// registered escalation handler.
///
/// This is the one transport structure shared across per-device call paths;
/// all state sits behind a single mutex. The escalation handler runs inside
/// that critical section, so it must return quickly and must not call back
/// into `notify_failure`.
pub struct FaultMonitor {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    seen: HashSet<String>,
    escalation: Option<EscalationHandler>,
}

impl FaultMonitor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Install the callback invoked on each newly seen fault. Registering
    /// again replaces the previous handler.
    pub fn register_escalation(&self, handler: impl Fn(&str) + Send + 'static) {
        self.lock().escalation = Some(Box::new(handler));
    }

    /// Report a fault. The first occurrence of each distinct message is
    /// forwarded to the escalation handler; repeats are silently dropped.
    pub fn notify_failure(&self, message: &str) {
        let mut inner = self.lock();
        if !inner.seen.insert(message.to_string()) {
            log::debug!("Suppressed duplicate fault: {}", message);
            return;
        }
        log::error!("Fault reported: {}", message);
        if let Some(handler) = &inner.escalation {
            handler(message);
        }
    }

    /// Number of distinct faults recorded so far.
    pub fn fault_count(&self) -> usize {
        self.lock().seen.len()
    }

    pub fn has_seen(&self, message: &str) -> bool {
        self.lock().seen.contains(message)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FaultMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_duplicate_faults_escalate_once() {
        let monitor = FaultMonitor::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        monitor.register_escalation(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        monitor.notify_failure("PG open failed");
        monitor.notify_failure("PG open failed");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.fault_count(), 1);
    }

    #[test]
    fn test_distinct_faults_escalate_separately() {
        let monitor = FaultMonitor::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        monitor.register_escalation(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        monitor.notify_failure("PG open failed");
        monitor.notify_failure("PSU open failed");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(monitor.has_seen("PG open failed"));
        assert!(monitor.has_seen("PSU open failed"));
    }

    #[test]
    fn test_reregistration_replaces_handler() {
        let monitor = FaultMonitor::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        monitor.register_escalation(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = second.clone();
        monitor.register_escalation(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        monitor.notify_failure("pump stalled");

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fault_without_handler_is_still_recorded() {
        let monitor = FaultMonitor::new();
        monitor.notify_failure("orphan fault");
        assert_eq!(monitor.fault_count(), 1);
    }
}
