//! Programming lifecycle notifier
//!
//! Independent subsystems that read flash-resident data (the animation
//! engine in particular) must not touch the store's regions while a
//! commit is erasing and rewriting them. They register a hook here; the
//! commit orchestrator fires `Begin` immediately before staging and
//! `End` after the terminal outcome, bracketing the entire multi-step
//! commit rather than each hardware operation.

use heapless::Vec;

/// Maximum number of registered programming hooks
pub const MAX_PROGRAMMING_CLIENTS: usize = 8;

/// Commit bracketing events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgrammingEvent {
    /// A commit is starting; flash contents for the store's regions are
    /// indeterminate until `End`
    Begin,
    /// The commit reached its terminal outcome (success or failure)
    End,
}

/// Hook signature: plain function pointer plus a caller-chosen token
pub type ProgrammingHook = fn(token: u32, event: ProgrammingEvent);

#[derive(Clone, Copy)]
struct Client {
    hook: ProgrammingHook,
    token: u32,
}

/// Bounded registry of programming hooks
#[derive(Default)]
pub struct ProgrammingNotifier {
    clients: Vec<Client, MAX_PROGRAMMING_CLIENTS>,
}

impl ProgrammingNotifier {
    pub const fn new() -> Self {
        Self { clients: Vec::new() }
    }

    /// Register a hook; returns false when the registry is full
    #[must_use]
    pub fn register(&mut self, hook: ProgrammingHook, token: u32) -> bool {
        self.clients.push(Client { hook, token }).is_ok()
    }

    /// Remove every hook registered with `token`
    pub fn unregister(&mut self, token: u32) {
        self.clients.retain(|c| c.token != token);
    }

    /// Number of registered hooks
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Invoke every registered hook, in registration order
    pub fn notify(&self, event: ProgrammingEvent) {
        for client in &self.clients {
            (client.hook)(client.token, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    static BEGINS: AtomicU32 = AtomicU32::new(0);
    static ENDS: AtomicU32 = AtomicU32::new(0);

    fn counting_hook(_token: u32, event: ProgrammingEvent) {
        match event {
            ProgrammingEvent::Begin => BEGINS.fetch_add(1, Ordering::Relaxed),
            ProgrammingEvent::End => ENDS.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn noop_hook(_token: u32, _event: ProgrammingEvent) {}

    #[test]
    fn test_notify_reaches_registered_hooks() {
        BEGINS.store(0, Ordering::Relaxed);
        ENDS.store(0, Ordering::Relaxed);

        let mut notifier = ProgrammingNotifier::new();
        assert!(notifier.register(counting_hook, 1));
        assert!(notifier.register(counting_hook, 2));

        notifier.notify(ProgrammingEvent::Begin);
        notifier.notify(ProgrammingEvent::End);

        assert_eq!(BEGINS.load(Ordering::Relaxed), 2);
        assert_eq!(ENDS.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_unregister_by_token() {
        let mut notifier = ProgrammingNotifier::new();
        assert!(notifier.register(noop_hook, 7));
        assert!(notifier.register(noop_hook, 8));
        assert!(notifier.register(noop_hook, 7));
        assert_eq!(notifier.len(), 3);

        notifier.unregister(7);
        assert_eq!(notifier.len(), 1);
    }

    #[test]
    fn test_register_full_reports_failure() {
        let mut notifier = ProgrammingNotifier::new();
        for token in 0..MAX_PROGRAMMING_CLIENTS as u32 {
            assert!(notifier.register(noop_hook, token));
        }
        assert!(!notifier.register(noop_hook, 99));
        assert_eq!(notifier.len(), MAX_PROGRAMMING_CLIENTS);
    }
}
