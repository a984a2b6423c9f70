//! Restart notification channel.
//!
//! The restart subsystem keeps an ordered list of observers and hands every
//! shutdown request to each of them before the machine actually goes down.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

/// Kind of a shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The system is about to restart.
    Restart,
    /// The system is about to halt.
    Halt,
    /// The system is about to power off.
    PowerOff,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::Restart => "restart",
            EventKind::Halt => "halt",
            EventKind::PowerOff => "power-off",
        })
    }
}

/// A shutdown request as seen by the observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartEvent<'a> {
    /// What is about to happen.
    pub kind: EventKind,
    /// The command the caller attached to the request, if any.
    pub payload: Option<&'a [u8]>,
}

impl<'a> RestartEvent<'a> {
    /// A new event.
    pub fn new(kind: EventKind, payload: Option<&'a [u8]>) -> Self {
        Self { kind, payload }
    }

    /// A restart request carrying `command`.
    pub fn restart(command: &'a [u8]) -> Self {
        Self::new(EventKind::Restart, Some(command))
    }
}

/// Observer's verdict on an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The observer ignored the event or failed to act on it.
    NotHandled,
    /// The observer acted on the event.
    Handled,
}

/// A subscriber of the restart notification channel.
pub trait RestartObserver {
    /// Called synchronously for every shutdown request. Must not block the
    /// shutdown: failures are reported as [Outcome::NotHandled].
    fn on_event(&self, event: &RestartEvent<'_>) -> Outcome;
}

/// Registration failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// The very same observer is already subscribed.
    AlreadyRegistered,
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::AlreadyRegistered => f.write_str("observer is already registered"),
        }
    }
}

impl std::error::Error for RegisterError {}

/// Ordered list of restart observers.
#[derive(Default)]
pub struct RestartChain {
    observers: Mutex<Vec<Arc<dyn RestartObserver>>>,
}

fn same_observer(left: &Arc<dyn RestartObserver>, right: &Arc<dyn RestartObserver>) -> bool {
    // Compare data pointers only, vtables may be duplicated across codegen units.
    Arc::as_ptr(left).cast::<()>() == Arc::as_ptr(right).cast::<()>()
}

impl RestartChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    fn observers(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn RestartObserver>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `observer` to the chain.
    pub fn register(&self, observer: Arc<dyn RestartObserver>) -> Result<(), RegisterError> {
        let mut observers = self.observers();
        if observers.iter().any(|known| same_observer(known, &observer)) {
            return Err(RegisterError::AlreadyRegistered);
        }
        observers.push(observer);
        Ok(())
    }

    /// Removes `observer` from the chain. Returns whether it was subscribed.
    pub fn unregister(&self, observer: &Arc<dyn RestartObserver>) -> bool {
        let mut observers = self.observers();
        let before = observers.len();
        observers.retain(|known| !same_observer(known, observer));
        observers.len() != before
    }

    /// Number of subscribed observers.
    pub fn len(&self) -> usize {
        self.observers().len()
    }

    /// Whether nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `event` to every observer in registration order.
    ///
    /// Returns [Outcome::Handled] if at least one observer handled the event.
    pub fn notify(&self, event: &RestartEvent<'_>) -> Outcome {
        // Observers are free to (un)register while being notified.
        let observers = self.observers().clone();
        log::debug!(
            "Delivering {} event to {} observer(s)",
            event.kind,
            observers.len()
        );
        observers
            .iter()
            .map(|observer| observer.on_event(event))
            .fold(Outcome::NotHandled, |folded, outcome| {
                if outcome == Outcome::Handled {
                    Outcome::Handled
                } else {
                    folded
                }
            })
    }
}
