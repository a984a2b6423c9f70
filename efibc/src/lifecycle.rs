//! Hooking the interceptor up to the restart chain.

use std::sync::Arc;

use crate::{
    buffer::Allocator,
    firmware::FirmwareVariables,
    interceptor::Interceptor,
    notifier::{RegisterError, RestartChain, RestartObserver},
};

/// A subscription of the interceptor. Unsubscribes when stopped or dropped.
pub struct Registration<'c> {
    chain: &'c RestartChain,
    observer: Option<Arc<dyn RestartObserver>>,
}

impl Registration<'_> {
    /// Whether the interceptor is actually subscribed. It is not when the
    /// firmware lacks runtime services.
    pub fn is_active(&self) -> bool {
        self.observer.is_some()
    }

    /// Unsubscribes the interceptor.
    pub fn stop(self) {
        drop(self)
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if let Some(observer) = self.observer.take() {
            self.chain.unregister(&observer);
            log::debug!("Reboot notifier unregistered");
        }
    }
}

/// Subscribes `interceptor` to `chain`.
///
/// Without firmware runtime services there is nothing to write to: nothing is
/// subscribed then, and an inactive [Registration] is returned.
pub fn start<S, A>(
    interceptor: Arc<Interceptor<S, A>>,
    chain: &RestartChain,
) -> Result<Registration<'_>, RegisterError>
where
    S: FirmwareVariables + 'static,
    A: Allocator + 'static,
{
    if !interceptor.services().runtime_services_available() {
        log::info!("EFI runtime services are not available, restarts won't be intercepted");
        return Ok(Registration {
            chain,
            observer: None,
        });
    }

    let observer: Arc<dyn RestartObserver> = interceptor;
    if let Err(e) = chain.register(Arc::clone(&observer)) {
        log::error!("efibc: unable to register reboot notifier: {}", e);
        return Err(e);
    }
    log::debug!("Reboot notifier registered");

    Ok(Registration {
        chain,
        observer: Some(observer),
    })
}
