//! The restart observer writing the one shot entry.

use std::fmt;

use crate::{
    array_ext::U16SliceExt,
    buffer::{AllocError, Allocator, Heap},
    encode,
    firmware::{FirmwareVariables, LOADER_ATTRIBUTES, LOADER_ENTRY_ONE_SHOT, LOADER_GUID},
    notifier::{EventKind, Outcome, RestartEvent, RestartObserver},
    status::Status,
};

/// Why the one shot entry has not been written.
#[derive(Debug)]
enum Failure {
    Allocation {
        what: &'static str,
        error: AllocError,
    },
    Encoding {
        what: &'static str,
        expected: usize,
        written: usize,
    },
    Firmware(Status),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Allocation { what, error } => {
                write!(f, "failed to allocate memory for the {}: {}", what, error)
            }
            Failure::Encoding {
                what,
                expected,
                written,
            } => write!(
                f,
                "failed to convert the {} to a wide string: {} of {} characters converted",
                what, written, expected
            ),
            Failure::Firmware(status) => write!(f, "set_variable() failed: {}", status),
        }
    }
}

/// Records the command of every restart request in the `LoaderEntryOneShot`
/// variable, so that the bootloader boots the requested entry next time.
pub struct Interceptor<S, A = Heap> {
    services: S,
    allocator: A,
}

impl<S: FirmwareVariables> Interceptor<S> {
    /// An interceptor writing through `services`, allocating on the heap.
    pub fn new(services: S) -> Self {
        Self::with_allocator(services, Heap)
    }
}

impl<S: FirmwareVariables, A: Allocator> Interceptor<S, A> {
    /// An interceptor taking its buffers from `allocator`.
    pub fn with_allocator(services: S, allocator: A) -> Self {
        Self {
            services,
            allocator,
        }
    }

    /// The firmware services the interceptor writes through.
    pub fn services(&self) -> &S {
        &self.services
    }

    /// Allocates a zeroed buffer fitting the wide form of `narrow`.
    fn allocate_for(&self, what: &'static str, narrow: &[u8]) -> Result<A::Buffer, Failure> {
        self.allocator
            .allocate_zeroed(encode::buffer_size_for(narrow))
            .map_err(|error| Failure::Allocation { what, error })
    }

    /// Writes `command` to the one shot variable.
    fn write_oneshot(&self, command: &[u8]) -> Result<(), Failure> {
        let name_narrow = LOADER_ENTRY_ONE_SHOT.as_bytes();

        // Buffers are released in reverse order: the command first, then the
        // name.
        let mut name = self.allocate_for("variable name", name_narrow)?;
        let mut data = self.allocate_for("command", command)?;

        check_encoded(
            "variable name",
            name_narrow,
            encode::encode(name.as_mut(), name_narrow),
        )?;
        check_encoded("command", command, encode::encode(data.as_mut(), command))?;

        let bytes = data.as_mut().le_u8();
        log::trace!("Command encoded as {:x?}", bytes);
        self.services
            .set_variable(name.as_ref(), &LOADER_GUID, LOADER_ATTRIBUTES, bytes)
            .map_err(Failure::Firmware)
    }
}

/// Every character of `narrow` must have been copied, otherwise the buffer is
/// not to be trusted.
fn check_encoded(what: &'static str, narrow: &[u8], written: usize) -> Result<(), Failure> {
    if written == narrow.len() {
        Ok(())
    } else {
        Err(Failure::Encoding {
            what,
            expected: narrow.len(),
            written,
        })
    }
}

impl<S: FirmwareVariables, A: Allocator> RestartObserver for Interceptor<S, A> {
    fn on_event(&self, event: &RestartEvent<'_>) -> Outcome {
        let command = match (event.kind, event.payload) {
            (EventKind::Restart, Some(command)) if !command.is_empty() => command,
            (EventKind::Restart, _) => {
                log::debug!("Ignoring restart without a command");
                return Outcome::NotHandled;
            }
            (kind, _) => {
                log::debug!("Ignoring {} event", kind);
                return Outcome::NotHandled;
            }
        };

        match self.write_oneshot(command) {
            Ok(()) => {
                log::info!(
                    r#"{} set to "{}""#,
                    LOADER_ENTRY_ONE_SHOT,
                    String::from_utf8_lossy(command)
                );
                Outcome::Handled
            }
            Err(failure) => {
                log::error!("efibc: {}", failure);
                Outcome::NotHandled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use efivar::efi::VariableFlags;
    use uuid::Uuid;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        name: Vec<u16>,
        vendor: Uuid,
        attributes: VariableFlags,
        data: Vec<u8>,
    }

    /// Records every write and answers with a preset status.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Call>>,
        reject_with: Option<Status>,
    }

    impl Recorder {
        fn rejecting(status: Status) -> Self {
            Self {
                reject_with: Some(status),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl FirmwareVariables for Recorder {
        fn runtime_services_available(&self) -> bool {
            true
        }

        fn set_variable(
            &self,
            name: &[u16],
            vendor: &Uuid,
            attributes: VariableFlags,
            data: &[u8],
        ) -> Result<(), Status> {
            self.calls.lock().unwrap().push(Call {
                name: name.to_vec(),
                vendor: *vendor,
                attributes,
                data: data.to_vec(),
            });
            match self.reject_with {
                Some(status) => Err(status),
                None => Ok(()),
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Trace {
        Allocated { id: usize, size: usize },
        Released { id: usize },
    }

    /// Keeps track of every buffer; the n-th allocation can be made to fail or
    /// to come out one unit short.
    #[derive(Default)]
    struct Tracking {
        trace: Arc<Mutex<Vec<Trace>>>,
        attempts: AtomicUsize,
        fail_at: Option<usize>,
        short_at: Option<usize>,
    }

    impl Tracking {
        fn failing_at(attempt: usize) -> Self {
            Self {
                fail_at: Some(attempt),
                ..Self::default()
            }
        }

        fn short_at(attempt: usize) -> Self {
            Self {
                short_at: Some(attempt),
                ..Self::default()
            }
        }

        fn trace(&self) -> Vec<Trace> {
            self.trace.lock().unwrap().clone()
        }

        /// Asserts that every allocated buffer has been released exactly once
        /// and returns the number of allocations.
        fn assert_released(&self) -> usize {
            let trace = self.trace();
            let allocated: Vec<usize> = trace
                .iter()
                .filter_map(|event| match event {
                    Trace::Allocated { id, .. } => Some(*id),
                    Trace::Released { .. } => None,
                })
                .collect();
            for id in &allocated {
                let releases = trace
                    .iter()
                    .filter(|event| **event == Trace::Released { id: *id })
                    .count();
                assert_eq!(releases, 1, "buffer {} released {} times", id, releases);
            }
            assert_eq!(trace.len(), allocated.len() * 2);
            allocated.len()
        }
    }

    struct TrackedBuffer {
        id: usize,
        units: Vec<u16>,
        trace: Arc<Mutex<Vec<Trace>>>,
    }

    impl AsRef<[u16]> for TrackedBuffer {
        fn as_ref(&self) -> &[u16] {
            &self.units
        }
    }

    impl AsMut<[u16]> for TrackedBuffer {
        fn as_mut(&mut self) -> &mut [u16] {
            &mut self.units
        }
    }

    impl Drop for TrackedBuffer {
        fn drop(&mut self) {
            self.trace
                .lock()
                .unwrap()
                .push(Trace::Released { id: self.id });
        }
    }

    impl Allocator for Tracking {
        type Buffer = TrackedBuffer;

        fn allocate_zeroed(&self, size: usize) -> Result<TrackedBuffer, AllocError> {
            let id = self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(id) {
                return Err(AllocError { size });
            }
            let mut units = size / encode::UNIT;
            if self.short_at == Some(id) {
                units -= 1;
            }
            self.trace
                .lock()
                .unwrap()
                .push(Trace::Allocated { id, size });
            Ok(TrackedBuffer {
                id,
                units: vec![0; units],
                trace: Arc::clone(&self.trace),
            })
        }
    }

    fn decode(data: &[u8]) -> Vec<u16> {
        data.chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    fn wide(text: &str) -> Vec<u16> {
        text.encode_utf16().chain(Some(0)).collect()
    }

    #[test]
    fn ignores_other_events() {
        let services = Recorder::default();
        let allocator = Tracking::default();
        let interceptor = Interceptor::with_allocator(&services, &allocator);

        for event in [
            RestartEvent::new(EventKind::Halt, Some(&b"recovery"[..])),
            RestartEvent::new(EventKind::PowerOff, Some(&b"recovery"[..])),
            RestartEvent::new(EventKind::Restart, None),
            RestartEvent::new(EventKind::Restart, Some(&b""[..])),
        ] {
            assert_eq!(interceptor.on_event(&event), Outcome::NotHandled);
        }
        assert!(allocator.trace().is_empty());
        assert!(services.calls().is_empty());
    }

    #[test]
    fn writes_the_command() {
        let services = Recorder::default();
        let allocator = Tracking::default();
        let interceptor = Interceptor::with_allocator(&services, &allocator);

        let outcome = interceptor.on_event(&RestartEvent::restart(b"reboot-to-recovery"));
        assert_eq!(outcome, Outcome::Handled);

        let calls = services.calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.name, wide("LoaderEntryOneShot"));
        assert_eq!(call.vendor, LOADER_GUID);
        assert_eq!(call.attributes.bits(), 0x7);
        assert_eq!(call.data.len(), (18 + 1) * 2);
        assert_eq!(decode(&call.data), wide("reboot-to-recovery"));

        assert_eq!(
            allocator.trace(),
            [
                Trace::Allocated { id: 0, size: 38 },
                Trace::Allocated { id: 1, size: 38 },
                Trace::Released { id: 1 },
                Trace::Released { id: 0 },
            ]
        );
    }

    #[test]
    fn name_allocation_failure() {
        let services = Recorder::default();
        let allocator = Tracking::failing_at(0);
        let interceptor = Interceptor::with_allocator(&services, &allocator);

        let outcome = interceptor.on_event(&RestartEvent::restart(b"recovery"));
        assert_eq!(outcome, Outcome::NotHandled);
        assert_eq!(allocator.assert_released(), 0);
        assert!(services.calls().is_empty());
    }

    #[test]
    fn command_allocation_failure() {
        let services = Recorder::default();
        let allocator = Tracking::failing_at(1);
        let interceptor = Interceptor::with_allocator(&services, &allocator);

        let outcome = interceptor.on_event(&RestartEvent::restart(b"recovery"));
        assert_eq!(outcome, Outcome::NotHandled);
        assert_eq!(allocator.assert_released(), 1);
        assert!(services.calls().is_empty());
    }

    #[test]
    fn name_encoding_mismatch() {
        let services = Recorder::default();
        let allocator = Tracking::short_at(0);
        let interceptor = Interceptor::with_allocator(&services, &allocator);

        let outcome = interceptor.on_event(&RestartEvent::restart(b"recovery"));
        assert_eq!(outcome, Outcome::NotHandled);
        assert_eq!(allocator.assert_released(), 2);
        assert!(services.calls().is_empty());
    }

    #[test]
    fn command_encoding_mismatch() {
        let services = Recorder::default();
        let allocator = Tracking::short_at(1);
        let interceptor = Interceptor::with_allocator(&services, &allocator);

        let outcome = interceptor.on_event(&RestartEvent::restart(b"recovery"));
        assert_eq!(outcome, Outcome::NotHandled);
        assert_eq!(allocator.assert_released(), 2);
        assert!(services.calls().is_empty());
    }

    #[test]
    fn embedded_null_is_rejected() {
        let services = Recorder::default();
        let allocator = Tracking::default();
        let interceptor = Interceptor::with_allocator(&services, &allocator);

        let outcome = interceptor.on_event(&RestartEvent::restart(b"reco\0very"));
        assert_eq!(outcome, Outcome::NotHandled);
        assert_eq!(allocator.assert_released(), 2);
        assert!(services.calls().is_empty());
    }

    #[test]
    fn firmware_failure() {
        let services = Recorder::rejecting(Status::OUT_OF_RESOURCES);
        let allocator = Tracking::default();
        let interceptor = Interceptor::with_allocator(&services, &allocator);

        let outcome = interceptor.on_event(&RestartEvent::restart(b"recovery"));
        assert_eq!(outcome, Outcome::NotHandled);
        assert_eq!(allocator.assert_released(), 2);
        assert_eq!(services.calls().len(), 1);
    }

    #[test]
    fn independent_invocations() {
        let services = Recorder::default();
        let allocator = Tracking::default();
        let interceptor = Interceptor::with_allocator(&services, &allocator);

        let event = RestartEvent::restart(b"windows");
        assert_eq!(interceptor.on_event(&event), Outcome::Handled);
        assert_eq!(interceptor.on_event(&event), Outcome::Handled);

        let calls = services.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
        assert_eq!(decode(&calls[1].data), wide("windows"));
        assert_eq!(allocator.assert_released(), 4);
    }

    #[test]
    fn heap_buffers() {
        let services = Recorder::default();
        let interceptor = Interceptor::new(&services);

        let outcome = interceptor.on_event(&RestartEvent::restart(b"auto-efi-shell"));
        assert_eq!(outcome, Outcome::Handled);
        let calls = services.calls();
        assert_eq!(calls[0].name, wide(LOADER_ENTRY_ONE_SHOT));
        assert_eq!(decode(&calls[0].data), wide("auto-efi-shell"));
    }

    #[test]
    fn failure_messages() {
        let failure = Failure::Encoding {
            what: "command",
            expected: 9,
            written: 4,
        };
        assert_eq!(
            failure.to_string(),
            "failed to convert the command to a wide string: 4 of 9 characters converted"
        );
        assert!(Failure::Firmware(Status::NOT_FOUND)
            .to_string()
            .starts_with("set_variable() failed: not found"));
    }
}
