//! Owned wide buffers.
//!
//! Buffers are obtained through an [Allocator] so that running out of memory
//! surfaces as an error instead of aborting the process. Dropping a buffer
//! releases its memory.

use std::fmt;

use crate::encode::UNIT;

/// Divide `dividend` by `divisor` and round the result up.
pub(crate) const fn divide_up(dividend: usize, divisor: usize) -> usize {
    dividend / divisor + (dividend % divisor != 0) as usize
}

#[cfg(test)]
#[test]
fn check_division() {
    assert_eq!(divide_up(16, 2), 8);
    assert_eq!(divide_up(15, 2), 8);
}

/// Failure to obtain memory for a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError {
    /// Requested size in bytes.
    pub size: usize,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unable to allocate {} bytes", self.size)
    }
}

impl std::error::Error for AllocError {}

/// A source of zero-initialized wide buffers.
pub trait Allocator {
    /// The buffer handle. Its memory is released when it is dropped.
    type Buffer: AsRef<[u16]> + AsMut<[u16]>;

    /// Allocates a zero-initialized buffer holding `size` bytes, rounded up to
    /// whole units.
    fn allocate_zeroed(&self, size: usize) -> Result<Self::Buffer, AllocError>;
}

impl<A: Allocator + ?Sized> Allocator for &A {
    type Buffer = A::Buffer;

    fn allocate_zeroed(&self, size: usize) -> Result<Self::Buffer, AllocError> {
        (**self).allocate_zeroed(size)
    }
}

/// Allocates buffers on the heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct Heap;

impl Allocator for Heap {
    type Buffer = WideBuffer;

    fn allocate_zeroed(&self, size: usize) -> Result<WideBuffer, AllocError> {
        let units = divide_up(size, UNIT);
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(units)
            .map_err(|_| AllocError { size })?;
        buffer.resize(units, 0);
        Ok(WideBuffer(buffer))
    }
}

/// A heap allocated wide buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct WideBuffer(Vec<u16>);

impl fmt::Debug for WideBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WideBuffer({:x?})", self.0)
    }
}

impl AsRef<[u16]> for WideBuffer {
    fn as_ref(&self) -> &[u16] {
        &self.0
    }
}

impl AsMut<[u16]> for WideBuffer {
    fn as_mut(&mut self) -> &mut [u16] {
        &mut self.0
    }
}
