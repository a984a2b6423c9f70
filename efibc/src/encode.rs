//! Narrow to wide string conversion.
//!
//! Every byte is widened into a single [u16] unit as is. This is not a UTF-16
//! transcoder: the bootloader expects ASCII entry identifiers, and anything
//! beyond ASCII ends up as a Latin-1 code point.

/// Size of a single wide unit, in bytes.
pub const UNIT: usize = std::mem::size_of::<u16>();

/// Returns how many bytes the wide representation of `narrow` occupies,
/// including the terminating null unit.
pub const fn buffer_size_for(narrow: &[u8]) -> usize {
    (narrow.len() + 1) * UNIT
}

/// Widens `src` into `dest` and returns the amount of copied units, the
/// terminating null not included.
///
/// Copying stops at the end of `src`, at the first null byte of `src`, or when
/// only a single unit of `dest` is left, whatever comes first. The terminating
/// null is always written right after the last copied unit, so the output is
/// truncated rather than overrun when `dest` is too short.
///
/// An empty `dest` has no room even for the terminator; nothing is written
/// then.
pub fn encode(dest: &mut [u16], src: &[u8]) -> usize {
    let limit = match dest.len().checked_sub(1) {
        Some(limit) => limit,
        None => return 0,
    };
    let mut written = 0;
    for (unit, &byte) in dest
        .iter_mut()
        .zip(src.iter().take_while(|&&byte| byte != 0))
        .take(limit)
    {
        *unit = u16::from(byte);
        written += 1;
    }
    dest[written] = 0;
    written
}

/// Returns the number of units before the first null, or the whole length of
/// `wide` if it is not null-terminated.
pub fn encoded_len(wide: &[u16]) -> usize {
    wide.iter().position(|&unit| unit == 0).unwrap_or(wide.len())
}
