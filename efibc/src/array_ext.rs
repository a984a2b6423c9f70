/// A helper trait to hand [u16] slices over to byte oriented interfaces.
pub trait U16SliceExt {
    /// Puts every unit into little-endian order, the byte order of UEFI, and
    /// returns the object as a [u8] slice, twice as long.
    ///
    /// The units are converted in place, so the slice must not be read as
    /// [u16] afterwards on big-endian hosts.
    fn le_u8(&mut self) -> &[u8];
}

impl U16SliceExt for [u16] {
    fn le_u8(&mut self) -> &[u8] {
        for unit in self.iter_mut() {
            *unit = unit.to_le();
        }
        let length = std::mem::size_of_val(self);
        let begin = self.as_ptr().cast::<u8>();
        // The operation is safe because u16 has stronger align requirements
        // than u8, and `length` covers exactly the memory of the slice.
        unsafe { std::slice::from_raw_parts(begin, length) }
    }
}

#[cfg(test)]
#[test]
fn check_bytes() {
    let mut wide = [0x0061u16, 0x0102, 0];
    let expected: Vec<u8> = wide.iter().flat_map(|unit| unit.to_le_bytes()).collect();
    assert_eq!(wide.le_u8(), expected);
    assert_eq!(expected, [0x61, 0, 0x02, 0x01, 0, 0]);
}
