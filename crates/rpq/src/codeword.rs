//! Storage type for one subcode / one byte of a packed term2 tail.

/// Code element type: `u8` in the common case, `u16` when `nbits` exceeds
/// 8 and a wider subcode index is needed.
pub trait CodeWord: Copy + Default + Send + Sync + 'static {
    const SIZE: usize;
    fn from_index(i: usize) -> Self;
    fn to_index(self) -> usize;
    fn write_le(self, out: &mut Vec<u8>);
    fn read_le(bytes: &[u8]) -> Self;
}

impl CodeWord for u8 {
    const SIZE: usize = 1;
    fn from_index(i: usize) -> Self {
        i as u8
    }
    fn to_index(self) -> usize {
        self as usize
    }
    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self);
    }
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl CodeWord for u16 {
    const SIZE: usize = 2;
    fn from_index(i: usize) -> Self {
        i as u16
    }
    fn to_index(self) -> usize {
        self as usize
    }
    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
    fn read_le(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

/// Number of `U` slots needed to hold one packed `f32` (the L2 term2
/// tail): `sizeof(f32) / sizeof(U)`.
pub fn f32_tail_width<U: CodeWord>() -> usize {
    std::mem::size_of::<f32>() / U::SIZE
}

/// Packs `value` into `width` trailing `U` code slots, little-endian.
pub fn pack_f32_tail<U: CodeWord>(value: f32, width: usize) -> Vec<U> {
    let bytes = value.to_le_bytes();
    let unit = U::SIZE;
    (0..width).map(|i| U::read_le(&bytes[i * unit..(i + 1) * unit])).collect()
}

/// Inverse of `pack_f32_tail`.
pub fn unpack_f32_tail<U: CodeWord>(slots: &[U]) -> f32 {
    let mut bytes = [0u8; 4];
    let mut buf = Vec::with_capacity(4);
    for &s in slots {
        s.write_le(&mut buf);
    }
    bytes.copy_from_slice(&buf[..4]);
    f32::from_le_bytes(bytes)
}
