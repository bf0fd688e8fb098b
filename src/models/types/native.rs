use std::fmt::Debug;

/// Fixed-width little-endian value types that can be read from, and written to, raw buffers.
pub trait NativeType: Copy + PartialEq + Debug + Send + Sync + 'static {
    /// Width in bytes.
    const WIDTH: usize;

    /// Decode from exactly `WIDTH` little-endian bytes.
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// Append the little-endian encoding to `out`.
    fn extend_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_native {
    ($($t:ty),*) => {
        $(
            impl NativeType for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();

                #[inline]
                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes[..Self::WIDTH]);
                    <$t>::from_le_bytes(raw)
                }

                #[inline]
                fn extend_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_native!(i8, i16, i32, i64, i128, u8, u16, u32, u64, f32, f64);
