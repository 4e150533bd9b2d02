//! Fixed-width field value types.

/// Type tag of a record field, used to check schema lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `u8`
    U8,
    /// `i8`
    I8,
    /// `u16`
    U16,
    /// `i16`
    I16,
    /// `u32`
    U32,
    /// `i32`
    I32,
    /// `u64`
    U64,
    /// `i64`
    I64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// `bool`, stored as one byte
    Bool,
    /// NUL-terminated string in a fixed-width byte array
    Str,
}

/// A value that can live at a fixed offset in a saved record.
///
/// Values are stored in host-native byte order, like the C structs the
/// record format mirrors. Records are therefore not portable between
/// devices of different endianness.
pub trait FieldValue: Copy + Default {
    /// Type tag for schema checks.
    const KIND: FieldKind;
    /// Stored width in bytes (at most 8).
    const WIDTH: usize;
    /// Natural alignment in bytes.
    const ALIGN: usize;

    /// Decodes a value from exactly `WIDTH` bytes.
    fn decode(bytes: &[u8]) -> Self;

    /// Encodes the value into exactly `WIDTH` bytes.
    fn encode(self, out: &mut [u8]);
}

macro_rules! impl_numeric_field {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                const KIND: FieldKind = FieldKind::$kind;
                const WIDTH: usize = std::mem::size_of::<$ty>();
                const ALIGN: usize = std::mem::size_of::<$ty>();

                fn decode(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_ne_bytes(raw)
                }

                fn encode(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_numeric_field! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

impl FieldValue for bool {
    const KIND: FieldKind = FieldKind::Bool;
    const WIDTH: usize = 1;
    const ALIGN: usize = 1;

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn encode(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }
}
