//! Record header, layout and field schema.
//!
//! ## Header Format
//!
//! ```text
//! ┌──────────┬─────────┬──────┬──────────┬──────────┐
//! │ magic(4) │ ver(2)  │ sz(2)│ rsvd(4)  │ rsvd(4)  │
//! └──────────┴─────────┴──────┴──────────┴──────────┘
//! ```
//!
//! Application fields follow the header at fixed offsets. `sz` is the size
//! of the whole record, header included, as written by the firmware that
//! saved it. All integers are host-native byte order.

use super::value::{FieldKind, FieldValue};
use crate::error::{CoreError, CoreResult};
use std::marker::PhantomData;

/// Size of the record header in bytes.
pub const HEADER_SIZE: usize = 16;

const MAGIC_RANGE: std::ops::Range<usize> = 0..4;
const VERSION_RANGE: std::ops::Range<usize> = 4..6;
const SIZE_RANGE: std::ops::Range<usize> = 6..8;

/// Decoded record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Magic number identifying the record type.
    pub magic: u32,
    /// Layout version.
    pub version: u16,
    /// Size of the record, header included.
    pub size: u16,
}

impl RecordHeader {
    /// Reads a header from the start of `bytes`.
    ///
    /// Returns `None` if `bytes` is shorter than [`HEADER_SIZE`].
    #[must_use]
    pub fn read(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            magic: u32::decode(&bytes[MAGIC_RANGE]),
            version: u16::decode(&bytes[VERSION_RANGE]),
            size: u16::decode(&bytes[SIZE_RANGE]),
        })
    }

    /// Writes the header to the start of `bytes`, leaving reserved bytes.
    ///
    /// `bytes` must be at least [`HEADER_SIZE`] long.
    pub fn write(&self, bytes: &mut [u8]) {
        self.magic.encode(&mut bytes[MAGIC_RANGE]);
        self.version.encode(&mut bytes[VERSION_RANGE]);
        self.size.encode(&mut bytes[SIZE_RANGE]);
    }

    /// Rewrites only the size field.
    pub(crate) fn write_size(bytes: &mut [u8], size: u16) {
        size.encode(&mut bytes[SIZE_RANGE]);
    }
}

/// Identity and size of a saved record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    magic: u32,
    version: u16,
    size: u16,
}

impl RecordLayout {
    /// Creates a layout.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is smaller than the header or does not
    /// fit the header's 16-bit size field.
    pub fn new(magic: u32, version: u16, size: usize) -> CoreResult<Self> {
        if size < HEADER_SIZE {
            return Err(CoreError::invalid_layout(format!(
                "record size {size} is smaller than the {HEADER_SIZE}-byte header"
            )));
        }
        let size = u16::try_from(size).map_err(|_| {
            CoreError::invalid_layout(format!("record size {size} exceeds {}", u16::MAX))
        })?;
        Ok(Self {
            magic,
            version,
            size,
        })
    }

    /// Returns the magic number.
    #[must_use]
    pub const fn magic(&self) -> u32 {
        self.magic
    }

    /// Returns the layout version.
    #[must_use]
    pub const fn version(&self) -> u16 {
        self.version
    }

    /// Returns the full record size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size as usize
    }

    /// Returns the header a freshly initialized record carries.
    #[must_use]
    pub const fn header(&self) -> RecordHeader {
        RecordHeader {
            magic: self.magic,
            version: self.version,
            size: self.size,
        }
    }
}

/// Typed handle to a scalar field at a fixed offset.
pub struct Field<T> {
    offset: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field").field("offset", &self.offset).finish()
    }
}

impl<T: FieldValue> Field<T> {
    /// Creates a handle for a field at `offset`.
    ///
    /// Prefer [`RecordSchema::field`]; this exists for hand-written layouts.
    #[must_use]
    pub const fn at(offset: usize) -> Self {
        Self {
            offset,
            _marker: PhantomData,
        }
    }

    /// Returns the byte offset of the field.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

/// Handle to a fixed-width, NUL-terminated string field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringField {
    /// Byte offset of the field.
    pub offset: usize,
    /// Width of the field in bytes, terminator included.
    pub width: usize,
}

/// One entry of a [`RecordSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Byte offset from the start of the record.
    pub offset: usize,
    /// Width in bytes.
    pub width: usize,
    /// Value type.
    pub kind: FieldKind,
}

/// Named fields of a record, laid out like the equivalent C struct.
///
/// Fields are placed in declaration order after the header, each at its
/// natural alignment, and the total size is rounded up to the largest
/// alignment. Fields may only ever be appended: inserting, removing or
/// resizing a field moves later offsets and makes old records read back as
/// garbage. Appending is safe without bumping the version, since shorter
/// saved records are zero-padded on load.
///
/// # Example
///
/// ```rust
/// use wakekit_core::record::RecordSchema;
///
/// let schema = RecordSchema::builder(0x20a9_9e73, 1)
///     .field::<i32>("count")
///     .field::<bool>("enabled")
///     .field::<f64>("reading")
///     .string("label", 10)
///     .build()
///     .unwrap();
///
/// assert_eq!(schema.layout().size(), 48);
/// let reading = schema.field::<f64>("reading").unwrap();
/// assert_eq!(reading.offset(), 24);
/// ```
#[derive(Debug, Clone)]
pub struct RecordSchema {
    layout: RecordLayout,
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    /// Starts a schema with the given identity.
    #[must_use]
    pub fn builder(magic: u32, version: u16) -> SchemaBuilder {
        SchemaBuilder {
            magic,
            version,
            cursor: HEADER_SIZE,
            max_align: 4,
            fields: Vec::new(),
        }
    }

    /// Returns the record layout.
    #[must_use]
    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Returns all fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks up a scalar field by name.
    ///
    /// Returns `None` if there is no such field or its type is not `T`.
    #[must_use]
    pub fn field<T: FieldValue>(&self, name: &str) -> Option<Field<T>> {
        self.fields
            .iter()
            .find(|f| f.name == name && f.kind == T::KIND)
            .map(|f| Field::at(f.offset))
    }

    /// Looks up a string field by name.
    #[must_use]
    pub fn string_field(&self, name: &str) -> Option<StringField> {
        self.fields
            .iter()
            .find(|f| f.name == name && f.kind == FieldKind::Str)
            .map(|f| StringField {
                offset: f.offset,
                width: f.width,
            })
    }
}

/// Builder for [`RecordSchema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    magic: u32,
    version: u16,
    cursor: usize,
    max_align: usize,
    fields: Vec<FieldSpec>,
}

impl SchemaBuilder {
    /// Appends a scalar field.
    #[must_use]
    pub fn field<T: FieldValue>(self, name: &str) -> Self {
        self.push(name, T::KIND, T::WIDTH, T::ALIGN)
    }

    /// Appends a string field of `width` bytes, terminator included.
    #[must_use]
    pub fn string(self, name: &str, width: usize) -> Self {
        self.push(name, FieldKind::Str, width, 1)
    }

    fn push(mut self, name: &str, kind: FieldKind, width: usize, align: usize) -> Self {
        let offset = self.cursor.next_multiple_of(align);
        self.cursor = offset + width;
        self.max_align = self.max_align.max(align);
        self.fields.push(FieldSpec {
            name: name.to_string(),
            offset,
            width,
            kind,
        });
        self
    }

    /// Finishes the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if two fields share a name, a string field has zero
    /// width, or the record outgrows the 16-bit size field.
    pub fn build(self) -> CoreResult<RecordSchema> {
        for (i, field) in self.fields.iter().enumerate() {
            if field.width == 0 {
                return Err(CoreError::invalid_layout(format!(
                    "field '{}' has zero width",
                    field.name
                )));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(CoreError::invalid_layout(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
        }

        let size = self.cursor.next_multiple_of(self.max_align);
        Ok(RecordSchema {
            layout: RecordLayout::new(self.magic, self.version, size)?,
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = RecordHeader {
            magic: 0xd82c_b5a4,
            version: 3,
            size: 48,
        };
        let mut bytes = [0xeeu8; HEADER_SIZE];
        header.write(&mut bytes);

        assert_eq!(RecordHeader::read(&bytes), Some(header));
        assert_eq!(&bytes[8..], &[0xee; 8], "reserved bytes untouched");
    }

    #[test]
    fn header_needs_full_length() {
        assert_eq!(RecordHeader::read(&[0u8; HEADER_SIZE - 1]), None);
    }

    #[test]
    fn layout_bounds() {
        assert!(RecordLayout::new(1, 1, HEADER_SIZE - 1).is_err());
        assert!(RecordLayout::new(1, 1, 70_000).is_err());
        let layout = RecordLayout::new(1, 2, HEADER_SIZE).unwrap();
        assert_eq!(layout.size(), HEADER_SIZE);
        assert_eq!(layout.header().version, 2);
    }

    #[test]
    fn schema_matches_c_struct_layout() {
        let schema = RecordSchema::builder(0x20a9_9e73, 1)
            .field::<i32>("test1")
            .field::<bool>("test2")
            .field::<f64>("test3")
            .string("test4", 10)
            .build()
            .unwrap();

        let offsets: Vec<_> = schema.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![16, 20, 24, 32]);
        assert_eq!(schema.layout().size(), 48);
    }

    #[test]
    fn header_only_schema() {
        let schema = RecordSchema::builder(7, 1).build().unwrap();
        assert_eq!(schema.layout().size(), HEADER_SIZE);
        assert!(schema.fields().is_empty());
    }

    #[test]
    fn lookup_checks_type() {
        let schema = RecordSchema::builder(1, 1)
            .field::<u16>("a")
            .string("s", 4)
            .build()
            .unwrap();

        assert!(schema.field::<u16>("a").is_some());
        assert!(schema.field::<u32>("a").is_none());
        assert!(schema.field::<u16>("missing").is_none());
        assert_eq!(
            schema.string_field("s"),
            Some(StringField {
                offset: 18,
                width: 4
            })
        );
        assert!(schema.string_field("a").is_none());
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = RecordSchema::builder(1, 1)
            .field::<u8>("x")
            .field::<u8>("x")
            .build();
        assert!(matches!(result, Err(CoreError::InvalidLayout { .. })));
    }

    #[test]
    fn zero_width_string_rejected() {
        assert!(RecordSchema::builder(1, 1).string("s", 0).build().is_err());
    }

    #[test]
    fn oversized_schema_rejected() {
        assert!(RecordSchema::builder(1, 1)
            .string("blob", 70_000)
            .build()
            .is_err());
    }
}
