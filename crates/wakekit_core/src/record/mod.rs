//! Versioned binary record store.
//!
//! A saved record is a fixed-layout byte image: a 16-byte header
//! (magic, version, size) followed by application fields at fixed offsets.
//! [`RecordSchema`] describes the fields, [`RecordStore`] holds the image
//! and persists it through a [`wakekit_storage::StorageBackend`].
//!
//! ## Invariants
//!
//! - A record failing magic/version/size checks is never partially
//!   trusted; it is replaced by a zero-filled default
//! - A shorter saved record is zero-padded up to the current layout size
//! - Field access outside the record reads zero and writes nothing

mod layout;
mod store;
mod value;
mod wake;

pub use layout::{
    Field, FieldSpec, RecordHeader, RecordLayout, RecordSchema, SchemaBuilder, StringField,
    HEADER_SIZE,
};
pub use store::RecordStore;
pub use value::{FieldKind, FieldValue};
pub use wake::{WakeRecord, WAKE_RECORD_MAGIC, WAKE_RECORD_VERSION};
