//! Field mapping
//!
//! The registry knows which predicate stores each (bundle, field, column) and
//! in which format. The codec uses it to turn field values into RDF terms and
//! back, running the value hooks on the way.

mod codec;
mod format;
mod hooks;
mod registry;

pub use codec::{CodecError, CodecResult, ValueCodec};
pub use format::ValueFormat;
pub use hooks::{TimestampDateHook, ValueContext, ValueHook};
pub use registry::{
    BundleMapping, BundleMatch, ColumnInfo, EntityTypeMapping, FieldInfo, FieldMappingRegistry,
    MappingError, MappingResult,
};
