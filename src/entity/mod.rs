//! Entity data: typed records and raw triple captures

mod raw;
mod record;
mod value;

pub use raw::{RawRecord, RawRepository, RawValues};
pub use record::{FieldItem, LanguageItems, Record, LANGCODE_DEFAULT};
pub use value::FieldValue;
