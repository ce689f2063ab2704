//! Schema Registry, Value Casts & Validators (spec §4.1, §4.2) and the
//! `Record`/`Class`/`Property` data model (spec §3).

pub mod cast;
pub mod class;
pub mod error;
pub mod property;
pub mod record;
pub mod registry;
pub mod rid;

pub use class::Class;
pub use error::{SchemaError, SchemaResult};
pub use property::{Property, PropertyDefault, PropertyType};
pub use record::{Record, RecordMeta};
pub use registry::{DbClassDescription, FormatOptions, SchemaRegistry};
pub use rid::RecordId;
