//! The data model shared by every writer: a generic, tagged-value record
//! type, the paths used to address fields and directories, and the
//! declarative schema that describes how a record shreds into columns.

pub mod path;
pub mod record;
pub mod schema;
pub mod value;

pub use path::{ColumnPath, DirPath};
pub use record::{PathError, Record};
pub use schema::{MetaFlag, Message, Metadata, SchemaDef, SchemaError};
pub use value::Value;
