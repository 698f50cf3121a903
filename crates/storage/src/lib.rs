pub mod ddl;
pub mod error;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use ddl::{TableDefinition, synthesize};
pub use error::StorageError;
pub use sqlite::SqliteStorage;
pub use traits::*;
