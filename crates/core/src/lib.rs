pub mod aggregate;
pub mod error;
pub mod field_value;
pub mod ids;
pub mod presets;
pub mod propagation;
pub mod schema;
pub mod time;
pub mod validation;
pub mod values;
pub mod visibility;

pub use aggregate::{Balance, Derived, Person, Reducer};
pub use error::CoreError;
pub use field_value::FieldValue;
pub use ids::*;
pub use propagation::{Applied, EditResult, FeedSchedule, FeedSlot, Rejected, TonnageSeries};
pub use schema::{Field, FieldKind, Group, SchemaModel, Tab};
pub use time::TimeAxis;
pub use validation::{SchemaIssue, ValueIssue};
pub use values::{Snapshot, ValueStore};
