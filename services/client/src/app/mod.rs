pub mod attendance;
pub mod relations;
pub mod state;
pub mod views;

pub use attendance::{AttendanceView, Location, MarkKind};
pub use relations::{Relation, RelationEditor};
pub use state::AppState;
pub use views::{render, ViewKind};
