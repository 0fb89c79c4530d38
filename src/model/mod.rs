pub mod project;
pub mod task;
pub mod timeline;

pub use project::Project;
pub use task::{
    parse_date, Dependency, DependencyId, DependencyKind, Lane, LaneId, ModelError, Task,
    TaskEdge, TaskId, TaskRecord,
};
pub use timeline::{Bound, TimelineScale, TimelineTick, TimelineViewport, ViewWindow};
