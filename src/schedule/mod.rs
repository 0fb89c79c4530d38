pub mod critical_path;
pub mod graph;

pub use critical_path::{calculate_critical_path, CriticalPathResult, TaskTiming};
pub use graph::{DependencyGraph, Edge, ScheduleWarning};
