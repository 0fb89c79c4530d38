use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::task::{Dependency, Lane, LaneId, ModelError, Task, TaskId, TaskRecord};

/// A snapshot of the plan handed over by the editing layer.
///
/// The engine never mutates a project; every computation borrows one and
/// returns fresh derived values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub tasks: Vec<Task>,
    pub lanes: Vec<Lane>,
    pub dependencies: Vec<Dependency>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Build a project from raw records, skipping the ones whose dates do not
    /// parse. The rejected records are returned alongside so the caller can
    /// surface them.
    pub fn from_records(
        name: impl Into<String>,
        records: Vec<TaskRecord>,
        lanes: Vec<Lane>,
        dependencies: Vec<Dependency>,
    ) -> (Self, Vec<ModelError>) {
        let mut tasks = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();
        for record in records {
            match Task::try_from(record) {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    warn!(error = %err, "skipping task record");
                    rejected.push(err);
                }
            }
        }

        let project = Self {
            name: name.into(),
            tasks,
            lanes,
            dependencies,
        };
        (project, rejected)
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn lane(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.iter().find(|l| l.id == id)
    }

    /// Map from lane id to the row it is drawn on.
    pub fn lane_rows(&self) -> HashMap<LaneId, usize> {
        self.lanes.iter().map(|l| (l.id, l.index)).collect()
    }

    pub fn row_of(&self, task: TaskId) -> Option<usize> {
        let task = self.task(task)?;
        self.lane(task.lane).map(|l| l.index)
    }

    /// Number of rows needed to draw every lane.
    pub fn row_count(&self) -> usize {
        self.lanes.iter().map(|l| l.index + 1).max().unwrap_or(0)
    }

    /// Stable hash over everything that affects scheduling and layout.
    ///
    /// Free-form attributes and labels are left out: they never change a
    /// computed position or the critical path.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tasks.len().hash(&mut hasher);
        for task in &self.tasks {
            task.id.hash(&mut hasher);
            task.start.hash(&mut hasher);
            task.end.hash(&mut hasher);
            task.lane.hash(&mut hasher);
        }
        self.lanes.len().hash(&mut hasher);
        for lane in &self.lanes {
            lane.id.hash(&mut hasher);
            lane.index.hash(&mut hasher);
        }
        self.dependencies.hash(&mut hasher);
        hasher.finish()
    }
}
