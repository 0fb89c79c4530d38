use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type TaskId = Uuid;
pub type LaneId = Uuid;
pub type DependencyId = Uuid;

/// Errors raised while turning editing-layer input into model values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Task {task}: unparseable {field} date '{value}'")]
    InvalidDate {
        task: TaskId,
        field: &'static str,
        value: String,
    },

    #[error("Task {task}: start {start} is after end {end}")]
    InvertedRange {
        task: TaskId,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// Represents the type of dependency between two tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

/// Which edge of a task bar a date or connector refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskEdge {
    Start,
    Finish,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 4] = [
        DependencyKind::FinishToStart,
        DependencyKind::StartToStart,
        DependencyKind::FinishToFinish,
        DependencyKind::StartToFinish,
    ];

    /// Edge of the predecessor the constraint is measured from.
    pub fn source_edge(self) -> TaskEdge {
        match self {
            DependencyKind::FinishToStart | DependencyKind::FinishToFinish => TaskEdge::Finish,
            DependencyKind::StartToStart | DependencyKind::StartToFinish => TaskEdge::Start,
        }
    }

    /// Edge of the successor the constraint applies to.
    pub fn target_edge(self) -> TaskEdge {
        match self {
            DependencyKind::FinishToStart | DependencyKind::StartToStart => TaskEdge::Start,
            DependencyKind::FinishToFinish | DependencyKind::StartToFinish => TaskEdge::Finish,
        }
    }
}

/// A dependency link between two tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub id: DependencyId,
    pub from_task: TaskId,
    pub to_task: TaskId,
    pub kind: DependencyKind,
    /// Signed offset in days applied on top of the kind's constraint.
    #[serde(default)]
    pub lag_days: i64,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Dependency {
    pub fn new(from_task: TaskId, to_task: TaskId, kind: DependencyKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_task,
            to_task,
            kind,
            lag_days: 0,
            visible: true,
        }
    }

    pub fn with_lag(mut self, lag_days: i64) -> Self {
        self.lag_days = lag_days;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.from_task == self.to_task
    }

    pub fn touches(&self, task: TaskId) -> bool {
        self.from_task == task || self.to_task == task
    }
}

/// A single task or milestone in the Gantt chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub start: NaiveDate,
    /// Finish boundary. `None` marks a point-in-time milestone.
    pub end: Option<NaiveDate>,
    pub lane: LaneId,
    /// Free-form attributes owned by the editing layer (status, progress, color...).
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Task {
    pub fn new(name: impl Into<String>, start: NaiveDate, end: NaiveDate, lane: LaneId) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            start,
            end: Some(end),
            lane,
            attributes: BTreeMap::new(),
        }
    }

    /// Create a new milestone.
    pub fn new_milestone(name: impl Into<String>, date: NaiveDate, lane: LaneId) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            start: date,
            end: None,
            lane,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn is_milestone(&self) -> bool {
        self.end.is_none()
    }

    /// Finish boundary; a milestone finishes where it starts.
    pub fn finish(&self) -> NaiveDate {
        self.end.unwrap_or(self.start)
    }

    pub fn edge_date(&self, edge: TaskEdge) -> NaiveDate {
        match edge {
            TaskEdge::Start => self.start,
            TaskEdge::Finish => self.finish(),
        }
    }

    /// Length in whole days, zero for milestones.
    pub fn duration_days(&self) -> i64 {
        (self.finish() - self.start).num_days()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match self.end {
            Some(end) if end < self.start => Err(ModelError::InvertedRange {
                task: self.id,
                start: self.start,
                end,
            }),
            _ => Ok(()),
        }
    }
}

/// Raw task as handed over by the editing layer, dates still unparsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub name: String,
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    pub lane: LaneId,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<TaskRecord> for Task {
    type Error = ModelError;

    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        let start = parse_date(&record.start).ok_or_else(|| ModelError::InvalidDate {
            task: record.id,
            field: "start",
            value: record.start.clone(),
        })?;
        let end = match record.end.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_date(raw).ok_or_else(|| ModelError::InvalidDate {
                task: record.id,
                field: "end",
                value: raw.to_string(),
            })?),
        };

        let task = Task {
            id: record.id,
            name: record.name,
            start,
            end,
            lane: record.lane,
            attributes: record.attributes,
        };
        task.validate()?;
        Ok(task)
    }
}

/// Try parsing a date string with several common formats.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    for fmt in &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d", "%m-%d-%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    None
}

/// A horizontal track holding an ordered set of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lane {
    pub id: LaneId,
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<TaskId>,
    /// Row the lane is drawn on, top to bottom.
    pub index: usize,
}

impl Lane {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tasks: Vec::new(),
            index,
        }
    }
}
