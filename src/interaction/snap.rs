//! Drag and resize of task bars.
//!
//! The interaction is an explicit state machine. Every transition consumes
//! the current state and returns the next one; nothing is mutated in place,
//! so an editing layer can drop or replay states freely. Candidates are
//! always computed from the snapshot taken when the gesture began plus the
//! cumulative pointer delta, never from the previous candidate.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::config::SnapConfig;
use crate::model::timeline::shift_days;
use crate::model::{LaneId, ModelError, Project, Task, TaskEdge, TaskId, TimelineViewport};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InteractionError {
    #[error("An interaction is already in progress for task {0}")]
    AlreadyActive(TaskId),

    #[error("Task {0} is a milestone and cannot be resized")]
    PointTaskResize(TaskId),

    #[error("Task cannot be moved: {0}")]
    InvalidTask(#[from] ModelError),
}

/// Dates and row of a task when the gesture began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragSnapshot {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub row: usize,
}

impl DragSnapshot {
    pub fn of(task: &Task, row: usize) -> Self {
        Self {
            start: task.start,
            end: task.end,
            row,
        }
    }

    fn edge_date(&self, edge: TaskEdge) -> NaiveDate {
        match edge {
            TaskEdge::Start => self.start,
            TaskEdge::Finish => self.end.unwrap_or(self.start),
        }
    }

    fn duration_days(&self) -> i64 {
        self.end.map_or(0, |end| (end - self.start).num_days())
    }
}

/// A task boundary other bars can be pulled onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapTarget {
    pub task: TaskId,
    pub edge: TaskEdge,
    pub date: NaiveDate,
    pub row: usize,
}

/// Proposed dates for the task under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    /// Whole-day offset of the moving edge from its original date.
    pub day_delta: i64,
    /// The boundary this candidate was pulled onto, if any.
    pub snapped_to: Option<SnapTarget>,
}

impl Candidate {
    fn unchanged(original: &DragSnapshot) -> Self {
        Self {
            start: original.start,
            end: original.end,
            day_delta: 0,
            snapped_to: None,
        }
    }

    /// Write the candidate dates into `task`.
    pub fn apply_to(&self, task: &mut Task) {
        task.start = self.start;
        task.end = self.end;
    }
}

/// What a finished gesture hands back for the editing layer to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub task: TaskId,
    pub candidate: Candidate,
}

/// Everything a pointer move needs besides the state itself.
#[derive(Debug, Clone, Copy)]
pub struct SnapContext<'a> {
    pub viewport: &'a TimelineViewport,
    pub config: &'a SnapConfig,
    pub targets: &'a [SnapTarget],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionState {
    #[default]
    Idle,
    Dragging {
        task: TaskId,
        original: DragSnapshot,
        candidate: Candidate,
    },
    Resizing {
        task: TaskId,
        edge: TaskEdge,
        original: DragSnapshot,
        candidate: Candidate,
    },
}

impl InteractionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, InteractionState::Idle)
    }

    pub fn active_task(&self) -> Option<TaskId> {
        match self {
            InteractionState::Idle => None,
            InteractionState::Dragging { task, .. } | InteractionState::Resizing { task, .. } => {
                Some(*task)
            }
        }
    }

    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            InteractionState::Idle => None,
            InteractionState::Dragging { candidate, .. }
            | InteractionState::Resizing { candidate, .. } => Some(candidate),
        }
    }

    /// Pick up a whole bar (or milestone) to move it.
    pub fn begin_drag(self, task: &Task, row: usize) -> Result<Self, InteractionError> {
        self.ensure_idle()?;
        task.validate()?;
        let original = DragSnapshot::of(task, row);
        trace!(task = %task.id, "drag started");
        Ok(InteractionState::Dragging {
            task: task.id,
            original,
            candidate: Candidate::unchanged(&original),
        })
    }

    /// Grab one edge of a bar to change its length.
    pub fn begin_resize(
        self,
        task: &Task,
        row: usize,
        edge: TaskEdge,
    ) -> Result<Self, InteractionError> {
        self.ensure_idle()?;
        task.validate()?;
        if task.is_milestone() {
            return Err(InteractionError::PointTaskResize(task.id));
        }
        let original = DragSnapshot::of(task, row);
        trace!(task = %task.id, ?edge, "resize started");
        Ok(InteractionState::Resizing {
            task: task.id,
            edge,
            original,
            candidate: Candidate::unchanged(&original),
        })
    }

    /// Recompute the candidate for a cumulative horizontal pointer delta.
    pub fn pointer_moved(self, delta_x: f32, ctx: &SnapContext<'_>) -> Self {
        match self {
            InteractionState::Idle => self,
            InteractionState::Dragging { task, original, .. } => {
                let candidate = drag_candidate(task, &original, delta_x, ctx);
                trace!(%task, delta_x, ?candidate, "drag moved");
                InteractionState::Dragging {
                    task,
                    original,
                    candidate,
                }
            }
            InteractionState::Resizing {
                task,
                edge,
                original,
                ..
            } => {
                let candidate = resize_candidate(task, edge, &original, delta_x, ctx);
                trace!(%task, delta_x, ?candidate, "resize moved");
                InteractionState::Resizing {
                    task,
                    edge,
                    original,
                    candidate,
                }
            }
        }
    }

    /// End the gesture and hand back the last candidate.
    pub fn release(self) -> (Self, Option<Commit>) {
        let commit = match self {
            InteractionState::Idle => None,
            InteractionState::Dragging {
                task, candidate, ..
            }
            | InteractionState::Resizing {
                task, candidate, ..
            } => Some(Commit { task, candidate }),
        };
        if let Some(commit) = &commit {
            trace!(task = %commit.task, "interaction released");
        }
        (InteractionState::Idle, commit)
    }

    /// Abort the gesture; the original dates stay as they were.
    pub fn cancel(self) -> Self {
        if let Some(task) = self.active_task() {
            trace!(%task, "interaction cancelled");
        }
        InteractionState::Idle
    }

    fn ensure_idle(&self) -> Result<(), InteractionError> {
        match self.active_task() {
            Some(task) => Err(InteractionError::AlreadyActive(task)),
            None => Ok(()),
        }
    }
}

/// Boundaries of every valid task except `moving`, in project order.
pub fn collect_targets(project: &Project, moving: TaskId) -> Vec<SnapTarget> {
    let rows: HashMap<LaneId, usize> = project.lane_rows();
    let mut targets = Vec::new();
    for task in &project.tasks {
        if task.id == moving || task.validate().is_err() {
            continue;
        }
        let Some(&row) = rows.get(&task.lane) else {
            continue;
        };
        targets.push(SnapTarget {
            task: task.id,
            edge: TaskEdge::Start,
            date: task.start,
            row,
        });
        if !task.is_milestone() {
            targets.push(SnapTarget {
                task: task.id,
                edge: TaskEdge::Finish,
                date: task.finish(),
                row,
            });
        }
    }
    targets
}

/// Whole days covered by a pixel delta, rounded to the nearest day.
pub fn drag_days(delta_x: f32, pixels_per_day: f32) -> i64 {
    if !delta_x.is_finite() || !pixels_per_day.is_finite() || pixels_per_day <= 0.0 {
        return 0;
    }
    (delta_x / pixels_per_day).round() as i64
}

/// Closest target to the moving edge's unrounded position, if within reach.
fn nearest_target(
    task: TaskId,
    original: &DragSnapshot,
    edge: TaskEdge,
    delta_x: f32,
    ctx: &SnapContext<'_>,
) -> Option<(f32, SnapTarget)> {
    if !ctx.config.enabled || !delta_x.is_finite() {
        return None;
    }
    let raw_x = ctx.viewport.date_to_x(original.edge_date(edge)) + delta_x;
    let mut best: Option<(f32, SnapTarget)> = None;
    for target in ctx.targets {
        if target.task == task || target.row.abs_diff(original.row) > ctx.config.lane_reach {
            continue;
        }
        let distance = (ctx.viewport.date_to_x(target.date) - raw_x).abs();
        if distance > ctx.config.threshold_px {
            continue;
        }
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, *target));
        }
    }
    best
}

fn drag_candidate(
    task: TaskId,
    original: &DragSnapshot,
    delta_x: f32,
    ctx: &SnapContext<'_>,
) -> Candidate {
    let mut day_delta = drag_days(delta_x, ctx.viewport.pixels_per_day());
    let mut snapped_to = None;

    let edges: &[TaskEdge] = if original.end.is_some() {
        &[TaskEdge::Start, TaskEdge::Finish]
    } else {
        &[TaskEdge::Start]
    };
    let mut best: Option<(f32, TaskEdge, SnapTarget)> = None;
    for &edge in edges {
        if let Some((distance, target)) = nearest_target(task, original, edge, delta_x, ctx) {
            if best.map_or(true, |(d, _, _)| distance < d) {
                best = Some((distance, edge, target));
            }
        }
    }
    if let Some((_, edge, target)) = best {
        day_delta = (target.date - original.edge_date(edge)).num_days();
        snapped_to = Some(target);
    }

    Candidate {
        start: shift_days(original.start, day_delta),
        end: original.end.map(|end| shift_days(end, day_delta)),
        day_delta,
        snapped_to,
    }
}

fn resize_candidate(
    task: TaskId,
    edge: TaskEdge,
    original: &DragSnapshot,
    delta_x: f32,
    ctx: &SnapContext<'_>,
) -> Candidate {
    let fixed = match edge {
        TaskEdge::Start => original.edge_date(TaskEdge::Finish),
        TaskEdge::Finish => original.start,
    };
    // Keep at least a day, unless the bar started out shorter than that.
    let min_days = original.duration_days().clamp(0, 1);
    let moving = original.edge_date(edge);

    let rounded = shift_days(moving, drag_days(delta_x, ctx.viewport.pixels_per_day()));
    let (mut date, mut snapped_to) = match nearest_target(task, original, edge, delta_x, ctx) {
        Some((_, target)) => (target.date, Some(target)),
        None => (rounded, None),
    };

    let span = match edge {
        TaskEdge::Start => (fixed - date).num_days(),
        TaskEdge::Finish => (date - fixed).num_days(),
    };
    if span < min_days {
        date = match edge {
            TaskEdge::Start => shift_days(fixed, -min_days),
            TaskEdge::Finish => shift_days(fixed, min_days),
        };
        snapped_to = None;
    }

    let day_delta = (date - moving).num_days();
    match edge {
        TaskEdge::Start => Candidate {
            start: date,
            end: original.end,
            day_delta,
            snapped_to,
        },
        TaskEdge::Finish => Candidate {
            start: original.start,
            end: Some(date),
            day_delta,
            snapped_to,
        },
    }
}
