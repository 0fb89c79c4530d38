use std::collections::{HashMap, HashSet};

use egui::{Pos2, Rect, Vec2};
use serde::Serialize;
use tracing::warn;

use crate::config::TimelineConfig;
use crate::model::{LaneId, Project, Task, TaskEdge, TaskId, TimelineViewport};
use crate::schedule::ScheduleWarning;

/// On-screen placement of one task, in chart coordinates (x from the
/// viewport start, y from the top of the first row).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BarLayout {
    pub task: TaskId,
    pub row: usize,
    /// Offset of the start date.
    pub x: f32,
    /// Exact span of the task; zero for milestones.
    pub width: f32,
    /// Hit/draw rectangle, widened to the minimum bar width.
    pub rect: Rect,
    pub milestone: bool,
}

impl BarLayout {
    /// Connection point on a bar edge, vertically centred. Milestones
    /// connect at the tips of their marker.
    pub fn anchor(&self, edge: TaskEdge) -> Pos2 {
        let y = self.rect.center().y;
        match edge {
            TaskEdge::Start => Pos2::new(self.rect.left(), y),
            TaskEdge::Finish => Pos2::new(self.rect.right(), y),
        }
    }

    /// x of the date boundary, ignoring the minimum width padding.
    pub fn edge_x(&self, edge: TaskEdge) -> f32 {
        match edge {
            TaskEdge::Start => self.x,
            TaskEdge::Finish => self.x + self.width,
        }
    }
}

pub fn row_top(row: usize, row_height: f32) -> f32 {
    row as f32 * row_height
}

/// Place a single task on its row.
pub fn layout_task(
    task: &Task,
    row: usize,
    viewport: &TimelineViewport,
    config: &TimelineConfig,
) -> BarLayout {
    let y = row_top(row, config.row_height);
    let x_start = viewport.date_to_x(task.start);

    if task.is_milestone() {
        let center = Pos2::new(x_start, y + config.row_height / 2.0);
        let size = config
            .milestone_radius
            .min(config.row_height / 2.0 - config.bar_inset)
            .max(0.0);
        return BarLayout {
            task: task.id,
            row,
            x: x_start,
            width: 0.0,
            rect: Rect::from_center_size(center, Vec2::splat(size * 2.0)),
            milestone: true,
        };
    }

    let width = viewport.bar_width(task.start, task.finish());
    let inset = config.bar_inset;
    BarLayout {
        task: task.id,
        row,
        x: x_start,
        width,
        rect: Rect::from_min_size(
            Pos2::new(x_start, y + inset),
            Vec2::new(width.max(config.min_bar_width), config.row_height - inset * 2.0),
        ),
        milestone: false,
    }
}

/// Place every drawable task. Tasks with inverted dates or an unknown lane
/// are skipped and reported, and only the first task with a given id is
/// placed, matching the dependency graph.
pub fn layout_bars(
    project: &Project,
    viewport: &TimelineViewport,
    config: &TimelineConfig,
) -> (Vec<BarLayout>, Vec<ScheduleWarning>) {
    let rows: HashMap<LaneId, usize> = project.lane_rows();
    let mut bars = Vec::with_capacity(project.tasks.len());
    let mut warnings = Vec::new();
    let mut placed = HashSet::with_capacity(project.tasks.len());

    for task in &project.tasks {
        if let Err(err) = task.validate() {
            warnings.push(ScheduleWarning::InvalidTask {
                task: task.id,
                reason: err.to_string(),
            });
            continue;
        }
        if !placed.insert(task.id) {
            warnings.push(ScheduleWarning::DuplicateTask { task: task.id });
            continue;
        }
        let Some(&row) = rows.get(&task.lane) else {
            warnings.push(ScheduleWarning::UnknownLane {
                task: task.id,
                lane: task.lane,
            });
            continue;
        };
        bars.push(layout_task(task, row, viewport, config));
    }

    for warning in &warnings {
        warn!(%warning, "task left out of layout");
    }
    (bars, warnings)
}
