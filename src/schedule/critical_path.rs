//! Critical path method over the acyclic part of the dependency graph.
//!
//! The early pass walks tasks in topological order. A task with no
//! predecessors keeps its own start date; any other task starts as early as
//! its most restrictive incoming constraint allows. The late pass runs in
//! reverse, anchored at the project finish. The project finish is the later
//! of the latest early finish and the latest committed finish, so a task that
//! sits later than it has to shows the gap as slack.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::graph::{DependencyGraph, Edge, ScheduleWarning};
use crate::model::timeline::shift_days;
use crate::model::{DependencyId, DependencyKind, Project, Task, TaskId};

/// Early/late timing of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskTiming {
    pub earliest_start: NaiveDate,
    pub earliest_finish: NaiveDate,
    pub latest_start: NaiveDate,
    pub latest_finish: NaiveDate,
    /// Days the task can slip without moving the project finish.
    pub slack_days: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CriticalPathResult {
    pub critical_tasks: BTreeSet<TaskId>,
    pub critical_dependencies: BTreeSet<DependencyId>,
    pub timings: BTreeMap<TaskId, TaskTiming>,
    pub project_start: Option<NaiveDate>,
    pub project_finish: Option<NaiveDate>,
    /// Everything left out of this pass, copied from the graph.
    pub warnings: Vec<ScheduleWarning>,
}

impl CriticalPathResult {
    /// Builds the graph for `project` and runs the calculation.
    pub fn for_project(project: &Project) -> Self {
        let graph = DependencyGraph::build(&project.tasks, &project.dependencies);
        calculate_critical_path(&project.tasks, &graph)
    }

    pub fn is_critical(&self, task: TaskId) -> bool {
        self.critical_tasks.contains(&task)
    }

    pub fn is_critical_dependency(&self, dependency: DependencyId) -> bool {
        self.critical_dependencies.contains(&dependency)
    }

    pub fn timing(&self, task: TaskId) -> Option<&TaskTiming> {
        self.timings.get(&task)
    }

    /// Overall length of the plan in days.
    pub fn duration_days(&self) -> Option<i64> {
        Some((self.project_finish? - self.project_start?).num_days())
    }
}

fn day_number(date: NaiveDate) -> i64 {
    (date - NaiveDate::default()).num_days()
}

fn from_day_number(day: i64) -> NaiveDate {
    shift_days(NaiveDate::default(), day)
}

#[derive(Debug, Clone, Copy, Default)]
struct Pass {
    start: i64,
    finish: i64,
}

/// Earliest start a single incoming edge allows for a successor of
/// `duration` days. Day arithmetic saturates so extreme lags clamp to the
/// calendar limits.
fn constrained_start(edge: &Edge, pred: Pass, duration: i64) -> i64 {
    match edge.kind {
        DependencyKind::FinishToStart => pred.finish.saturating_add(edge.lag_days),
        DependencyKind::StartToStart => pred.start.saturating_add(edge.lag_days),
        DependencyKind::FinishToFinish => pred
            .finish
            .saturating_add(edge.lag_days)
            .saturating_sub(duration),
        DependencyKind::StartToFinish => pred
            .start
            .saturating_add(edge.lag_days)
            .saturating_sub(duration),
    }
}

/// Latest finish a single outgoing edge allows for a predecessor of
/// `duration` days.
fn constrained_finish(edge: &Edge, succ: Pass, duration: i64) -> i64 {
    match edge.kind {
        DependencyKind::FinishToStart => succ.start.saturating_sub(edge.lag_days),
        DependencyKind::StartToStart => succ
            .start
            .saturating_sub(edge.lag_days)
            .saturating_add(duration),
        DependencyKind::FinishToFinish => succ.finish.saturating_sub(edge.lag_days),
        DependencyKind::StartToFinish => succ
            .finish
            .saturating_sub(edge.lag_days)
            .saturating_add(duration),
    }
}

/// Whether the early schedule meets the edge's constraint exactly.
fn is_binding(edge: &Edge, pred: Pass, succ: Pass) -> bool {
    match edge.kind {
        DependencyKind::FinishToStart => succ.start == pred.finish.saturating_add(edge.lag_days),
        DependencyKind::StartToStart => succ.start == pred.start.saturating_add(edge.lag_days),
        DependencyKind::FinishToFinish => succ.finish == pred.finish.saturating_add(edge.lag_days),
        DependencyKind::StartToFinish => succ.finish == pred.start.saturating_add(edge.lag_days),
    }
}

/// Runs the forward and backward passes.
///
/// Tasks missing from `graph` or sitting on a cycle get no timing. Tasks
/// without any usable dependency get a timing but are never critical.
pub fn calculate_critical_path(tasks: &[Task], graph: &DependencyGraph) -> CriticalPathResult {
    let mut index: HashMap<TaskId, &Task> = HashMap::with_capacity(tasks.len());
    for task in tasks {
        index.entry(task.id).or_insert(task);
    }

    let order: Vec<&Task> = graph
        .topological_order()
        .iter()
        .filter_map(|id| index.get(id).copied())
        .collect();

    let usable = |edge: &&Edge| !graph.is_cyclic(edge.from) && !graph.is_cyclic(edge.to);

    let mut early: HashMap<TaskId, Pass> = HashMap::with_capacity(order.len());
    for task in &order {
        let duration = task.duration_days();
        let start = graph
            .predecessors(task.id)
            .into_iter()
            .filter(usable)
            .filter_map(|edge| {
                let pred = early.get(&edge.from)?;
                Some(constrained_start(edge, *pred, duration))
            })
            .max()
            .unwrap_or_else(|| day_number(task.start));
        early.insert(
            task.id,
            Pass {
                start,
                finish: start.saturating_add(duration),
            },
        );
    }

    let Some(project_finish) = order
        .iter()
        .map(|t| early[&t.id].finish.max(day_number(t.finish())))
        .max()
    else {
        debug!("no schedulable tasks");
        return CriticalPathResult {
            warnings: graph.warnings().to_vec(),
            ..Default::default()
        };
    };
    let project_start = order
        .iter()
        .map(|t| early[&t.id].start.min(day_number(t.start)))
        .min()
        .unwrap_or(project_finish);

    let mut late: HashMap<TaskId, Pass> = HashMap::with_capacity(order.len());
    for task in order.iter().rev() {
        let duration = task.duration_days();
        let finish = graph
            .successors(task.id)
            .into_iter()
            .filter(usable)
            .filter_map(|edge| {
                let succ = late.get(&edge.to)?;
                Some(constrained_finish(edge, *succ, duration))
            })
            .fold(project_finish, i64::min);
        late.insert(
            task.id,
            Pass {
                start: finish.saturating_sub(duration),
                finish,
            },
        );
    }

    let connected: BTreeSet<TaskId> = graph
        .edges()
        .filter(|e| !graph.is_cyclic(e.from) && !graph.is_cyclic(e.to))
        .flat_map(|e| [e.from, e.to])
        .collect();

    let mut result = CriticalPathResult {
        project_start: Some(from_day_number(project_start)),
        project_finish: Some(from_day_number(project_finish)),
        warnings: graph.warnings().to_vec(),
        ..Default::default()
    };

    for task in &order {
        let e = early[&task.id];
        let l = late[&task.id];
        let slack = l.start.saturating_sub(e.start);
        result.timings.insert(
            task.id,
            TaskTiming {
                earliest_start: from_day_number(e.start),
                earliest_finish: from_day_number(e.finish),
                latest_start: from_day_number(l.start),
                latest_finish: from_day_number(l.finish),
                slack_days: slack,
            },
        );
        if slack == 0 && connected.contains(&task.id) {
            result.critical_tasks.insert(task.id);
        }
    }

    for edge in graph.edges() {
        if !(result.critical_tasks.contains(&edge.from) && result.critical_tasks.contains(&edge.to)) {
            continue;
        }
        if is_binding(edge, early[&edge.from], early[&edge.to]) {
            result.critical_dependencies.insert(edge.dependency);
        }
    }

    debug!(
        tasks = result.timings.len(),
        critical = result.critical_tasks.len(),
        cyclic = graph.cyclic_tasks().len(),
        duration = project_finish.saturating_sub(project_start),
        "computed critical path"
    );
    result
}
