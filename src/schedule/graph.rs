//! Dependency graph for tasks
//!
//! Validates a flat task/dependency snapshot into a directed graph. Nothing
//! in the input is fatal: tasks with broken dates, dependencies pointing at
//! unknown tasks and cycles are reported as warnings and left out of the
//! computations they would corrupt.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{Dependency, DependencyId, DependencyKind, LaneId, Task, TaskId};

/// Non-fatal findings produced while validating a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ScheduleWarning {
    #[error("Task {task} skipped: {reason}")]
    InvalidTask { task: TaskId, reason: String },

    #[error("Task {task} appears more than once; later copies are ignored")]
    DuplicateTask { task: TaskId },

    #[error("Dependency {dependency} references missing task {missing}")]
    DanglingDependency {
        dependency: DependencyId,
        missing: TaskId,
    },

    #[error("Dependency {dependency} touches skipped task {task}")]
    DependencyOnInvalidTask {
        dependency: DependencyId,
        task: TaskId,
    },

    #[error("Self-dependency not allowed: {dependency}")]
    SelfDependency { dependency: DependencyId },

    #[error("Task {task} belongs to unknown lane {lane}")]
    UnknownLane { task: TaskId, lane: LaneId },

    #[error("Cyclic dependency between tasks {tasks:?}")]
    CyclicDependency {
        tasks: Vec<TaskId>,
        dependencies: Vec<DependencyId>,
    },
}

/// A validated dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub dependency: DependencyId,
    pub from: TaskId,
    pub to: TaskId,
    pub kind: DependencyKind,
    pub lag_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    InProgress,
    Done,
}

struct Frame {
    node: NodeIndex,
    successors: Vec<(EdgeIndex, NodeIndex)>,
    next: usize,
    via: Option<EdgeIndex>,
}

/// A dependency graph for tasks
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// The underlying directed graph; edges point from predecessor to successor.
    graph: DiGraph<TaskId, Edge>,

    /// Map from TaskId to node index
    node_map: HashMap<TaskId, NodeIndex>,

    cyclic: BTreeSet<TaskId>,

    /// Topological order of the acyclic part of the graph.
    order: Vec<TaskId>,

    warnings: Vec<ScheduleWarning>,
}

impl DependencyGraph {
    /// Builds a graph from a task and dependency snapshot.
    pub fn build(tasks: &[Task], dependencies: &[Dependency]) -> Self {
        let mut graph = Self::default();
        let mut skipped = BTreeSet::new();

        // First pass: add all nodes
        for task in tasks {
            if let Err(err) = task.validate() {
                graph.warn(ScheduleWarning::InvalidTask {
                    task: task.id,
                    reason: err.to_string(),
                });
                skipped.insert(task.id);
                continue;
            }
            if graph.node_map.contains_key(&task.id) {
                graph.warn(ScheduleWarning::DuplicateTask { task: task.id });
                continue;
            }
            let idx = graph.graph.add_node(task.id);
            graph.node_map.insert(task.id, idx);
        }

        // Second pass: add all edges
        for dep in dependencies {
            if dep.is_self_loop() {
                graph.warn(ScheduleWarning::SelfDependency { dependency: dep.id });
                continue;
            }
            let Some((from, to)) = graph.endpoints(dep, &skipped) else {
                continue;
            };
            graph.graph.add_edge(
                from,
                to,
                Edge {
                    dependency: dep.id,
                    from: dep.from_task,
                    to: dep.to_task,
                    kind: dep.kind,
                    lag_days: dep.lag_days,
                },
            );
        }

        graph.detect_cycles();
        graph.order = graph.acyclic_order();

        debug!(
            tasks = graph.graph.node_count(),
            edges = graph.graph.edge_count(),
            cyclic = graph.cyclic.len(),
            warnings = graph.warnings.len(),
            "built dependency graph"
        );
        graph
    }

    fn warn(&mut self, warning: ScheduleWarning) {
        warn!(%warning, "excluding from dependency graph");
        self.warnings.push(warning);
    }

    /// Resolves both ends of a dependency, reporting the first one that is
    /// not in the graph.
    fn endpoints(
        &mut self,
        dep: &Dependency,
        skipped: &BTreeSet<TaskId>,
    ) -> Option<(NodeIndex, NodeIndex)> {
        for id in [dep.from_task, dep.to_task] {
            if self.node_map.contains_key(&id) {
                continue;
            }
            let warning = if skipped.contains(&id) {
                ScheduleWarning::DependencyOnInvalidTask {
                    dependency: dep.id,
                    task: id,
                }
            } else {
                ScheduleWarning::DanglingDependency {
                    dependency: dep.id,
                    missing: id,
                }
            };
            self.warn(warning);
            return None;
        }
        Some((self.node_map[&dep.from_task], self.node_map[&dep.to_task]))
    }

    /// Outgoing edges of a node in insertion order.
    fn outgoing(&self, node: NodeIndex) -> Vec<(EdgeIndex, NodeIndex)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (e.id(), e.target()))
            .collect();
        edges.sort_by_key(|(idx, _)| *idx);
        edges
    }

    /// Depth-first traversal tagging nodes unvisited / in progress / done.
    /// A back edge to an in-progress node is reported with the stack path
    /// from that node onwards. Membership is then widened to the whole
    /// strongly connected component, since a node can sit on a cycle whose
    /// closing edge leads into an already finished node.
    fn detect_cycles(&mut self) {
        let mut state = vec![Visit::Unvisited; self.graph.node_count()];
        let mut found = Vec::new();

        for root in self.graph.node_indices() {
            if state[root.index()] != Visit::Unvisited {
                continue;
            }
            state[root.index()] = Visit::InProgress;
            let mut stack = vec![Frame {
                node: root,
                successors: self.outgoing(root),
                next: 0,
                via: None,
            }];

            while let Some(frame) = stack.last_mut() {
                if frame.next == frame.successors.len() {
                    state[frame.node.index()] = Visit::Done;
                    stack.pop();
                    continue;
                }
                let (edge, next) = frame.successors[frame.next];
                frame.next += 1;

                match state[next.index()] {
                    Visit::Unvisited => {
                        state[next.index()] = Visit::InProgress;
                        stack.push(Frame {
                            node: next,
                            successors: self.outgoing(next),
                            next: 0,
                            via: Some(edge),
                        });
                    }
                    Visit::InProgress => {
                        let Some(start) = stack.iter().position(|f| f.node == next) else {
                            continue;
                        };
                        let path = &stack[start..];
                        let tasks: Vec<TaskId> =
                            path.iter().map(|f| self.graph[f.node]).collect();
                        let dependencies: Vec<DependencyId> = path[1..]
                            .iter()
                            .filter_map(|f| f.via)
                            .chain(std::iter::once(edge))
                            .map(|e| self.graph[e].dependency)
                            .collect();
                        found.push(ScheduleWarning::CyclicDependency {
                            tasks,
                            dependencies,
                        });
                    }
                    Visit::Done => {}
                }
            }
        }

        for warning in found {
            if let ScheduleWarning::CyclicDependency { tasks, .. } = &warning {
                self.cyclic.extend(tasks.iter().copied());
            }
            self.warn(warning);
        }

        for component in tarjan_scc(&self.graph) {
            if component.len() > 1 {
                self.cyclic
                    .extend(component.into_iter().map(|idx| self.graph[idx]));
            }
        }
    }

    fn acyclic_order(&self) -> Vec<TaskId> {
        let acyclic = self.graph.filter_map(
            |_, id| (!self.cyclic.contains(id)).then_some(*id),
            |_, edge| Some(*edge),
        );
        match toposort(&acyclic, None) {
            Ok(order) => order.into_iter().map(|idx| acyclic[idx]).collect(),
            Err(cycle) => {
                // Unreachable once cyclic nodes are removed.
                warn!(node = ?acyclic[cycle.node_id()], "cycle survived cycle detection");
                Vec::new()
            }
        }
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.node_map.contains_key(&task)
    }

    pub fn is_cyclic(&self, task: TaskId) -> bool {
        self.cyclic.contains(&task)
    }

    pub fn cyclic_tasks(&self) -> &BTreeSet<TaskId> {
        &self.cyclic
    }

    /// Tasks outside every cycle, predecessors before successors.
    pub fn topological_order(&self) -> &[TaskId] {
        &self.order
    }

    pub fn warnings(&self) -> &[ScheduleWarning] {
        &self.warnings
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// All validated edges, in the order their dependencies were supplied.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.edge_weights()
    }

    pub fn edge_for(&self, dependency: DependencyId) -> Option<&Edge> {
        self.edges().find(|e| e.dependency == dependency)
    }

    /// Edges leaving `task`, in insertion order.
    pub fn successors(&self, task: TaskId) -> Vec<&Edge> {
        self.edges_of(task, Direction::Outgoing)
    }

    /// Edges entering `task`, in insertion order.
    pub fn predecessors(&self, task: TaskId) -> Vec<&Edge> {
        self.edges_of(task, Direction::Incoming)
    }

    fn edges_of(&self, task: TaskId, direction: Direction) -> Vec<&Edge> {
        let Some(&idx) = self.node_map.get(&task) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| (e.id(), e.weight()))
            .collect();
        edges.sort_by_key(|(idx, _)| *idx);
        edges.into_iter().map(|(_, edge)| edge).collect()
    }

    /// Adjacency map `from -> [edges]`, every task present even without
    /// successors.
    pub fn adjacency(&self) -> BTreeMap<TaskId, Vec<Edge>> {
        let mut map: BTreeMap<TaskId, Vec<Edge>> =
            self.node_map.keys().map(|id| (*id, Vec::new())).collect();
        for edge in self.edges() {
            map.entry(edge.from).or_default().push(*edge);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Lane, Task};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn tasks(n: usize) -> Vec<Task> {
        let lane = Lane::new("L", 0);
        (0..n)
            .map(|i| Task::new(format!("T{i}"), date(1), date(2), lane.id))
            .collect()
    }

    fn fs(a: &Task, b: &Task) -> Dependency {
        Dependency::new(a.id, b.id, DependencyKind::FinishToStart)
    }

    #[test]
    fn chain_orders_predecessors_first() {
        let t = tasks(3);
        let deps = vec![fs(&t[1], &t[2]), fs(&t[0], &t[1])];
        let graph = DependencyGraph::build(&t, &deps);

        assert!(graph.warnings().is_empty());
        let order = graph.topological_order();
        let pos = |id: TaskId| order.iter().position(|x| *x == id).unwrap();
        assert!(pos(t[0].id) < pos(t[1].id));
        assert!(pos(t[1].id) < pos(t[2].id));
        assert_eq!(graph.successors(t[0].id).len(), 1);
        assert_eq!(graph.predecessors(t[2].id)[0].from, t[1].id);
    }

    #[test]
    fn dangling_dependency_is_reported_and_dropped() {
        let t = tasks(2);
        let ghost = Uuid::new_v4();
        let dep = Dependency::new(t[0].id, ghost, DependencyKind::FinishToStart);
        let graph = DependencyGraph::build(&t, &[dep.clone()]);

        assert_eq!(
            graph.warnings(),
            &[ScheduleWarning::DanglingDependency {
                dependency: dep.id,
                missing: ghost
            }]
        );
        assert_eq!(graph.edges().count(), 0);
        assert_eq!(graph.topological_order().len(), 2);
    }

    #[test]
    fn self_loop_is_rejected() {
        let t = tasks(1);
        let dep = Dependency::new(t[0].id, t[0].id, DependencyKind::StartToStart);
        let graph = DependencyGraph::build(&t, &[dep.clone()]);
        assert_eq!(
            graph.warnings(),
            &[ScheduleWarning::SelfDependency { dependency: dep.id }]
        );
    }

    #[test]
    fn invalid_task_and_its_dependencies_are_skipped() {
        let mut t = tasks(2);
        t[1].start = date(5);
        t[1].end = Some(date(3));
        let dep = fs(&t[0], &t[1]);
        let graph = DependencyGraph::build(&t, &[dep.clone()]);

        assert!(!graph.contains(t[1].id));
        assert!(matches!(graph.warnings()[0], ScheduleWarning::InvalidTask { task, .. } if task == t[1].id));
        assert_eq!(
            graph.warnings()[1],
            ScheduleWarning::DependencyOnInvalidTask {
                dependency: dep.id,
                task: t[1].id
            }
        );
    }

    #[test]
    fn duplicate_task_ids_keep_the_first() {
        let t = tasks(1);
        let mut dup = t[0].clone();
        dup.name = "Copy".into();
        let graph = DependencyGraph::build(&[t[0].clone(), dup], &[]);
        assert_eq!(graph.task_count(), 1);
        assert_eq!(
            graph.warnings(),
            &[ScheduleWarning::DuplicateTask { task: t[0].id }]
        );
    }

    #[test]
    fn cycle_marks_members_and_spares_the_rest() {
        let t = tasks(5);
        // 0 -> 1 -> 2 -> 1 is a cycle; 3 -> 4 is clean.
        let back = fs(&t[2], &t[1]);
        let deps = vec![fs(&t[0], &t[1]), fs(&t[1], &t[2]), back.clone(), fs(&t[3], &t[4])];
        let graph = DependencyGraph::build(&t, &deps);

        assert!(graph.is_cyclic(t[1].id));
        assert!(graph.is_cyclic(t[2].id));
        assert!(!graph.is_cyclic(t[0].id));
        assert!(!graph.is_cyclic(t[3].id));

        let cycle = graph
            .warnings()
            .iter()
            .find_map(|w| match w {
                ScheduleWarning::CyclicDependency { tasks, dependencies } => {
                    Some((tasks.clone(), dependencies.clone()))
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(cycle.0, vec![t[1].id, t[2].id]);
        assert_eq!(cycle.1, vec![deps[1].id, back.id]);

        let order = graph.topological_order();
        assert_eq!(order.len(), 3);
        assert!(!order.contains(&t[1].id));
        // Cyclic edges stay in the graph for drawing.
        assert!(graph.edge_for(back.id).is_some());
    }

    #[test]
    fn cycle_membership_covers_the_whole_component() {
        let t = tasks(5);
        let (a, b, c, d, e) = (&t[0], &t[1], &t[2], &t[3], &t[4]);
        // a -> b -> c -> a, plus a -> d -> c which closes a second loop
        // through d after c is already finished. e hangs off c.
        let deps = vec![fs(a, b), fs(b, c), fs(c, a), fs(a, d), fs(d, c), fs(c, e)];
        let graph = DependencyGraph::build(&t, &deps);

        for task in [a, b, c, d] {
            assert!(graph.is_cyclic(task.id), "{} should be cyclic", task.name);
        }
        assert!(!graph.is_cyclic(e.id));
        assert_eq!(graph.cyclic_tasks().len(), 4);
        assert_eq!(graph.topological_order(), &[e.id]);
    }

    #[test]
    fn adjacency_lists_every_task() {
        let t = tasks(3);
        let deps = vec![
            fs(&t[0], &t[1]),
            Dependency::new(t[0].id, t[2].id, DependencyKind::StartToStart).with_lag(2),
        ];
        let graph = DependencyGraph::build(&t, &deps);
        let adjacency = graph.adjacency();

        assert_eq!(adjacency.len(), 3);
        let out = &adjacency[&t[0].id];
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].kind, DependencyKind::StartToStart);
        assert_eq!(out[1].lag_days, 2);
        assert!(adjacency[&t[2].id].is_empty());
    }

    #[test]
    fn build_is_deterministic() {
        let t = tasks(4);
        let deps = vec![fs(&t[0], &t[1]), fs(&t[1], &t[0]), fs(&t[2], &t[3])];
        let a = DependencyGraph::build(&t, &deps);
        let b = DependencyGraph::build(&t, &deps);
        assert_eq!(a.topological_order(), b.topological_order());
        assert_eq!(a.warnings(), b.warnings());
    }
}
