//! Memoized derived values.
//!
//! The graph, critical path, bar layout and connector routes are pure
//! functions of the project snapshot, viewport and configuration. The cache
//! keeps the last result of each and recomputes only when the fingerprint
//! of its inputs changes. Any change drops the whole entry.

use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::layout::{layout_bars, route_dependencies, BarLayout, RoutedConnector};
use crate::model::{Project, TimelineViewport};
use crate::schedule::{calculate_critical_path, CriticalPathResult, DependencyGraph, ScheduleWarning};

/// Everything a chart needs to draw one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartLayout {
    pub bars: Vec<BarLayout>,
    pub connectors: Vec<RoutedConnector>,
    /// Tasks left out of the layout.
    pub warnings: Vec<ScheduleWarning>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
struct Schedule {
    project: u64,
    graph: DependencyGraph,
    critical: CriticalPathResult,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LayoutKey {
    project: u64,
    viewport: u64,
    config: EngineConfig,
}

#[derive(Debug, Default)]
pub struct LayoutCache {
    schedule: Option<Schedule>,
    layout: Option<(LayoutKey, ChartLayout)>,
    stats: CacheStats,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dependency graph for `project`, rebuilt if the project changed.
    pub fn graph(&mut self, project: &Project) -> &DependencyGraph {
        &self.schedule_for(project).graph
    }

    /// Critical path for `project`, recomputed if the project changed.
    pub fn critical_path(&mut self, project: &Project) -> &CriticalPathResult {
        &self.schedule_for(project).critical
    }

    /// Bars and connectors for the given snapshot, viewport and config.
    pub fn layout(
        &mut self,
        project: &Project,
        viewport: &TimelineViewport,
        config: &EngineConfig,
    ) -> &ChartLayout {
        let key = LayoutKey {
            project: project.fingerprint(),
            viewport: viewport.fingerprint(),
            config: *config,
        };
        let fresh = matches!(&self.layout, Some((cached, _)) if *cached == key);
        if fresh {
            self.stats.hits += 1;
            trace!("layout cache hit");
        } else {
            self.stats.misses += 1;
            let graph = &self.schedule_for(project).graph;
            let (bars, warnings) = layout_bars(project, viewport, &config.timeline);
            let connectors = route_dependencies(
                project,
                graph,
                &bars,
                config.timeline.row_height,
                &config.router,
            );
            debug!(
                bars = bars.len(),
                connectors = connectors.len(),
                "layout recomputed"
            );
            self.layout = Some((
                key,
                ChartLayout {
                    bars,
                    connectors,
                    warnings,
                },
            ));
        }
        &self
            .layout
            .get_or_insert_with(|| (key, ChartLayout::default()))
            .1
    }

    /// Drop every cached value.
    pub fn invalidate(&mut self) {
        debug!("layout cache invalidated");
        self.schedule = None;
        self.layout = None;
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn schedule_for(&mut self, project: &Project) -> &Schedule {
        let fingerprint = project.fingerprint();
        let fresh = matches!(&self.schedule, Some(s) if s.project == fingerprint);
        if fresh {
            self.stats.hits += 1;
            trace!("schedule cache hit");
        } else {
            self.stats.misses += 1;
            let graph = DependencyGraph::build(&project.tasks, &project.dependencies);
            let critical = calculate_critical_path(&project.tasks, &graph);
            debug!(
                tasks = graph.task_count(),
                critical = critical.critical_tasks.len(),
                "schedule recomputed"
            );
            self.schedule = Some(Schedule {
                project: fingerprint,
                graph,
                critical,
            });
        }
        self.schedule.get_or_insert_with(|| Schedule {
            project: fingerprint,
            graph: DependencyGraph::default(),
            critical: CriticalPathResult::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dependency, DependencyKind, Lane, Task, TimelineScale};
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn project() -> Project {
        let lane = Lane::new("Work", 0);
        let a = Task::new("A", date(1), date(4), lane.id);
        let b = Task::new("B", date(4), date(6), lane.id);
        let mut project = Project::new("Cached");
        project.dependencies = vec![Dependency::new(a.id, b.id, DependencyKind::FinishToStart)];
        project.tasks = vec![a, b];
        project.lanes = vec![lane];
        project
    }

    #[test]
    fn unchanged_inputs_hit() {
        let project = project();
        let viewport = TimelineViewport::new(date(1), date(31), TimelineScale::Day);
        let config = EngineConfig::default();
        let mut cache = LayoutCache::new();

        let first = cache.layout(&project, &viewport, &config).clone();
        let second = cache.layout(&project, &viewport, &config).clone();
        assert_eq!(first, second);
        assert_eq!(first.bars.len(), 2);
        assert_eq!(first.connectors.len(), 1);

        let before = cache.stats();
        assert_eq!(cache.critical_path(&project).critical_tasks.len(), 2);
        assert_eq!(cache.stats().hits, before.hits + 1);
    }

    #[test]
    fn any_input_change_recomputes() {
        let mut project = project();
        let mut viewport = TimelineViewport::new(date(1), date(31), TimelineScale::Day);
        let config = EngineConfig::default();
        let mut cache = LayoutCache::new();

        cache.layout(&project, &viewport, &config);
        let misses = cache.stats().misses;

        viewport.zoom_in(&config.timeline);
        cache.layout(&project, &viewport, &config);
        assert_eq!(cache.stats().misses, misses + 1);

        project.tasks[1].end = Some(date(9));
        let layout = cache.layout(&project, &viewport, &config).clone();
        assert!(cache.stats().misses >= misses + 3);
        assert!(layout.bars[1].width > layout.bars[0].width);
        assert_eq!(
            cache.critical_path(&project).project_finish,
            Some(date(9))
        );
    }

    #[test]
    fn invalidate_forces_recompute() {
        let project = project();
        let mut cache = LayoutCache::new();
        cache.critical_path(&project);
        cache.invalidate();
        let misses = cache.stats().misses;
        cache.critical_path(&project);
        assert_eq!(cache.stats().misses, misses + 1);
    }
}
