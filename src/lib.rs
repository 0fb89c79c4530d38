//! Temporal layout and dependency scheduling for Gantt charts.
//!
//! The crate maps calendar dates to pixels across several scales, computes
//! the critical path over typed task dependencies, routes connector paths
//! between dependent bars and turns pointer drags into date changes with
//! magnetic snapping. Everything is a pure function of a [`model::Project`]
//! snapshot, a [`model::TimelineViewport`] and an [`config::EngineConfig`];
//! drawing and editing are left to the caller.
//!
//! ```no_run
//! use rust_gantt_engine::cache::LayoutCache;
//! use rust_gantt_engine::config::EngineConfig;
//! use rust_gantt_engine::model::{Project, TimelineScale, TimelineViewport, ViewWindow};
//!
//! # fn frame(project: &Project) {
//! let config = EngineConfig::default();
//! let fallback = chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
//! let window = ViewWindow::fit(&project.tasks, TimelineScale::Week, 7, fallback);
//! let viewport = TimelineViewport::new(window.start, window.end, TimelineScale::Week);
//!
//! let mut cache = LayoutCache::new();
//! let critical = cache.critical_path(project).clone();
//! for bar in &cache.layout(project, &viewport, &config).bars {
//!     let _highlight = critical.is_critical(bar.task);
//! }
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod interaction;
pub mod layout;
pub mod model;
pub mod schedule;

pub use cache::{ChartLayout, LayoutCache};
pub use config::{ConfigError, EngineConfig};
pub use interaction::{InteractionError, InteractionState};
pub use model::{Project, Task, TimelineScale, TimelineViewport};
pub use schedule::{calculate_critical_path, CriticalPathResult, DependencyGraph, ScheduleWarning};
