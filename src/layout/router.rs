//! Connector routing between dependent task bars.
//!
//! Routing is a pure function of the two anchors, their rows and the row
//! height: the same input always yields the same geometry. Paths are
//! orthogonal polylines whose inner corners are rounded with quadratic
//! curves, and whose last segment stops short of the target so an
//! arrowhead fits in front of the bar edge.

use std::collections::{HashMap, HashSet};

use egui::{Pos2, Vec2};
use serde::Serialize;
use tracing::debug;

use super::bars::{row_top, BarLayout};
use crate::config::RouterConfig;
use crate::model::{DependencyId, DependencyKind, Project, TaskEdge, TaskId};
use crate::schedule::DependencyGraph;

/// Lengths below this are treated as zero.
const EPSILON: f32 = 1e-3;

/// Where a connector attaches to a bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anchor {
    pub point: Pos2,
    pub edge: TaskEdge,
}

impl Anchor {
    pub fn new(point: Pos2, edge: TaskEdge) -> Self {
        Self { point, edge }
    }

    /// Horizontal direction a connector leaves this anchor in.
    fn exit_sign(&self) -> f32 {
        match self.edge {
            TaskEdge::Start => -1.0,
            TaskEdge::Finish => 1.0,
        }
    }

    /// Horizontal direction a connector travels when it arrives here.
    fn approach_sign(&self) -> f32 {
        -self.exit_sign()
    }
}

/// Which routing rule produced a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RouteKind {
    /// One straight segment inside a row.
    Direct,
    /// Detour through the margin above a row.
    Margin,
    /// Orthogonal path through the gutter between rows.
    Gutter,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PathCommand {
    MoveTo(Pos2),
    LineTo(Pos2),
    QuadTo { control: Pos2, to: Pos2 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectorPath {
    pub kind: RouteKind,
    pub commands: Vec<PathCommand>,
    /// Corner points before rounding, last one already shortened.
    pub waypoints: Vec<Pos2>,
    /// Where the arrowhead points to: the target anchor.
    pub arrow_tip: Pos2,
    /// Unit vector of the terminal segment.
    pub arrow_direction: Vec2,
}

impl ConnectorPath {
    /// SVG path data, for renderers that speak it.
    pub fn to_svg(&self) -> String {
        let mut out = String::new();
        for command in &self.commands {
            if !out.is_empty() {
                out.push(' ');
            }
            match command {
                PathCommand::MoveTo(p) => out.push_str(&format!("M {} {}", p.x, p.y)),
                PathCommand::LineTo(p) => out.push_str(&format!("L {} {}", p.x, p.y)),
                PathCommand::QuadTo { control, to } => out.push_str(&format!(
                    "Q {} {} {} {}",
                    control.x, control.y, to.x, to.y
                )),
            }
        }
        out
    }
}

/// Route one connector.
pub fn route(
    source: Anchor,
    target: Anchor,
    source_row: usize,
    target_row: usize,
    row_height: f32,
    config: &RouterConfig,
) -> ConnectorPath {
    let from = source.point;
    let to = target.point;

    let (kind, points) = if source_row == target_row {
        let dx = to.x - from.x;
        let forward = dx * source.exit_sign() >= 0.0;
        if forward
            && source.exit_sign() == target.approach_sign()
            && dx.abs() <= config.direct_max_distance
        {
            (RouteKind::Direct, vec![from, to])
        } else {
            let margin_y = row_top(source_row, row_height) - config.margin_offset;
            (
                RouteKind::Margin,
                stubbed(source, target, margin_y, config.extension),
            )
        }
    } else {
        let gutter_y = if target_row > source_row {
            row_top(source_row + 1, row_height) + config.gutter_offset
        } else {
            row_top(target_row, row_height) - config.gutter_offset
        };
        (
            RouteKind::Gutter,
            stubbed(source, target, gutter_y, config.extension),
        )
    };

    let mut points = simplify(points);
    let arrow_direction = shorten_tail(&mut points, config.arrow_length, target);
    let commands = rounded_commands(&points, config.corner_radius);

    ConnectorPath {
        kind,
        commands,
        waypoints: points,
        arrow_tip: to,
        arrow_direction,
    }
}

/// Orthogonal path through the horizontal channel at `channel_y`. The path
/// leaves and enters the bars horizontally, so neither end runs along a bar
/// edge.
fn stubbed(source: Anchor, target: Anchor, channel_y: f32, extension: f32) -> Vec<Pos2> {
    let from = source.point;
    let to = target.point;
    let out_x = from.x + source.exit_sign() * extension;
    let in_x = to.x - target.approach_sign() * extension;
    vec![
        from,
        Pos2::new(out_x, from.y),
        Pos2::new(out_x, channel_y),
        Pos2::new(in_x, channel_y),
        Pos2::new(in_x, to.y),
        to,
    ]
}

/// Drop repeated points and the middle of collinear runs.
fn simplify(points: Vec<Pos2>) -> Vec<Pos2> {
    let mut out: Vec<Pos2> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().is_some_and(|last| (p - *last).length() < EPSILON) {
            continue;
        }
        if out.len() >= 2 {
            let a = out[out.len() - 2];
            let b = out[out.len() - 1];
            let cross = (b - a).x * (p - b).y - (b - a).y * (p - b).x;
            let same_way = (b - a).dot(p - b) > 0.0;
            if cross.abs() < EPSILON && same_way {
                out.pop();
            }
        }
        out.push(p);
    }
    out
}

/// Pull the last point back along the terminal segment to leave room for
/// the arrowhead. Returns the arrow direction.
fn shorten_tail(points: &mut [Pos2], arrow_length: f32, target: Anchor) -> Vec2 {
    let fallback = Vec2::new(target.approach_sign(), 0.0);
    let n = points.len();
    if n < 2 {
        return fallback;
    }
    let segment = points[n - 1] - points[n - 2];
    let length = segment.length();
    if length < EPSILON {
        return fallback;
    }
    let direction = segment / length;
    points[n - 1] -= direction * arrow_length.min(length);
    direction
}

fn rounded_commands(points: &[Pos2], corner_radius: f32) -> Vec<PathCommand> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    let mut commands = vec![PathCommand::MoveTo(first)];
    for i in 1..points.len() {
        let corner = points[i];
        if i == points.len() - 1 {
            commands.push(PathCommand::LineTo(corner));
            break;
        }
        let back = points[i - 1] - corner;
        let ahead = points[i + 1] - corner;
        let radius = corner_radius
            .min(back.length() / 2.0)
            .min(ahead.length() / 2.0);
        if radius < EPSILON {
            commands.push(PathCommand::LineTo(corner));
            continue;
        }
        commands.push(PathCommand::LineTo(corner + back.normalized() * radius));
        commands.push(PathCommand::QuadTo {
            control: corner,
            to: corner + ahead.normalized() * radius,
        });
    }
    commands
}

/// A routed dependency, ready to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedConnector {
    pub dependency: DependencyId,
    pub from: TaskId,
    pub to: TaskId,
    pub kind: DependencyKind,
    pub path: ConnectorPath,
}

/// Route every visible dependency whose endpoints both made it into the
/// graph and the layout. Dependencies on a cycle are still routed.
pub fn route_dependencies(
    project: &Project,
    graph: &DependencyGraph,
    bars: &[BarLayout],
    row_height: f32,
    config: &RouterConfig,
) -> Vec<RoutedConnector> {
    let placed: HashMap<TaskId, &BarLayout> = bars.iter().map(|b| (b.task, b)).collect();
    let routable: HashSet<DependencyId> = graph.edges().map(|e| e.dependency).collect();

    let mut connectors = Vec::new();
    for dep in &project.dependencies {
        if !dep.visible || !routable.contains(&dep.id) {
            continue;
        }
        let (Some(from), Some(to)) = (placed.get(&dep.from_task), placed.get(&dep.to_task)) else {
            debug!(dependency = %dep.id, "endpoint not laid out, skipping connector");
            continue;
        };
        let source = Anchor::new(from.anchor(dep.kind.source_edge()), dep.kind.source_edge());
        let target = Anchor::new(to.anchor(dep.kind.target_edge()), dep.kind.target_edge());
        connectors.push(RoutedConnector {
            dependency: dep.id,
            from: dep.from_task,
            to: dep.to_task,
            kind: dep.kind,
            path: route(source, target, from.row, to.row, row_height, config),
        });
    }
    connectors
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    const ROW: f32 = 32.0;

    fn config() -> RouterConfig {
        RouterConfig::default()
    }

    fn finish(x: f32, row: usize) -> Anchor {
        Anchor::new(Pos2::new(x, row as f32 * ROW + ROW / 2.0), TaskEdge::Finish)
    }

    fn start(x: f32, row: usize) -> Anchor {
        Anchor::new(Pos2::new(x, row as f32 * ROW + ROW / 2.0), TaskEdge::Start)
    }

    fn last_line_end(path: &ConnectorPath) -> Pos2 {
        match path.commands.last() {
            Some(PathCommand::LineTo(p)) => *p,
            other => panic!("path should end with a line, got {other:?}"),
        }
    }

    #[test]
    fn short_forward_gap_is_a_straight_line() {
        let path = route(finish(100.0, 2), start(160.0, 2), 2, 2, ROW, &config());
        assert_eq!(path.kind, RouteKind::Direct);
        assert_eq!(path.commands.len(), 2);
        let end = last_line_end(&path);
        assert_relative_eq!(end.x, 160.0 - config().arrow_length);
        assert_relative_eq!(path.arrow_direction.x, 1.0);
        assert_eq!(path.arrow_tip, Pos2::new(160.0, 2.0 * ROW + ROW / 2.0));
    }

    #[test]
    fn long_gap_detours_above_the_row() {
        let cfg = config();
        let path = route(finish(100.0, 1), start(400.0, 1), 1, 1, ROW, &cfg);
        assert_eq!(path.kind, RouteKind::Margin);
        let margin_y = ROW - cfg.margin_offset;
        let on_margin: Vec<_> = path
            .waypoints
            .iter()
            .filter(|p| (p.y - margin_y).abs() < 1e-3)
            .collect();
        assert_eq!(on_margin.len(), 2);
        assert_relative_eq!(on_margin[0].x, 100.0 + cfg.extension);
        assert_relative_eq!(on_margin[1].x, 400.0 - cfg.extension);
        // Four corners, each rounded.
        let curves = path
            .commands
            .iter()
            .filter(|c| matches!(c, PathCommand::QuadTo { .. }))
            .count();
        assert_eq!(curves, 4);
    }

    #[rstest]
    #[case::long_forward(finish(100.0, 2), start(400.0, 2))]
    #[case::backwards(finish(300.0, 2), start(280.0, 2))]
    #[case::start_to_start(start(100.0, 2), start(140.0, 2))]
    #[case::finish_to_finish(finish(100.0, 2), finish(140.0, 2))]
    fn margin_route_enters_the_target_sideways(#[case] source: Anchor, #[case] target: Anchor) {
        let cfg = config();
        let path = route(source, target, 2, 2, ROW, &cfg);
        assert_eq!(path.kind, RouteKind::Margin);

        // The last segment runs along the anchor's row centre, not down
        // the bar edge.
        let n = path.waypoints.len();
        let (before, end) = (path.waypoints[n - 2], path.waypoints[n - 1]);
        assert_relative_eq!(before.y, target.point.y);
        assert_relative_eq!(end.y, target.point.y);
        assert_relative_eq!(path.arrow_direction.y, 0.0);
        assert_relative_eq!(path.arrow_direction.x, target.approach_sign());
        assert_relative_eq!(
            (target.point.x - end.x).abs(),
            cfg.arrow_length
        );

        // Nothing but the tip touches x == target.x inside the bar's rows.
        let bar_top = 2.0 * ROW + 3.0;
        let bar_bottom = 3.0 * ROW - 3.0;
        for window in path.waypoints.windows(2) {
            let (a, b) = (window[0], window[1]);
            let vertical_on_edge = (a.x - target.point.x).abs() < 1e-3
                && (b.x - target.point.x).abs() < 1e-3;
            let inside = a.y.max(b.y) > bar_top && a.y.min(b.y) < bar_bottom;
            assert!(!(vertical_on_edge && inside), "segment {a:?} -> {b:?} runs along the bar edge");
        }
    }

    #[test]
    fn backwards_same_row_never_goes_straight() {
        let path = route(finish(300.0, 0), start(280.0, 0), 0, 0, ROW, &config());
        assert_eq!(path.kind, RouteKind::Margin);
    }

    #[test]
    fn start_to_start_in_one_row_uses_margin() {
        let path = route(start(100.0, 0), start(140.0, 0), 0, 0, ROW, &config());
        assert_eq!(path.kind, RouteKind::Margin);
    }

    #[test]
    fn moving_down_uses_gutter_below_source() {
        let cfg = config();
        let path = route(finish(100.0, 1), start(300.0, 4), 1, 4, ROW, &cfg);
        assert_eq!(path.kind, RouteKind::Gutter);
        let gutter_y = 2.0 * ROW + cfg.gutter_offset;
        let on_gutter: Vec<_> = path
            .waypoints
            .iter()
            .filter(|p| (p.y - gutter_y).abs() < 1e-3)
            .collect();
        assert_eq!(on_gutter.len(), 2);
        assert_relative_eq!(on_gutter[0].x, 100.0 + cfg.extension);
        assert_relative_eq!(on_gutter[1].x, 300.0 - cfg.extension);
        assert_relative_eq!(path.arrow_direction.x, 1.0);
    }

    #[test]
    fn moving_up_uses_gutter_above_target() {
        let cfg = config();
        let path = route(finish(100.0, 5), start(300.0, 2), 5, 2, ROW, &cfg);
        let gutter_y = 2.0 * ROW - cfg.gutter_offset;
        assert!(path.waypoints.iter().any(|p| (p.y - gutter_y).abs() < 1e-3));
    }

    #[test]
    fn aligned_stubs_collapse_to_three_segments() {
        let cfg = config();
        // Finish-to-finish where the target's entry column equals the exit column.
        let source = finish(100.0, 0);
        let target = Anchor::new(
            Pos2::new(100.0, 3.0 * ROW + ROW / 2.0),
            TaskEdge::Finish,
        );
        let path = route(source, target, 0, 3, ROW, &cfg);
        // from -> out stub -> down -> back into the finish edge.
        assert_eq!(path.waypoints.len(), 4);
        assert_relative_eq!(path.arrow_direction.x, -1.0);
    }

    #[test]
    fn routing_is_deterministic() {
        let target = Anchor::new(Pos2::new(20.0, 10.0), TaskEdge::Finish);
        let a = route(start(50.0, 3), target, 3, 0, ROW, &config());
        let b = route(start(50.0, 3), target, 3, 0, ROW, &config());
        assert_eq!(a, b);
        assert_eq!(a.kind, RouteKind::Gutter);
    }

    #[test]
    fn touching_bars_keep_a_valid_path() {
        let path = route(finish(100.0, 0), start(100.0, 0), 0, 0, ROW, &config());
        assert_eq!(path.kind, RouteKind::Direct);
        assert_relative_eq!(path.arrow_direction.x, 1.0);
        assert!(path.commands.iter().all(|c| match c {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) => p.x.is_finite(),
            PathCommand::QuadTo { to, .. } => to.x.is_finite(),
        }));
    }

    #[test]
    fn corner_radius_shrinks_on_short_segments() {
        let cfg = RouterConfig {
            corner_radius: 50.0,
            ..config()
        };
        let path = route(finish(100.0, 0), start(400.0, 0), 0, 0, ROW, &cfg);
        for command in &path.commands {
            if let PathCommand::QuadTo { control, to } = command {
                assert!((*to - *control).length() <= 50.0);
            }
        }
    }

    #[test]
    fn svg_output_lists_commands() {
        let path = route(finish(0.0, 0), start(10.0, 0), 0, 0, ROW, &config());
        assert_eq!(path.to_svg(), "M 0 16 L 4 16");
    }
}
