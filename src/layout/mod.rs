pub mod bars;
pub mod router;

pub use bars::{layout_bars, layout_task, row_top, BarLayout};
pub use router::{
    route, route_dependencies, Anchor, ConnectorPath, PathCommand, RouteKind, RoutedConnector,
};
