pub mod snap;

pub use snap::{
    collect_targets, drag_days, Candidate, Commit, DragSnapshot, InteractionError,
    InteractionState, SnapContext, SnapTarget,
};
