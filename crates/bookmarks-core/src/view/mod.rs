//! View state and its rendering projection.
//!
//! - `mode`: the three-way view mode
//! - `state`: the snapshot the view-model publishes
//! - `screen`: what a front end draws for a snapshot

mod mode;
mod screen;
mod state;

pub use mode::ViewMode;
pub use screen::{BookmarkRow, EMPTY_LIST_MESSAGE, Screen};
pub use state::ViewState;
