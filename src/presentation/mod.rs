// Terminal views over tracker state. Everything here is a function of the
// records handed in; nothing mutates the store.

pub mod progress_view;
pub mod summary;
pub mod timeline;

pub use progress_view::ProgressBoard;
pub use summary::{record_header, summary_line};
pub use timeline::{current_stage_message, render_timeline, stage_marker};
