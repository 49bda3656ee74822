pub mod header;
pub mod utils;

pub use header::draw_header;
pub use utils::{format_days, issue_age_color, pr_age_color, priority_color, status_color, truncate};
