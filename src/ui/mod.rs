//! User interface module: terminal and JSON rendering of release runs.

pub mod formatter;

pub use formatter::{
    display_boundary_warning, display_error, display_report,
    render_outcome, render_plan, render_report, report_json,
};
