//! Report assembly: the CSV report file and the console summary.

#[cfg(feature = "cli")]
mod console;
mod csv;

#[cfg(feature = "cli")]
pub use console::generate as generate_console;
pub use self::csv::{COST_HEADER, FINDINGS_HEADER, render_csv, write_report};
