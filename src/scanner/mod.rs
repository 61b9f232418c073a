//! Sweep pipeline: classification, protection, deletion, the three scan passes,
//! and the run that ties them together.

pub mod classify;
pub mod deletion;
pub mod finding;
pub mod passes;
pub mod protection;
pub mod rightsize;
pub mod run;
