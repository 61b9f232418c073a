//! Activity logging: JSONL lines written by a background thread.

pub mod activity;
pub mod jsonl;
