//! Change-impact reachability analysis for Android applications.
//!
//! Given the methods changed between two builds, find the GUI events and
//! platform entry points that can trigger each of them.

pub mod config;
pub mod core;
pub mod error;
