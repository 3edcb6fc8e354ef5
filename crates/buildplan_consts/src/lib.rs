//! Constants and terminal styles shared by all buildplan crates.

pub mod consts;
