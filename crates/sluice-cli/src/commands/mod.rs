//! CLI command implementations

pub mod plugins;
pub mod run;
pub mod validate;
