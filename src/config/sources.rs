//! Config file sources, lowest precedence first: global, then repo

pub mod global_file;
pub mod repo_file;
