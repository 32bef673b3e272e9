//! Common test utilities for export-worker integration tests

#[allow(dead_code)]
pub mod config;
#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod remote;

#[allow(unused_imports)]
pub use config::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use remote::*;
