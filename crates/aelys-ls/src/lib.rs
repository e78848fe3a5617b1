//
// lib.rs
//
// Library root shared by the binary, integration tests and benches
//

pub mod analysis;
pub mod backend;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod content_provider;
pub mod handlers;
pub mod host;
pub mod state;
pub mod stdlib;
pub mod utf16;

// Recording host, fake releases and fixture workspaces; test builds and the
// `test-support` feature only.
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
