//
// test_utils/mod.rs
//
// Shared helpers for unit tests, integration tests and benches
//

mod fake_releases;
mod fixture_workspace;
mod recording_host;

pub use fake_releases::{release, FakeReleases};
pub use fixture_workspace::{create_fixture_workspace, write_fixture_workspace, FixtureConfig};
pub use recording_host::{HostEvent, RecordingHost};
