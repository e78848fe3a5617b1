//
// compiler/mod.rs
//
// The external Aelys compiler: process invocation, releases, managed installs
//

pub mod install;
pub mod release;
pub mod storage;
pub mod subprocess;

pub use install::{InstallError, Toolchain};
pub use release::{Release, ReleaseClient, ReleaseSource, TargetPlatform, LATEST_TAG};
pub use storage::{PersistedState, StateStore};
pub use subprocess::AelysCompiler;
