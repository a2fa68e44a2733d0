//! Execution backends for approved shell commands.

pub mod native;
pub mod traits;

pub use native::NativeRunner;
pub use traits::{ExecOutcome, SandboxRunner};
