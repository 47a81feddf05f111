//! Utilities shared by Quill tests.
//!
//! Fixtures are plain Java text with optional `//- /Path.java` file headers
//! and `$0`, `$1`, ... (or `/*caret*/`) markers; see [`Fixture`].

pub mod env;
mod fixtures;

pub use env::{env_lock, EnvVarGuard};
pub use fixtures::*;
