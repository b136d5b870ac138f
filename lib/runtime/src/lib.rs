//! The managed runtime behind the libhdfs bridge.
//!
//! Filesystem clients and their streams are objects on a reference
//! counted heap. Native code never holds an object directly; it holds a
//! [`Reference`], either local to the calling thread and its current
//! frame, or global and valid until deleted. Failures are [`Exception`]s
//! tagged with an [`ExceptionClass`].
//!
//! ```rust
//! use hdfs_runtime::{fs::Target, Runtime};
//!
//! let runtime = Runtime::global();
//! let env = runtime.attach();
//! let fs = env
//!     .with_local_frame(4, |env| {
//!         let local = env.get_file_system(&Target::Local)?;
//!         env.promote(local)
//!     })
//!     .unwrap();
//! assert_eq!(env.file_system(fs).unwrap().uri(), "file:///");
//! env.delete_global(fs).unwrap();
//! ```

#![deny(
    unused_extern_crates,
    unused_imports,
    unreachable_patterns,
    rustdoc::broken_intra_doc_links
)]
#![warn(unused_import_braces)]
#![allow(clippy::new_without_default)]
#![warn(
    clippy::mut_mut,
    clippy::nonminimal_bool,
    clippy::map_unwrap_or,
    clippy::print_stdout,
    clippy::use_self
)]

pub mod conf;
mod env;
pub mod error;
pub mod fs;
mod object;
mod reference;
mod runtime;

pub use crate::conf::{CONF_ENV_VAR, ConfigError, Configuration};
pub use crate::env::Env;
pub use crate::error::{Exception, ExceptionClass, Result};
pub use crate::object::Object;
pub use crate::reference::{Reference, Scope};
pub use crate::runtime::Runtime;
