//! Event-handling framework shared by every bot.
//!
//! - [`registry`]: one handler slot per event category
//! - [`dispatcher`]: parse, spawn, track and drain handler tasks
//! - [`run`]: CLI-facing runtime with graceful shutdown

pub mod dispatcher;
pub mod registry;
pub mod run;

pub use dispatcher::{Dispatch, DispatchError, Dispatcher};
pub use registry::{Handler, HandlerContext, HandlerFuture, HandlerRegistry, RegistryError};
pub use run::{Robot, ServiceOptions, build_dispatcher, drain, load_secret, run};
