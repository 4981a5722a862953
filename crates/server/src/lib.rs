//! HTTP side of RestKit: servers, routing, and built-in endpoints.
//!
//! A [`BaseServer`] exposes one [`restkit_core::Service`]; a
//! [`CompositeServer`] additionally mounts named units under `/{unit}/`.

pub mod app;
pub mod config;
pub mod context;
pub mod demo;
pub mod error;
pub mod middleware;
pub mod server;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use context::{RouteInfo, ServerContext};
pub use error::{ConfigError, ServerError};
pub use server::{BaseServer, CompositeServer, CompositeServerBuilder, ServerBuilder};
