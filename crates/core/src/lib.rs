//! `restkit-core`: framework-free building blocks for exposing a service's
//! members as REST endpoints.
//!
//! This crate has no HTTP server dependency: it knows how to discover members,
//! derive their paths, bind request parameters, and fold results into the
//! `{status, data, code}` envelope. `restkit-server` puts it on the wire.

pub mod binder;
pub mod error;
pub mod members;
pub mod params;
pub mod registry;
pub mod response;
pub mod status;

pub use binder::{BoundEndpoint, EndpointBinder, Handler, HandlerFn};
pub use error::{BindingError, EndpointError, RegistryError};
pub use members::{ClassInfo, Discovered, DiscoveredMember, Member, MemberMut, Members, Service};
pub use params::{Args, ParamSchema, ParamSpec, ParamType, RequestParams, UploadedFile};
pub use registry::{
    EXCLUDED_MEMBERS, EndpointEntry, EndpointRegistry, HttpMethod, MemberKind, canonical_path,
    default_methods, is_exposable,
};
pub use response::{Outcome, Reply, RestResponse};
pub use status::{RestCode, StatusSpec};
