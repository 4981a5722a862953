//! Endpoints every server has.
//!
//! Built-ins are ordinary members: a service that declares a member with the
//! same name replaces the built-in one.

use serde_json::{Value, json};

use restkit_core::{EndpointError, HttpMethod, Members, ParamSchema, Reply, Service};

use crate::context::ServerContext;

pub mod logs;
pub mod transfer;

/// Holder of the built-in members.
pub struct Builtins {
    ctx: ServerContext,
}

impl Builtins {
    pub fn new(ctx: ServerContext) -> Self {
        Self { ctx }
    }

    /// Welcome message plus every registered route.
    pub fn index(&self) -> Result<Reply, EndpointError> {
        Reply::json(json!({
            "message": format!("Welcome to the {} ", self.ctx.app_name()),
            "routes": self.ctx.routes(),
        }))
    }

    pub fn get_run_mode(&self) -> Result<Reply, EndpointError> {
        let (message, mode) = if self.ctx.config().demo_mode {
            ("Server is running in demo mode", "demo")
        } else {
            ("Server is running in production mode", "production")
        };
        Reply::json(json!({ "message": message, "run_mode": mode }))
    }
}

impl Service for Builtins {
    fn describe(m: &mut Members<Self>) {
        m.method("index", |s, _| s.index())
            .doc("Returns the index page.\n\nThe index page lists all available API endpoints.");

        m.method("get_run_mode", |s, _| s.get_run_mode())
            .doc("Returns the current run mode of the server.");

        m.method("download", |s, args| {
            transfer::download(s.ctx.config(), args.str("path"))
        })
        .doc("Download a file from the server.\n\nPass the file path as `path` in the query string or JSON body.")
        .params(ParamSchema::new().optional("path", Value::Null));

        m.method("upload", |s, args| {
            transfer::upload(s.ctx.config(), args.file("file"), args.str("filename"))
        })
        .doc("Upload a file to the server.\n\nSend a multipart form with a `file` field and an optional `filename`.")
        .params(ParamSchema::new().optional("filename", Value::Null))
        .methods([HttpMethod::Post]);

        m.method("list_logs", |s, _| logs::list_logs(s.ctx.logs()))
            .doc("Lists the available log files.");

        m.method("logs", |s, args| logs::view_log(s.ctx.logs(), args.str("log_file")))
            .doc("Returns the contents of a log file as plain text.\n\nDefaults to the current log; pass `log_file` to pick another.")
            .params(ParamSchema::new().optional("log_file", Value::Null));
    }
}
