// Library root
// -----------
// Client for the EAS catalog service and the Apperian management service:
// authenticate, upload an application binary, then optionally sign and
// enable it. The binary (`main.rs`) is a thin command-line host over this.
//
// Module responsibilities:
// - `envelope`: JSON-RPC request/response shapes and the request id counter.
// - `api`: `Endpoint` (one service URL + HTTP transport) and `EndpointPair`.
// - `credentials`: username/password, session token, stored-credential lookup.
// - `config`: upload settings, environment resolution and validation.
// - `artifact`: locating the build output to upload.
// - `publish`: authentication driving and the publish sequence.
// - `ui`: option lists, prompts and progress for terminal hosts.
pub mod api;
pub mod artifact;
pub mod config;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod model;
pub mod publish;
pub mod ui;

pub use error::{Error, Result};
