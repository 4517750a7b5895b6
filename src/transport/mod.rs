//! Transport layer: the HTTP/JSON adapter for the chat service.

pub mod http;
mod wire;

pub use http::HttpTransport;

/// Returns the transport module name for smoke checks.
pub fn module_name() -> &'static str {
    "transport"
}
