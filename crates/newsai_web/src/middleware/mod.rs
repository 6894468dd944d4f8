pub mod fallback;
pub mod redact;
pub mod request_context;
pub mod session;

pub use fallback::envelope_bare_errors;
pub use request_context::request_context;
pub use session::resolve_session;
