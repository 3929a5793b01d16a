//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, timeout, trace span)
//!     → request.rs (request id assigned or kept, echoed on the response)
//!     → handler → Gateway::lookup
//!     → response.rs (image bytes + content type, or status mapped from LookupError)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id_layers, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
