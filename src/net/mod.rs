//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! [listener.tls] configured
//!     → tls.rs (load PEM cert and key)
//!     → axum-server rustls acceptor
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS is optional; plain TCP uses a tokio listener directly
//! - Missing certificate files fail startup with the offending path

pub mod tls;
