//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → DirectorConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → sent to the running server
//!     → throttle, health and auth settings swapped atomically
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Secrets can come from the environment instead of the file
//! - Listener and registry settings only take effect on restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::AuthConfig;
pub use schema::DirectorConfig;
pub use schema::HealthCheckConfig;
pub use schema::HealthMode;
pub use schema::ListenerConfig;
pub use schema::ThrottleConfig;
