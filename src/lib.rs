//! Node Director
//!
//! Routes each client request to one healthy backend node, rotating fairly
//! among eligible nodes by least-recent use.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                    NODE DIRECTOR                      │
//!                    │                                                       │
//!  GET /api/hotnode  │  ┌──────────┐   ┌──────────┐   ┌──────────────────┐  │
//!  ──────────────────┼─▶│   http   │──▶│ security │──▶│     director     │  │
//!                    │  │  server  │   │ throttle │   │      engine      │  │
//!                    │  └──────────┘   └──────────┘   └───┬─────┬─────┬──┘  │
//!                    │                                    │     │     │     │
//!                    │                   ┌────────────────┘     │     └──┐  │
//!                    │                   ▼                      ▼        ▼  │
//!                    │            ┌────────────┐   ┌────────────┐ ┌───────┐│     Backend
//!                    │            │  registry  │   │   health   │─┼───────┼┼───▶ /health
//!                    │            │ (+ JSON)   │   │ aggregator │ │select-││
//!                    │            └────────────┘   └────────────┘ │ ion   ││
//!                    │                                            └───────┘│
//!                    │  ┌────────────────────────────────────────────────┐ │
//!                    │  │  config (hot reload) · observability · lifecycle │ │
//!                    │  └────────────────────────────────────────────────┘ │
//!                    └──────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod director;
pub mod http;
pub mod net;
pub mod registry;

// Node arbitration
pub mod health;
pub mod selection;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::DirectorConfig;
pub use director::Director;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use registry::{InMemoryRegistry, NodeRegistry};
