//! AppStream provider plugin surface
//!
//! Provider-agnostic building blocks for a declarative resource plugin:
//! attribute schemas, the per-call [`ResourceData`] view with field-level
//! change detection, the [`Resource`] CRUD trait, the [`Provider`] registry,
//! the state-convergence poller, and the gRPC server that speaks Terraform
//! plugin protocol 6 on top of the registry.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   Terraform                      │
//! │     (plugin protocol 6 over gRPC, msgpack)       │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               appstream-plugin                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   PluginServer  ->  codec  ->  Provider   │   │
//! │  │   trait Resource<M> { create/read/... }   │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │    Schema    │  │    Poller    │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │ appstream-aws │  fleets, stacks, stack attachments
//! └───────────────┘
//! ```

pub mod codec;
pub mod data;
pub mod error;
pub mod poller;
pub mod provider;
pub mod schema;
pub mod server;

#[allow(clippy::all)]
pub mod generated;

// Re-exports
pub use data::{Attributes, ResourceData, ResourceState};
pub use error::{ProviderError, Result, ServeError};
pub use poller::{PollConfig, wait_for_state};
pub use provider::{Configure, PlanResult, Provider, ProviderSchema, Resource};
pub use schema::{Attribute, AttributeType, Diagnostic, ElementType, Schema, Severity};
pub use server::{PluginServer, handshake, serve, serve_on};

// Re-export for implementors of the traits
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
pub use tonic;
