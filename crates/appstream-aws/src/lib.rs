//! AWS AppStream 2.0 resources
//!
//! Registers `appstream_fleet`, `appstream_stack` and
//! `appstream_stack_attachment` with the plugin [`Provider`] registry.
//! Lifecycle handlers talk to AppStream through the [`AppStreamApi`] seam;
//! [`SdkAppStream`] implements it on top of `aws-sdk-appstream`.
//!
//! [`Provider`]: appstream_plugin::Provider

pub mod api;
pub mod error;
pub mod fleet;
pub mod mapper;
pub mod model;
pub mod provider;
pub mod schema;
pub mod sdk;
pub mod stack;
pub mod stack_attachment;

pub use api::AppStreamApi;
pub use error::{AppStreamError, Result};
pub use fleet::FleetResource;
pub use model::*;
pub use provider::{
    AppStreamConfigurer, AppStreamMeta, FLEET_TYPE, PROVIDER_NAME, STACK_ATTACHMENT_TYPE,
    STACK_TYPE, appstream_provider, merge_settings,
};
pub use sdk::SdkAppStream;
pub use stack::StackResource;
pub use stack_attachment::{StackAttachmentResource, attachment_id, parse_attachment_id};
