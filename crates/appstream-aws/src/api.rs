//! AppStream control-plane seam
//!
//! Lifecycle handlers only talk to [`AppStreamApi`]. The production
//! implementation is [`SdkAppStream`](crate::sdk::SdkAppStream); tests plug
//! in an in-memory fake.

use crate::error::Result;
use crate::model::{Fleet, FleetRequest, Stack, StackRequest, Tags};
use async_trait::async_trait;

#[async_trait]
pub trait AppStreamApi: Send + Sync {
    async fn create_fleet(&self, request: &FleetRequest) -> Result<()>;

    async fn update_fleet(&self, request: &FleetRequest) -> Result<()>;

    /// Describe one fleet by name; `None` when it does not exist
    async fn describe_fleet(&self, name: &str) -> Result<Option<Fleet>>;

    async fn start_fleet(&self, name: &str) -> Result<()>;

    async fn stop_fleet(&self, name: &str) -> Result<()>;

    async fn delete_fleet(&self, name: &str) -> Result<()>;

    async fn create_stack(&self, request: &StackRequest) -> Result<()>;

    async fn update_stack(&self, request: &StackRequest) -> Result<()>;

    /// Describe one stack by name; `None` when it does not exist
    async fn describe_stack(&self, name: &str) -> Result<Option<Stack>>;

    async fn delete_stack(&self, name: &str) -> Result<()>;

    async fn associate_fleet(&self, stack: &str, fleet: &str) -> Result<()>;

    async fn disassociate_fleet(&self, stack: &str, fleet: &str) -> Result<()>;

    /// Fleet names associated with a stack; `None` when the stack is gone
    async fn list_associated_fleets(&self, stack: &str) -> Result<Option<Vec<String>>>;

    async fn tag_resource(&self, arn: &str, tags: &Tags) -> Result<()>;

    async fn untag_resource(&self, arn: &str, keys: &[String]) -> Result<()>;

    async fn list_tags(&self, arn: &str) -> Result<Tags>;
}
