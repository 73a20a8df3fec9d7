//! `appstream_stack_attachment` lifecycle
//!
//! Associates one fleet with one stack. The id is `"{stack}/{fleet}"`;
//! AppStream names cannot contain `/`.

use crate::provider::AppStreamMeta;
use crate::schema::stack_attachment_schema;
use appstream_plugin::{ProviderError, Resource, ResourceData, Result, Schema, async_trait};

const STACK_KEY: &str = "appstream_stack_id";
const FLEET_KEY: &str = "appstream_fleet_id";

pub struct StackAttachmentResource;

pub fn attachment_id(stack: &str, fleet: &str) -> String {
    format!("{}/{}", stack, fleet)
}

/// Split an attachment id into `(stack, fleet)`
pub fn parse_attachment_id(id: &str) -> Result<(&str, &str)> {
    match id.split_once('/') {
        Some((stack, fleet)) if !stack.is_empty() && !fleet.is_empty() && !fleet.contains('/') => {
            Ok((stack, fleet))
        }
        _ => Err(ProviderError::InvalidId {
            id: id.to_string(),
            message: "expected <stack name>/<fleet name>".to_string(),
        }),
    }
}

fn configured_pair(d: &ResourceData) -> Result<(String, String)> {
    let stack = d
        .get_string(STACK_KEY)
        .ok_or_else(|| ProviderError::invalid_attribute(STACK_KEY, "stack name is required"))?;
    let fleet = d
        .get_string(FLEET_KEY)
        .ok_or_else(|| ProviderError::invalid_attribute(FLEET_KEY, "fleet name is required"))?;
    Ok((stack, fleet))
}

#[async_trait]
impl Resource<AppStreamMeta> for StackAttachmentResource {
    fn schema(&self) -> Schema {
        stack_attachment_schema()
    }

    async fn create(&self, d: &mut ResourceData, meta: &AppStreamMeta) -> Result<()> {
        let (stack, fleet) = configured_pair(d)?;

        meta.api.associate_fleet(&stack, &fleet).await?;
        tracing::info!("Fleet {} associated with stack {}", fleet, stack);

        d.set_id(attachment_id(&stack, &fleet));
        self.read(d, meta).await
    }

    async fn read(&self, d: &mut ResourceData, meta: &AppStreamMeta) -> Result<()> {
        let (stack, fleet) = {
            let (stack, fleet) = parse_attachment_id(d.id())?;
            (stack.to_string(), fleet.to_string())
        };

        let associated = meta.api.list_associated_fleets(&stack).await?;
        if !associated.is_some_and(|fleets| fleets.contains(&fleet)) {
            tracing::warn!("Fleet {} is no longer associated with stack {}", fleet, stack);
            d.clear_id();
            return Ok(());
        }

        d.set(STACK_KEY, stack);
        d.set(FLEET_KEY, fleet);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, meta: &AppStreamMeta) -> Result<()> {
        if d.has_changes(&[STACK_KEY, FLEET_KEY]) {
            let (old_stack, old_fleet) = {
                let (stack, fleet) = parse_attachment_id(d.id())?;
                (stack.to_string(), fleet.to_string())
            };
            let (stack, fleet) = configured_pair(d)?;

            // Not atomic: a failed associate leaves the old pair disassociated
            meta.api.disassociate_fleet(&old_stack, &old_fleet).await?;
            tracing::info!("Fleet {} disassociated from stack {}", old_fleet, old_stack);
            meta.api.associate_fleet(&stack, &fleet).await?;
            tracing::info!("Fleet {} associated with stack {}", fleet, stack);

            d.set_id(attachment_id(&stack, &fleet));
        }

        self.read(d, meta).await
    }

    async fn delete(&self, d: &mut ResourceData, meta: &AppStreamMeta) -> Result<()> {
        let (stack, fleet) = parse_attachment_id(d.id())?;
        meta.api.disassociate_fleet(stack, fleet).await?;
        tracing::info!("Fleet {} disassociated from stack {}", fleet, stack);
        Ok(())
    }
}
