//! `appstream_stack` lifecycle

use crate::error::AppStreamError;
use crate::mapper::{expand_stack, expand_stack_update, flatten_stack, flatten_tags};
use crate::provider::AppStreamMeta;
use crate::schema::stack_schema;
use appstream_plugin::{Resource, ResourceData, Result, Schema, async_trait};

pub struct StackResource;

async fn stack_arn(meta: &AppStreamMeta, name: &str) -> Result<String> {
    let stack = meta
        .api
        .describe_stack(name)
        .await?
        .ok_or_else(|| AppStreamError::not_found("stack", name))?;
    Ok(stack.arn)
}

#[async_trait]
impl Resource<AppStreamMeta> for StackResource {
    fn schema(&self) -> Schema {
        stack_schema()
    }

    async fn create(&self, d: &mut ResourceData, meta: &AppStreamMeta) -> Result<()> {
        let request = expand_stack(d)?;
        let name = request.name.clone();

        meta.api.create_stack(&request).await?;
        tracing::info!("AppStream stack {} created", name);

        meta.sync_tags(d, || stack_arn(meta, &name)).await?;

        d.set_id(name);
        self.read(d, meta).await
    }

    async fn read(&self, d: &mut ResourceData, meta: &AppStreamMeta) -> Result<()> {
        let Some(stack) = meta.api.describe_stack(d.id()).await? else {
            tracing::warn!("AppStream stack {} not found", d.id());
            d.clear_id();
            return Ok(());
        };

        flatten_stack(d, &stack);
        let tags = meta.api.list_tags(&stack.arn).await?;
        d.set("tags", flatten_tags(&tags));
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, meta: &AppStreamMeta) -> Result<()> {
        let name = d.id().to_string();

        let request = expand_stack_update(d)?;
        if request.is_empty() {
            tracing::debug!("No updatable stack attribute changed for {}", name);
        } else {
            meta.api.update_stack(&request).await?;
            tracing::info!("AppStream stack {} updated", name);
        }

        if d.has_change("tags") {
            meta.sync_tags(d, || stack_arn(meta, &name)).await?;
        }

        self.read(d, meta).await
    }

    async fn delete(&self, d: &mut ResourceData, meta: &AppStreamMeta) -> Result<()> {
        meta.api.delete_stack(d.id()).await?;
        tracing::info!("AppStream stack {} deleted", d.id());
        Ok(())
    }
}
