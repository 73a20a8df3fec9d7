//! `appstream_fleet` lifecycle

use crate::error::AppStreamError;
use crate::mapper::{expand_fleet, expand_fleet_update, flatten_fleet, flatten_tags};
use crate::model::FleetState;
use crate::provider::AppStreamMeta;
use crate::schema::fleet_schema;
use appstream_plugin::{Resource, ResourceData, Result, Schema, async_trait};

pub struct FleetResource;

async fn fleet_arn(meta: &AppStreamMeta, name: &str) -> Result<String> {
    let fleet = meta
        .api
        .describe_fleet(name)
        .await?
        .ok_or_else(|| AppStreamError::not_found("fleet", name))?;
    Ok(fleet.arn)
}

async fn start(meta: &AppStreamMeta, name: &str) -> Result<()> {
    tracing::info!("Starting AppStream fleet {}", name);
    meta.api.start_fleet(name).await?;
    meta.wait_for_fleet_state(name, FleetState::Running).await?;
    Ok(())
}

async fn stop(meta: &AppStreamMeta, name: &str) -> Result<()> {
    tracing::info!("Stopping AppStream fleet {}", name);
    meta.api.stop_fleet(name).await?;
    meta.wait_for_fleet_state(name, FleetState::Stopped).await?;
    Ok(())
}

#[async_trait]
impl Resource<AppStreamMeta> for FleetResource {
    fn schema(&self) -> Schema {
        fleet_schema()
    }

    async fn create(&self, d: &mut ResourceData, meta: &AppStreamMeta) -> Result<()> {
        let request = expand_fleet(d)?;
        let name = request.name.clone();

        meta.api.create_fleet(&request).await?;
        tracing::info!("AppStream fleet {} created", name);

        meta.sync_tags(d, || fleet_arn(meta, &name)).await?;

        if d.get_string("state").as_deref() == Some(FleetState::Running.as_str()) {
            start(meta, &name).await?;
        }

        d.set_id(name);
        self.read(d, meta).await
    }

    async fn read(&self, d: &mut ResourceData, meta: &AppStreamMeta) -> Result<()> {
        let Some(fleet) = meta.api.describe_fleet(d.id()).await? else {
            tracing::warn!("AppStream fleet {} not found", d.id());
            d.clear_id();
            return Ok(());
        };

        flatten_fleet(d, &fleet);
        let tags = meta.api.list_tags(&fleet.arn).await?;
        d.set("tags", flatten_tags(&tags));
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData, meta: &AppStreamMeta) -> Result<()> {
        let name = d.id().to_string();

        let request = expand_fleet_update(d)?;
        if request.is_empty() {
            tracing::debug!("No updatable fleet attribute changed for {}", name);
        } else {
            meta.api.update_fleet(&request).await?;
            tracing::info!("AppStream fleet {} updated", name);
        }

        if d.has_change("tags") {
            meta.sync_tags(d, || fleet_arn(meta, &name)).await?;
        }

        if d.has_change("state") {
            match d.get_string("state").map(|s| FleetState::parse(&s)) {
                Some(FleetState::Stopped) => stop(meta, &name).await?,
                Some(FleetState::Running) => start(meta, &name).await?,
                Some(other) => tracing::warn!("Ignoring unsupported fleet state {}", other),
                None => {}
            }
        }

        self.read(d, meta).await
    }

    async fn delete(&self, d: &mut ResourceData, meta: &AppStreamMeta) -> Result<()> {
        let name = d.id().to_string();
        let Some(fleet) = meta.api.describe_fleet(&name).await? else {
            tracing::warn!("AppStream fleet {} already gone", name);
            return Ok(());
        };

        match fleet.state {
            Some(FleetState::Running | FleetState::Starting) => stop(meta, &name).await?,
            Some(FleetState::Stopping) => {
                meta.wait_for_fleet_state(&name, FleetState::Stopped).await?;
            }
            _ => {}
        }

        meta.api.delete_fleet(&name).await?;
        tracing::info!("AppStream fleet {} deleted", name);
        Ok(())
    }
}
