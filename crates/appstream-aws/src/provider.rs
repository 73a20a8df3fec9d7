//! Provider registration and configuration

use crate::api::AppStreamApi;
use crate::error::AppStreamError;
use crate::fleet::FleetResource;
use crate::mapper::{expand_tags, removed_tag_keys};
use crate::model::FleetState;
use crate::schema::provider_schema;
use crate::sdk::SdkAppStream;
use crate::stack::StackResource;
use crate::stack_attachment::StackAttachmentResource;
use appstream_config::Settings;
use appstream_plugin::{
    Attributes, CancellationToken, Configure, PollConfig, Provider, ProviderError, ResourceData,
    Result, async_trait, wait_for_state,
};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const PROVIDER_NAME: &str = "appstream";
pub const FLEET_TYPE: &str = "appstream_fleet";
pub const STACK_TYPE: &str = "appstream_stack";
pub const STACK_ATTACHMENT_TYPE: &str = "appstream_stack_attachment";

/// Configured client and timing handed to every lifecycle call
#[derive(Clone)]
pub struct AppStreamMeta {
    pub api: Arc<dyn AppStreamApi>,
    pub poll: PollConfig,
    /// Pause before looking up a freshly created or updated resource for tagging
    pub tag_delay: Duration,
    pub cancel: CancellationToken,
}

impl AppStreamMeta {
    pub fn new(api: Arc<dyn AppStreamApi>, settings: &Settings, cancel: CancellationToken) -> Self {
        Self {
            api,
            poll: PollConfig::new(settings.poll_interval(), settings.state_timeout()),
            tag_delay: settings.tag_delay(),
            cancel,
        }
    }

    /// Block until DescribeFleets reports `target` for `name`
    pub async fn wait_for_fleet_state(&self, name: &str, target: FleetState) -> Result<u32> {
        let resource = format!("fleet {}", name);
        let fetch = move || async move {
            let fleet = self
                .api
                .describe_fleet(name)
                .await?
                .ok_or_else(|| AppStreamError::not_found("fleet", name))?;
            tracing::debug!("Fleet {} is {:?}", name, fleet.state);
            Ok::<_, ProviderError>(fleet.state.unwrap_or(FleetState::Other(String::new())))
        };
        wait_for_state(&resource, &target, &self.poll, &self.cancel, fetch).await
    }

    /// Reconcile remote tags with the configured `tags` map.
    ///
    /// Waits `tag_delay` before resolving the ARN with `lookup`, so a
    /// resource created a moment ago is visible.
    pub async fn sync_tags<F, Fut>(&self, d: &ResourceData, lookup: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let tags = expand_tags(d);
        let removed = removed_tag_keys(d);
        if tags.is_empty() && removed.is_empty() {
            return Ok(());
        }

        tokio::time::sleep(self.tag_delay).await;
        let arn = lookup().await?;

        if !removed.is_empty() {
            tracing::debug!("Removing tags {:?} from {}", removed, arn);
            self.api.untag_resource(&arn, &removed).await?;
        }
        if !tags.is_empty() {
            tracing::debug!("Tagging {} with {:?}", arn, tags);
            self.api.tag_resource(&arn, &tags).await?;
        }
        Ok(())
    }
}

/// Builds [`AppStreamMeta`] from the provider block merged over file settings
pub struct AppStreamConfigurer {
    cancel: CancellationToken,
}

impl AppStreamConfigurer {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

#[async_trait]
impl Configure<AppStreamMeta> for AppStreamConfigurer {
    async fn configure(&self, config: &Attributes) -> Result<AppStreamMeta> {
        let settings = Settings::load().map_err(AppStreamError::from)?;
        let settings = merge_settings(settings, config)?;
        tracing::debug!("Provider settings: {:?}", settings);

        let api = SdkAppStream::connect(settings.region.clone(), settings.profile.clone()).await?;
        Ok(AppStreamMeta::new(Arc::new(api), &settings, self.cancel.clone()))
    }
}

fn seconds(config: &Attributes, key: &str) -> Result<Option<u64>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            ProviderError::invalid_attribute(key, "expected a non-negative integer")
        }),
    }
}

/// Provider block values override file settings key by key
pub fn merge_settings(mut settings: Settings, config: &Attributes) -> Result<Settings> {
    if let Some(region) = config.get("region").and_then(Value::as_str) {
        settings.region = Some(region.to_string());
    }
    if let Some(profile) = config.get("profile").and_then(Value::as_str) {
        settings.profile = Some(profile.to_string());
    }
    if let Some(secs) = seconds(config, "poll_interval_secs")? {
        settings.poll_interval_secs = secs;
    }
    if let Some(secs) = seconds(config, "state_timeout_secs")? {
        settings.state_timeout_secs = secs;
    }
    if let Some(secs) = seconds(config, "tag_delay_secs")? {
        settings.tag_delay_secs = secs;
    }
    Ok(settings)
}

/// The AppStream provider with its three resource types
pub fn appstream_provider(cancel: CancellationToken) -> Provider<AppStreamMeta> {
    Provider::new(PROVIDER_NAME, provider_schema(), AppStreamConfigurer::new(cancel))
        .resource(FLEET_TYPE, FleetResource)
        .resource(STACK_TYPE, StackResource)
        .resource(STACK_ATTACHMENT_TYPE, StackAttachmentResource)
}
