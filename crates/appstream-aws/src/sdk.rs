//! [`AppStreamApi`] backed by `aws-sdk-appstream`

use crate::api::AppStreamApi;
use crate::error::{AppStreamError, Result};
use crate::model::{
    AccessEndpoint, ApplicationSettings, DomainJoinInfo, Fleet, FleetRequest, FleetState, Stack,
    StackRequest, StorageConnector, Tags, UserSetting, VpcConfig,
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_appstream::Client;
use aws_sdk_appstream::config::Region;
use aws_sdk_appstream::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_appstream::types;
use std::collections::HashMap;
use std::future::Future;

const NOT_FOUND_CODE: &str = "ResourceNotFoundException";

/// AppStream client built from the AWS default credential chain
#[derive(Clone, Debug)]
pub struct SdkAppStream {
    client: Client,
}

impl SdkAppStream {
    /// Load the AWS configuration, optionally pinning region and profile
    pub async fn connect(region: Option<String>, profile: Option<String>) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        if config.region().is_none() {
            return Err(AppStreamError::Config(
                "no AWS region configured (set `region` or AWS_REGION)".to_string(),
            ));
        }
        tracing::debug!("AppStream client region: {:?}", config.region());

        Ok(Self {
            client: Client::new(&config),
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AppStreamApi for SdkAppStream {
    async fn create_fleet(&self, request: &FleetRequest) -> Result<()> {
        tracing::debug!("CreateFleet: {:?}", request);
        self.client
            .create_fleet()
            .name(&request.name)
            .set_instance_type(request.instance_type.clone())
            .set_compute_capacity(compute_capacity(request.desired_instances))
            .set_description(request.description.clone())
            .set_disconnect_timeout_in_seconds(request.disconnect_timeout_in_seconds)
            .set_display_name(request.display_name.clone())
            .set_domain_join_info(domain_join_info(request.domain_join_info.as_ref()))
            .set_enable_default_internet_access(request.enable_default_internet_access)
            .set_fleet_type(request.fleet_type.as_deref().map(types::FleetType::from))
            .set_iam_role_arn(request.iam_role_arn.clone())
            .set_idle_disconnect_timeout_in_seconds(request.idle_disconnect_timeout_in_seconds)
            .set_image_name(request.image_name.clone())
            .set_max_user_duration_in_seconds(request.max_user_duration_in_seconds)
            .set_stream_view(request.stream_view.as_deref().map(types::StreamView::from))
            .set_vpc_config(vpc_config(request.vpc_config.as_ref()))
            .send()
            .await
            .map_err(|e| api_error("CreateFleet", e))?;
        Ok(())
    }

    async fn update_fleet(&self, request: &FleetRequest) -> Result<()> {
        tracing::debug!("UpdateFleet: {:?}", request);
        let attributes_to_delete = (!request.attributes_to_delete.is_empty()).then(|| {
            request
                .attributes_to_delete
                .iter()
                .map(|a| types::FleetAttribute::from(a.as_str()))
                .collect::<Vec<_>>()
        });

        self.client
            .update_fleet()
            .name(&request.name)
            .set_instance_type(request.instance_type.clone())
            .set_compute_capacity(compute_capacity(request.desired_instances))
            .set_description(request.description.clone())
            .set_disconnect_timeout_in_seconds(request.disconnect_timeout_in_seconds)
            .set_display_name(request.display_name.clone())
            .set_domain_join_info(domain_join_info(request.domain_join_info.as_ref()))
            .set_enable_default_internet_access(request.enable_default_internet_access)
            .set_iam_role_arn(request.iam_role_arn.clone())
            .set_idle_disconnect_timeout_in_seconds(request.idle_disconnect_timeout_in_seconds)
            .set_image_name(request.image_name.clone())
            .set_max_user_duration_in_seconds(request.max_user_duration_in_seconds)
            .set_stream_view(request.stream_view.as_deref().map(types::StreamView::from))
            .set_vpc_config(vpc_config(request.vpc_config.as_ref()))
            .set_attributes_to_delete(attributes_to_delete)
            .send()
            .await
            .map_err(|e| api_error("UpdateFleet", e))?;
        Ok(())
    }

    async fn describe_fleet(&self, name: &str) -> Result<Option<Fleet>> {
        let output = match self.client.describe_fleets().names(name).send().await {
            Ok(output) => output,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(api_error("DescribeFleets", e)),
        };

        Ok(output
            .fleets()
            .iter()
            .find(|f| f.name() == Some(name))
            .map(fleet_from_sdk))
    }

    async fn start_fleet(&self, name: &str) -> Result<()> {
        self.client
            .start_fleet()
            .name(name)
            .send()
            .await
            .map_err(|e| api_error("StartFleet", e))?;
        Ok(())
    }

    async fn stop_fleet(&self, name: &str) -> Result<()> {
        self.client
            .stop_fleet()
            .name(name)
            .send()
            .await
            .map_err(|e| api_error("StopFleet", e))?;
        Ok(())
    }

    async fn delete_fleet(&self, name: &str) -> Result<()> {
        self.client
            .delete_fleet()
            .name(name)
            .send()
            .await
            .map_err(|e| api_error("DeleteFleet", e))?;
        Ok(())
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<()> {
        tracing::debug!("CreateStack: {:?}", request);
        self.client
            .create_stack()
            .name(&request.name)
            .set_access_endpoints(access_endpoints(request.access_endpoints.as_deref()))
            .set_application_settings(application_settings(
                request.application_settings.as_ref(),
            ))
            .set_description(request.description.clone())
            .set_display_name(request.display_name.clone())
            .set_embed_host_domains(request.embed_host_domains.clone())
            .set_feedback_url(request.feedback_url.clone())
            .set_redirect_url(request.redirect_url.clone())
            .set_storage_connectors(storage_connectors(request.storage_connectors.as_deref()))
            .set_user_settings(user_settings(request.user_settings.as_deref()))
            .send()
            .await
            .map_err(|e| api_error("CreateStack", e))?;
        Ok(())
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<()> {
        tracing::debug!("UpdateStack: {:?}", request);
        let attributes_to_delete = (!request.attributes_to_delete.is_empty()).then(|| {
            request
                .attributes_to_delete
                .iter()
                .map(|a| types::StackAttribute::from(a.as_str()))
                .collect::<Vec<_>>()
        });

        self.client
            .update_stack()
            .name(&request.name)
            .set_access_endpoints(access_endpoints(request.access_endpoints.as_deref()))
            .set_application_settings(application_settings(
                request.application_settings.as_ref(),
            ))
            .set_description(request.description.clone())
            .set_display_name(request.display_name.clone())
            .set_embed_host_domains(request.embed_host_domains.clone())
            .set_feedback_url(request.feedback_url.clone())
            .set_redirect_url(request.redirect_url.clone())
            .set_storage_connectors(storage_connectors(request.storage_connectors.as_deref()))
            .set_user_settings(user_settings(request.user_settings.as_deref()))
            .set_attributes_to_delete(attributes_to_delete)
            .send()
            .await
            .map_err(|e| api_error("UpdateStack", e))?;
        Ok(())
    }

    async fn describe_stack(&self, name: &str) -> Result<Option<Stack>> {
        let output = match self.client.describe_stacks().names(name).send().await {
            Ok(output) => output,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(api_error("DescribeStacks", e)),
        };

        Ok(output
            .stacks()
            .iter()
            .find(|s| s.name() == Some(name))
            .map(stack_from_sdk))
    }

    async fn delete_stack(&self, name: &str) -> Result<()> {
        self.client
            .delete_stack()
            .name(name)
            .send()
            .await
            .map_err(|e| api_error("DeleteStack", e))?;
        Ok(())
    }

    async fn associate_fleet(&self, stack: &str, fleet: &str) -> Result<()> {
        self.client
            .associate_fleet()
            .stack_name(stack)
            .fleet_name(fleet)
            .send()
            .await
            .map_err(|e| api_error("AssociateFleet", e))?;
        Ok(())
    }

    async fn disassociate_fleet(&self, stack: &str, fleet: &str) -> Result<()> {
        self.client
            .disassociate_fleet()
            .stack_name(stack)
            .fleet_name(fleet)
            .send()
            .await
            .map_err(|e| api_error("DisassociateFleet", e))?;
        Ok(())
    }

    async fn list_associated_fleets(&self, stack: &str) -> Result<Option<Vec<String>>> {
        collect_pages(|next_token| async move {
            match self
                .client
                .list_associated_fleets()
                .stack_name(stack)
                .set_next_token(next_token)
                .send()
                .await
            {
                Ok(output) => Ok(Some((
                    output.names().to_vec(),
                    output.next_token().map(str::to_string),
                ))),
                Err(e) if is_not_found(&e) => Ok(None),
                Err(e) => Err(api_error("ListAssociatedFleets", e)),
            }
        })
        .await
    }

    async fn tag_resource(&self, arn: &str, tags: &Tags) -> Result<()> {
        let tags: HashMap<String, String> =
            tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        self.client
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(|e| api_error("TagResource", e))?;
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, keys: &[String]) -> Result<()> {
        self.client
            .untag_resource()
            .resource_arn(arn)
            .set_tag_keys(Some(keys.to_vec()))
            .send()
            .await
            .map_err(|e| api_error("UntagResource", e))?;
        Ok(())
    }

    async fn list_tags(&self, arn: &str) -> Result<Tags> {
        let output = self
            .client
            .list_tags_for_resource()
            .resource_arn(arn)
            .send()
            .await
            .map_err(|e| api_error("ListTagsForResource", e))?;
        Ok(output
            .tags()
            .map(|tags| tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}

fn is_not_found<E: ProvideErrorMetadata>(err: &E) -> bool {
    err.code() == Some(NOT_FOUND_CODE)
}

fn api_error<E>(operation: &'static str, err: E) -> AppStreamError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let code = err.code().map(str::to_string);
    let message = DisplayErrorContext(&err).to_string();
    tracing::error!("{} failed: {}", operation, message);
    AppStreamError::Api {
        operation,
        code,
        message,
    }
}

fn compute_capacity(desired: Option<i32>) -> Option<types::ComputeCapacity> {
    desired.map(|n| types::ComputeCapacity::builder().desired_instances(n).build())
}

fn domain_join_info(info: Option<&DomainJoinInfo>) -> Option<types::DomainJoinInfo> {
    info.map(|info| {
        types::DomainJoinInfo::builder()
            .set_directory_name(info.directory_name.clone())
            .set_organizational_unit_distinguished_name(
                info.organizational_unit_distinguished_name.clone(),
            )
            .build()
    })
}

fn vpc_config(config: Option<&VpcConfig>) -> Option<types::VpcConfig> {
    config.map(|config| {
        types::VpcConfig::builder()
            .set_security_group_ids(Some(config.security_group_ids.clone()))
            .set_subnet_ids(Some(config.subnet_ids.clone()))
            .build()
    })
}

fn access_endpoints(endpoints: Option<&[AccessEndpoint]>) -> Option<Vec<types::AccessEndpoint>> {
    endpoints.map(|endpoints| {
        endpoints
            .iter()
            .map(|e| {
                types::AccessEndpoint::builder()
                    .endpoint_type(types::AccessEndpointType::from(e.endpoint_type.as_str()))
                    .set_vpce_id(e.vpce_id.clone())
                    .build()
            })
            .collect()
    })
}

fn application_settings(
    settings: Option<&ApplicationSettings>,
) -> Option<types::ApplicationSettings> {
    settings.map(|s| {
        types::ApplicationSettings::builder()
            .enabled(s.enabled)
            .set_settings_group(s.settings_group.clone())
            .build()
    })
}

fn storage_connectors(
    connectors: Option<&[StorageConnector]>,
) -> Option<Vec<types::StorageConnector>> {
    connectors.map(|connectors| {
        connectors
            .iter()
            .map(|c| {
                types::StorageConnector::builder()
                    .connector_type(types::StorageConnectorType::from(c.connector_type.as_str()))
                    .set_domains((!c.domains.is_empty()).then(|| c.domains.clone()))
                    .set_resource_identifier(c.resource_identifier.clone())
                    .build()
            })
            .collect()
    })
}

fn user_settings(settings: Option<&[UserSetting]>) -> Option<Vec<types::UserSetting>> {
    settings.map(|settings| {
        settings
            .iter()
            .map(|s| {
                types::UserSetting::builder()
                    .action(types::Action::from(s.action.as_str()))
                    .permission(types::Permission::from(s.permission.as_str()))
                    .build()
            })
            .collect()
    })
}

/// Drain a `next_token` paged listing; `None` from `fetch` means not found
async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Option<Vec<T>>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Option<(Vec<T>, Option<String>)>>>,
{
    let mut items = Vec::new();
    let mut next_token = None;
    loop {
        let Some((page, next)) = fetch(next_token.take()).await? else {
            return Ok(None);
        };
        items.extend(page);
        match next {
            Some(token) => next_token = Some(token),
            None => return Ok(Some(items)),
        }
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

fn fleet_from_sdk(fleet: &types::Fleet) -> Fleet {
    Fleet {
        name: fleet.name().unwrap_or_default().to_string(),
        arn: fleet.arn().unwrap_or_default().to_string(),
        state: fleet.state().map(|s| FleetState::parse(s.as_str())),
        desired_instances: fleet.compute_capacity_status().and_then(|c| c.desired()),
        description: owned(fleet.description()),
        disconnect_timeout_in_seconds: fleet.disconnect_timeout_in_seconds(),
        display_name: owned(fleet.display_name()),
        domain_join_info: fleet.domain_join_info().map(|info| DomainJoinInfo {
            directory_name: owned(info.directory_name()),
            organizational_unit_distinguished_name: owned(
                info.organizational_unit_distinguished_name(),
            ),
        }),
        enable_default_internet_access: fleet.enable_default_internet_access(),
        fleet_type: fleet.fleet_type().map(|t| t.as_str().to_string()),
        iam_role_arn: owned(fleet.iam_role_arn()),
        idle_disconnect_timeout_in_seconds: fleet.idle_disconnect_timeout_in_seconds(),
        image_name: owned(fleet.image_name()),
        instance_type: owned(fleet.instance_type()),
        max_user_duration_in_seconds: fleet.max_user_duration_in_seconds(),
        stream_view: fleet.stream_view().map(|v| v.as_str().to_string()),
        vpc_config: fleet.vpc_config().map(|vpc| VpcConfig {
            security_group_ids: vpc.security_group_ids().to_vec(),
            subnet_ids: vpc.subnet_ids().to_vec(),
        }),
    }
}

fn stack_from_sdk(stack: &types::Stack) -> Stack {
    Stack {
        name: stack.name().unwrap_or_default().to_string(),
        arn: stack.arn().unwrap_or_default().to_string(),
        access_endpoints: stack
            .access_endpoints()
            .iter()
            .map(|e| AccessEndpoint {
                endpoint_type: e
                    .endpoint_type()
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_default(),
                vpce_id: owned(e.vpce_id()),
            })
            .collect(),
        application_settings: stack.application_settings().map(|s| ApplicationSettings {
            enabled: s.enabled().unwrap_or_default(),
            settings_group: owned(s.settings_group()),
        }),
        description: owned(stack.description()),
        display_name: owned(stack.display_name()),
        embed_host_domains: stack.embed_host_domains().to_vec(),
        feedback_url: owned(stack.feedback_url()),
        redirect_url: owned(stack.redirect_url()),
        storage_connectors: stack
            .storage_connectors()
            .iter()
            .map(|c| StorageConnector {
                connector_type: c
                    .connector_type()
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_default(),
                domains: c.domains().to_vec(),
                resource_identifier: owned(c.resource_identifier()),
            })
            .collect(),
        user_settings: stack
            .user_settings()
            .iter()
            .map(|s| UserSetting {
                action: s.action().map(|a| a.as_str().to_string()).unwrap_or_default(),
                permission: s
                    .permission()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default(),
            })
            .collect(),
    }
}
