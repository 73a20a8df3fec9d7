//! Attribute mapper
//!
//! *expand* turns the attribute map of a [`ResourceData`] into AppStream
//! request structs; *flatten* writes described objects back into it.
//!
//! Nested single blocks (`compute_capacity`, `domain_info`, `vpc_config`,
//! `application_settings`) are lists holding one map. Empty remote
//! collections flatten to null so they never diff against an unset value.

use crate::model::{
    AccessEndpoint, ApplicationSettings, DomainJoinInfo, Fleet, FleetAttribute, FleetRequest,
    Stack, StackAttribute, StackRequest, StorageConnector, Tags, UserSetting, VpcConfig,
};
use appstream_plugin::{Attributes, ProviderError, ResourceData, Result};
use serde_json::{Value, json};

/// First (and only) map of a single-block list
fn block<'a>(d: &'a ResourceData, key: &str) -> Option<&'a Attributes> {
    d.get_ok(key)?.as_array()?.first()?.as_object()
}

/// Every map of a block list or set
fn blocks<'a>(d: &'a ResourceData, key: &str) -> Vec<&'a Attributes> {
    d.get_ok(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

fn block_string(block: &Attributes, key: &str) -> Option<String> {
    block
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn block_strings(block: &Attributes, key: &str) -> Vec<String> {
    block
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn strings(d: &ResourceData, key: &str) -> Option<Vec<String>> {
    let items: Vec<String> = d
        .get_ok(key)?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

fn to_i32(key: &str, value: i64) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| ProviderError::invalid_attribute(key, format!("{} is out of range", value)))
}

fn int(d: &ResourceData, key: &str) -> Result<Option<i32>> {
    d.get_int(key).map(|n| to_i32(key, n)).transpose()
}

/// The value only when the attribute changed since the prior state
fn changed<T>(d: &ResourceData, key: &str, value: Option<T>) -> Option<T> {
    if d.has_change(key) { value } else { None }
}

/// Planned string of a changed attribute, `""` once cleared
fn changed_string(d: &ResourceData, key: &str) -> Option<String> {
    d.has_change(key)
        .then(|| d.get(key).and_then(Value::as_str).unwrap_or_default().to_string())
}

/// Planned integer of a changed attribute, `0` once cleared
fn changed_int(d: &ResourceData, key: &str) -> Result<Option<i32>> {
    if !d.has_change(key) {
        return Ok(None);
    }
    let n = d.get(key).and_then(Value::as_i64).unwrap_or(0);
    to_i32(key, n).map(Some)
}

/// Whether the attribute changed from set to unset
fn removed(d: &ResourceData, key: &str) -> bool {
    d.has_change(key) && d.get_ok(key).is_none()
}

fn list_or_null(items: Vec<Value>) -> Value {
    if items.is_empty() {
        Value::Null
    } else {
        Value::Array(items)
    }
}

fn strings_or_null(items: &[String]) -> Value {
    list_or_null(items.iter().cloned().map(Value::from).collect())
}

fn desired_instances(d: &ResourceData) -> Result<Option<i32>> {
    let Some(capacity) = block(d, "compute_capacity") else {
        return Ok(None);
    };
    capacity
        .get("desired_instances")
        .and_then(Value::as_i64)
        .map(|n| to_i32("compute_capacity.0.desired_instances", n))
        .transpose()
}

fn domain_join_info(d: &ResourceData) -> Option<DomainJoinInfo> {
    block(d, "domain_info").map(|info| DomainJoinInfo {
        directory_name: block_string(info, "directory_name"),
        organizational_unit_distinguished_name: block_string(
            info,
            "organizational_unit_distinguished_name",
        ),
    })
}

fn vpc_config(d: &ResourceData) -> Option<VpcConfig> {
    block(d, "vpc_config").map(|vpc| VpcConfig {
        security_group_ids: block_strings(vpc, "security_group_ids"),
        subnet_ids: block_strings(vpc, "subnet_ids"),
    })
}

/// `CreateFleet` input from every set attribute
pub fn expand_fleet(d: &ResourceData) -> Result<FleetRequest> {
    let name = d
        .get_string("name")
        .ok_or_else(|| ProviderError::invalid_attribute("name", "fleet name is required"))?;

    Ok(FleetRequest {
        desired_instances: desired_instances(d)?,
        description: d.get_string("description"),
        disconnect_timeout_in_seconds: int(d, "disconnect_timeout")?,
        display_name: d.get_string("display_name"),
        domain_join_info: domain_join_info(d),
        enable_default_internet_access: d.get_bool("enable_default_internet_access"),
        fleet_type: d.get_string("fleet_type"),
        iam_role_arn: d.get_string("iam_role_arn"),
        idle_disconnect_timeout_in_seconds: int(d, "idle_disconnect_timeout")?,
        image_name: d.get_string("image_name"),
        instance_type: d.get_string("instance_type"),
        max_user_duration_in_seconds: int(d, "max_user_duration")?,
        stream_view: d.get_string("stream_view"),
        vpc_config: vpc_config(d),
        ..FleetRequest::new(name)
    })
}

/// `UpdateFleet` input holding only the attributes that changed
pub fn expand_fleet_update(d: &ResourceData) -> Result<FleetRequest> {
    let mut request = FleetRequest::new(d.id());

    request.desired_instances = changed(d, "compute_capacity", desired_instances(d)?);
    request.description = changed_string(d, "description");
    request.disconnect_timeout_in_seconds = changed_int(d, "disconnect_timeout")?;
    request.display_name = changed_string(d, "display_name");
    request.domain_join_info = changed(d, "domain_info", domain_join_info(d));
    request.enable_default_internet_access = changed(
        d,
        "enable_default_internet_access",
        Some(d.get_bool("enable_default_internet_access").unwrap_or(false)),
    );
    // cleared through attributes_to_delete
    request.iam_role_arn = changed(d, "iam_role_arn", d.get_string("iam_role_arn"));
    request.idle_disconnect_timeout_in_seconds = changed_int(d, "idle_disconnect_timeout")?;
    request.image_name = changed_string(d, "image_name");
    request.instance_type = changed_string(d, "instance_type");
    request.max_user_duration_in_seconds = changed_int(d, "max_user_duration")?;
    request.stream_view = changed_string(d, "stream_view");
    request.vpc_config = changed(d, "vpc_config", vpc_config(d));

    for (key, attribute) in [
        ("vpc_config", FleetAttribute::VpcConfiguration),
        ("domain_info", FleetAttribute::DomainJoinInfo),
        ("iam_role_arn", FleetAttribute::IamRoleArn),
    ] {
        if removed(d, key) {
            request.attributes_to_delete.push(attribute);
        }
    }

    Ok(request)
}

/// Write a described fleet into `d`
pub fn flatten_fleet(d: &mut ResourceData, fleet: &Fleet) {
    d.set("name", fleet.name.as_str());
    d.set("arn", fleet.arn.as_str());
    d.set(
        "compute_capacity",
        fleet
            .desired_instances
            .map_or(Value::Null, |n| json!([{ "desired_instances": n }])),
    );
    d.set("description", fleet.description.clone());
    d.set("disconnect_timeout", fleet.disconnect_timeout_in_seconds);
    d.set("display_name", fleet.display_name.clone());
    d.set(
        "domain_info",
        fleet.domain_join_info.as_ref().map_or(Value::Null, |info| {
            let ou = &info.organizational_unit_distinguished_name;
            json!([{
                "directory_name": info.directory_name,
                "organizational_unit_distinguished_name": ou,
            }])
        }),
    );
    d.set(
        "enable_default_internet_access",
        fleet.enable_default_internet_access,
    );
    d.set("fleet_type", fleet.fleet_type.clone());
    d.set("iam_role_arn", fleet.iam_role_arn.clone());
    d.set(
        "idle_disconnect_timeout",
        fleet.idle_disconnect_timeout_in_seconds,
    );
    d.set("image_name", fleet.image_name.clone());
    d.set("instance_type", fleet.instance_type.clone());
    d.set("max_user_duration", fleet.max_user_duration_in_seconds);
    d.set("stream_view", fleet.stream_view.clone());
    d.set(
        "vpc_config",
        fleet.vpc_config.as_ref().map_or(Value::Null, |vpc| {
            json!([{
                "security_group_ids": strings_or_null(&vpc.security_group_ids),
                "subnet_ids": strings_or_null(&vpc.subnet_ids),
            }])
        }),
    );
    d.set("state", fleet.state.as_ref().map(|s| s.as_str().to_string()));
}

fn access_endpoints(d: &ResourceData) -> Option<Vec<AccessEndpoint>> {
    let endpoints: Vec<AccessEndpoint> = blocks(d, "access_endpoints")
        .into_iter()
        .filter_map(|e| {
            Some(AccessEndpoint {
                endpoint_type: block_string(e, "endpoint_type")?,
                vpce_id: block_string(e, "vpce_id"),
            })
        })
        .collect();
    (!endpoints.is_empty()).then_some(endpoints)
}

fn application_settings(d: &ResourceData) -> Option<ApplicationSettings> {
    block(d, "application_settings").map(|s| ApplicationSettings {
        enabled: s.get("enabled").and_then(Value::as_bool).unwrap_or(false),
        settings_group: block_string(s, "settings_group"),
    })
}

fn storage_connectors(d: &ResourceData) -> Option<Vec<StorageConnector>> {
    let connectors: Vec<StorageConnector> = blocks(d, "storage_connectors")
        .into_iter()
        .filter_map(|c| {
            Some(StorageConnector {
                connector_type: block_string(c, "connector_type")?,
                domains: block_strings(c, "domains"),
                resource_identifier: block_string(c, "resource_identifier"),
            })
        })
        .collect();
    (!connectors.is_empty()).then_some(connectors)
}

fn user_settings(d: &ResourceData) -> Option<Vec<UserSetting>> {
    let settings: Vec<UserSetting> = blocks(d, "user_settings")
        .into_iter()
        .filter_map(|s| {
            Some(UserSetting {
                action: block_string(s, "action")?,
                permission: block_string(s, "permission")?,
            })
        })
        .collect();
    (!settings.is_empty()).then_some(settings)
}

/// `CreateStack` input from every set attribute
pub fn expand_stack(d: &ResourceData) -> Result<StackRequest> {
    let name = d
        .get_string("name")
        .ok_or_else(|| ProviderError::invalid_attribute("name", "stack name is required"))?;

    Ok(StackRequest {
        access_endpoints: access_endpoints(d),
        application_settings: application_settings(d),
        description: d.get_string("description"),
        display_name: d.get_string("display_name"),
        embed_host_domains: strings(d, "embed_host_domains"),
        feedback_url: d.get_string("feedback_url"),
        redirect_url: d.get_string("redirect_url"),
        storage_connectors: storage_connectors(d),
        user_settings: user_settings(d),
        ..StackRequest::new(name)
    })
}

/// `UpdateStack` input holding only the attributes that changed
pub fn expand_stack_update(d: &ResourceData) -> Result<StackRequest> {
    let mut request = StackRequest::new(d.id());

    request.access_endpoints = changed(d, "access_endpoints", access_endpoints(d));
    request.application_settings = changed(
        d,
        "application_settings",
        Some(application_settings(d).unwrap_or_default()),
    );
    request.description = changed_string(d, "description");
    request.display_name = changed_string(d, "display_name");
    request.embed_host_domains = changed(d, "embed_host_domains", strings(d, "embed_host_domains"));
    request.feedback_url = changed(d, "feedback_url", d.get_string("feedback_url"));
    request.redirect_url = changed(d, "redirect_url", d.get_string("redirect_url"));
    request.storage_connectors = changed(d, "storage_connectors", storage_connectors(d));
    request.user_settings = changed(d, "user_settings", user_settings(d));

    for (key, attribute) in [
        ("access_endpoints", StackAttribute::AccessEndpoints),
        ("embed_host_domains", StackAttribute::EmbedHostDomains),
        ("feedback_url", StackAttribute::FeedbackUrl),
        ("redirect_url", StackAttribute::RedirectUrl),
        ("storage_connectors", StackAttribute::StorageConnectors),
        ("user_settings", StackAttribute::UserSettings),
    ] {
        if removed(d, key) {
            request.attributes_to_delete.push(attribute);
        }
    }

    Ok(request)
}

/// Write a described stack into `d`
pub fn flatten_stack(d: &mut ResourceData, stack: &Stack) {
    d.set("name", stack.name.as_str());
    d.set("arn", stack.arn.as_str());
    d.set(
        "access_endpoints",
        list_or_null(
            stack
                .access_endpoints
                .iter()
                .map(|e| json!({ "endpoint_type": e.endpoint_type, "vpce_id": e.vpce_id }))
                .collect(),
        ),
    );
    d.set(
        "application_settings",
        stack.application_settings.as_ref().map_or(Value::Null, |s| {
            json!([{ "enabled": s.enabled, "settings_group": s.settings_group }])
        }),
    );
    d.set("description", stack.description.clone());
    d.set("display_name", stack.display_name.clone());
    d.set("embed_host_domains", strings_or_null(&stack.embed_host_domains));
    d.set("feedback_url", stack.feedback_url.clone());
    d.set("redirect_url", stack.redirect_url.clone());
    d.set(
        "storage_connectors",
        list_or_null(
            stack
                .storage_connectors
                .iter()
                .map(|c| {
                    json!({
                        "connector_type": c.connector_type,
                        "domains": strings_or_null(&c.domains),
                        "resource_identifier": c.resource_identifier,
                    })
                })
                .collect(),
        ),
    );
    d.set(
        "user_settings",
        list_or_null(
            stack
                .user_settings
                .iter()
                .map(|s| json!({ "action": s.action, "permission": s.permission }))
                .collect(),
        ),
    );
}

/// Configured `tags` map
pub fn expand_tags(d: &ResourceData) -> Tags {
    d.get_ok("tags")
        .and_then(Value::as_object)
        .map(|tags| {
            tags.iter()
                .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Tag keys present before this call but absent now
pub fn removed_tag_keys(d: &ResourceData) -> Vec<String> {
    let current = expand_tags(d);
    d.prior("tags")
        .and_then(Value::as_object)
        .map(|prior| {
            prior
                .keys()
                .filter(|k| !current.contains_key(k.as_str()))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

pub fn flatten_tags(tags: &Tags) -> Value {
    if tags.is_empty() {
        Value::Null
    } else {
        json!(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FleetState;
    use appstream_plugin::ResourceState;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_expand_fleet_only_set_fields() {
        let d = ResourceData::new(attrs(json!({
            "name": "fleet-a",
            "instance_type": "stream.standard.medium",
            "compute_capacity": [{ "desired_instances": 2 }],
            "description": "",
            "disconnect_timeout": 0,
            "enable_default_internet_access": false,
            "vpc_config": [{ "subnet_ids": ["subnet-1"], "security_group_ids": [] }],
        })));

        let request = expand_fleet(&d).unwrap();
        assert_eq!(request.name, "fleet-a");
        assert_eq!(request.desired_instances, Some(2));
        assert_eq!(request.instance_type.as_deref(), Some("stream.standard.medium"));
        assert_eq!(request.description, None);
        assert_eq!(request.disconnect_timeout_in_seconds, None);
        assert_eq!(request.enable_default_internet_access, None);
        assert_eq!(
            request.vpc_config,
            Some(VpcConfig {
                security_group_ids: vec![],
                subnet_ids: vec!["subnet-1".into()],
            })
        );
        assert!(request.attributes_to_delete.is_empty());
    }

    #[test]
    fn test_expand_fleet_rejects_out_of_range_int() {
        let d = ResourceData::new(attrs(json!({
            "name": "fleet-a",
            "max_user_duration": 5_000_000_000i64,
        })));
        let err = expand_fleet(&d).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_expand_fleet_update_changed_fields_only() {
        let prior = ResourceState::new(
            "fleet-a",
            attrs(json!({
                "name": "fleet-a",
                "description": "old",
                "display_name": "Fleet A",
                "enable_default_internet_access": true,
                "iam_role_arn": "arn:aws:iam::1:role/x",
                "vpc_config": [{ "subnet_ids": ["subnet-1"] }],
            })),
        );
        let d = ResourceData::for_update(
            prior,
            attrs(json!({
                "name": "fleet-a",
                "description": "new",
                "display_name": "Fleet A",
                "enable_default_internet_access": false,
            })),
        );

        let request = expand_fleet_update(&d).unwrap();
        assert_eq!(request.name, "fleet-a");
        assert_eq!(request.description.as_deref(), Some("new"));
        assert_eq!(request.display_name, None);
        assert_eq!(request.enable_default_internet_access, Some(false));
        assert_eq!(request.iam_role_arn, None);
        assert_eq!(request.vpc_config, None);
        assert_eq!(
            request.attributes_to_delete,
            vec![FleetAttribute::VpcConfiguration, FleetAttribute::IamRoleArn]
        );
    }

    #[test]
    fn test_expand_fleet_update_sends_cleared_values() {
        let prior = ResourceState::new(
            "fleet-a",
            attrs(json!({
                "name": "fleet-a",
                "description": "old",
                "idle_disconnect_timeout": 600,
                "max_user_duration": 3600,
            })),
        );
        let d = ResourceData::for_update(
            prior,
            attrs(json!({
                "name": "fleet-a",
                "idle_disconnect_timeout": 0,
                "max_user_duration": 3600,
            })),
        );

        let request = expand_fleet_update(&d).unwrap();
        assert_eq!(request.description.as_deref(), Some(""));
        assert_eq!(request.idle_disconnect_timeout_in_seconds, Some(0));
        assert_eq!(request.max_user_duration_in_seconds, None);
        assert!(request.attributes_to_delete.is_empty());
    }

    #[test]
    fn test_expand_fleet_update_nothing_changed() {
        let state = ResourceState::new(
            "fleet-a",
            attrs(json!({ "name": "fleet-a", "image_name": "img" })),
        );
        let planned = state.attributes.clone();
        let d = ResourceData::for_update(state, planned);
        assert!(expand_fleet_update(&d).unwrap().is_empty());
    }

    #[test]
    fn test_flatten_fleet_nested_blocks() {
        let fleet = Fleet {
            name: "fleet-a".into(),
            arn: "arn:aws:appstream:us-east-1:1:fleet/fleet-a".into(),
            state: Some(FleetState::Stopped),
            desired_instances: Some(1),
            domain_join_info: Some(DomainJoinInfo {
                directory_name: Some("corp.example.com".into()),
                organizational_unit_distinguished_name: None,
            }),
            vpc_config: Some(VpcConfig {
                security_group_ids: vec!["sg-1".into()],
                subnet_ids: vec!["subnet-1".into(), "subnet-2".into()],
            }),
            ..Fleet::default()
        };

        let mut d = ResourceData::for_import("fleet-a");
        flatten_fleet(&mut d, &fleet);

        assert_eq!(d.get("compute_capacity"), Some(&json!([{ "desired_instances": 1 }])));
        assert_eq!(
            d.get("vpc_config"),
            Some(&json!([{
                "security_group_ids": ["sg-1"],
                "subnet_ids": ["subnet-1", "subnet-2"],
            }]))
        );
        assert_eq!(
            d.get("domain_info"),
            Some(&json!([{
                "directory_name": "corp.example.com",
                "organizational_unit_distinguished_name": null,
            }]))
        );
        assert_eq!(d.get_string("state").as_deref(), Some("STOPPED"));
        assert!(d.get("description").is_none());
    }

    #[test]
    fn test_expand_stack_blocks() {
        let d = ResourceData::new(attrs(json!({
            "name": "stack-a",
            "storage_connectors": [
                { "connector_type": "HOMEFOLDERS" },
                { "connector_type": "GOOGLE_DRIVE", "domains": ["example.com"] },
            ],
            "user_settings": [{
                "action": "CLIPBOARD_COPY_FROM_LOCAL_DEVICE",
                "permission": "ENABLED",
            }],
            "application_settings": [{ "enabled": true, "settings_group": "sg" }],
            "embed_host_domains": [],
        })));

        let request = expand_stack(&d).unwrap();
        let connectors = request.storage_connectors.unwrap();
        assert_eq!(connectors.len(), 2);
        assert_eq!(connectors[1].domains, vec!["example.com"]);
        assert_eq!(request.user_settings.unwrap()[0].permission, "ENABLED");
        assert_eq!(
            request.application_settings,
            Some(ApplicationSettings {
                enabled: true,
                settings_group: Some("sg".into()),
            })
        );
        assert_eq!(request.embed_host_domains, None);
        assert_eq!(request.access_endpoints, None);
    }

    #[test]
    fn test_expand_stack_update_removals() {
        let prior = ResourceState::new(
            "stack-a",
            attrs(json!({
                "name": "stack-a",
                "redirect_url": "https://example.com",
                "user_settings": [{ "action": "FILE_UPLOAD", "permission": "DISABLED" }],
            })),
        );
        let d = ResourceData::for_update(
            prior,
            attrs(json!({
                "name": "stack-a",
                "user_settings": [{ "action": "FILE_UPLOAD", "permission": "ENABLED" }],
            })),
        );

        let request = expand_stack_update(&d).unwrap();
        assert_eq!(request.redirect_url, None);
        assert_eq!(request.user_settings.unwrap()[0].permission, "ENABLED");
        assert_eq!(request.attributes_to_delete, vec![StackAttribute::RedirectUrl]);
        assert_eq!(request.application_settings, None);
    }

    #[test]
    fn test_flatten_stack_empty_collections_are_null() {
        let stack = Stack {
            name: "stack-a".into(),
            arn: "arn:aws:appstream:us-east-1:1:stack/stack-a".into(),
            ..Stack::default()
        };
        let mut d = ResourceData::for_import("stack-a");
        flatten_stack(&mut d, &stack);

        for key in [
            "access_endpoints",
            "embed_host_domains",
            "storage_connectors",
            "user_settings",
        ] {
            assert!(d.get(key).is_none(), "{} should be null", key);
        }
        assert_eq!(d.get_string("name").as_deref(), Some("stack-a"));
    }

    #[test]
    fn test_tags() {
        let prior = ResourceState::new(
            "fleet-a",
            attrs(json!({ "tags": { "team": "x", "env": "dev" } })),
        );
        let d = ResourceData::for_update(prior, attrs(json!({ "tags": { "team": "y" } })));

        assert_eq!(expand_tags(&d).get("team").map(String::as_str), Some("y"));
        assert_eq!(removed_tag_keys(&d), vec!["env"]);
        assert_eq!(flatten_tags(&Tags::new()), Value::Null);
    }
}
