//! AppStream request and description types
//!
//! Plain structs exchanged with [`AppStreamApi`](crate::api::AppStreamApi).
//! Request structs carry only the fields the caller set; `None` leaves the
//! remote value (or remote default) untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag map attached to a fleet or stack
pub type Tags = BTreeMap<String, String>;

/// Lifecycle state of a fleet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FleetState {
    Starting,
    Running,
    Stopping,
    Stopped,
    #[serde(untagged)]
    Other(String),
}

impl FleetState {
    pub fn parse(value: &str) -> Self {
        match value {
            "STARTING" => Self::Starting,
            "RUNNING" => Self::Running,
            "STOPPING" => Self::Stopping,
            "STOPPED" => Self::Stopped,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Other(other) => other,
        }
    }
}

impl std::fmt::Display for FleetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainJoinInfo {
    pub directory_name: Option<String>,
    pub organizational_unit_distinguished_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcConfig {
    pub security_group_ids: Vec<String>,
    pub subnet_ids: Vec<String>,
}

/// Fleet attributes that can be removed through `UpdateFleet`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FleetAttribute {
    VpcConfiguration,
    DomainJoinInfo,
    IamRoleArn,
}

impl FleetAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VpcConfiguration => "VPC_CONFIGURATION",
            Self::DomainJoinInfo => "DOMAIN_JOIN_INFO",
            Self::IamRoleArn => "IAM_ROLE_ARN",
        }
    }
}

/// Input of `CreateFleet` and `UpdateFleet`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetRequest {
    pub name: String,
    pub desired_instances: Option<i32>,
    pub description: Option<String>,
    pub disconnect_timeout_in_seconds: Option<i32>,
    pub display_name: Option<String>,
    pub domain_join_info: Option<DomainJoinInfo>,
    pub enable_default_internet_access: Option<bool>,
    pub fleet_type: Option<String>,
    pub iam_role_arn: Option<String>,
    pub idle_disconnect_timeout_in_seconds: Option<i32>,
    pub image_name: Option<String>,
    pub instance_type: Option<String>,
    pub max_user_duration_in_seconds: Option<i32>,
    pub stream_view: Option<String>,
    pub vpc_config: Option<VpcConfig>,
    /// Update only: attributes to clear remotely
    pub attributes_to_delete: Vec<FleetAttribute>,
}

impl FleetRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether the request changes anything besides naming the fleet
    pub fn is_empty(&self) -> bool {
        *self == Self::new(self.name.clone())
    }
}

/// A fleet as reported by `DescribeFleets`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fleet {
    pub name: String,
    pub arn: String,
    pub state: Option<FleetState>,
    pub desired_instances: Option<i32>,
    pub description: Option<String>,
    pub disconnect_timeout_in_seconds: Option<i32>,
    pub display_name: Option<String>,
    pub domain_join_info: Option<DomainJoinInfo>,
    pub enable_default_internet_access: Option<bool>,
    pub fleet_type: Option<String>,
    pub iam_role_arn: Option<String>,
    pub idle_disconnect_timeout_in_seconds: Option<i32>,
    pub image_name: Option<String>,
    pub instance_type: Option<String>,
    pub max_user_duration_in_seconds: Option<i32>,
    pub stream_view: Option<String>,
    pub vpc_config: Option<VpcConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEndpoint {
    pub endpoint_type: String,
    pub vpce_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSettings {
    pub enabled: bool,
    pub settings_group: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConnector {
    pub connector_type: String,
    pub domains: Vec<String>,
    pub resource_identifier: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSetting {
    pub action: String,
    pub permission: String,
}

/// Stack attributes that can be removed through `UpdateStack`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackAttribute {
    AccessEndpoints,
    EmbedHostDomains,
    FeedbackUrl,
    RedirectUrl,
    StorageConnectors,
    UserSettings,
}

impl StackAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessEndpoints => "ACCESS_ENDPOINTS",
            Self::EmbedHostDomains => "EMBED_HOST_DOMAINS",
            Self::FeedbackUrl => "FEEDBACK_URL",
            Self::RedirectUrl => "REDIRECT_URL",
            Self::StorageConnectors => "STORAGE_CONNECTORS",
            Self::UserSettings => "USER_SETTINGS",
        }
    }
}

/// Input of `CreateStack` and `UpdateStack`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRequest {
    pub name: String,
    pub access_endpoints: Option<Vec<AccessEndpoint>>,
    pub application_settings: Option<ApplicationSettings>,
    pub description: Option<String>,
    pub display_name: Option<String>,
    pub embed_host_domains: Option<Vec<String>>,
    pub feedback_url: Option<String>,
    pub redirect_url: Option<String>,
    pub storage_connectors: Option<Vec<StorageConnector>>,
    pub user_settings: Option<Vec<UserSetting>>,
    /// Update only: attributes to clear remotely
    pub attributes_to_delete: Vec<StackAttribute>,
}

impl StackRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::new(self.name.clone())
    }
}

/// A stack as reported by `DescribeStacks`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub name: String,
    pub arn: String,
    pub access_endpoints: Vec<AccessEndpoint>,
    pub application_settings: Option<ApplicationSettings>,
    pub description: Option<String>,
    pub display_name: Option<String>,
    pub embed_host_domains: Vec<String>,
    pub feedback_url: Option<String>,
    pub redirect_url: Option<String>,
    pub storage_connectors: Vec<StorageConnector>,
    pub user_settings: Vec<UserSetting>,
}
