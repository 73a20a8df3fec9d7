use appstream_aws::{
    AppStreamApi, AppStreamError, AppStreamMeta, Fleet, FleetAttribute, FleetRequest, FleetState,
    Result, Stack, StackAttribute, StackRequest, Tags, appstream_provider,
};
use appstream_config::Settings;
use appstream_plugin::{Attributes, CancellationToken, Provider, async_trait};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

const ARN_PREFIX: &str = "arn:aws:appstream:us-east-1:123456789012";

struct FakeFleet {
    fleet: Fleet,
    /// Target state and the number of describes left before it is reached
    pending: Option<(FleetState, u32)>,
}

#[derive(Default)]
struct FakeState {
    fleets: BTreeMap<String, FakeFleet>,
    stacks: BTreeMap<String, Stack>,
    associations: BTreeMap<String, Vec<String>>,
    tags: BTreeMap<String, Tags>,
    calls: Vec<(Instant, String)>,
    fleet_updates: Vec<FleetRequest>,
    stack_updates: Vec<StackRequest>,
    transition_polls: u32,
    failing: Option<&'static str>,
}

/// In-memory AppStream control plane with a call log.
///
/// Start/stop put the fleet in STARTING/STOPPING; the target state shows
/// up after `transition_polls` further describes.
#[derive(Default)]
pub struct FakeAppStream {
    state: Mutex<FakeState>,
}

#[allow(dead_code)]
impl FakeAppStream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_transition_polls(polls: u32) -> Arc<Self> {
        let fake = Self::default();
        fake.state.lock().unwrap().transition_polls = polls;
        Arc::new(fake)
    }

    /// Make every call of `operation` fail
    pub fn fail_on(&self, operation: &'static str) {
        self.state.lock().unwrap().failing = Some(operation);
    }

    /// Operation names in call order, e.g. `"StopFleet fleet-a"`
    pub fn calls(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.calls.iter().map(|(_, call)| call.clone()).collect()
    }

    pub fn calls_of(&self, operation: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .collect()
    }

    /// Instant of the first call of `operation`
    pub fn first_call_at(&self, operation: &str) -> Option<Instant> {
        let state = self.state.lock().unwrap();
        state
            .calls
            .iter()
            .find(|(_, call)| call.split(' ').next() == Some(operation))
            .map(|(at, _)| *at)
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn fleet_updates(&self) -> Vec<FleetRequest> {
        self.state.lock().unwrap().fleet_updates.clone()
    }

    pub fn stack_updates(&self) -> Vec<StackRequest> {
        self.state.lock().unwrap().stack_updates.clone()
    }

    pub fn fleet(&self, name: &str) -> Option<Fleet> {
        let state = self.state.lock().unwrap();
        state.fleets.get(name).map(|f| f.fleet.clone())
    }

    pub fn stack(&self, name: &str) -> Option<Stack> {
        self.state.lock().unwrap().stacks.get(name).cloned()
    }

    pub fn tags_of(&self, arn: &str) -> Tags {
        let state = self.state.lock().unwrap();
        state.tags.get(arn).cloned().unwrap_or_default()
    }

    /// Change a fleet behind the provider's back
    pub fn set_fleet_state(&self, name: &str, fleet_state: FleetState) {
        let mut state = self.state.lock().unwrap();
        if let Some(f) = state.fleets.get_mut(name) {
            f.fleet.state = Some(fleet_state);
            f.pending = None;
        }
    }

    pub fn remove_fleet(&self, name: &str) {
        self.state.lock().unwrap().fleets.remove(name);
    }

    pub fn associate(&self, stack: &str, fleet: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .associations
            .entry(stack.to_string())
            .or_default()
            .push(fleet.to_string());
    }

    fn record(&self, call: String) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let operation = call.split(' ').next().unwrap_or_default().to_string();
        state.calls.push((Instant::now(), call));
        if state.failing == Some(operation.as_str()) {
            return Err(AppStreamError::Api {
                operation: state.failing.unwrap(),
                code: Some("LimitExceededException".into()),
                message: format!("{} failed", operation),
            });
        }
        Ok(())
    }
}

fn api_error(operation: &'static str, code: &str, message: String) -> AppStreamError {
    AppStreamError::Api {
        operation,
        code: Some(code.to_string()),
        message,
    }
}

fn fleet_from_request(request: &FleetRequest) -> Fleet {
    Fleet {
        name: request.name.clone(),
        arn: format!("{}:fleet/{}", ARN_PREFIX, request.name),
        state: Some(FleetState::Stopped),
        desired_instances: request.desired_instances,
        description: request.description.clone(),
        disconnect_timeout_in_seconds: Some(request.disconnect_timeout_in_seconds.unwrap_or(900)),
        display_name: request.display_name.clone(),
        domain_join_info: request.domain_join_info.clone(),
        enable_default_internet_access: Some(
            request.enable_default_internet_access.unwrap_or(false),
        ),
        fleet_type: Some(request.fleet_type.clone().unwrap_or_else(|| "ON_DEMAND".into())),
        iam_role_arn: request.iam_role_arn.clone(),
        idle_disconnect_timeout_in_seconds: request.idle_disconnect_timeout_in_seconds,
        image_name: request.image_name.clone(),
        instance_type: request.instance_type.clone(),
        max_user_duration_in_seconds: Some(request.max_user_duration_in_seconds.unwrap_or(57600)),
        stream_view: request.stream_view.clone(),
        vpc_config: request.vpc_config.clone(),
    }
}

fn apply_fleet_update(fleet: &mut Fleet, request: &FleetRequest) {
    fn set<T: Clone>(field: &mut Option<T>, value: &Option<T>) {
        if value.is_some() {
            field.clone_from(value);
        }
    }

    set(&mut fleet.desired_instances, &request.desired_instances);
    set(&mut fleet.description, &request.description);
    set(
        &mut fleet.disconnect_timeout_in_seconds,
        &request.disconnect_timeout_in_seconds,
    );
    set(&mut fleet.display_name, &request.display_name);
    set(&mut fleet.domain_join_info, &request.domain_join_info);
    set(
        &mut fleet.enable_default_internet_access,
        &request.enable_default_internet_access,
    );
    set(&mut fleet.iam_role_arn, &request.iam_role_arn);
    set(
        &mut fleet.idle_disconnect_timeout_in_seconds,
        &request.idle_disconnect_timeout_in_seconds,
    );
    set(&mut fleet.image_name, &request.image_name);
    set(&mut fleet.instance_type, &request.instance_type);
    set(
        &mut fleet.max_user_duration_in_seconds,
        &request.max_user_duration_in_seconds,
    );
    set(&mut fleet.stream_view, &request.stream_view);
    set(&mut fleet.vpc_config, &request.vpc_config);
    clear_empty(&mut fleet.description);
    clear_empty(&mut fleet.display_name);

    for attribute in &request.attributes_to_delete {
        match attribute {
            FleetAttribute::VpcConfiguration => fleet.vpc_config = None,
            FleetAttribute::DomainJoinInfo => fleet.domain_join_info = None,
            FleetAttribute::IamRoleArn => fleet.iam_role_arn = None,
        }
    }
}

/// AppStream stores an empty description or display name as unset
fn clear_empty(field: &mut Option<String>) {
    if field.as_deref() == Some("") {
        *field = None;
    }
}

fn stack_from_request(request: &StackRequest) -> Stack {
    Stack {
        name: request.name.clone(),
        arn: format!("{}:stack/{}", ARN_PREFIX, request.name),
        access_endpoints: request.access_endpoints.clone().unwrap_or_default(),
        application_settings: request.application_settings.clone(),
        description: request.description.clone(),
        display_name: request.display_name.clone(),
        embed_host_domains: request.embed_host_domains.clone().unwrap_or_default(),
        feedback_url: request.feedback_url.clone(),
        redirect_url: request.redirect_url.clone(),
        storage_connectors: request.storage_connectors.clone().unwrap_or_default(),
        user_settings: request.user_settings.clone().unwrap_or_default(),
    }
}

fn apply_stack_update(stack: &mut Stack, request: &StackRequest) {
    if let Some(v) = &request.access_endpoints {
        stack.access_endpoints = v.clone();
    }
    if request.application_settings.is_some() {
        stack.application_settings = request.application_settings.clone();
    }
    if request.description.is_some() {
        stack.description = request.description.clone();
    }
    if request.display_name.is_some() {
        stack.display_name = request.display_name.clone();
    }
    if let Some(v) = &request.embed_host_domains {
        stack.embed_host_domains = v.clone();
    }
    if request.feedback_url.is_some() {
        stack.feedback_url = request.feedback_url.clone();
    }
    if request.redirect_url.is_some() {
        stack.redirect_url = request.redirect_url.clone();
    }
    if let Some(v) = &request.storage_connectors {
        stack.storage_connectors = v.clone();
    }
    if let Some(v) = &request.user_settings {
        stack.user_settings = v.clone();
    }
    clear_empty(&mut stack.description);
    clear_empty(&mut stack.display_name);

    for attribute in &request.attributes_to_delete {
        match attribute {
            StackAttribute::AccessEndpoints => stack.access_endpoints.clear(),
            StackAttribute::EmbedHostDomains => stack.embed_host_domains.clear(),
            StackAttribute::FeedbackUrl => stack.feedback_url = None,
            StackAttribute::RedirectUrl => stack.redirect_url = None,
            StackAttribute::StorageConnectors => stack.storage_connectors.clear(),
            StackAttribute::UserSettings => stack.user_settings.clear(),
        }
    }
}

#[async_trait]
impl AppStreamApi for FakeAppStream {
    async fn create_fleet(&self, request: &FleetRequest) -> Result<()> {
        self.record(format!("CreateFleet {}", request.name))?;
        let mut state = self.state.lock().unwrap();
        if state.fleets.contains_key(&request.name) {
            return Err(api_error(
                "CreateFleet",
                "ResourceAlreadyExistsException",
                format!("fleet {} already exists", request.name),
            ));
        }
        state.fleets.insert(
            request.name.clone(),
            FakeFleet {
                fleet: fleet_from_request(request),
                pending: None,
            },
        );
        Ok(())
    }

    async fn update_fleet(&self, request: &FleetRequest) -> Result<()> {
        self.record(format!("UpdateFleet {}", request.name))?;
        let mut state = self.state.lock().unwrap();
        state.fleet_updates.push(request.clone());
        let fleet = state
            .fleets
            .get_mut(&request.name)
            .ok_or_else(|| AppStreamError::not_found("fleet", &request.name))?;
        apply_fleet_update(&mut fleet.fleet, request);
        Ok(())
    }

    async fn describe_fleet(&self, name: &str) -> Result<Option<Fleet>> {
        self.record(format!("DescribeFleets {}", name))?;
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.fleets.get_mut(name) else {
            return Ok(None);
        };

        if let Some((target, remaining)) = entry.pending.take() {
            if remaining == 0 {
                entry.fleet.state = Some(target);
            } else {
                entry.pending = Some((target, remaining - 1));
            }
        }
        Ok(Some(entry.fleet.clone()))
    }

    async fn start_fleet(&self, name: &str) -> Result<()> {
        self.record(format!("StartFleet {}", name))?;
        let mut state = self.state.lock().unwrap();
        let polls = state.transition_polls;
        let entry = state
            .fleets
            .get_mut(name)
            .ok_or_else(|| AppStreamError::not_found("fleet", name))?;
        entry.fleet.state = Some(FleetState::Starting);
        entry.pending = Some((FleetState::Running, polls));
        Ok(())
    }

    async fn stop_fleet(&self, name: &str) -> Result<()> {
        self.record(format!("StopFleet {}", name))?;
        let mut state = self.state.lock().unwrap();
        let polls = state.transition_polls;
        let entry = state
            .fleets
            .get_mut(name)
            .ok_or_else(|| AppStreamError::not_found("fleet", name))?;
        entry.fleet.state = Some(FleetState::Stopping);
        entry.pending = Some((FleetState::Stopped, polls));
        Ok(())
    }

    async fn delete_fleet(&self, name: &str) -> Result<()> {
        self.record(format!("DeleteFleet {}", name))?;
        let mut state = self.state.lock().unwrap();
        match state.fleets.get(name).map(|f| f.fleet.state.clone()) {
            None => Err(AppStreamError::not_found("fleet", name)),
            Some(Some(FleetState::Stopped)) => {
                state.fleets.remove(name);
                Ok(())
            }
            Some(other) => Err(api_error(
                "DeleteFleet",
                "ConcurrentModificationException",
                format!("fleet {} is {:?}", name, other),
            )),
        }
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<()> {
        self.record(format!("CreateStack {}", request.name))?;
        let mut state = self.state.lock().unwrap();
        if state.stacks.contains_key(&request.name) {
            return Err(api_error(
                "CreateStack",
                "ResourceAlreadyExistsException",
                format!("stack {} already exists", request.name),
            ));
        }
        state
            .stacks
            .insert(request.name.clone(), stack_from_request(request));
        Ok(())
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<()> {
        self.record(format!("UpdateStack {}", request.name))?;
        let mut state = self.state.lock().unwrap();
        state.stack_updates.push(request.clone());
        let stack = state
            .stacks
            .get_mut(&request.name)
            .ok_or_else(|| AppStreamError::not_found("stack", &request.name))?;
        apply_stack_update(stack, request);
        Ok(())
    }

    async fn describe_stack(&self, name: &str) -> Result<Option<Stack>> {
        self.record(format!("DescribeStacks {}", name))?;
        Ok(self.state.lock().unwrap().stacks.get(name).cloned())
    }

    async fn delete_stack(&self, name: &str) -> Result<()> {
        self.record(format!("DeleteStack {}", name))?;
        let mut state = self.state.lock().unwrap();
        state
            .stacks
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AppStreamError::not_found("stack", name))
    }

    async fn associate_fleet(&self, stack: &str, fleet: &str) -> Result<()> {
        self.record(format!("AssociateFleet {} {}", stack, fleet))?;
        self.associate(stack, fleet);
        Ok(())
    }

    async fn disassociate_fleet(&self, stack: &str, fleet: &str) -> Result<()> {
        self.record(format!("DisassociateFleet {} {}", stack, fleet))?;
        let mut state = self.state.lock().unwrap();
        if let Some(fleets) = state.associations.get_mut(stack) {
            fleets.retain(|f| f != fleet);
        }
        Ok(())
    }

    async fn list_associated_fleets(&self, stack: &str) -> Result<Option<Vec<String>>> {
        self.record(format!("ListAssociatedFleets {}", stack))?;
        let state = self.state.lock().unwrap();
        if !state.stacks.contains_key(stack) {
            return Ok(None);
        }
        Ok(Some(
            state.associations.get(stack).cloned().unwrap_or_default(),
        ))
    }

    async fn tag_resource(&self, arn: &str, tags: &Tags) -> Result<()> {
        self.record(format!("TagResource {}", arn))?;
        let mut state = self.state.lock().unwrap();
        state
            .tags
            .entry(arn.to_string())
            .or_default()
            .extend(tags.clone());
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, keys: &[String]) -> Result<()> {
        self.record(format!("UntagResource {}", arn))?;
        let mut state = self.state.lock().unwrap();
        if let Some(tags) = state.tags.get_mut(arn) {
            tags.retain(|k, _| !keys.contains(k));
        }
        Ok(())
    }

    async fn list_tags(&self, arn: &str) -> Result<Tags> {
        self.record(format!("ListTagsForResource {}", arn))?;
        Ok(self.tags_of(arn))
    }
}

/// Provider wired to `fake` with default timing
pub fn provider(fake: Arc<FakeAppStream>) -> Provider<AppStreamMeta> {
    provider_with(fake, &Settings::default(), CancellationToken::new())
}

pub fn provider_with(
    fake: Arc<FakeAppStream>,
    settings: &Settings,
    cancel: CancellationToken,
) -> Provider<AppStreamMeta> {
    let meta = AppStreamMeta::new(fake, settings, cancel.clone());
    appstream_provider(cancel).with_meta(meta)
}

pub fn attrs(value: Value) -> Attributes {
    value.as_object().cloned().unwrap()
}

/// Keys whose values differ, an absent key counting as null
pub fn differing(a: &Attributes, b: &Attributes) -> Vec<String> {
    let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
    keys.sort();
    keys.dedup();
    keys.into_iter()
        .filter(|k| {
            a.get(k.as_str()).unwrap_or(&Value::Null) != b.get(k.as_str()).unwrap_or(&Value::Null)
        })
        .cloned()
        .collect()
}
