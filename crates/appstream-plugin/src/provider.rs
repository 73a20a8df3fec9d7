//! Resource trait and provider registry

use crate::data::{Attributes, ResourceData, ResourceState};
use crate::error::{ProviderError, Result};
use crate::schema::{Diagnostic, Schema};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// CRUD callbacks of one resource type
///
/// `M` is the configured provider meta (API client and settings) handed to
/// every call.
#[async_trait]
pub trait Resource<M>: Send + Sync {
    /// Attribute schema of the resource
    fn schema(&self) -> Schema;

    /// Create the remote object from `d` and set its id
    async fn create(&self, d: &mut ResourceData, meta: &M) -> Result<()>;

    /// Refresh `d` from the remote object; clear the id if it is gone
    async fn read(&self, d: &mut ResourceData, meta: &M) -> Result<()>;

    /// Apply the attributes that changed since the prior state
    async fn update(&self, d: &mut ResourceData, meta: &M) -> Result<()>;

    /// Remove the remote object
    async fn delete(&self, d: &mut ResourceData, meta: &M) -> Result<()>;
}

/// Builds the provider meta from the provider configuration block
#[async_trait]
pub trait Configure<M>: Send + Sync {
    async fn configure(&self, config: &Attributes) -> Result<M>;
}

/// Full schema set exposed to the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSchema {
    pub provider: Schema,
    pub resources: BTreeMap<String, Schema>,
}

/// Result of planning a change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// Proposed attributes with defaults filled in and sets normalized
    pub planned: Attributes,

    /// Attributes whose change forces destroy-then-create
    pub requires_replace: Vec<String>,
}

/// Registry of resource types plus the configured meta
pub struct Provider<M> {
    name: String,
    config_schema: Schema,
    configurer: Arc<dyn Configure<M>>,
    resources: BTreeMap<String, Arc<dyn Resource<M>>>,
    meta: Option<M>,
}

impl<M: Send + Sync> Provider<M> {
    pub fn new(
        name: impl Into<String>,
        config_schema: Schema,
        configurer: impl Configure<M> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            config_schema,
            configurer: Arc::new(configurer),
            resources: BTreeMap::new(),
            meta: None,
        }
    }

    /// Register a resource type
    pub fn resource(
        mut self,
        type_name: impl Into<String>,
        resource: impl Resource<M> + 'static,
    ) -> Self {
        self.resources.insert(type_name.into(), Arc::new(resource));
        self
    }

    /// Install an already-built meta, bypassing [`configure`](Self::configure)
    pub fn with_meta(mut self, meta: M) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn schema(&self) -> ProviderSchema {
        ProviderSchema {
            provider: self.config_schema.clone(),
            resources: self
                .resources
                .iter()
                .map(|(name, r)| (name.clone(), r.schema()))
                .collect(),
        }
    }

    /// Schema of one registered resource type
    pub fn resource_schema(&self, type_name: &str) -> Result<Schema> {
        Ok(self.lookup(type_name)?.schema())
    }

    /// Validate the provider block and build the meta
    pub async fn configure(&mut self, config: Attributes) -> Result<()> {
        reject_errors(self.config_schema.validate(&config))?;
        let meta = self.configurer.configure(&config).await?;
        self.meta = Some(meta);
        tracing::debug!("{} provider configured", self.name);
        Ok(())
    }

    pub fn validate_config(&self, config: &Attributes) -> Vec<Diagnostic> {
        self.config_schema.validate(config)
    }

    pub fn validate(&self, type_name: &str, config: &Attributes) -> Result<Vec<Diagnostic>> {
        Ok(self.lookup(type_name)?.schema().validate(config))
    }

    pub fn plan(
        &self,
        type_name: &str,
        prior: Option<&ResourceState>,
        mut proposed: Attributes,
    ) -> Result<PlanResult> {
        let schema = self.lookup(type_name)?.schema();
        schema.apply_defaults(&mut proposed);
        if let Some(prior) = prior {
            schema.carry_computed(&prior.attributes, &mut proposed);
        }
        schema.normalize(&mut proposed);

        let requires_replace = match prior {
            Some(prior) => schema.requires_replace(&prior.attributes, &proposed),
            None => Vec::new(),
        };

        Ok(PlanResult {
            planned: proposed,
            requires_replace,
        })
    }

    pub async fn create(&self, type_name: &str, planned: Attributes) -> Result<ResourceState> {
        let resource = self.lookup(type_name)?;
        let meta = self.meta()?;
        let schema = resource.schema();
        let planned = prepare(&schema, planned)?;

        tracing::info!("Creating {}", type_name);
        let mut d = ResourceData::new(planned);
        resource.create(&mut d, meta).await?;

        finish(&schema, d).ok_or_else(|| {
            ProviderError::ResourceNotFound(format!("{} vanished after create", type_name))
        })
    }

    pub async fn read(
        &self,
        type_name: &str,
        state: ResourceState,
    ) -> Result<Option<ResourceState>> {
        let resource = self.lookup(type_name)?;
        let meta = self.meta()?;

        let id = state.id.clone();
        let mut d = ResourceData::from_state(state);
        resource.read(&mut d, meta).await?;

        let refreshed = finish(&resource.schema(), d);
        if refreshed.is_none() {
            tracing::warn!("{} {} no longer exists, removing from state", type_name, id);
        }
        Ok(refreshed)
    }

    pub async fn update(
        &self,
        type_name: &str,
        prior: ResourceState,
        planned: Attributes,
    ) -> Result<ResourceState> {
        let resource = self.lookup(type_name)?;
        let meta = self.meta()?;
        let schema = resource.schema();
        let planned = prepare(&schema, planned)?;

        tracing::info!("Updating {} {}", type_name, prior.id);
        let mut d = ResourceData::for_update(prior, planned);
        resource.update(&mut d, meta).await?;

        finish(&schema, d).ok_or_else(|| {
            ProviderError::ResourceNotFound(format!("{} vanished during update", type_name))
        })
    }

    pub async fn delete(&self, type_name: &str, state: ResourceState) -> Result<()> {
        let resource = self.lookup(type_name)?;
        let meta = self.meta()?;

        tracing::info!("Deleting {} {}", type_name, state.id);
        let mut d = ResourceData::from_state(state);
        resource.delete(&mut d, meta).await
    }

    /// Passthrough import: the id is taken as-is and the resource is read
    pub async fn import(&self, type_name: &str, id: &str) -> Result<Option<ResourceState>> {
        let resource = self.lookup(type_name)?;
        let meta = self.meta()?;

        tracing::info!("Importing {} {}", type_name, id);
        let mut d = ResourceData::for_import(id);
        resource.read(&mut d, meta).await?;
        Ok(finish(&resource.schema(), d))
    }

    fn lookup(&self, type_name: &str) -> Result<&Arc<dyn Resource<M>>> {
        self.resources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResourceType(type_name.to_string()))
    }

    fn meta(&self) -> Result<&M> {
        self.meta.as_ref().ok_or(ProviderError::NotConfigured)
    }
}

fn reject_errors(diagnostics: Vec<Diagnostic>) -> Result<()> {
    let errors: Vec<String> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(ToString::to_string)
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::InvalidConfig(errors.join("; ")))
    }
}

fn prepare(schema: &Schema, mut planned: Attributes) -> Result<Attributes> {
    schema.strip_computed(&mut planned);
    schema.apply_defaults(&mut planned);
    reject_errors(schema.validate(&planned))?;
    schema.normalize(&mut planned);
    Ok(planned)
}

fn finish(schema: &Schema, d: ResourceData) -> Option<ResourceState> {
    let mut state = d.into_state()?;
    schema.normalize(&mut state.attributes);
    Some(state)
}
