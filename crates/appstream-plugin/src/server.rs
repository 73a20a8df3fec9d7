//! Terraform plugin protocol 6 server
//!
//! [`serve`] binds a loopback port, prints the go-plugin handshake line on
//! stdout and answers the `tfplugin6.Provider` service by dispatching into
//! the [`Provider`] registry. The `plugin.GRPCController` service lets the
//! host shut the server down, and the standard health service reports the
//! `plugin` service as serving.

use crate::codec::{self, ID_ATTRIBUTE, Unknown};
use crate::data::ResourceState;
use crate::error::{ProviderError, Result, ServeError};
use crate::generated::plugin::Empty;
use crate::generated::plugin::grpc_controller_server::{GrpcController, GrpcControllerServer};
use crate::generated::tfplugin6 as tf;
use crate::generated::tfplugin6::provider_server::{Provider as ProviderService, ProviderServer};
use crate::provider::Provider;
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use rcgen::CertifiedKey;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tonic::{Request, Response, Status};
use tonic_health::ServingStatus;

/// go-plugin core protocol version
pub const CORE_PROTOCOL_VERSION: u32 = 1;

/// Terraform plugin protocol version
pub const PROTOCOL_VERSION: u32 = 6;

/// Set by Terraform when it expects a TLS connection
pub const CLIENT_CERT_ENV: &str = "PLUGIN_CLIENT_CERT";

/// Health-check name go-plugin asks for
const HEALTH_SERVICE: &str = "plugin";

/// `tfplugin6.Provider` implementation over a [`Provider`] registry
pub struct PluginServer<M> {
    provider: Arc<RwLock<Provider<M>>>,
    cancel: CancellationToken,
}

impl<M: Send + Sync + 'static> PluginServer<M> {
    /// `cancel` is fired when the host asks the provider to stop
    pub fn new(provider: Provider<M>, cancel: CancellationToken) -> Self {
        Self {
            provider: Arc::new(RwLock::new(provider)),
            cancel,
        }
    }

    async fn plan_change(
        &self,
        request: &tf::plan_resource_change::Request,
    ) -> Result<(tf::DynamicValue, Vec<tf::AttributePath>)> {
        let provider = self.provider.read().await;
        let schema = provider.resource_schema(&request.type_name)?;
        let prior = codec::decode(request.prior_state.as_ref())?.state;
        let proposed = codec::decode(request.proposed_new_state.as_ref())?;
        let config = codec::decode(request.config.as_ref())?;

        let Some(proposed_state) = proposed.state else {
            return Ok((codec::encode(&schema, None, &Unknown::new())?, Vec::new()));
        };

        let plan = provider.plan(&request.type_name, prior.as_ref(), proposed_state.attributes)?;

        let mut unknown: Unknown = config.unknown.union(&proposed.unknown).cloned().collect();
        let id = match &prior {
            Some(prior) => prior.id.clone(),
            None => {
                unknown.insert(ID_ATTRIBUTE.to_string());
                for (name, attribute) in &schema.attributes {
                    let unset = plan.planned.get(name).is_none_or(Value::is_null);
                    if attribute.computed && unset && !attribute.is_block() {
                        unknown.insert(name.clone());
                    }
                }
                String::new()
            }
        };

        let requires_replace = plan
            .requires_replace
            .iter()
            .map(|name| codec::attribute_path(name))
            .collect();
        let planned = ResourceState::new(id, plan.planned);
        Ok((codec::encode(&schema, Some(&planned), &unknown)?, requires_replace))
    }

    async fn apply_change(
        &self,
        request: &tf::apply_resource_change::Request,
    ) -> Result<tf::DynamicValue> {
        let provider = self.provider.read().await;
        let type_name = request.type_name.as_str();
        let schema = provider.resource_schema(type_name)?;
        let prior = codec::decode(request.prior_state.as_ref())?.state;
        let planned = codec::decode(request.planned_state.as_ref())?.state;

        let new_state = match (prior, planned) {
            (None, None) => None,
            (Some(prior), None) => {
                provider.delete(type_name, prior).await?;
                None
            }
            (None, Some(planned)) => Some(provider.create(type_name, planned.attributes).await?),
            (Some(prior), Some(planned)) => {
                Some(provider.update(type_name, prior, planned.attributes).await?)
            }
        };
        codec::encode(&schema, new_state.as_ref(), &Unknown::new())
    }

    async fn read_state(&self, request: &tf::read_resource::Request) -> Result<tf::DynamicValue> {
        let provider = self.provider.read().await;
        let schema = provider.resource_schema(&request.type_name)?;
        let refreshed = match codec::decode(request.current_state.as_ref())?.state {
            Some(state) => provider.read(&request.type_name, state).await?,
            None => None,
        };
        codec::encode(&schema, refreshed.as_ref(), &Unknown::new())
    }

    async fn import_state(
        &self,
        request: &tf::import_resource_state::Request,
    ) -> Result<tf::import_resource_state::ImportedResource> {
        let provider = self.provider.read().await;
        let schema = provider.resource_schema(&request.type_name)?;
        let state = provider
            .import(&request.type_name, &request.id)
            .await?
            .ok_or_else(|| {
                ProviderError::ResourceNotFound(format!(
                    "cannot import non-existent {} {}",
                    request.type_name, request.id
                ))
            })?;

        Ok(tf::import_resource_state::ImportedResource {
            type_name: request.type_name.clone(),
            state: Some(codec::encode(&schema, Some(&state), &Unknown::new())?),
            private: Vec::new(),
        })
    }

    async fn upgrade_state(
        &self,
        request: &tf::upgrade_resource_state::Request,
    ) -> Result<tf::DynamicValue> {
        let provider = self.provider.read().await;
        let schema = provider.resource_schema(&request.type_name)?;
        let raw = request
            .raw_state
            .as_ref()
            .map(|raw| raw.json.as_slice())
            .unwrap_or_default();

        let state = if raw.is_empty() {
            None
        } else {
            match serde_json::from_slice(raw)
                .map_err(|e| ProviderError::Wire(format!("invalid stored state: {}", e)))?
            {
                Value::Null => None,
                Value::Object(attributes) => Some(codec::into_state(attributes)),
                other => {
                    return Err(ProviderError::Wire(format!(
                        "stored state is not an object: {}",
                        other
                    )));
                }
            }
        };
        codec::encode(&schema, state.as_ref(), &Unknown::new())
    }
}

/// Diagnostics for `diagnostics`, minus those rooted at an unknown value
fn known_diagnostics(
    diagnostics: &[crate::schema::Diagnostic],
    unknown: &Unknown,
) -> Vec<tf::Diagnostic> {
    diagnostics
        .iter()
        .filter(|d| {
            let root = d.attribute.as_deref().and_then(|p| p.split('.').next());
            !root.is_some_and(|root| unknown.contains(root))
        })
        .map(codec::diagnostic)
        .collect()
}

fn errors(err: ProviderError) -> Vec<tf::Diagnostic> {
    tracing::error!("{}", err);
    vec![codec::error_diagnostic(err)]
}

fn data_sources_unsupported(type_name: &str) -> Vec<tf::Diagnostic> {
    errors(ProviderError::UnknownResourceType(format!(
        "data source {}",
        type_name
    )))
}

#[tonic::async_trait]
impl<M: Send + Sync + 'static> ProviderService for PluginServer<M> {
    async fn get_metadata(
        &self,
        _request: Request<tf::get_metadata::Request>,
    ) -> std::result::Result<Response<tf::get_metadata::Response>, Status> {
        let provider = self.provider.read().await;
        let resources = provider
            .resource_types()
            .map(|type_name| tf::get_metadata::ResourceMetadata {
                type_name: type_name.to_string(),
            })
            .collect();

        Ok(Response::new(tf::get_metadata::Response {
            server_capabilities: Some(server_capabilities()),
            resources,
            ..Default::default()
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<tf::get_provider_schema::Request>,
    ) -> std::result::Result<Response<tf::get_provider_schema::Response>, Status> {
        let schema = self.provider.read().await.schema();
        let resource_schemas = schema
            .resources
            .iter()
            .map(|(name, s)| (name.clone(), codec::resource_schema(s)))
            .collect();

        Ok(Response::new(tf::get_provider_schema::Response {
            provider: Some(codec::provider_schema(&schema.provider)),
            resource_schemas,
            server_capabilities: Some(server_capabilities()),
            ..Default::default()
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<tf::validate_provider_config::Request>,
    ) -> std::result::Result<Response<tf::validate_provider_config::Response>, Status> {
        let request = request.into_inner();
        let diagnostics = match codec::decode(request.config.as_ref()) {
            Ok(config) => {
                let found = self
                    .provider
                    .read()
                    .await
                    .validate_config(&config.attributes());
                known_diagnostics(&found, &config.unknown)
            }
            Err(e) => errors(e),
        };
        Ok(Response::new(tf::validate_provider_config::Response { diagnostics }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<tf::validate_resource_config::Request>,
    ) -> std::result::Result<Response<tf::validate_resource_config::Response>, Status> {
        let request = request.into_inner();
        let provider = self.provider.read().await;
        let diagnostics = match codec::decode(request.config.as_ref()).and_then(|config| {
            let found = provider.validate(&request.type_name, &config.attributes())?;
            Ok(known_diagnostics(&found, &config.unknown))
        }) {
            Ok(diagnostics) => diagnostics,
            Err(e) => errors(e),
        };
        Ok(Response::new(tf::validate_resource_config::Response { diagnostics }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<tf::validate_data_resource_config::Request>,
    ) -> std::result::Result<Response<tf::validate_data_resource_config::Response>, Status> {
        Ok(Response::new(tf::validate_data_resource_config::Response {
            diagnostics: data_sources_unsupported(&request.get_ref().type_name),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<tf::upgrade_resource_state::Request>,
    ) -> std::result::Result<Response<tf::upgrade_resource_state::Response>, Status> {
        let response = match self.upgrade_state(request.get_ref()).await {
            Ok(upgraded) => tf::upgrade_resource_state::Response {
                upgraded_state: Some(upgraded),
                diagnostics: Vec::new(),
            },
            Err(e) => tf::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: errors(e),
            },
        };
        Ok(Response::new(response))
    }

    async fn configure_provider(
        &self,
        request: Request<tf::configure_provider::Request>,
    ) -> std::result::Result<Response<tf::configure_provider::Response>, Status> {
        let request = request.into_inner();
        tracing::debug!("Configure requested by Terraform {}", request.terraform_version);

        let result = match codec::decode(request.config.as_ref()) {
            Ok(config) => {
                let mut provider = self.provider.write().await;
                provider.configure(config.attributes()).await
            }
            Err(e) => Err(e),
        };
        let diagnostics = result.err().map(errors).unwrap_or_default();
        Ok(Response::new(tf::configure_provider::Response { diagnostics }))
    }

    async fn read_resource(
        &self,
        request: Request<tf::read_resource::Request>,
    ) -> std::result::Result<Response<tf::read_resource::Response>, Status> {
        let request = request.into_inner();
        let response = match self.read_state(&request).await {
            Ok(new_state) => tf::read_resource::Response {
                new_state: Some(new_state),
                diagnostics: Vec::new(),
                private: request.private,
            },
            Err(e) => tf::read_resource::Response {
                new_state: request.current_state,
                diagnostics: errors(e),
                private: request.private,
            },
        };
        Ok(Response::new(response))
    }

    async fn plan_resource_change(
        &self,
        request: Request<tf::plan_resource_change::Request>,
    ) -> std::result::Result<Response<tf::plan_resource_change::Response>, Status> {
        let request = request.into_inner();
        let mut response = tf::plan_resource_change::Response {
            planned_private: request.prior_private.clone(),
            legacy_type_system: true,
            ..Default::default()
        };
        match self.plan_change(&request).await {
            Ok((planned, requires_replace)) => {
                response.planned_state = Some(planned);
                response.requires_replace = requires_replace;
            }
            Err(e) => response.diagnostics = errors(e),
        }
        Ok(Response::new(response))
    }

    async fn apply_resource_change(
        &self,
        request: Request<tf::apply_resource_change::Request>,
    ) -> std::result::Result<Response<tf::apply_resource_change::Response>, Status> {
        let request = request.into_inner();
        let mut response = tf::apply_resource_change::Response {
            private: request.planned_private.clone(),
            legacy_type_system: true,
            ..Default::default()
        };
        match self.apply_change(&request).await {
            Ok(new_state) => response.new_state = Some(new_state),
            Err(e) => {
                // the remote object is assumed unchanged
                response.new_state = request.prior_state;
                response.diagnostics = errors(e);
            }
        }
        Ok(Response::new(response))
    }

    async fn import_resource_state(
        &self,
        request: Request<tf::import_resource_state::Request>,
    ) -> std::result::Result<Response<tf::import_resource_state::Response>, Status> {
        let response = match self.import_state(request.get_ref()).await {
            Ok(imported) => tf::import_resource_state::Response {
                imported_resources: vec![imported],
                diagnostics: Vec::new(),
            },
            Err(e) => tf::import_resource_state::Response {
                imported_resources: Vec::new(),
                diagnostics: errors(e),
            },
        };
        Ok(Response::new(response))
    }

    async fn read_data_source(
        &self,
        request: Request<tf::read_data_source::Request>,
    ) -> std::result::Result<Response<tf::read_data_source::Response>, Status> {
        Ok(Response::new(tf::read_data_source::Response {
            state: None,
            diagnostics: data_sources_unsupported(&request.get_ref().type_name),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<tf::stop_provider::Request>,
    ) -> std::result::Result<Response<tf::stop_provider::Response>, Status> {
        tracing::warn!("Stop requested, cancelling pending operations");
        self.cancel.cancel();
        Ok(Response::new(tf::stop_provider::Response {
            error: String::new(),
        }))
    }
}

fn server_capabilities() -> tf::ServerCapabilities {
    tf::ServerCapabilities {
        plan_destroy: true,
        get_provider_schema_optional: false,
        move_resource_state: false,
    }
}

/// `plugin.GRPCController`: ends the server on request
struct Controller {
    shutdown: CancellationToken,
}

#[tonic::async_trait]
impl GrpcController for Controller {
    async fn shutdown(
        &self,
        _request: Request<Empty>,
    ) -> std::result::Result<Response<Empty>, Status> {
        tracing::debug!("Shutdown requested by host");
        self.shutdown.cancel();
        Ok(Response::new(Empty {}))
    }
}

/// go-plugin handshake line; the certificate is sent when serving TLS
pub fn handshake(addr: SocketAddr, cert_der: Option<&[u8]>) -> String {
    let mut line = format!(
        "{}|{}|tcp|{}|grpc",
        CORE_PROTOCOL_VERSION, PROTOCOL_VERSION, addr
    );
    if let Some(der) = cert_der {
        line.push('|');
        line.push_str(&STANDARD_NO_PAD.encode(der));
    }
    line
}

/// Serve `provider` on a loopback port until the host shuts it down.
///
/// TLS is used whenever Terraform announced a client certificate.
pub async fn serve<M: Send + Sync + 'static>(
    provider: Provider<M>,
    cancel: CancellationToken,
) -> std::result::Result<(), ServeError> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let tls = std::env::var_os(CLIENT_CERT_ENV).is_some_and(|cert| !cert.is_empty());
    serve_on(listener, provider, cancel, tls).await
}

/// Serve `provider` on an already bound listener
pub async fn serve_on<M: Send + Sync + 'static>(
    listener: TcpListener,
    provider: Provider<M>,
    cancel: CancellationToken,
    tls: bool,
) -> std::result::Result<(), ServeError> {
    let addr = listener.local_addr()?;

    let mut builder = Server::builder();
    let mut cert_der = None;
    if tls {
        let CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()])?;
        let identity = Identity::from_pem(cert.pem(), key_pair.serialize_pem());
        builder = builder.tls_config(ServerTlsConfig::new().identity(identity))?;
        cert_der = Some(cert.der().to_vec());
    }

    let (mut health, health_service) = tonic_health::server::health_reporter();
    health
        .set_service_status(HEALTH_SERVICE, ServingStatus::Serving)
        .await;

    let shutdown = CancellationToken::new();
    let controller = Controller {
        shutdown: shutdown.clone(),
    };

    tracing::info!("{} provider listening on {}", provider.name(), addr);
    println!("{}", handshake(addr, cert_der.as_deref()));

    builder
        .add_service(health_service)
        .add_service(GrpcControllerServer::new(controller))
        .add_service(ProviderServer::new(PluginServer::new(provider, cancel)))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            shutdown.cancelled().await
        })
        .await?;

    tracing::debug!("Plugin server stopped");
    Ok(())
}
