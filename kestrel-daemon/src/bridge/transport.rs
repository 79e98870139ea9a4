use async_trait::async_trait;
use kestrel_plugin::SourceError;
use kestrel_plugin::contract::{PluginRequest, PluginResponse};
use kestrel_plugin::provider::{self, PluginProvider};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use zbus::{Connection, proxy};

use crate::error::BridgeError;

/// Carries contract messages to the plugin registered under an authority.
#[async_trait]
pub trait PluginTransport: Send + Sync {
    async fn call(&self, authority: &str, request: PluginRequest) -> Result<PluginResponse, BridgeError>;
}

#[proxy(interface = "org.kestrel.Plugin1", default_path = "/org/kestrel/Plugin1")]
trait Plugin {
    /// Takes a JSON encoded request and answers with a JSON encoded response.
    async fn call(&self, request: &str) -> zbus::Result<String>;
}

/// Talks to plugins that own the well-known bus name equal to their authority.
pub struct DbusTransport {
    connection: Connection,
}

impl DbusTransport {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl PluginTransport for DbusTransport {
    async fn call(&self, authority: &str, request: PluginRequest) -> Result<PluginResponse, BridgeError> {
        let transport_err = |e: zbus::Error| BridgeError::Transport {
            authority: authority.to_string(),
            message: e.to_string(),
        };
        let contract_err = |source| BridgeError::Contract {
            authority: authority.to_string(),
            source,
        };

        let proxy = PluginProxy::builder(&self.connection)
            .destination(authority.to_string())
            .map_err(transport_err)?
            .build()
            .await
            .map_err(transport_err)?;
        let request = request.to_json().map_err(contract_err)?;
        let response = proxy.call(&request).await.map_err(transport_err)?;
        PluginResponse::from_json(&response).map_err(contract_err)
    }
}

/// Serves providers living in the daemon process.
#[derive(Default)]
pub struct LocalTransport {
    providers: RwLock<HashMap<String, Arc<dyn PluginProvider>>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, authority: impl Into<String>, provider: Arc<dyn PluginProvider>) {
        if let Ok(mut providers) = self.providers.write() {
            providers.insert(authority.into(), provider);
        }
    }

    pub fn remove(&self, authority: &str) {
        if let Ok(mut providers) = self.providers.write() {
            providers.remove(authority);
        }
    }

    fn provider(&self, authority: &str) -> Option<Arc<dyn PluginProvider>> {
        self.providers.read().ok()?.get(authority).cloned()
    }
}

#[async_trait]
impl PluginTransport for LocalTransport {
    async fn call(&self, authority: &str, request: PluginRequest) -> Result<PluginResponse, BridgeError> {
        let provider = self
            .provider(authority)
            .ok_or_else(|| BridgeError::Transport {
                authority: authority.to_string(),
                message: "no provider registered".to_string(),
            })?;
        provider::handle(provider.as_ref(), &request)
            .await
            .map_err(|e| match e {
                SourceError::Contract(source) => BridgeError::Contract {
                    authority: authority.to_string(),
                    source,
                },
                other => BridgeError::Plugin {
                    authority: authority.to_string(),
                    message: other.to_string(),
                },
            })
    }
}
