//! Gateway directory
//!
//! The directory owns the mapping between a gateway's immutable hardware id
//! and its network-scoped `(network_id, logical_id)`. This service only reads
//! from it; `StaticDirectory` is an in-memory implementation seeded from config.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Unknown hardware id: {0}")]
    UnknownHardwareId(String),

    #[error("Hardware id {hardware_id} is not registered in network {network_id}")]
    NotInNetwork {
        network_id: String,
        hardware_id: String,
    },

    #[error("Gateway directory unavailable: {0}")]
    Unavailable(String),
}

/// Lookups against the external gateway registry.
#[async_trait]
pub trait GatewayDirectory: Send + Sync {
    async fn list_networks(&self) -> Result<Vec<String>, DirectoryError>;

    async fn list_gateways(&self, network_id: &str) -> Result<Vec<String>, DirectoryError>;

    async fn find_gateway_network_id(&self, hardware_id: &str) -> Result<String, DirectoryError>;

    async fn find_gateway_id(
        &self,
        network_id: &str,
        hardware_id: &str,
    ) -> Result<String, DirectoryError>;
}

/// A gateway registration entry, as found in the `[[directory.gateways]]` config table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRecord {
    pub network_id: String,
    pub logical_id: String,
    pub hardware_id: String,
}

#[derive(Debug, Default)]
struct DirectoryState {
    /// network_id -> logical_id -> hardware_id
    networks: BTreeMap<String, BTreeMap<String, String>>,
    /// hardware_id -> (network_id, logical_id)
    by_hardware: BTreeMap<String, (String, String)>,
}

/// In-memory gateway directory.
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory {
    inner: Arc<RwLock<DirectoryState>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_records(records: &[GatewayRecord]) -> Self {
        let directory = Self::new();
        for record in records {
            directory.register_gateway(record.clone()).await;
        }
        directory
    }

    /// Create an empty network.
    pub async fn add_network(&self, network_id: &str) {
        self.inner
            .write()
            .await
            .networks
            .entry(network_id.to_string())
            .or_default();
    }

    /// Register a gateway, replacing any previous registration of its hardware id
    /// and evicting whichever hardware id held the same `(network_id, logical_id)`.
    pub async fn register_gateway(&self, record: GatewayRecord) {
        let mut state = self.inner.write().await;

        if let Some((old_net, old_logical)) = state.by_hardware.remove(&record.hardware_id)
            && let Some(gateways) = state.networks.get_mut(&old_net)
        {
            gateways.remove(&old_logical);
        }

        let previous_owner = state
            .networks
            .entry(record.network_id.clone())
            .or_default()
            .insert(record.logical_id.clone(), record.hardware_id.clone());
        if let Some(evicted) = previous_owner {
            state.by_hardware.remove(&evicted);
            debug!(
                "Gateway {}/{} reassigned from {} to {}",
                record.network_id, record.logical_id, evicted, record.hardware_id
            );
        }
        state.by_hardware.insert(
            record.hardware_id.clone(),
            (record.network_id.clone(), record.logical_id.clone()),
        );

        debug!(
            "Registered gateway {} as {}/{}",
            record.hardware_id, record.network_id, record.logical_id
        );
    }

    /// Remove a gateway registration. Its network is kept.
    pub async fn remove_gateway(&self, network_id: &str, logical_id: &str) {
        let mut state = self.inner.write().await;
        let removed = state
            .networks
            .get_mut(network_id)
            .and_then(|gateways| gateways.remove(logical_id));
        if let Some(hardware_id) = removed {
            state.by_hardware.remove(&hardware_id);
        }
    }
}

#[async_trait]
impl GatewayDirectory for StaticDirectory {
    async fn list_networks(&self) -> Result<Vec<String>, DirectoryError> {
        Ok(self.inner.read().await.networks.keys().cloned().collect())
    }

    async fn list_gateways(&self, network_id: &str) -> Result<Vec<String>, DirectoryError> {
        self.inner
            .read()
            .await
            .networks
            .get(network_id)
            .map(|gateways| gateways.keys().cloned().collect())
            .ok_or_else(|| DirectoryError::UnknownNetwork(network_id.to_string()))
    }

    async fn find_gateway_network_id(&self, hardware_id: &str) -> Result<String, DirectoryError> {
        self.inner
            .read()
            .await
            .by_hardware
            .get(hardware_id)
            .map(|(network_id, _)| network_id.clone())
            .ok_or_else(|| DirectoryError::UnknownHardwareId(hardware_id.to_string()))
    }

    async fn find_gateway_id(
        &self,
        network_id: &str,
        hardware_id: &str,
    ) -> Result<String, DirectoryError> {
        let state = self.inner.read().await;
        match state.by_hardware.get(hardware_id) {
            Some((net, logical)) if net == network_id => Ok(logical.clone()),
            Some(_) => Err(DirectoryError::NotInNetwork {
                network_id: network_id.to_string(),
                hardware_id: hardware_id.to_string(),
            }),
            None => Err(DirectoryError::UnknownHardwareId(hardware_id.to_string())),
        }
    }
}
