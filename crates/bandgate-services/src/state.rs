//! Shared server state handed to every connection handler.

use std::fmt;
use std::sync::Arc;

use bandgate_core::config::{BandgateConfig, TransferConfig};
use bandgate_core::QosTable;
use serde::Serialize;

use crate::admission::AdmissionController;
use crate::registry::ClientRegistry;
use crate::resources::ResourceMap;

/// Identity of one accepted connection, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone)]
pub struct ServerState {
    pub qos: Arc<QosTable>,
    pub admission: Arc<AdmissionController>,
    pub registry: ClientRegistry,
    pub resources: Arc<ResourceMap>,
    pub transfer: TransferConfig,
}

impl ServerState {
    pub fn new(qos: QosTable, config: &BandgateConfig) -> Self {
        Self {
            qos: Arc::new(qos),
            admission: AdmissionController::new(config.qos.ceiling),
            registry: ClientRegistry::new(config.registry.capacity),
            resources: Arc::new(ResourceMap::from_config(&config.resources)),
            transfer: config.transfer.clone(),
        }
    }
}
