//! HTTP API handlers — exposes server state as JSON.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use bandgate_core::{QosEntry, QosTable};
use bandgate_services::{AdmissionController, AdmissionSnapshot, ClientRegistry, ClientSnapshot};

#[derive(Clone)]
pub struct ApiState {
    pub qos: Arc<QosTable>,
    pub admission: Arc<AdmissionController>,
    pub registry: ClientRegistry,
}

impl From<&bandgate_services::ServerState> for ApiState {
    fn from(s: &bandgate_services::ServerState) -> Self {
        Self {
            qos: s.qos.clone(),
            admission: s.admission.clone(),
            registry: s.registry.clone(),
        }
    }
}

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub admission: AdmissionSnapshot,
    pub tracked_clients: usize,
    pub registry_capacity: usize,
    pub qos_entries: usize,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        admission: state.admission.snapshot(),
        tracked_clients: state.registry.len(),
        registry_capacity: state.registry.capacity(),
        qos_entries: state.qos.len(),
    })
}

// ── /clients ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ClientsResponse {
    pub clients: Vec<ClientSnapshot>,
}

pub async fn handle_clients(State(state): State<ApiState>) -> Json<ClientsResponse> {
    Json(ClientsResponse {
        clients: state.registry.snapshot(),
    })
}

// ── /qos ─────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct QosResponse {
    pub default_rate_kbps: f64,
    pub entries: Vec<QosEntry>,
}

pub async fn handle_qos(State(state): State<ApiState>) -> Json<QosResponse> {
    Json(QosResponse {
        default_rate_kbps: state.qos.default_rate().kbps(),
        entries: state.qos.entries().to_vec(),
    })
}
