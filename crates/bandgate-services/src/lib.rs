//! bandgate-services — the admission-and-delivery engine.
//!
//! Shared state (QoS policy, admission controller, client registry,
//! resource map) lives in [`ServerState`]; [`Server`] accepts
//! connections and runs a [`ConnectionHandler`] for each one.

pub mod admission;
pub mod handler;
pub mod monitor;
pub mod pacing;
pub mod registry;
pub mod resources;
pub mod server;
pub mod state;
pub mod transmit;

pub use admission::{Admission, AdmissionController, AdmissionSnapshot};
pub use handler::{ConnectionHandler, Outcome};
pub use monitor::{snapshot, Monitor, StatusSnapshot};
pub use pacing::{pacer_for, FixedDelay, Pacer, TokenBucket};
pub use registry::{ClientHandle, ClientRecord, ClientRegistry, ClientSnapshot};
pub use resources::ResourceMap;
pub use server::Server;
pub use state::{ConnectionId, ServerState};
pub use transmit::{send_file, ByteSource, TransmitError};
