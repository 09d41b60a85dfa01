//! Client registry: one lazily-built agent client per project.
//!
//! The backend address is discovered once and cached. Discovery is
//! single-flight: callers arriving while a discovery is pending await the
//! same attempt and all observe its outcome, success or failure. A failed
//! attempt clears the in-flight marker so the next caller starts over.
//!
//! ```text
//! get_client(p) ──▶ cached handle? ──yes──▶ handle
//!                        │ no
//!                        ▼
//!                 resolve_address() ──▶ [cached | join in-flight | start discovery]
//!                        │
//!                        ▼
//!                 factory.connect(address, path) ──▶ insert (first insert wins)
//! ```

mod discovery;
mod error;

pub use discovery::{
    parse_discovery_response, AddressDiscovery, ClientFactory, HttpClientFactory, HttpDiscovery,
};
pub use error::{RegistryError, RegistryResult};

use agent_service_client::AgentService;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

type PendingAddress = Shared<BoxFuture<'static, RegistryResult<String>>>;

/// A ready-to-use client bound to one project.
pub struct ClientHandle {
    project_id: String,
    project_path: String,
    client: Arc<dyn AgentService>,
}

impl ClientHandle {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn project_path(&self) -> &str {
        &self.project_path
    }

    pub fn client(&self) -> &dyn AgentService {
        self.client.as_ref()
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("project_id", &self.project_id)
            .field("project_path", &self.project_path)
            .finish_non_exhaustive()
    }
}

struct InFlight {
    generation: u64,
    future: PendingAddress,
}

#[derive(Default)]
struct RegistryState {
    address: Option<String>,
    in_flight: Option<InFlight>,
    /// Bumped for every new discovery attempt; stale continuations compare against it.
    generation: u64,
    clients: HashMap<String, Arc<ClientHandle>>,
    service: Option<Arc<ClientHandle>>,
}

/// Cache of agent clients keyed by project identifier.
///
/// Constructed once at startup and shared by every store.
pub struct ClientRegistry {
    discovery: Arc<dyn AddressDiscovery>,
    factory: Arc<dyn ClientFactory>,
    state: Mutex<RegistryState>,
}

impl ClientRegistry {
    pub fn new(discovery: Arc<dyn AddressDiscovery>, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            discovery,
            factory,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Return the backend base address, discovering it if needed.
    pub async fn resolve_address(&self) -> RegistryResult<String> {
        let (generation, pending) = {
            let mut state = self.state.lock();
            if let Some(address) = &state.address {
                return Ok(address.clone());
            }
            match &state.in_flight {
                Some(in_flight) => (in_flight.generation, in_flight.future.clone()),
                None => {
                    let discovery = Arc::clone(&self.discovery);
                    let future = async move { discovery.discover().await }.boxed().shared();
                    state.generation += 1;
                    let generation = state.generation;
                    state.in_flight = Some(InFlight {
                        generation,
                        future: future.clone(),
                    });
                    debug!(generation, "Starting backend discovery");
                    (generation, future)
                }
            }
        };

        let result = pending.await;

        let mut state = self.state.lock();
        let current = state
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation);
        if current {
            state.in_flight = None;
            match &result {
                Ok(address) => {
                    info!(generation, address = %address, "Backend address resolved");
                    state.address = Some(address.clone());
                }
                Err(err) => warn!(generation, "Backend discovery failed: {}", err),
            }
        }
        result
    }

    /// Return the cached handle for `project_id`, building it on first use.
    pub async fn get_client(
        &self,
        project_id: &str,
        project_path: &str,
    ) -> RegistryResult<Arc<ClientHandle>> {
        let cached = self.state.lock().clients.get(project_id).cloned();
        if let Some(handle) = cached {
            return Ok(handle);
        }

        let address = self.resolve_address().await?;
        let handle = self.build_handle(&address, project_id, project_path)?;

        let mut state = self.state.lock();
        let handle = state
            .clients
            .entry(project_id.to_string())
            .or_insert(handle)
            .clone();
        Ok(handle)
    }

    /// Handle for calls that are not scoped to a project (listing and creating projects).
    pub async fn service_client(&self) -> RegistryResult<Arc<ClientHandle>> {
        let cached = self.state.lock().service.clone();
        if let Some(handle) = cached {
            return Ok(handle);
        }

        let address = self.resolve_address().await?;
        let handle = self.build_handle(&address, "", "")?;

        let mut state = self.state.lock();
        Ok(state.service.get_or_insert(handle).clone())
    }

    fn build_handle(
        &self,
        address: &str,
        project_id: &str,
        project_path: &str,
    ) -> RegistryResult<Arc<ClientHandle>> {
        let client = match self.factory.connect(address, project_path) {
            Ok(client) => client,
            Err(err) => {
                self.forget_address(address);
                return Err(RegistryError::BackendUnreachable(err.to_string()));
            }
        };
        debug!(project_id, project_path, "Built agent client");
        Ok(Arc::new(ClientHandle {
            project_id: project_id.to_string(),
            project_path: project_path.to_string(),
            client,
        }))
    }

    /// Drop a cached address no client can be built for, so the next call rediscovers.
    fn forget_address(&self, address: &str) {
        let mut state = self.state.lock();
        if state.address.as_deref() == Some(address) {
            warn!(address, "Discarding unusable backend address");
            state.address = None;
        }
    }

    /// Drop every cached handle and the cached or in-flight address.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let dropped = state.clients.len();
        state.clients.clear();
        state.service = None;
        state.address = None;
        state.in_flight = None;
        info!(dropped, "Client registry reset");
    }

    pub fn cached_address(&self) -> Option<String> {
        self.state.lock().address.clone()
    }

    pub fn cached_client_count(&self) -> usize {
        self.state.lock().clients.len()
    }
}
