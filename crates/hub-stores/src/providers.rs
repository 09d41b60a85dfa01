//! Provider/model catalog, cached per context key.
//!
//! A context without a directory resolves to the project's root path, so
//! `catalog(p, None)` and `catalog(p, Some(root))` read the same entry.

use crate::error::StoreResult;
use crate::HubContext;
use agent_service_client::ProviderCatalog;
use context_key_resolver::context_key;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Default)]
struct ProvidersState {
    catalogs: HashMap<String, Arc<ProviderCatalog>>,
    loading: HashSet<String>,
    error: Option<String>,
}

pub struct ProvidersStore {
    context: HubContext,
    state: Mutex<ProvidersState>,
}

impl ProvidersStore {
    pub fn new(context: HubContext) -> Self {
        Self {
            context,
            state: Mutex::new(ProvidersState::default()),
        }
    }

    pub fn catalog(&self, project_id: &str, directory: Option<&str>) -> Option<Arc<ProviderCatalog>> {
        self.state
            .lock()
            .catalogs
            .get(&self.key(project_id, directory))
            .cloned()
    }

    /// Default model id of `provider_id` in this context.
    pub fn default_model(
        &self,
        project_id: &str,
        directory: Option<&str>,
        provider_id: &str,
    ) -> Option<String> {
        self.catalog(project_id, directory)?
            .default
            .get(provider_id)
            .cloned()
    }

    /// Display name of a model, if the catalog knows it.
    pub fn model_name(
        &self,
        project_id: &str,
        directory: Option<&str>,
        provider_id: &str,
        model_id: &str,
    ) -> Option<String> {
        let catalog = self.catalog(project_id, directory)?;
        let model = catalog.provider(provider_id)?.models.get(model_id)?;
        Some(model.name.clone())
    }

    pub fn is_loading(&self, project_id: &str, directory: Option<&str>) -> bool {
        self.state
            .lock()
            .loading
            .contains(&self.key(project_id, directory))
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn clear_error(&self) {
        self.state.lock().error = None;
    }

    /// Fetch the catalog for a context. An identical catalog keeps its `Arc`.
    pub async fn load_providers(&self, project_id: &str, directory: Option<&str>) {
        let directory = self.context.scope_directory(project_id, directory);
        let key = context_key(project_id, directory.as_deref());
        self.state.lock().loading.insert(key.clone());

        let result = self.fetch(project_id, directory.as_deref()).await;

        let mut state = self.state.lock();
        state.loading.remove(&key);
        match result {
            Ok(catalog) => {
                debug!(key = %key, providers = catalog.providers.len(), "Loaded provider catalog");
                let unchanged = state
                    .catalogs
                    .get(&key)
                    .is_some_and(|cached| **cached == catalog);
                if !unchanged {
                    state.catalogs.insert(key, Arc::new(catalog));
                }
                state.error = None;
            }
            Err(err) => {
                warn!(key = %key, "Failed to load providers: {}", err);
                state.error = Some(err.message_or("Failed to load providers"));
            }
        }
    }

    async fn fetch(&self, project_id: &str, directory: Option<&str>) -> StoreResult<ProviderCatalog> {
        let handle = self.context.project_client(project_id).await?;
        Ok(handle.client().providers(directory).await?)
    }

    fn key(&self, project_id: &str, directory: Option<&str>) -> String {
        let directory = self.context.scope_directory(project_id, directory);
        context_key(project_id, directory.as_deref())
    }
}
