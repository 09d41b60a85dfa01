//! Generic keyed collection behind every store.
//!
//! Each key owns an ordered entity list and a status record. Lists are held
//! as `Arc<Vec<T>>` snapshots and a key's `Arc` is only swapped when the new
//! content differs, so repeated reads over unchanged data hand back the same
//! allocation (`Arc::ptr_eq` holds between them).

use agent_service_client::{Project, Session, Worktree};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// An entity addressable by a string identifier.
pub trait Entity: Clone + PartialEq {
    fn entity_id(&self) -> &str;
}

impl Entity for Project {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl Entity for Session {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl Entity for Worktree {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// In-flight flag and last error of one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStatus {
    pub loading: bool,
    pub error: Option<String>,
}

/// Snapshot of a key's list taken before an optimistic write.
pub type Snapshot<T> = Option<Arc<Vec<T>>>;

pub struct KeyedCollection<T> {
    lists: BTreeMap<String, Arc<Vec<T>>>,
    status: HashMap<String, KeyStatus>,
    empty: Arc<Vec<T>>,
}

impl<T> Default for KeyedCollection<T> {
    fn default() -> Self {
        Self {
            lists: BTreeMap::new(),
            status: HashMap::new(),
            empty: Arc::new(Vec::new()),
        }
    }
}

impl<T: Entity> KeyedCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `key` an empty list and a default status if it has neither.
    pub fn ensure_key(&mut self, key: &str) {
        if !self.lists.contains_key(key) {
            self.lists.insert(key.to_string(), Arc::clone(&self.empty));
        }
        self.status.entry(key.to_string()).or_default();
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lists.contains_key(key)
    }

    /// The list stored under `key`, or a shared empty list.
    pub fn list(&self, key: &str) -> Arc<Vec<T>> {
        self.lists
            .get(key)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::clone(&self.empty))
    }

    pub fn find(&self, key: &str, id: &str) -> Option<T> {
        self.lists
            .get(key)?
            .iter()
            .find(|entity| entity.entity_id() == id)
            .cloned()
    }

    pub fn snapshot(&self, key: &str) -> Snapshot<T> {
        self.lists.get(key).map(Arc::clone)
    }

    /// Store `items` under `key`. Returns whether the content changed.
    pub fn replace(&mut self, key: &str, items: Vec<T>) -> bool {
        match self.lists.get_mut(key) {
            Some(current) => stable_replace(current, items),
            None => {
                self.lists.insert(key.to_string(), Arc::new(items));
                true
            }
        }
    }

    /// Apply `f` to a copy of the list and store the result.
    pub fn modify(&mut self, key: &str, f: impl FnOnce(&mut Vec<T>)) -> bool {
        let mut items = self.list(key).as_ref().clone();
        f(&mut items);
        self.replace(key, items)
    }

    /// Replace the entity with the same identifier, or append it.
    pub fn upsert(&mut self, key: &str, entity: T) -> bool {
        self.modify(key, |items| {
            match items
                .iter_mut()
                .find(|existing| existing.entity_id() == entity.entity_id())
            {
                Some(existing) => *existing = entity,
                None => items.push(entity),
            }
        })
    }

    /// Mutate the entity `id` in place. Returns false when it is not stored.
    pub fn update_entity(&mut self, key: &str, id: &str, f: impl FnOnce(&mut T)) -> bool {
        if self.find(key, id).is_none() {
            return false;
        }
        self.modify(key, |items| {
            if let Some(entity) = items.iter_mut().find(|e| e.entity_id() == id) {
                f(entity);
            }
        });
        true
    }

    pub fn remove_entity(&mut self, key: &str, id: &str) -> Option<T> {
        let removed = self.find(key, id)?;
        self.modify(key, |items| items.retain(|e| e.entity_id() != id));
        Some(removed)
    }

    /// Put a snapshot back exactly as it was taken.
    pub fn restore(&mut self, key: &str, snapshot: Snapshot<T>) {
        match snapshot {
            Some(list) => {
                self.lists.insert(key.to_string(), list);
            }
            None => {
                self.lists.remove(key);
            }
        }
    }

    /// Settle a failed optimistic write.
    ///
    /// The canonical list wins when it could be fetched; otherwise the
    /// pre-write snapshot is restored.
    pub fn revert<E>(&mut self, key: &str, canonical: Result<Vec<T>, E>, snapshot: Snapshot<T>) {
        match canonical {
            Ok(items) => {
                self.replace(key, items);
            }
            Err(_) => self.restore(key, snapshot),
        }
    }

    pub fn status(&self, key: &str) -> KeyStatus {
        self.status.get(key).cloned().unwrap_or_default()
    }

    pub fn set_loading(&mut self, key: &str, loading: bool) {
        self.status.entry(key.to_string()).or_default().loading = loading;
    }

    pub fn set_error(&mut self, key: &str, error: Option<String>) {
        self.status.entry(key.to_string()).or_default().error = error;
    }

    /// Stored keys starting with `prefix`, in lexicographic order.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.lists
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Concatenation of every list whose key starts with `prefix`.
    pub fn concat_with_prefix(&self, prefix: &str) -> Vec<T> {
        self.lists
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .flat_map(|(_, list)| list.iter().cloned())
            .collect()
    }

    pub fn remove_key(&mut self, key: &str) {
        self.lists.remove(key);
        self.status.remove(key);
    }
}

/// Swap `current` for `next` only when the content differs.
pub fn stable_replace<T: PartialEq>(current: &mut Arc<Vec<T>>, next: Vec<T>) -> bool {
    if current.as_slice() == next.as_slice() {
        return false;
    }
    *current = Arc::new(next);
    true
}
