use super::thread_pool::ThreadPool;
use crate::error::{ResourceError, panic_message};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use rustc_hash::FxHashMap;
use slotmap::{Key, SlotMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// URIs starting with this sigil are reserved and never loaded or cached.
pub const RESERVED_URI_PREFIX: char = '@';

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceState {
    Init,
    Loading,
    Ready,
    Error(ResourceError),
}

impl ResourceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResourceState::Ready | ResourceState::Error(_))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ResourceState::Ready)
    }
}

/// What a caller asks a manager to load.
pub trait ResourceRequest: Clone + Send + 'static {
    fn uri(&self) -> &str;

    /// Canonical lookup key: the URI plus every parameter that changes the load result.
    fn cache_key(&self) -> String;
}

/// Produces a resource from a request. Runs on a [`ThreadPool`] worker.
pub trait ResourceLoader: Send + Sync + 'static {
    type Request: ResourceRequest;
    type Output: Send + 'static;

    fn load(&self, request: &Self::Request) -> Result<Self::Output, ResourceError>;
}

/// Identifies who registered a listener so it can be dropped when the owner goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerOwner(pub u64);

pub type ResourceListener<K> = Box<dyn FnOnce(K, &ResourceState)>;

struct Entry<R, T, K> {
    key: String,
    request: R,
    state: ResourceState,
    value: Option<T>,
    ref_count: usize,
    listeners: Vec<(ListenerOwner, ResourceListener<K>)>,
}

struct Completion<K, T> {
    id: K,
    result: Result<T, ResourceError>,
}

/// Content-keyed, reference-counted cache of asynchronously loaded resources.
///
/// Lookup tables are touched only by the owning (UI) thread. Decode jobs own a clone
/// of their request and report back through a channel drained by [`Self::poll`], so a
/// job never touches an entry that was released while it ran.
pub struct ResourceManager<K: Key, L: ResourceLoader> {
    loader: Arc<L>,
    pool: Arc<ThreadPool>,
    entries: SlotMap<K, Entry<L::Request, L::Output, K>>,
    keys: FxHashMap<String, K>,
    pending_deletes: Vec<K>,
    completion_tx: Sender<Completion<K, L::Output>>,
    completion_rx: Receiver<Completion<K, L::Output>>,
    loads_submitted: usize,
    destroyed: bool,
}

impl<K: Key + Send + 'static, L: ResourceLoader> ResourceManager<K, L> {
    pub fn new(loader: L, pool: Arc<ThreadPool>) -> Self {
        let (completion_tx, completion_rx) = channel::unbounded();
        Self {
            loader: Arc::new(loader),
            pool,
            entries: SlotMap::with_key(),
            keys: FxHashMap::default(),
            pending_deletes: Vec::new(),
            completion_tx,
            completion_rx,
            loads_submitted: 0,
            destroyed: false,
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Returns the entry for `request`, starting a background load on a miss.
    pub fn acquire(&mut self, request: L::Request) -> Result<K, ResourceError> {
        if request.uri().starts_with(RESERVED_URI_PREFIX) {
            return Err(ResourceError::ReservedUri(request.uri().to_string()));
        }

        let key = request.cache_key();
        if let Some(&id) = self.keys.get(&key) {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.ref_count += 1;
                if entry.ref_count == 1 {
                    self.pending_deletes.retain(|pending| *pending != id);
                }
                log::debug!("resource hit {key} (refs {})", entry.ref_count);
                return Ok(id);
            }
        }

        let id = self.entries.insert(Entry {
            key: key.clone(),
            request: request.clone(),
            state: ResourceState::Init,
            value: None,
            ref_count: 1,
            listeners: Vec::new(),
        });
        self.keys.insert(key.clone(), id);
        log::debug!("resource miss {key}, loading");
        self.start_load(id, request);
        Ok(id)
    }

    /// [`Self::acquire`] plus a listener that fires exactly once: immediately when the
    /// resource is already terminal, otherwise when its load completes.
    pub fn safe_acquire(
        &mut self,
        request: L::Request,
        owner: ListenerOwner,
        listener: ResourceListener<K>,
    ) -> Result<K, ResourceError> {
        let id = self.acquire(request)?;
        self.listen(id, owner, listener);
        Ok(id)
    }

    pub fn listen(&mut self, id: K, owner: ListenerOwner, listener: ResourceListener<K>) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        if entry.state.is_terminal() {
            listener(id, &entry.state);
        } else {
            entry.listeners.push((owner, listener));
        }
    }

    pub fn remove_listeners(&mut self, id: K, owner: ListenerOwner) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.listeners.retain(|(listener_owner, _)| *listener_owner != owner);
        }
    }

    /// Takes another reference on an existing entry.
    pub fn add_ref(&mut self, id: K) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        entry.ref_count += 1;
        if entry.ref_count == 1 {
            self.pending_deletes.retain(|pending| *pending != id);
        }
        true
    }

    /// Drops one reference. At zero the entry is deleted now when `immediate` is set and
    /// no load is in flight, otherwise it waits for [`Self::compact`]. Returns whether
    /// the entry was deleted by this call.
    pub fn release(&mut self, id: K, immediate: bool) -> bool {
        if self.destroyed {
            return false;
        }
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        if entry.ref_count == 0 {
            log::warn!("release of unreferenced resource {}", entry.key);
            return false;
        }
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return false;
        }

        entry.listeners.clear();
        if immediate && entry.state != ResourceState::Loading {
            self.delete(id);
            true
        } else {
            self.pending_deletes.push(id);
            false
        }
    }

    /// Deletes every unreferenced entry whose load is not in flight. Returns their ids.
    pub fn compact(&mut self) -> Vec<K> {
        let pending = std::mem::take(&mut self.pending_deletes);
        let mut deleted = Vec::new();
        for id in pending {
            let Some(entry) = self.entries.get(id) else {
                continue;
            };
            if entry.ref_count > 0 {
                continue;
            }
            if entry.state == ResourceState::Loading {
                self.pending_deletes.push(id);
            } else {
                self.delete(id);
                deleted.push(id);
            }
        }
        deleted
    }

    /// Applies finished loads and fires their listeners. `on_complete` runs for each
    /// completed entry before its listeners. Returns the number of completions applied.
    pub fn poll_with(&mut self, mut on_complete: impl FnMut(K, &L::Output)) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completion_rx.try_recv() {
            if self.apply(completion, &mut on_complete) {
                applied += 1;
            }
        }
        applied
    }

    pub fn poll(&mut self) -> usize {
        self.poll_with(|_, _| {})
    }

    /// Blocks until `id` reaches a terminal state or `timeout` elapses.
    pub fn wait_for(
        &mut self,
        id: K,
        timeout: Duration,
        mut on_complete: impl FnMut(K, &L::Output),
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.entries.get(id) {
                Some(entry) if entry.state.is_terminal() => return true,
                Some(_) => {}
                None => return false,
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.completion_rx.recv_timeout(remaining) {
                Ok(completion) => {
                    self.apply(completion, &mut on_complete);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return self
                        .entries
                        .get(id)
                        .is_some_and(|entry| entry.state.is_terminal());
                }
            }
        }
    }

    pub fn get(&self, id: K) -> Option<&L::Output> {
        self.entries.get(id).and_then(|entry| entry.value.as_ref())
    }

    pub fn state(&self, id: K) -> Option<&ResourceState> {
        self.entries.get(id).map(|entry| &entry.state)
    }

    pub fn request(&self, id: K) -> Option<&L::Request> {
        self.entries.get(id).map(|entry| &entry.request)
    }

    pub fn ref_count(&self, id: K) -> usize {
        self.entries.get(id).map_or(0, |entry| entry.ref_count)
    }

    pub fn lookup(&self, request: &L::Request) -> Option<K> {
        self.keys.get(&request.cache_key()).copied()
    }

    pub fn contains(&self, request: &L::Request) -> bool {
        self.lookup(request).is_some()
    }

    pub fn contains_id(&self, id: K) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn loads_submitted(&self) -> usize {
        self.loads_submitted
    }

    pub fn pending_delete_count(&self) -> usize {
        self.pending_deletes.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.keys()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Drops every entry without notifying listeners. Later releases are no-ops.
    pub fn destroy(&mut self) -> Vec<K> {
        self.destroyed = true;
        self.keys.clear();
        self.pending_deletes.clear();
        self.entries.drain().map(|(id, _)| id).collect()
    }

    fn start_load(&mut self, id: K, request: L::Request) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.state = ResourceState::Loading;
        }

        let loader = self.loader.clone();
        let completion_tx = self.completion_tx.clone();
        let accepted = self.pool.execute(move || {
            let result = catch_unwind(AssertUnwindSafe(|| loader.load(&request)))
                .unwrap_or_else(|payload| Err(ResourceError::Panicked(panic_message(&*payload))));
            let _ = completion_tx.send(Completion { id, result });
        });

        if accepted {
            self.loads_submitted += 1;
        } else if let Some(entry) = self.entries.get_mut(id) {
            entry.state = ResourceState::Error(ResourceError::Io("thread pool is stopped".into()));
        }
    }

    fn apply(
        &mut self,
        completion: Completion<K, L::Output>,
        on_complete: &mut impl FnMut(K, &L::Output),
    ) -> bool {
        let Completion { id, result } = completion;
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        match result {
            Ok(value) => {
                entry.state = ResourceState::Ready;
                on_complete(id, &value);
                entry.value = Some(value);
            }
            Err(err) => {
                log::warn!("failed to load {}: {err}", entry.key);
                entry.state = ResourceState::Error(err);
            }
        }

        let listeners = std::mem::take(&mut entry.listeners);
        for (_, listener) in listeners {
            listener(id, &entry.state);
        }
        true
    }

    fn delete(&mut self, id: K) {
        if let Some(entry) = self.entries.remove(id) {
            if self.keys.get(&entry.key) == Some(&id) {
                self.keys.remove(&entry.key);
            }
            log::debug!("resource deleted {}", entry.key);
        }
    }
}

impl<K: Key, L: ResourceLoader> std::fmt::Debug for ResourceManager<K, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("entries", &self.entries.len())
            .field("pending_deletes", &self.pending_deletes.len())
            .field("loads_submitted", &self.loads_submitted)
            .finish()
    }
}
