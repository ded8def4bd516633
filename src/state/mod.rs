//! Active-space store.
//!
//! Holds the endpoint (backend base URL + space name) every API call is
//! made against, persists it under a fixed storage key and pushes each
//! replacement to subscribers. Reads are synchronous so request builders
//! can resolve the endpoint at the point of use.

pub mod storage;

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, Weak};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::space_config;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};

/// Storage key the active endpoint is persisted under.
pub const STORAGE_KEY: &str = "active_space";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize endpoint: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Unknown space profile: {0}")]
    UnknownProfile(String),

    #[error("No config directory available; set DMART_CONFIG_DIR")]
    NoConfigDir,
}

/// Backend base URL and space name selected for all requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub space_name: String,
    pub backend: String,
}

impl EndpointConfig {
    pub fn new(space_name: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            space_name: space_name.into(),
            backend: backend.into(),
        }
    }

    /// Backend base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.backend.trim_end_matches('/')
    }

    /// Absolute URL for a backend-relative path (`path` starts with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }
}

/// On-disk shapes: the current object form, or a bare space name written
/// by older front ends.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSpace {
    Config(EndpointConfig),
    Legacy(String),
}

type Observer = Arc<dyn Fn(&EndpointConfig) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    // Keyed by registration id so iteration follows registration order.
    observers: BTreeMap<u64, Observer>,
    // Values set but not yet delivered, oldest first.
    pending: VecDeque<EndpointConfig>,
    // Set while some caller is draining `pending`.
    draining: bool,
}

/// Handle returned by [`ActiveSpace::subscribe`].
///
/// The observer stays registered until the handle is dropped.
#[must_use = "dropping a Subscription unsubscribes the observer"]
pub struct Subscription {
    id: u64,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    /// Stop receiving updates. Same as dropping the handle.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .observers
                .remove(&self.id);
        }
    }
}

/// Clears the draining flag if an observer panics mid-delivery.
struct DrainGuard<'a>(&'a Mutex<Subscribers>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut subscribers = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            subscribers.draining = false;
            subscribers.pending.clear();
        }
    }
}

/// Reactive, persisted holder of the active [`EndpointConfig`].
pub struct ActiveSpace {
    storage: Box<dyn KeyValueStorage>,
    // Serializes persist-then-swap so storage, `current` and the
    // notification queue all see writes in the same order.
    writes: Mutex<()>,
    current: RwLock<EndpointConfig>,
    subscribers: Arc<Mutex<Subscribers>>,
    default: EndpointConfig,
}

impl ActiveSpace {
    /// Open the store over `storage` with the built-in default profile.
    pub fn open<S: KeyValueStorage + 'static>(storage: S) -> Result<Self, StoreError> {
        Self::open_with_default(storage, space_config::default_endpoint())
    }

    /// Open the store, seeding storage with `default` when the key is absent.
    ///
    /// An unreadable stored value is replaced by `default` (with a warning)
    /// so storage and memory agree once this returns.
    pub fn open_with_default<S: KeyValueStorage + 'static>(
        storage: S,
        default: EndpointConfig,
    ) -> Result<Self, StoreError> {
        let raw = match storage.get(STORAGE_KEY)? {
            Some(raw) => raw,
            None => {
                log::info!(
                    "No stored active space, seeding default {} @ {}",
                    default.space_name,
                    default.backend
                );
                let raw = serde_json::to_string(&default)?;
                storage.set(STORAGE_KEY, &raw)?;
                raw
            }
        };

        let (config, rewrite) = match serde_json::from_str::<StoredSpace>(&raw) {
            Ok(StoredSpace::Config(config)) => (config, false),
            Ok(StoredSpace::Legacy(name)) => match space_config::find(&name) {
                Some(profile) => {
                    log::info!("Migrating legacy active space '{}'", name);
                    (profile.endpoint(), true)
                }
                None => {
                    log::warn!("Stored space '{}' matches no profile, using default", name);
                    (default.clone(), true)
                }
            },
            Err(e) => {
                log::warn!("Stored active space is malformed ({}), using default", e);
                (default.clone(), true)
            }
        };
        if rewrite {
            storage.set(STORAGE_KEY, &serde_json::to_string(&config)?)?;
        }

        Ok(Self {
            storage: Box::new(storage),
            writes: Mutex::new(()),
            current: RwLock::new(config),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            default,
        })
    }

    /// The endpoint active right now.
    pub fn get(&self) -> EndpointConfig {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Persist `config`, make it active and notify every subscriber.
    ///
    /// On a storage failure nothing changes and nobody is notified.
    /// Subscribers receive values in the order they were set, including
    /// values set from inside an observer; such a nested set is delivered
    /// after the current round finishes.
    pub fn set(&self, config: EndpointConfig) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&config)?;
        {
            let _write = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
            self.storage.set(STORAGE_KEY, &raw)?;
            *self.current.write().unwrap_or_else(PoisonError::into_inner) = config.clone();
            self.subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pending
                .push_back(config.clone());
        }
        log::info!(
            "Active space set to {} @ {}",
            config.space_name,
            config.backend
        );
        self.drain();
        Ok(())
    }

    /// Restore the default endpoint.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.set(self.default.clone())
    }

    /// Activate the endpoint of a named profile.
    pub fn select_profile(&self, name: &str) -> Result<EndpointConfig, StoreError> {
        let profile =
            space_config::find(name).ok_or_else(|| StoreError::UnknownProfile(name.to_string()))?;
        let config = profile.endpoint();
        self.set(config.clone())?;
        Ok(config)
    }

    /// Register `observer`. It runs once now with the current value, then
    /// after every `set`.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&EndpointConfig) + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(observer);
        let id = {
            let mut subscribers = self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.observers.insert(id, observer.clone());
            id
        };
        observer(&self.get());
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observers
            .len()
    }

    /// Deliver queued values FIFO. Only one caller drains at a time; others
    /// leave their value queued for it.
    fn drain(&self) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if subscribers.draining {
            return;
        }
        subscribers.draining = true;
        let _guard = DrainGuard(&self.subscribers);

        while let Some(config) = subscribers.pending.pop_front() {
            // Snapshot, then unlock so observers may call back into the store.
            let observers: Vec<Observer> = subscribers.observers.values().cloned().collect();
            drop(subscribers);
            for observer in observers {
                observer(&config);
            }
            subscribers = self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
        }
        subscribers.draining = false;
    }
}

static GLOBAL: OnceLock<Arc<ActiveSpace>> = OnceLock::new();

/// Process-wide store over [`FileStorage::from_env`], opened on first use.
pub fn global() -> Result<Arc<ActiveSpace>, StoreError> {
    if let Some(space) = GLOBAL.get() {
        return Ok(space.clone());
    }
    let space = Arc::new(ActiveSpace::open(FileStorage::from_env()?)?);
    Ok(GLOBAL.get_or_init(|| space).clone())
}
