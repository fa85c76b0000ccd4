use bourse_types::{
    market::{Account, Directory},
    Key, Value,
};
use commonware_codec::Encode;
use commonware_cryptography::{
    sha256::{Digest, Sha256},
    Hasher,
};
use commonware_runtime::{Clock, Metrics, Spawner, Storage};
use commonware_storage::{adb::any::variable::Any, translator::Translator};
use std::{collections::HashMap, future::Future};
use tracing::warn;

pub type Adb<E, T> = Any<E, Digest, Value, Sha256, T>;

pub trait State {
    fn get(&self, key: &Key) -> impl Future<Output = Option<Value>>;
    fn insert(&mut self, key: Key, value: Value) -> impl Future<Output = ()>;
    fn delete(&mut self, key: &Key) -> impl Future<Output = ()>;

    fn apply(&mut self, changes: Vec<(Key, Status)>) -> impl Future<Output = ()> {
        async {
            for (key, status) in changes {
                match status {
                    Status::Update(value) => self.insert(key, value).await,
                    Status::Delete => self.delete(&key).await,
                }
            }
        }
    }

    /// Makes applied changes durable, recording `sequence` instructions as executed.
    fn persist(&mut self, _sequence: u64) -> impl Future<Output = ()> {
        async {}
    }
}

impl<E: Spawner + Metrics + Clock + Storage, T: Translator> State for Adb<E, T> {
    async fn get(&self, key: &Key) -> Option<Value> {
        let key = Sha256::hash(&key.encode());
        match self.get(&key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Database error during get operation: {:?}", e);
                None
            }
        }
    }

    async fn insert(&mut self, key: Key, value: Value) {
        let key = Sha256::hash(&key.encode());
        if let Err(e) = self.update(key, value).await {
            warn!("Database error during insert operation: {:?}", e);
        }
    }

    async fn delete(&mut self, key: &Key) {
        let key = Sha256::hash(&key.encode());
        if let Err(e) = self.delete(key).await {
            warn!("Database error during delete operation: {:?}", e);
        }
    }

    async fn persist(&mut self, sequence: u64) {
        if let Err(e) = self.commit(Some(Value::Commit { sequence })).await {
            warn!("Database error during commit operation: {:?}", e);
            return;
        }

        // Drop operations below the inactivity floor
        if let Err(e) = self.prune(self.inactivity_floor_loc()).await {
            warn!("Database error during prune operation: {:?}", e);
        }
    }
}

/// Sequence recorded by the last commit of `adb`, or 0 for a fresh database.
pub async fn restored_sequence<E: Spawner + Metrics + Clock + Storage, T: Translator>(
    adb: &Adb<E, T>,
) -> u64 {
    adb.get_metadata()
        .await
        .unwrap_or(None)
        .and_then(|(_, v)| match v {
            Some(Value::Commit { sequence }) => Some(sequence),
            _ => None,
        })
        .unwrap_or(0)
}

#[derive(Default)]
pub struct Memory {
    state: HashMap<Key, Value>,
}

impl Memory {
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl State for Memory {
    async fn get(&self, key: &Key) -> Option<Value> {
        self.state.get(key).cloned()
    }

    async fn insert(&mut self, key: Key, value: Value) {
        self.state.insert(key, value);
    }

    async fn delete(&mut self, key: &Key) {
        self.state.remove(key);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Update(Value),
    Delete,
}

pub async fn load_account<S: State>(state: &S, username: &str) -> Option<Account> {
    match state.get(&Key::Account(username.to_string())).await {
        Some(Value::Account(account)) => Some(account),
        _ => None,
    }
}

pub async fn load_directory<S: State>(state: &S) -> Directory {
    match state.get(&Key::Directory).await {
        Some(Value::Directory(directory)) => directory,
        _ => Directory::default(),
    }
}
