//! Shared traveller profile: points, miles and wallet balance.
//!
//! Every mutation goes through one owning task so concurrent wizards never
//! read-modify-write the same counter.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Points,
    Miles,
    WalletBalance,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("insufficient {field:?}: have {current}, change {delta}")]
    Insufficient {
        field: ProfileField,
        current: i64,
        delta: i64,
    },

    #[error("profile store is closed")]
    Closed,

    #[error("profile backend error: {0}")]
    Backend(String),
}

/// Storage behind the profile. `increment` must be atomic on the backend side.
#[async_trait]
pub trait ProfileBackend: Send + Sync + 'static {
    async fn get(&self, field: ProfileField) -> Result<i64, SessionError>;

    /// Add `delta` and return the new value; a negative result is refused untouched.
    async fn increment(&self, field: ProfileField, delta: i64) -> Result<i64, SessionError>;
}

#[derive(Debug, Default)]
pub struct InMemoryProfileBackend {
    values: Mutex<HashMap<ProfileField, i64>>,
}

impl InMemoryProfileBackend {
    pub fn with_values(values: impl IntoIterator<Item = (ProfileField, i64)>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ProfileBackend for InMemoryProfileBackend {
    async fn get(&self, field: ProfileField) -> Result<i64, SessionError> {
        let values = self
            .values
            .lock()
            .map_err(|_| SessionError::Backend("profile values poisoned".into()))?;
        Ok(values.get(&field).copied().unwrap_or(0))
    }

    async fn increment(&self, field: ProfileField, delta: i64) -> Result<i64, SessionError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| SessionError::Backend("profile values poisoned".into()))?;
        let current = values.get(&field).copied().unwrap_or(0);
        let next = current
            .checked_add(delta)
            .filter(|v| *v >= 0)
            .ok_or(SessionError::Insufficient {
                field,
                current,
                delta,
            })?;
        values.insert(field, next);
        Ok(next)
    }
}

enum ProfileRequest {
    Get {
        field: ProfileField,
        reply: oneshot::Sender<Result<i64, SessionError>>,
    },
    Apply {
        field: ProfileField,
        delta: i64,
        reply: oneshot::Sender<Result<i64, SessionError>>,
    },
}

/// Cloneable handle to the profile task.
#[derive(Clone)]
pub struct ProfileStore {
    tx: mpsc::UnboundedSender<ProfileRequest>,
}

impl ProfileStore {
    /// Start the owning task. It stops once every handle is dropped.
    pub fn spawn(backend: impl ProfileBackend) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<ProfileRequest>();
        let handle = tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                match req {
                    ProfileRequest::Get { field, reply } => {
                        let _ = reply.send(backend.get(field).await);
                    }
                    ProfileRequest::Apply {
                        field,
                        delta,
                        reply,
                    } => {
                        let res = backend.increment(field, delta).await;
                        match &res {
                            Ok(value) => debug!(?field, delta, value, "profile updated"),
                            Err(e) => warn!(?field, delta, %e, "profile update refused"),
                        }
                        let _ = reply.send(res);
                    }
                }
            }
        });
        (Self { tx }, handle)
    }

    pub async fn apply_delta(&self, field: ProfileField, delta: i64) -> Result<i64, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ProfileRequest::Apply {
                field,
                delta,
                reply,
            })
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn get(&self, field: ProfileField) -> Result<i64, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ProfileRequest::Get { field, reply })
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_deltas_are_all_applied() {
        let (store, _task) = ProfileStore::spawn(InMemoryProfileBackend::default());
        let mut joins = Vec::new();
        for _ in 0..50 {
            let s = store.clone();
            joins.push(tokio::spawn(async move {
                s.apply_delta(ProfileField::Points, 10).await
            }));
        }
        for j in joins {
            j.await.unwrap().unwrap();
        }
        assert_eq!(store.get(ProfileField::Points).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn overdraw_is_refused_and_value_kept() {
        let backend = InMemoryProfileBackend::with_values([(ProfileField::WalletBalance, 100)]);
        let (store, _task) = ProfileStore::spawn(backend);
        let err = store
            .apply_delta(ProfileField::WalletBalance, -150)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::Insufficient {
                field: ProfileField::WalletBalance,
                current: 100,
                delta: -150,
            }
        );
        assert_eq!(store.get(ProfileField::WalletBalance).await.unwrap(), 100);
        assert_eq!(
            store.apply_delta(ProfileField::WalletBalance, -100).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn closed_store_reports_closed() {
        let (store, task) = ProfileStore::spawn(InMemoryProfileBackend::default());
        task.abort();
        let _ = task.await;
        assert_eq!(
            store.apply_delta(ProfileField::Miles, 1).await,
            Err(SessionError::Closed)
        );
    }
}
