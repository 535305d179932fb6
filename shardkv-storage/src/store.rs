//! Storage façade: routes `Get`/`Set`/`Del` to the engine and WAL, and
//! enforces the role-based write restriction.

use crate::error::StorageError;
use shardkv_core::Engine;
use shardkv_wal::{Command, Request, Wal};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Fixed at boot. Only `Slave` rejects writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
    Standalone,
}

/// Routes reads/writes between the in-memory engine and the durable WAL,
/// applying the role check on the write path. Reads never consult role.
pub struct Storage {
    engine: Arc<Engine>,
    wal: Option<Arc<Wal>>,
    role: Role,
}

impl Storage {
    pub fn new(engine: Arc<Engine>, wal: Option<Arc<Wal>>, role: Role) -> Arc<Self> {
        Arc::new(Self { engine, wal, role })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Reads are allowed on any role.
    pub fn get(&self, key: &str) -> Option<String> {
        self.engine.get(key)
    }

    /// Fails with `StorageError::SetOnSlave` if this role is `Slave`.
    /// Otherwise writes through the WAL (if present) before the engine,
    /// so a crash between the two never loses a durably-acked write.
    pub async fn set(&self, key: String, value: String) -> Result<(), StorageError> {
        if self.role == Role::Slave {
            tracing::debug!(key, "rejected SET on slave");
            return Err(StorageError::SetOnSlave);
        }
        if let Some(wal) = self.wal.clone() {
            let key_for_wal = key.clone();
            let value_for_wal = value.clone();
            tokio::task::spawn_blocking(move || wal.set(&key_for_wal, &value_for_wal))
                .await
                .expect("WAL writer thread panicked")?;
        }
        self.engine.set(&key, &value);
        Ok(())
    }

    /// Fails with `StorageError::DeleteOnSlave` if this role is `Slave`.
    pub async fn del(&self, key: String) -> Result<(), StorageError> {
        if self.role == Role::Slave {
            tracing::debug!(key, "rejected DEL on slave");
            return Err(StorageError::DeleteOnSlave);
        }
        if let Some(wal) = self.wal.clone() {
            let key_for_wal = key.clone();
            tokio::task::spawn_blocking(move || wal.del(&key_for_wal))
                .await
                .expect("WAL writer thread panicked")?;
        }
        self.engine.delete(&key);
        Ok(())
    }

    /// Applies every Request in `batch`, in order, directly to the engine —
    /// bypassing the WAL and the role check entirely. Used for boot-time
    /// WAL replay and for applying segments pulled by the replication
    /// slave.
    pub fn restore(&self, batch: Vec<Request>) {
        for req in batch {
            match req.command {
                Command::Set => {
                    if req.args.len() == 2 {
                        tracing::debug!(key = %req.args[0], "replaying SET");
                        self.engine.set(&req.args[0], &req.args[1]);
                    }
                }
                Command::Del => {
                    if !req.args.is_empty() {
                        tracing::debug!(key = %req.args[0], "replaying DEL");
                        self.engine.delete(&req.args[0]);
                    }
                }
            }
        }
    }

    /// Reads everything the WAL has on disk and applies it to the engine.
    /// Called once at boot, before any client is served.
    pub async fn replay_wal(self: &Arc<Self>) -> Result<(), StorageError> {
        let Some(wal) = self.wal.clone() else {
            return Ok(());
        };
        let records = tokio::task::spawn_blocking(move || wal.read_all())
            .await
            .expect("WAL reader thread panicked")?;
        let count = records.len();
        self.restore(records);
        tracing::info!(count, "WAL replay complete");
        Ok(())
    }

    /// Runs until `stream` closes or `shutdown` fires, applying each
    /// incoming batch of replicated Requests to the engine. The slave
    /// never closes `stream` on its own shutdown (see design notes), so
    /// this loop's only reliable exit during a live process is the
    /// shutdown signal; the stream closing is handled too for
    /// completeness and for tests that drop the sender.
    pub async fn run_replication_consumer(
        self: Arc<Self>,
        mut stream: mpsc::UnboundedReceiver<Vec<Request>>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                batch = stream.recv() => {
                    match batch {
                        Some(batch) => self.restore(batch),
                        None => return,
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(role: Role) -> Arc<Storage> {
        Storage::new(Arc::new(Engine::new(8)), None, role)
    }

    #[tokio::test]
    async fn master_can_write_and_read() {
        let storage = storage(Role::Master);
        storage.set("k".into(), "v".into()).await.unwrap();
        assert_eq!(storage.get("k"), Some("v".to_string()));
    }

    #[tokio::test]
    async fn standalone_can_write() {
        let storage = storage(Role::Standalone);
        storage.set("k".into(), "v".into()).await.unwrap();
        assert_eq!(storage.get("k"), Some("v".to_string()));
    }

    #[tokio::test]
    async fn slave_rejects_writes_but_allows_reads() {
        let storage = storage(Role::Slave);
        let err = storage.set("k".into(), "v".into()).await.unwrap_err();
        assert!(matches!(err, StorageError::SetOnSlave));
        let err = storage.del("k".into()).await.unwrap_err();
        assert!(matches!(err, StorageError::DeleteOnSlave));
        assert_eq!(storage.get("k"), None);
    }

    #[tokio::test]
    async fn restore_bypasses_role_check() {
        let storage = storage(Role::Slave);
        let (req, _rx) = Request::new(Command::Set, vec!["k".into(), "v".into()]);
        storage.restore(vec![req]);
        assert_eq!(storage.get("k"), Some("v".to_string()));
    }

    #[tokio::test]
    async fn restore_applies_delete() {
        let storage = storage(Role::Master);
        storage.set("k".into(), "v".into()).await.unwrap();
        let (req, _rx) = Request::new(Command::Del, vec!["k".into()]);
        storage.restore(vec![req]);
        assert_eq!(storage.get("k"), None);
    }
}
