//! Persistence layer for the realm server.
//!
//! The world tick never waits on I/O: respawn deadlines are handed to a
//! background task through a channel and written to PostgreSQL, with Redis
//! as a mirror. Bulk world data is loaded once at boot through [`Database`].

mod database;
mod cache;

pub use database::{Database, LoadedWorldData};
pub use cache::Cache;

use std::collections::HashMap;
use tokio::sync::mpsc;
use log::{info, error, warn, debug};

/// Sink for respawn deadlines (unix seconds). Implementations must not block.
pub trait RespawnStore: Send + Sync {
    fn save_respawn_time(&self, guid: u64, respawn_at: u64);

    fn delete_respawn_time(&self, guid: u64);
}

/// Store used when the server runs without a database
#[derive(Debug, Default)]
pub struct NoPersistence;

impl RespawnStore for NoPersistence {
    fn save_respawn_time(&self, guid: u64, respawn_at: u64) {
        debug!("Persistence disabled, respawn time {} for {} not saved", respawn_at, guid);
    }

    fn delete_respawn_time(&self, _guid: u64) {}
}

/// Commands sent to the persistence background task
#[derive(Debug)]
pub enum PersistenceCommand {
    /// Persist a respawn deadline to both database and cache
    SaveRespawnTime {
        guid: u64,
        respawn_at: u64,
    },
    DeleteRespawnTime {
        guid: u64,
    },
    /// Load every stored respawn deadline (response sent via oneshot channel)
    LoadRespawnTimes {
        response: tokio::sync::oneshot::Sender<HashMap<u64, u64>>,
    },
    /// Stop the task once every queued command ran (acknowledged via `done`)
    Shutdown {
        done: tokio::sync::oneshot::Sender<()>,
    },
}

/// Handle for sending commands to the persistence task
#[derive(Clone)]
pub struct PersistenceHandle {
    sender: mpsc::Sender<PersistenceCommand>,
}

impl PersistenceHandle {
    /// Load respawn deadlines (async - boot only)
    pub async fn load_respawn_times(&self) -> HashMap<u64, u64> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        if self.sender.send(PersistenceCommand::LoadRespawnTimes { response: tx }).await.is_err() {
            return HashMap::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Shutdown the persistence task
    pub async fn shutdown(&self) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        if self.sender.send(PersistenceCommand::Shutdown { done: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

impl RespawnStore for PersistenceHandle {
    fn save_respawn_time(&self, guid: u64, respawn_at: u64) {
        if let Err(e) = self.sender.try_send(PersistenceCommand::SaveRespawnTime { guid, respawn_at }) {
            warn!("Dropped respawn time save for {}: {}", guid, e);
        }
    }

    fn delete_respawn_time(&self, guid: u64) {
        if let Err(e) = self.sender.try_send(PersistenceCommand::DeleteRespawnTime { guid }) {
            warn!("Dropped respawn time delete for {}: {}", guid, e);
        }
    }
}

/// Initialize the persistence system and spawn the background task.
/// Returns a handle for sending commands.
pub async fn init(
    database_url: &str,
    redis_url: &str,
) -> Result<PersistenceHandle, Box<dyn std::error::Error + Send + Sync>> {
    // Connect to PostgreSQL
    let db = Database::connect(database_url).await?;
    info!("Connected to PostgreSQL");

    // Redis is only a mirror; run without it if unreachable
    let cache = match Cache::connect(redis_url).await {
        Ok(cache) => {
            info!("Connected to Redis");
            Some(cache)
        }
        Err(e) => {
            warn!("Failed to connect to Redis: {}, respawn times will not be cached", e);
            None
        }
    };

    let (tx, rx) = mpsc::channel(256);

    tokio::spawn(persistence_task(db, cache, rx));
    info!("Persistence background task started");

    Ok(PersistenceHandle { sender: tx })
}

/// Background task that handles all persistence operations
async fn persistence_task(
    db: Database,
    cache: Option<Cache>,
    mut rx: mpsc::Receiver<PersistenceCommand>,
) {
    info!("Persistence task running");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            PersistenceCommand::SaveRespawnTime { guid, respawn_at } => {
                if let Some(cache) = &cache {
                    if let Err(e) = cache.save_respawn_time(guid, respawn_at).await {
                        warn!("Failed to cache respawn time for {}: {}", guid, e);
                    }
                }
                if let Err(e) = db.save_respawn_time(guid, respawn_at).await {
                    error!("Failed to save respawn time for {}: {}", guid, e);
                }
            }

            PersistenceCommand::DeleteRespawnTime { guid } => {
                if let Some(cache) = &cache {
                    if let Err(e) = cache.delete_respawn_time(guid).await {
                        warn!("Failed to remove cached respawn time for {}: {}", guid, e);
                    }
                }
                if let Err(e) = db.delete_respawn_time(guid).await {
                    error!("Failed to delete respawn time for {}: {}", guid, e);
                }
            }

            PersistenceCommand::LoadRespawnTimes { response } => {
                let times = match db.load_respawn_times().await {
                    Ok(times) => {
                        info!("Loaded {} respawn times from database", times.len());
                        times
                    }
                    Err(e) => {
                        error!("Failed to load respawn times from database: {}", e);
                        match &cache {
                            Some(cache) => match cache.load_respawn_times().await {
                                Ok(times) => {
                                    warn!("Using {} respawn times from cache", times.len());
                                    times
                                }
                                Err(e) => {
                                    error!("Failed to load respawn times from cache: {}", e);
                                    HashMap::new()
                                }
                            },
                            None => HashMap::new(),
                        }
                    }
                };
                let _ = response.send(times);
            }

            PersistenceCommand::Shutdown { done } => {
                info!("Persistence task shutting down");
                let _ = done.send(());
                break;
            }
        }
    }

    info!("Persistence task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_queues_commands() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = PersistenceHandle { sender: tx };

        handle.save_respawn_time(7, 1_000);
        handle.delete_respawn_time(7);

        assert!(matches!(rx.recv().await, Some(PersistenceCommand::SaveRespawnTime { guid: 7, respawn_at: 1_000 })));
        assert!(matches!(rx.recv().await, Some(PersistenceCommand::DeleteRespawnTime { guid: 7 })));
    }

    #[tokio::test]
    async fn test_full_channel_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = PersistenceHandle { sender: tx };

        handle.save_respawn_time(1, 10);
        handle.save_respawn_time(2, 20);

        assert!(matches!(rx.recv().await, Some(PersistenceCommand::SaveRespawnTime { guid: 1, .. })));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_load_without_task_is_empty() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = PersistenceHandle { sender: tx };
        assert!(handle.load_respawn_times().await.is_empty());
    }
}
