//! Pipeline execution against Redis
//!
//! Translates driver pipelines into Redis command pipelines and executes
//! them on a pooled connection under a per-request deadline. Cluster
//! topology (redirect handling, node discovery) is owned by the cluster
//! connection; this layer only guarantees it never mixes slots within one
//! pipeline.

use super::pool::{ConnectionPool, PoolStats, PooledConn};
use super::slot::cluster_slot;
use crate::config::StoreConfig;
use crate::storage::{CounterStore, Pipeline, StoreOp};
use crate::utils::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Redis-backed [`CounterStore`] for standalone and cluster endpoints.
pub struct RedisCounterStore {
    pool: ConnectionPool,
    cluster: bool,
    timeout: Duration,
}

impl RedisCounterStore {
    /// Connect to the configured endpoint and verify it answers PING.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let pool = ConnectionPool::connect(config).await?;
        let store = Self {
            cluster: pool.is_cluster(),
            pool,
            timeout: Duration::from_millis(config.request_timeout_ms),
        };

        store.health_check().await?;
        info!(
            "Redis counter store ready (cluster: {}, timeout: {:?})",
            store.cluster, store.timeout
        );
        Ok(store)
    }

    /// Pool counters.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    fn build_pipeline(pipeline: &Pipeline) -> redis::Pipeline {
        let mut pipe = redis::pipe();
        for op in pipeline.ops() {
            match op {
                StoreOp::IncrBy { key, delta } => {
                    pipe.cmd("INCRBY").arg(key).arg(*delta);
                }
                StoreOp::Expire { key, seconds } => {
                    pipe.cmd("EXPIRE").arg(key).arg(*seconds);
                }
                StoreOp::Get { key } => {
                    pipe.cmd("GET").arg(key);
                }
            }
        }
        pipe
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    fn is_cluster(&self) -> bool {
        self.cluster
    }

    fn slot(&self, key: &str) -> u16 {
        if self.cluster {
            cluster_slot(key)
        } else {
            0
        }
    }

    async fn run_pipeline(&self, pipeline: &Pipeline) -> Result<Vec<Option<u64>>> {
        if pipeline.is_empty() {
            return Ok(Vec::new());
        }

        let pipe = Self::build_pipeline(pipeline);
        let mut guard = self.pool.acquire().await?;

        let query = async {
            match guard.conn_mut() {
                PooledConn::Single(conn) => {
                    let replies: redis::RedisResult<Vec<Option<u64>>> =
                        pipe.query_async(conn).await;
                    replies
                }
                PooledConn::Cluster(conn) => {
                    let replies: redis::RedisResult<Vec<Option<u64>>> =
                        pipe.query_async(conn).await;
                    replies
                }
            }
        };

        let outcome = tokio::time::timeout(self.timeout, query).await;

        let raw = match outcome {
            Ok(Ok(replies)) => replies,
            Ok(Err(e)) => {
                guard.discard();
                return Err(Error::Redis(e));
            }
            Err(_) => {
                guard.discard();
                return Err(Error::Timeout(format!(
                    "pipeline of {} ops exceeded {:?}",
                    pipeline.len(),
                    self.timeout
                )));
            }
        };

        debug!("executed pipeline of {} ops", pipeline.len());

        // TTL updates reply with an integer acknowledgement; the driver
        // contract says they produce nothing.
        let replies = raw
            .into_iter()
            .zip(pipeline.ops())
            .map(|(reply, op)| match op {
                StoreOp::Expire { .. } => None,
                _ => reply,
            })
            .collect();

        Ok(replies)
    }

    async fn health_check(&self) -> Result<()> {
        let mut guard = self.pool.acquire().await?;
        let ping = async {
            match guard.conn_mut() {
                PooledConn::Single(conn) => {
                    let pong: redis::RedisResult<String> =
                        redis::cmd("PING").query_async(conn).await;
                    pong
                }
                PooledConn::Cluster(conn) => {
                    let pong: redis::RedisResult<String> =
                        redis::cmd("PING").query_async(conn).await;
                    pong
                }
            }
        };

        tokio::time::timeout(self.timeout, ping)
            .await
            .map_err(|_| Error::Timeout("health check exceeded deadline".to_string()))??;

        debug!("store health check passed");
        Ok(())
    }
}
