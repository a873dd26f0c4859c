// mongotool/src/mongod/service.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use mongodb::bson::{Document, doc};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use super::{AdminConnector, AdminSession, MongoCfgConfig, RsConfig, ShConfig};

const STALE_REPLSET_COLLECTIONS: &[&str] = &[
    "replset.election",
    "replset.minvalid",
    "replset.oplogTruncateAfterPoint",
];
const STALE_ROUTING_CACHES: &[&str] = &["cache.collections", "cache.databases"];

/// Opens admin sessions against transient mongod instances.
pub struct MongodConnector;

#[async_trait]
impl AdminConnector for MongodConnector {
    async fn open(&self, client_label: &str, endpoint: &str, timeout: Duration) -> Result<Box<dyn AdminSession>> {
        let mut options = ClientOptions::parse(endpoint)
            .await
            .with_context(|| format!("Invalid mongod endpoint {}", endpoint))?;
        options.app_name = Some(client_label.to_string());
        options.direct_connection = Some(true);
        options.server_selection_timeout = Some(timeout);

        let client = Client::with_options(options).context("Failed to build mongod client")?;
        let service = MongodService { client, timeout };

        // Server selection blocks until mongod accepts connections or the timeout passes.
        service
            .admin()
            .run_command(doc! { "ping": 1 }, None)
            .await
            .with_context(|| format!("mongod at {} did not become available within {:?}", endpoint, timeout))?;

        info!(endpoint, timeout_secs = timeout.as_secs(), "connected to transient mongod");
        Ok(Box::new(service))
    }
}

pub struct MongodService {
    client: Client,
    timeout: Duration,
}

impl MongodService {
    fn admin(&self) -> Database {
        self.client.database("admin")
    }

    async fn bounded<T, F>(&self, what: &str, operation: F) -> Result<T>
    where
        F: Future<Output = mongodb::error::Result<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result.with_context(|| format!("Failed to {}", what)),
            Err(_) => Err(anyhow::anyhow!("Timed out after {:?} trying to {}", self.timeout, what)),
        }
    }

    async fn drop_collections(&self, db: &Database, names: &[&str]) -> Result<()> {
        for name in names {
            let collection = db.collection::<Document>(name);
            self.bounded(&format!("drop {}.{}", db.name(), name), collection.drop(None))
                .await?;
        }
        Ok(())
    }

    async fn reset_replset_config(&self, rs: &RsConfig) -> Result<()> {
        let replset = self.client.database("local").collection::<Document>("system.replset");
        self.bounded("clear local.system.replset", replset.delete_many(doc! {}, None))
            .await?;
        self.bounded("write local.system.replset", replset.insert_one(rs.to_document(), None))
            .await?;
        debug!(rs_name = %rs.rs_name, members = rs.members.len(), "replica set config rewritten");
        Ok(())
    }

    async fn reset_shard_identity(&self, sh: &ShConfig) -> Result<()> {
        let version = self.admin().collection::<Document>("system.version");
        let update = doc! {
            "$set": {
                "shardName": sh.shard_name.as_str(),
                "configsvrConnectionString": sh.mongocfg_connection_string.as_str(),
            }
        };
        self.bounded(
            "update shard identity",
            version.update_one(doc! { "_id": "shardIdentity" }, update, None),
        )
        .await?;
        Ok(())
    }

    async fn reset_shard_hosts(&self, cfg: &MongoCfgConfig) -> Result<()> {
        let shards = self.client.database("config").collection::<Document>("shards");
        for (name, host) in &cfg.shards {
            self.bounded(
                &format!("update host of shard {}", name),
                shards.update_one(
                    doc! { "_id": name.as_str() },
                    doc! { "$set": { "host": host.as_str() } },
                    None,
                ),
            )
            .await?;
        }
        Ok(())
    }
}

fn is_connection_dropped(error: &mongodb::error::Error) -> bool {
    matches!(
        *error.kind,
        ErrorKind::Io(_) | ErrorKind::ConnectionPoolCleared { .. }
    )
}

#[async_trait]
impl AdminSession for MongodService {
    async fn repair_metadata(&self, rs: &RsConfig, sh: &ShConfig, cfg: &MongoCfgConfig) -> Result<()> {
        let local = self.client.database("local");
        self.drop_collections(&local, STALE_REPLSET_COLLECTIONS).await?;

        if !rs.is_empty() {
            self.reset_replset_config(rs).await?;
        }
        if !sh.is_empty() {
            self.reset_shard_identity(sh).await?;
        }

        let config = self.client.database("config");
        self.drop_collections(&config, STALE_ROUTING_CACHES).await?;
        if !cfg.is_empty() {
            self.reset_shard_hosts(cfg).await?;
        }

        let version = self.admin().collection::<Document>("system.version");
        self.bounded(
            "remove minOpTimeRecovery",
            version.delete_one(doc! { "_id": "minOpTimeRecovery" }, None),
        )
        .await?;

        info!("system data fixed after restore");
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        let result = tokio::time::timeout(
            self.timeout,
            self.admin().run_command(doc! { "shutdown": 1 }, None),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Timed out after {:?} waiting for shutdown", self.timeout))?;

        match result {
            Ok(_) => Ok(()),
            // mongod drops the connection while shutting down.
            Err(e) if is_connection_dropped(&e) => Ok(()),
            Err(e) => Err(e).context("mongod rejected the shutdown command"),
        }
    }
}
