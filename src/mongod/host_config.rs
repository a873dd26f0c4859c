// mongotool/src/mongod/host_config.rs
use anyhow::Result;
use mongodb::bson::{Document, doc};
use std::collections::BTreeMap;

/// Replica set membership the restored node should come up with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RsConfig {
    pub rs_name: String,
    pub members: Vec<String>,
    pub member_ids: Vec<i32>,
}

impl RsConfig {
    pub fn new(rs_name: impl Into<String>, members: Vec<String>, member_ids: Vec<i32>) -> Result<Self> {
        let config = RsConfig {
            rs_name: rs_name.into(),
            members,
            member_ids,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn is_empty(&self) -> bool {
        self.rs_name.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            if !self.members.is_empty() || !self.member_ids.is_empty() {
                anyhow::bail!("replica set members are given without a replica set name");
            }
            return Ok(());
        }
        if self.members.is_empty() {
            anyhow::bail!("replica set {} has no members", self.rs_name);
        }
        if !self.member_ids.is_empty() && self.member_ids.len() != self.members.len() {
            anyhow::bail!(
                "replica set {} has {} members but {} member ids",
                self.rs_name,
                self.members.len(),
                self.member_ids.len()
            );
        }
        Ok(())
    }

    /// The `local.system.replset` document for this configuration.
    pub fn to_document(&self) -> Document {
        let members: Vec<Document> = self
            .members
            .iter()
            .enumerate()
            .map(|(i, host)| {
                let id = self.member_ids.get(i).copied().unwrap_or(i as i32);
                doc! { "_id": id, "host": host.as_str() }
            })
            .collect();

        doc! {
            "_id": self.rs_name.as_str(),
            "version": 1,
            "protocolVersion": 1_i64,
            "members": members,
            "settings": {},
        }
    }
}

/// Shard identity of the restored node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShConfig {
    pub shard_name: String,
    pub mongocfg_connection_string: String,
}

impl ShConfig {
    pub fn is_empty(&self) -> bool {
        self.shard_name.is_empty() && self.mongocfg_connection_string.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        if self.shard_name.is_empty() || self.mongocfg_connection_string.is_empty() {
            anyhow::bail!("shard name and config server connection string must be given together");
        }
        Ok(())
    }
}

/// Shard hosts to record when the restored node is a config server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MongoCfgConfig {
    pub shards: BTreeMap<String, String>,
}

impl MongoCfgConfig {
    /// Accepts connection strings shaped `shardName/host1:port,host2:port`.
    pub fn from_connection_strings(connection_strings: &[String]) -> Result<Self> {
        let mut shards = BTreeMap::new();
        for conn in connection_strings {
            let (name, _) = conn
                .split_once('/')
                .filter(|(name, hosts)| !name.is_empty() && !hosts.is_empty())
                .ok_or_else(|| anyhow::anyhow!("shard connection string '{}' must look like name/host:port", conn))?;
            if shards.insert(name.to_string(), conn.clone()).is_some() {
                anyhow::bail!("shard {} is given more than once", name);
            }
        }
        Ok(MongoCfgConfig { shards })
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}
