//! Handshake line written to stdout when the plugin starts.
//!
//! The host reads a single JSON object describing the plugin and the
//! address its RPC server listens on. Nothing else may be written to
//! stdout before it.

use serde::Serialize;
use snap_plugin_error::{PluginError, Result};
use std::io::Write;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum PluginType {
    Collector,
    Processor,
    Publisher,
    StreamCollector,
}

impl From<PluginType> for u8 {
    fn from(value: PluginType) -> Self {
        match value {
            PluginType::Collector => 0,
            PluginType::Processor => 1,
            PluginType::Publisher => 2,
            PluginType::StreamCollector => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum RpcType {
    Grpc,
    GrpcStream,
}

impl From<RpcType> for u8 {
    fn from(value: RpcType) -> Self {
        match value {
            RpcType::Grpc => 2,
            RpcType::GrpcStream => 3,
        }
    }
}

/// How the host routes requests across plugin instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum RoutingStrategy {
    Lru,
    Sticky,
    Concurrency,
}

impl From<RoutingStrategy> for u8 {
    fn from(value: RoutingStrategy) -> Self {
        match value {
            RoutingStrategy::Lru => 0,
            RoutingStrategy::Sticky => 1,
            RoutingStrategy::Concurrency => 2,
        }
    }
}

/// Identity and scheduling hints a plugin reports to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    pub plugin_type: PluginType,
    pub name: String,
    pub version: i32,
    pub rpc_type: RpcType,
    pub concurrency_count: u32,
    pub exclusive: bool,
    pub unsecure: bool,
    pub cache_ttl: Duration,
    pub strategy: RoutingStrategy,
}

impl Meta {
    pub fn new(plugin_type: PluginType, name: impl Into<String>, version: i32) -> Self {
        let rpc_type = match plugin_type {
            PluginType::StreamCollector => RpcType::GrpcStream,
            _ => RpcType::Grpc,
        };

        Self {
            plugin_type,
            name: name.into(),
            version,
            rpc_type,
            concurrency_count: 5,
            exclusive: false,
            unsecure: false,
            cache_ttl: Duration::from_millis(500),
            strategy: RoutingStrategy::Lru,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MetaRecord<'a> {
    #[serde(rename = "Type")]
    plugin_type: PluginType,
    name: &'a str,
    version: i32,
    #[serde(rename = "RPCType")]
    rpc_type: RpcType,
    concurrency_count: u32,
    exclusive: bool,
    unsecure: bool,
    #[serde(rename = "CacheTTL")]
    cache_ttl_ms: u64,
    routing_strategy: RoutingStrategy,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Preamble<'a> {
    meta: MetaRecord<'a>,
    listen_address: &'a str,
    #[serde(rename = "Type")]
    plugin_type: PluginType,
    state: u8,
    err_message: &'a str,
    version: i32,
}

/// Writes the preamble as one line of JSON and flushes the writer.
pub fn emit_preamble<W: Write>(meta: &Meta, listen_address: &str, mut writer: W) -> Result<()> {
    let preamble = Preamble {
        meta: MetaRecord {
            plugin_type: meta.plugin_type,
            name: &meta.name,
            version: meta.version,
            rpc_type: meta.rpc_type,
            concurrency_count: meta.concurrency_count,
            exclusive: meta.exclusive,
            unsecure: meta.unsecure,
            cache_ttl_ms: u64::try_from(meta.cache_ttl.as_millis()).unwrap_or(u64::MAX),
            routing_strategy: meta.strategy,
        },
        listen_address,
        plugin_type: meta.plugin_type,
        state: 0,
        err_message: "",
        version: meta.version,
    };

    serde_json::to_writer(&mut writer, &preamble)
        .map_err(|e| PluginError::Serialization(e.to_string()))?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn meta_defaults() {
        let meta = Meta::new(PluginType::Collector, "rando", 1);
        assert_eq!(meta.rpc_type, RpcType::Grpc);
        assert_eq!(meta.concurrency_count, 5);
        assert!(!meta.exclusive);
        assert!(!meta.unsecure);
        assert_eq!(meta.cache_ttl, Duration::from_millis(500));
        assert_eq!(meta.strategy, RoutingStrategy::Lru);

        let meta = Meta::new(PluginType::StreamCollector, "rando", 1);
        assert_eq!(meta.rpc_type, RpcType::GrpcStream);
    }

    #[test]
    fn preamble_is_one_json_line() {
        let mut meta = Meta::new(PluginType::StreamCollector, "rando", 7);
        meta.strategy = RoutingStrategy::Sticky;

        let mut out = Vec::new();
        emit_preamble(&meta, "127.0.0.1:9997", &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);

        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({
                "Meta": {
                    "Type": 3,
                    "Name": "rando",
                    "Version": 7,
                    "RPCType": 3,
                    "ConcurrencyCount": 5,
                    "Exclusive": false,
                    "Unsecure": false,
                    "CacheTTL": 500,
                    "RoutingStrategy": 1
                },
                "ListenAddress": "127.0.0.1:9997",
                "Type": 3,
                "State": 0,
                "ErrMessage": "",
                "Version": 7
            })
        );
    }
}
