//! Data model manipulated by the Snap plugin runtime: hierarchical
//! namespaces, typed metrics and the typed configuration exchanged with the
//! host, together with the config policy that declares its defaults.

mod config;
mod metric;
mod namespace;
mod policy;

pub use config::Config;
pub use metric::{DataType, Metric, MetricRef, MetricValue, time_from_wire, time_to_wire};
pub use namespace::{Namespace, NamespaceElement};
pub use policy::{BoolRule, ConfigPolicy, IntRule, Rule, StringRule, build_key};

pub use snap_plugin_proto::rpc;
