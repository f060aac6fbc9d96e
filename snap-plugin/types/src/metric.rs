use crate::config::Config;
use crate::namespace::Namespace;
use snap_plugin_proto::rpc::{self, metric::Data};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Splits a point in time into the wire's second + nanosecond pair.
pub fn time_to_wire(time: SystemTime) -> rpc::Time {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => rpc::Time {
            sec: since.as_secs() as i64,
            nsec: i64::from(since.subsec_nanos()),
        },
        Err(err) => {
            // nsec stays positive, so borrow one second when there is a fraction
            let before = err.duration();
            let mut sec = -(before.as_secs() as i64);
            let mut nsec = i64::from(before.subsec_nanos());
            if nsec > 0 {
                sec -= 1;
                nsec = NANOS_PER_SEC - nsec;
            }
            rpc::Time { sec, nsec }
        }
    }
}

/// Rebuilds a point in time from the wire pair. `nsec` outside one second
/// carries into `sec`. Returns `None` when the result is not representable.
pub fn time_from_wire(time: &rpc::Time) -> Option<SystemTime> {
    let sec = time.sec.checked_add(time.nsec.div_euclid(NANOS_PER_SEC))?;
    let nanos = Duration::from_nanos(time.nsec.rem_euclid(NANOS_PER_SEC) as u64);

    let base = if sec >= 0 {
        UNIX_EPOCH.checked_add(Duration::from_secs(sec as u64))?
    } else {
        UNIX_EPOCH.checked_sub(Duration::from_secs(sec.unsigned_abs()))?
    };
    base.checked_add(nanos)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    NotSet,
    Float32,
    Float64,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Bool,
    String,
}

/// The typed value carried by a metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MetricValue {
    #[default]
    NotSet,
    Float32(f32),
    Float64(f64),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Bool(bool),
    String(String),
}

impl MetricValue {
    pub fn data_type(&self) -> DataType {
        match self {
            MetricValue::NotSet => DataType::NotSet,
            MetricValue::Float32(_) => DataType::Float32,
            MetricValue::Float64(_) => DataType::Float64,
            MetricValue::Int32(_) => DataType::Int32,
            MetricValue::Int64(_) => DataType::Int64,
            MetricValue::Uint32(_) => DataType::Uint32,
            MetricValue::Uint64(_) => DataType::Uint64,
            MetricValue::Bool(_) => DataType::Bool,
            MetricValue::String(_) => DataType::String,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            MetricValue::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            MetricValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetricValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            MetricValue::Uint32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            MetricValue::Uint64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetricValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::String(v) => Some(v),
            _ => None,
        }
    }

    fn from_wire(data: Option<&Data>) -> Self {
        match data {
            None => MetricValue::NotSet,
            Some(Data::Float32Data(v)) => MetricValue::Float32(*v),
            Some(Data::Float64Data(v)) => MetricValue::Float64(*v),
            Some(Data::Int32Data(v)) => MetricValue::Int32(*v),
            Some(Data::Int64Data(v)) => MetricValue::Int64(*v),
            Some(Data::Uint32Data(v)) => MetricValue::Uint32(*v),
            Some(Data::Uint64Data(v)) => MetricValue::Uint64(*v),
            Some(Data::BoolData(v)) => MetricValue::Bool(*v),
            Some(Data::StringData(v)) => MetricValue::String(v.clone()),
        }
    }

    fn into_wire(self) -> Option<Data> {
        match self {
            MetricValue::NotSet => None,
            MetricValue::Float32(v) => Some(Data::Float32Data(v)),
            MetricValue::Float64(v) => Some(Data::Float64Data(v)),
            MetricValue::Int32(v) => Some(Data::Int32Data(v)),
            MetricValue::Int64(v) => Some(Data::Int64Data(v)),
            MetricValue::Uint32(v) => Some(Data::Uint32Data(v)),
            MetricValue::Uint64(v) => Some(Data::Uint64Data(v)),
            MetricValue::Bool(v) => Some(Data::BoolData(v)),
            MetricValue::String(v) => Some(Data::StringData(v)),
        }
    }
}

macro_rules! metric_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for MetricValue {
                fn from(value: $ty) -> Self {
                    MetricValue::$variant(value)
                }
            }
        )*
    };
}

metric_value_from!(
    f32 => Float32,
    f64 => Float64,
    i32 => Int32,
    i64 => Int64,
    u32 => Uint32,
    u64 => Uint64,
    bool => Bool,
    String => String,
);

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::String(value.to_string())
    }
}

/// Read-only view over a wire metric owned by someone else.
///
/// Namespace and config are derived from the wire form on every call, so a
/// view always reflects the current contents of the metric it borrows.
#[derive(Debug, Clone, Copy)]
pub struct MetricRef<'a> {
    wire: &'a rpc::Metric,
}

impl<'a> MetricRef<'a> {
    pub fn new(wire: &'a rpc::Metric) -> Self {
        Self { wire }
    }

    pub fn wire(&self) -> &'a rpc::Metric {
        self.wire
    }

    pub fn ns(&self) -> Namespace {
        Namespace::from_wire(&self.wire.namespace)
    }

    pub fn unit(&self) -> &'a str {
        &self.wire.unit
    }

    pub fn description(&self) -> &'a str {
        &self.wire.description
    }

    pub fn version(&self) -> i64 {
        self.wire.version
    }

    pub fn tags(&self) -> &'a HashMap<String, String> {
        &self.wire.tags
    }

    pub fn tag(&self, key: &str) -> Option<&'a str> {
        self.wire.tags.get(key).map(String::as_str)
    }

    pub fn timestamp(&self) -> Option<SystemTime> {
        self.wire.timestamp.as_ref().and_then(time_from_wire)
    }

    pub fn last_advertised_time(&self) -> Option<SystemTime> {
        self.wire.last_advertised_time.as_ref().and_then(time_from_wire)
    }

    pub fn value(&self) -> MetricValue {
        MetricValue::from_wire(self.wire.data.as_ref())
    }

    pub fn data_type(&self) -> DataType {
        self.value().data_type()
    }

    /// Diagnostic configuration attached to the metric.
    pub fn config(&self) -> Config {
        self.wire
            .config
            .clone()
            .map(Config::from_wire)
            .unwrap_or_default()
    }

    /// Copies the borrowed metric into an owned value.
    pub fn to_metric(&self) -> Metric {
        Metric::from_wire(self.wire.clone())
    }
}

/// One timestamped, typed measurement owning its wire representation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metric {
    wire: rpc::Metric,
}

impl Metric {
    pub fn new(ns: Namespace, unit: impl Into<String>, description: impl Into<String>) -> Self {
        let mut metric = Metric::default();
        metric.wire.unit = unit.into();
        metric.wire.description = description.into();
        metric.set_ns(&ns);
        metric
    }

    pub fn from_wire(wire: rpc::Metric) -> Self {
        Self { wire }
    }

    pub fn wire(&self) -> &rpc::Metric {
        &self.wire
    }

    pub fn into_wire(self) -> rpc::Metric {
        self.wire
    }

    pub fn as_view(&self) -> MetricRef<'_> {
        MetricRef::new(&self.wire)
    }

    pub fn set_ns(&mut self, ns: &Namespace) {
        self.wire.namespace = ns.to_wire();
    }

    pub fn ns(&self) -> Namespace {
        self.as_view().ns()
    }

    pub fn unit(&self) -> &str {
        &self.wire.unit
    }

    pub fn set_unit(&mut self, unit: impl Into<String>) {
        self.wire.unit = unit.into();
    }

    pub fn description(&self) -> &str {
        &self.wire.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.wire.description = description.into();
    }

    pub fn version(&self) -> i64 {
        self.wire.version
    }

    pub fn set_version(&mut self, version: i64) {
        self.wire.version = version;
    }

    /// Inserts or replaces a tag.
    pub fn add_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.wire.tags.insert(key.into(), value.into());
    }

    pub fn tags(&self) -> &HashMap<String, String> {
        &self.wire.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.as_view().tag(key)
    }

    pub fn timestamp(&self) -> Option<SystemTime> {
        self.as_view().timestamp()
    }

    pub fn set_timestamp(&mut self, time: SystemTime) {
        self.wire.timestamp = Some(time_to_wire(time));
    }

    /// Stamps the metric with the current wall clock time.
    pub fn stamp_timestamp(&mut self) {
        self.set_timestamp(SystemTime::now());
    }

    pub fn last_advertised_time(&self) -> Option<SystemTime> {
        self.as_view().last_advertised_time()
    }

    pub fn set_last_advertised_time(&mut self, time: SystemTime) {
        self.wire.last_advertised_time = Some(time_to_wire(time));
    }

    pub fn stamp_last_advertised_time(&mut self) {
        self.set_last_advertised_time(SystemTime::now());
    }

    pub fn value(&self) -> MetricValue {
        self.as_view().value()
    }

    pub fn data_type(&self) -> DataType {
        self.as_view().data_type()
    }

    pub fn set_data(&mut self, value: impl Into<MetricValue>) {
        self.wire.data = value.into().into_wire();
    }

    pub fn config(&self) -> Config {
        self.as_view().config()
    }

    /// Attaches a configuration snapshot used for diagnostics.
    pub fn set_diagnostic_config(&mut self, config: &Config) {
        self.wire.config = Some(config.to_wire());
    }
}

impl From<rpc::Metric> for Metric {
    fn from(wire: rpc::Metric) -> Self {
        Self::from_wire(wire)
    }
}

impl From<Metric> for rpc::Metric {
    fn from(metric: Metric) -> Self {
        metric.wire
    }
}
