use crate::policy::ConfigPolicy;
use snap_plugin_proto::rpc;
use std::collections::HashMap;

/// Typed settings exchanged between the host and the plugin.
///
/// The three maps are independent: the same key may hold a string, an
/// integer and a boolean at the same time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    strings: HashMap<String, String>,
    ints: HashMap<String, i64>,
    bools: HashMap<String, bool>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_wire(map: rpc::ConfigMap) -> Self {
        Self {
            strings: map.string_map,
            ints: map.int_map,
            bools: map.bool_map,
        }
    }

    pub fn to_wire(&self) -> rpc::ConfigMap {
        rpc::ConfigMap {
            int_map: self.ints.clone(),
            string_map: self.strings.clone(),
            bool_map: self.bools.clone(),
        }
    }

    pub fn has_string_key(&self, key: &str) -> bool {
        self.strings.contains_key(key)
    }

    pub fn has_int_key(&self, key: &str) -> bool {
        self.ints.contains_key(key)
    }

    pub fn has_bool_key(&self, key: &str) -> bool {
        self.bools.contains_key(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.strings.get(key).map(String::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.ints.get(key).copied()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.bools.get(key).copied()
    }

    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.strings.insert(key.into(), value.into());
    }

    pub fn set_int(&mut self, key: impl Into<String>, value: i64) {
        self.ints.insert(key.into(), value);
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.bools.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.ints.is_empty() && self.bools.is_empty()
    }

    /// Inserts the default of every policy rule whose key is missing.
    /// Values already present are never overwritten.
    pub fn apply_defaults(&mut self, policy: &ConfigPolicy) {
        for (key, rule) in policy.string_rules() {
            if let Some(default) = rule.default_value() {
                self.strings
                    .entry(key.clone())
                    .or_insert_with(|| default.to_string());
            }
        }

        for (key, rule) in policy.int_rules() {
            if let Some(default) = rule.default_value() {
                self.ints.entry(key.clone()).or_insert(default);
            }
        }

        for (key, rule) in policy.bool_rules() {
            if let Some(default) = rule.default_value() {
                self.bools.entry(key.clone()).or_insert(default);
            }
        }
    }
}

impl From<rpc::ConfigMap> for Config {
    fn from(map: rpc::ConfigMap) -> Self {
        Self::from_wire(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{BoolRule, IntRule, StringRule};

    fn policy() -> ConfigPolicy {
        let mut policy = ConfigPolicy::new();
        policy.add_rule(&["x", "y"], IntRule::new().with_default(7));
        policy.add_rule(&["user"], StringRule::new().with_default("root"));
        policy.add_rule(&["debug"], BoolRule::new().with_default(false));
        policy.add_rule(&["password"], StringRule::required());
        policy
    }

    #[test]
    fn integer_default_lands_under_dotted_key() {
        let mut cfg = Config::new();
        assert!(!cfg.has_int_key("x.y"));

        cfg.apply_defaults(&policy());

        assert!(cfg.has_int_key("x.y"));
        assert_eq!(cfg.get_int("x.y"), Some(7));
    }

    #[test]
    fn explicit_values_win_over_defaults() {
        let mut cfg = Config::new();
        cfg.set_string("user", "snap");
        cfg.set_bool("debug", true);

        cfg.apply_defaults(&policy());

        assert_eq!(cfg.get_string("user"), Some("snap"));
        assert_eq!(cfg.get_bool("debug"), Some(true));
        assert!(!cfg.has_string_key("password"));
    }

    #[test]
    fn apply_defaults_is_idempotent() {
        let mut once = Config::new();
        once.set_int("x.y", 3);
        once.apply_defaults(&policy());

        let mut twice = once.clone();
        twice.apply_defaults(&policy());

        assert_eq!(once, twice);
        assert_eq!(twice.get_int("x.y"), Some(3));
    }

    #[test]
    fn wire_conversion_keeps_all_maps() {
        let mut cfg = Config::new();
        cfg.set_int("a", 1);
        cfg.set_string("b", "two");
        cfg.set_bool("c", true);

        let back = Config::from_wire(cfg.to_wire());
        assert_eq!(back, cfg);
    }
}
