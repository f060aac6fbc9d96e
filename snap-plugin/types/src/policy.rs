use crate::config::Config;
use snap_plugin_error::{PluginError, Result};
use snap_plugin_proto::rpc;
use std::collections::BTreeMap;

/// Joins namespace segments with `.` to form a policy key.
///
/// `[]` and `[""]` both map to the empty key, which holds rules that apply
/// to the whole metric.
pub fn build_key<S: AsRef<str>>(path: &[S]) -> String {
    let segments: Vec<&str> = path.iter().map(AsRef::as_ref).collect();
    segments.join(".")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringRule {
    required: bool,
    default: Option<String>,
}

impl StringRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required() -> Self {
        Self {
            required: true,
            default: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntRule {
    required: bool,
    default: Option<i64>,
    minimum: Option<i64>,
    maximum: Option<i64>,
}

impl IntRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    pub fn with_default(mut self, value: i64) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_minimum(mut self, value: i64) -> Self {
        self.minimum = Some(value);
        self
    }

    pub fn with_maximum(mut self, value: i64) -> Self {
        self.maximum = Some(value);
        self
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<i64> {
        self.default
    }

    pub fn minimum(&self) -> Option<i64> {
        self.minimum
    }

    pub fn maximum(&self) -> Option<i64> {
        self.maximum
    }

    fn accepts(&self, value: i64) -> bool {
        self.minimum.is_none_or(|min| value >= min) && self.maximum.is_none_or(|max| value <= max)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoolRule {
    required: bool,
    default: Option<bool>,
}

impl BoolRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required() -> Self {
        Self {
            required: true,
            default: None,
        }
    }

    pub fn with_default(mut self, value: bool) -> Self {
        self.default = Some(value);
        self
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<bool> {
        self.default
    }
}

/// A rule of any of the three value kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    String(StringRule),
    Int(IntRule),
    Bool(BoolRule),
}

impl From<StringRule> for Rule {
    fn from(rule: StringRule) -> Self {
        Rule::String(rule)
    }
}

impl From<IntRule> for Rule {
    fn from(rule: IntRule) -> Self {
        Rule::Int(rule)
    }
}

impl From<BoolRule> for Rule {
    fn from(rule: BoolRule) -> Self {
        Rule::Bool(rule)
    }
}

/// Required and optional typed settings declared by the plugin, keyed by
/// dotted namespace path.
///
/// Each value kind has its own map; a key used in more than one of them is
/// not detected here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPolicy {
    strings: BTreeMap<String, StringRule>,
    ints: BTreeMap<String, IntRule>,
    bools: BTreeMap<String, BoolRule>,
}

impl ConfigPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `rule` under the key built from `path`, replacing any rule of
    /// the same kind already there.
    pub fn add_rule<S: AsRef<str>>(&mut self, path: &[S], rule: impl Into<Rule>) -> &mut Self {
        let key = build_key(path);
        match rule.into() {
            Rule::String(rule) => {
                self.strings.insert(key, rule);
            }
            Rule::Int(rule) => {
                self.ints.insert(key, rule);
            }
            Rule::Bool(rule) => {
                self.bools.insert(key, rule);
            }
        }
        self
    }

    pub fn string_rules(&self) -> impl Iterator<Item = (&String, &StringRule)> {
        self.strings.iter()
    }

    pub fn int_rules(&self) -> impl Iterator<Item = (&String, &IntRule)> {
        self.ints.iter()
    }

    pub fn bool_rules(&self) -> impl Iterator<Item = (&String, &BoolRule)> {
        self.bools.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.ints.is_empty() && self.bools.is_empty()
    }

    /// Checks that every required key is present and that integers respect
    /// their bounds. Meant to run after [`Config::apply_defaults`].
    pub fn validate(&self, config: &Config) -> Result<()> {
        let mut problems = Vec::new();

        for (key, rule) in &self.strings {
            if rule.required && !config.has_string_key(key) {
                problems.push(format!("missing required string '{}'", key));
            }
        }

        for (key, rule) in &self.ints {
            match config.get_int(key) {
                None if rule.required => {
                    problems.push(format!("missing required integer '{}'", key));
                }
                Some(value) if !rule.accepts(value) => {
                    problems.push(format!("integer '{}' out of range: {}", key, value));
                }
                _ => {}
            }
        }

        for (key, rule) in &self.bools {
            if rule.required && !config.has_bool_key(key) {
                problems.push(format!("missing required bool '{}'", key));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(PluginError::Config(problems.join("; ")))
        }
    }

    pub fn to_wire(&self) -> rpc::GetConfigPolicyReply {
        let string_policy = self
            .strings
            .iter()
            .map(|(key, rule)| {
                let wire = rpc::StringRule {
                    required: rule.required,
                    default: rule.default.clone().unwrap_or_default(),
                    has_default: rule.default.is_some(),
                };
                (key.clone(), wire)
            })
            .collect();

        let integer_policy = self
            .ints
            .iter()
            .map(|(key, rule)| {
                let wire = rpc::IntegerRule {
                    required: rule.required,
                    default: rule.default.unwrap_or_default(),
                    has_default: rule.default.is_some(),
                    minimum: rule.minimum.unwrap_or_default(),
                    maximum: rule.maximum.unwrap_or_default(),
                    has_min: rule.minimum.is_some(),
                    has_max: rule.maximum.is_some(),
                };
                (key.clone(), wire)
            })
            .collect();

        let bool_policy = self
            .bools
            .iter()
            .map(|(key, rule)| {
                let wire = rpc::BoolRule {
                    required: rule.required,
                    default: rule.default.unwrap_or_default(),
                    has_default: rule.default.is_some(),
                };
                (key.clone(), wire)
            })
            .collect();

        rpc::GetConfigPolicyReply {
            error: String::new(),
            bool_policy,
            integer_policy,
            string_policy,
        }
    }
}

macro_rules! single_rule_policy {
    ($($rule:ty),*) => {
        $(
            impl From<$rule> for ConfigPolicy {
                /// A policy holding a single whole-metric rule.
                fn from(rule: $rule) -> Self {
                    let mut policy = ConfigPolicy::new();
                    policy.add_rule(&[""], rule);
                    policy
                }
            }
        )*
    };
}

single_rule_policy!(StringRule, IntRule, BoolRule);
