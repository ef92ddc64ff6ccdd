//! Parameter tables and the descriptors producers validate them against.

use crate::value::{Value, ValueKind};
use std::collections::HashMap;
use std::fmt;
use std::ops::BitOr;

/// Raw key/value parameters, as declared or injected.
pub type ParameterMap = HashMap<String, Value>;

/// A producer's configuration store.
///
/// `Clone` is deep: a cloned table shares nothing with the original, so a
/// per-call override can be applied to the clone without touching the
/// producer's durable configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterTable {
    storage: ParameterMap,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.storage.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.storage.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.storage.remove(key)
    }

    pub fn clear(&mut self) {
        self.storage.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.storage.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.storage.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.storage.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Replace the whole storage.
    pub fn replace_all(&mut self, params: ParameterMap) {
        self.storage = params;
    }

    /// Merge keys into the storage, leaving unmentioned keys intact.
    pub fn patch(&mut self, params: ParameterMap) {
        self.storage.extend(params);
    }

    /// A deep copy of the table with `params` merged on top.
    pub fn patched(&self, params: ParameterMap) -> Self {
        let mut table = self.clone();
        table.patch(params);
        table
    }

    pub fn to_map(&self) -> ParameterMap {
        self.storage.clone()
    }
}

impl From<ParameterMap> for ParameterTable {
    fn from(storage: ParameterMap) -> Self {
        Self { storage }
    }
}

/// Set of value kinds a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterType(u8);

impl ParameterType {
    pub const STRING: ParameterType = ParameterType(1);
    pub const NUMBER: ParameterType = ParameterType(1 << 1);
    pub const BOOLEAN: ParameterType = ParameterType(1 << 2);
    pub const ARRAY: ParameterType = ParameterType(1 << 3);
    pub const OBJECT: ParameterType = ParameterType(1 << 4);
    pub const NULL: ParameterType = ParameterType(1 << 5);
    pub const ANY: ParameterType = ParameterType(0b11_1111);

    fn of(kind: ValueKind) -> ParameterType {
        match kind {
            ValueKind::String => Self::STRING,
            ValueKind::Number => Self::NUMBER,
            ValueKind::Boolean => Self::BOOLEAN,
            ValueKind::Array => Self::ARRAY,
            ValueKind::Object => Self::OBJECT,
            ValueKind::Null => Self::NULL,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        self.0 & Self::of(value.kind()).0 != 0
    }
}

impl BitOr for ParameterType {
    type Output = ParameterType;

    fn bitor(self, rhs: Self) -> Self::Output {
        ParameterType(self.0 | rhs.0)
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ANY {
            return f.write_str("any");
        }
        let names: Vec<&str> = [
            ValueKind::String,
            ValueKind::Number,
            ValueKind::Boolean,
            ValueKind::Array,
            ValueKind::Object,
            ValueKind::Null,
        ]
        .into_iter()
        .filter(|kind| self.0 & Self::of(*kind).0 != 0)
        .map(|kind| kind.name())
        .collect();
        f.write_str(&names.join(" | "))
    }
}

/// Declaration of one accepted parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParameterType,
    pub optional: bool,
    /// Filled in at initialization when the key is absent.
    pub default: Option<Value>,
    pub description: String,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, kind: ParameterType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            default: None,
            description: description.into(),
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParameterType, description: impl Into<String>) -> Self {
        Self {
            optional: true,
            ..Self::required(name, kind, description)
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.optional = true;
        self
    }
}

/// The parameters a producer declares. An empty descriptor accepts anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterDescriptor {
    specs: Vec<ParameterSpec>,
}

impl ParameterDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, spec: ParameterSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.specs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Check `params` against the declared specs.
    ///
    /// A `partial` check (per-call overrides) only looks at the keys present;
    /// a full check also fills defaults and requires every mandatory key.
    /// `null` is accepted for optional parameters and means "unset".
    pub fn validate(&self, mut params: ParameterMap, partial: bool) -> Result<ParameterMap, String> {
        if self.specs.is_empty() {
            return Ok(params);
        }

        for (key, value) in &params {
            let spec = self
                .get(key)
                .ok_or_else(|| format!("Unknown parameter \"{}\"", key))?;
            if value.is_null() && spec.optional {
                continue;
            }
            if !spec.kind.accepts(value) {
                return Err(format!(
                    "Parameter \"{}\" must be {}, got {}",
                    key,
                    spec.kind,
                    value.kind()
                ));
            }
        }

        if !partial {
            for spec in &self.specs {
                if params.contains_key(&spec.name) {
                    continue;
                }
                match (&spec.default, spec.optional) {
                    (Some(default), _) => {
                        params.insert(spec.name.clone(), default.clone());
                    }
                    (None, true) => {}
                    (None, false) => {
                        return Err(format!("Missing required parameter \"{}\"", spec.name));
                    }
                }
            }
        }

        Ok(params)
    }
}
