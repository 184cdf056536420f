//! Configuration values and their declared types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// A configuration value.
///
/// Serialized untagged so that JSON and TOML sources read naturally. Floats
/// always carry a decimal point on the wire, so integer and float values
/// survive a round trip with their tag intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Boolean(bool),
    Integer(i64),
    Float(#[serde(serialize_with = "serialize_finite")] f64),
    String(String),
    List(Vec<ConfigValue>),
    Record(BTreeMap<String, ConfigValue>),
}

/// JSON has no representation for NaN or infinity; refuse instead of
/// silently writing `null`.
fn serialize_finite<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        Err(serde::ser::Error::custom(format!("non-finite float {value}")))
    }
}

impl ConfigValue {
    /// Human readable name of the value's tag.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ConfigValue::Boolean(_) => "boolean",
            ConfigValue::Integer(_) => "integer",
            ConfigValue::Float(_) => "float",
            ConfigValue::String(_) => "string",
            ConfigValue::List(_) => "list",
            ConfigValue::Record(_) => "record",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Convert any serializable type into a configuration value.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(value)?)
    }

    /// Convert this value into a typed structure.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(self)?)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Boolean(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(value: Vec<ConfigValue>) -> Self {
        ConfigValue::List(value)
    }
}

impl From<BTreeMap<String, ConfigValue>> for ConfigValue {
    fn from(value: BTreeMap<String, ConfigValue>) -> Self {
        ConfigValue::Record(value)
    }
}

/// Declared type of a key, including its bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueType {
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    Float {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Boolean,
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        one_of: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_len: Option<usize>,
    },
    /// Every declared field is required and no other field is accepted.
    Record { fields: BTreeMap<String, ValueType> },
    List {
        items: Box<ValueType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_len: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_len: Option<usize>,
        /// Record field whose value must differ between items.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unique_by: Option<String>,
    },
}

/// A failed check, before it is attributed to a key.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Violation {
    Type {
        path: String,
        expected: String,
        found: String,
    },
    Range {
        path: String,
        detail: String,
    },
}

impl ValueType {
    pub fn integer() -> Self {
        ValueType::Integer { min: None, max: None }
    }

    pub fn integer_range(min: Option<i64>, max: Option<i64>) -> Self {
        ValueType::Integer { min, max }
    }

    pub fn float() -> Self {
        ValueType::Float { min: None, max: None }
    }

    pub fn float_range(min: Option<f64>, max: Option<f64>) -> Self {
        ValueType::Float { min, max }
    }

    pub fn boolean() -> Self {
        ValueType::Boolean
    }

    pub fn string() -> Self {
        ValueType::String { one_of: None, max_len: None }
    }

    /// A string restricted to a fixed set of choices.
    pub fn choice(options: &[&str]) -> Self {
        ValueType::String {
            one_of: Some(options.iter().map(|s| s.to_string()).collect()),
            max_len: None,
        }
    }

    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, ValueType)>) -> Self {
        ValueType::Record {
            fields: fields
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
        }
    }

    pub fn list(items: ValueType) -> Self {
        ValueType::List { items: Box::new(items), min_len: None, max_len: None, unique_by: None }
    }

    pub fn list_bounded(items: ValueType, min_len: Option<usize>, max_len: Option<usize>) -> Self {
        ValueType::List { items: Box::new(items), min_len, max_len, unique_by: None }
    }

    /// Require `field` to be distinct across the items of a list of records.
    /// Has no effect on other types.
    pub fn unique_by(mut self, field: &str) -> Self {
        if let ValueType::List { unique_by, .. } = &mut self {
            *unique_by = Some(field.to_string());
        }
        self
    }

    /// Name of the declared tag.
    pub fn describe(&self) -> &'static str {
        match self {
            ValueType::Integer { .. } => "integer",
            ValueType::Float { .. } => "float",
            ValueType::Boolean => "boolean",
            ValueType::String { .. } => "string",
            ValueType::Record { .. } => "record",
            ValueType::List { .. } => "list",
        }
    }

    /// Check `value` and return it in canonical form.
    ///
    /// Integers are widened where a float is declared, at any depth.
    pub(crate) fn check(&self, value: ConfigValue, path: &str) -> Result<ConfigValue, Violation> {
        match (self, value) {
            (ValueType::Integer { min, max }, ConfigValue::Integer(v)) => {
                if let Some(min) = min.filter(|min| v < *min) {
                    return Err(range(path, format!("{v} is below minimum {min}")));
                }
                if let Some(max) = max.filter(|max| v > *max) {
                    return Err(range(path, format!("{v} is above maximum {max}")));
                }
                Ok(ConfigValue::Integer(v))
            }
            (ValueType::Float { min, max }, ConfigValue::Float(v)) => check_float(v, *min, *max, path),
            (ValueType::Float { min, max }, ConfigValue::Integer(v)) => {
                check_float(v as f64, *min, *max, path)
            }
            (ValueType::Boolean, ConfigValue::Boolean(b)) => Ok(ConfigValue::Boolean(b)),
            (ValueType::String { one_of, max_len }, ConfigValue::String(s)) => {
                if let Some(options) = one_of {
                    if !options.iter().any(|option| option == &s) {
                        return Err(range(
                            path,
                            format!("'{s}' is not one of [{}]", options.join(", ")),
                        ));
                    }
                }
                if let Some(max_len) = max_len {
                    let len = s.chars().count();
                    if len > *max_len {
                        return Err(range(
                            path,
                            format!("length {len} exceeds maximum {max_len}"),
                        ));
                    }
                }
                Ok(ConfigValue::String(s))
            }
            (ValueType::Record { fields }, ConfigValue::Record(mut given)) => {
                let mut checked = BTreeMap::new();
                for (name, field_type) in fields {
                    let field_path = format!("{path}.{name}");
                    let Some(field_value) = given.remove(name) else {
                        return Err(Violation::Type {
                            path: field_path,
                            expected: field_type.describe().to_string(),
                            found: "nothing".to_string(),
                        });
                    };
                    checked.insert(name.clone(), field_type.check(field_value, &field_path)?);
                }
                if let Some((extra, extra_value)) = given.into_iter().next() {
                    return Err(Violation::Type {
                        path: format!("{path}.{extra}"),
                        expected: "no such field".to_string(),
                        found: extra_value.kind_name().to_string(),
                    });
                }
                Ok(ConfigValue::Record(checked))
            }
            (
                ValueType::List {
                    items,
                    min_len,
                    max_len,
                    unique_by,
                },
                ConfigValue::List(given),
            ) => {
                let len = given.len();
                if let Some(min_len) = min_len.filter(|min_len| len < *min_len) {
                    return Err(range(path, format!("length {len} is below minimum {min_len}")));
                }
                if let Some(max_len) = max_len.filter(|max_len| len > *max_len) {
                    return Err(range(path, format!("length {len} exceeds maximum {max_len}")));
                }
                let checked = given
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| items.check(item, &format!("{path}[{index}]")))
                    .collect::<Result<Vec<_>, _>>()?;
                if let Some(field) = unique_by {
                    check_unique(&checked, field, path)?;
                }
                Ok(ConfigValue::List(checked))
            }
            (declared, other) => Err(Violation::Type {
                path: path.to_string(),
                expected: declared.describe().to_string(),
                found: other.kind_name().to_string(),
            }),
        }
    }
}

fn check_float(v: f64, min: Option<f64>, max: Option<f64>, path: &str) -> Result<ConfigValue, Violation> {
    if !v.is_finite() {
        return Err(range(path, format!("{v} is not a finite number")));
    }
    if let Some(min) = min.filter(|min| v < *min) {
        return Err(range(path, format!("{v} is below minimum {min}")));
    }
    if let Some(max) = max.filter(|max| v > *max) {
        return Err(range(path, format!("{v} is above maximum {max}")));
    }
    Ok(ConfigValue::Float(v))
}

/// First repeated value of `field` across record items, reported at the repeat.
fn check_unique(items: &[ConfigValue], field: &str, path: &str) -> Result<(), Violation> {
    let mut seen: Vec<&ConfigValue> = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Some(value) = item.as_record().and_then(|fields| fields.get(field)) else {
            continue;
        };
        if seen.contains(&value) {
            return Err(range(
                &format!("{path}[{index}].{field}"),
                format!("duplicate {field} {}", describe_value(value)),
            ));
        }
        seen.push(value);
    }
    Ok(())
}

fn describe_value(value: &ConfigValue) -> String {
    match value {
        ConfigValue::String(s) => format!("'{s}'"),
        other => serde_json::to_string(other).unwrap_or_else(|_| other.kind_name().to_string()),
    }
}

fn range(path: &str, detail: String) -> Violation {
    Violation::Range { path: path.to_string(), detail }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_type() -> ValueType {
        ValueType::record([
            ("name", ValueType::string()),
            ("lap_count", ValueType::integer_range(Some(1), None)),
            ("penalty", ValueType::float_range(Some(0.0), None)),
        ])
    }

    fn agent(laps: i64) -> ConfigValue {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), ConfigValue::from("agent0"));
        fields.insert("lap_count".to_string(), ConfigValue::from(laps));
        fields.insert("penalty".to_string(), ConfigValue::from(2i64));
        ConfigValue::Record(fields)
    }

    #[test]
    fn widens_integers_inside_records() {
        let checked = agent_type().check(agent(3), "agents.roster").unwrap();
        let record = checked.as_record().unwrap();
        assert_eq!(record["penalty"], ConfigValue::Float(2.0));
        assert_eq!(record["lap_count"], ConfigValue::Integer(3));
    }

    #[test]
    fn reports_nested_paths() {
        let roster = ValueType::list(agent_type());
        let err = roster
            .check(ConfigValue::List(vec![agent(2), agent(0)]), "agents.roster")
            .unwrap_err();
        match err {
            Violation::Range { path, .. } => assert_eq!(path, "agents.roster[1].lap_count"),
            other => panic!("unexpected violation {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_and_extra_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), ConfigValue::from("a"));
        let missing = agent_type().check(ConfigValue::Record(fields.clone()), "k.v");
        assert!(matches!(missing, Err(Violation::Type { ref found, .. }) if found == "nothing"));

        let mut extra = agent(1).as_record().cloned().unwrap();
        extra.insert("color".to_string(), ConfigValue::from("red"));
        let extra = agent_type().check(ConfigValue::Record(extra), "k.v");
        assert!(matches!(extra, Err(Violation::Type { ref path, .. }) if path == "k.v.color"));
    }

    #[test]
    fn choice_and_length_bounds() {
        let direction = ValueType::choice(&["ccw", "cw"]);
        assert!(direction.check(ConfigValue::from("cw"), "track.direction").is_ok());
        assert!(matches!(
            direction.check(ConfigValue::from("up"), "track.direction"),
            Err(Violation::Range { .. })
        ));

        let roster = ValueType::list_bounded(ValueType::integer(), Some(1), Some(2));
        assert!(matches!(
            roster.check(ConfigValue::List(vec![]), "a.b"),
            Err(Violation::Range { .. })
        ));
    }

    #[test]
    fn unique_field_rejects_repeats() {
        let roster = ValueType::list(agent_type()).unique_by("name");
        let err = roster
            .check(ConfigValue::List(vec![agent(1), agent(2)]), "agents.roster")
            .unwrap_err();
        match err {
            Violation::Range { path, detail } => {
                assert_eq!(path, "agents.roster[1].name");
                assert!(detail.contains("'agent0'"), "{detail}");
            }
            other => panic!("unexpected violation {other:?}"),
        }

        let mut renamed = agent(2).as_record().cloned().unwrap();
        renamed.insert("name".to_string(), ConfigValue::from("agent1"));
        let distinct = ConfigValue::List(vec![agent(1), ConfigValue::Record(renamed)]);
        assert!(roster.check(distinct, "agents.roster").is_ok());
    }

    #[test]
    fn non_finite_floats_are_out_of_range() {
        let result = ValueType::float().check(ConfigValue::Float(f64::NAN), "speed.max");
        assert!(matches!(result, Err(Violation::Range { .. })));
    }

    #[test]
    fn untagged_json_keeps_numeric_tags() {
        let value: ConfigValue = serde_json::from_str("[1, 1.0, true, \"x\", {\"a\": 2}]").unwrap();
        let items = value.as_list().unwrap();
        assert_eq!(items[0], ConfigValue::Integer(1));
        assert_eq!(items[1], ConfigValue::Float(1.0));
        assert_eq!(items[2], ConfigValue::Boolean(true));
        assert_eq!(serde_json::to_string(&ConfigValue::Float(12.0)).unwrap(), "12.0");
        assert!(serde_json::to_string(&ConfigValue::Float(f64::INFINITY)).is_err());
    }

    #[test]
    fn value_type_reads_from_toml() {
        #[derive(Deserialize)]
        struct Holder {
            kind: ValueType,
        }
        let holder: Holder =
            toml::from_str("kind = { type = \"float\", min = 0.0, max = 10.0 }").unwrap();
        assert_eq!(holder.kind, ValueType::float_range(Some(0.0), Some(10.0)));
    }
}
