use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Declared type of a field. Two fields can only be synchronized if their
/// declared types are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Boolean,
    Integer,
    Decimal,
    String,
    StringLong,
    Email,
    Timestamp,
    Language,
    Uuid,
    /// Reference to another entity, stored as its id
    EntityReference,
}

impl FieldType {
    /// Whether a json value can be stored in a field of this type. `null`
    /// (an empty field) is always accepted.
    pub fn accepts(
        self,
        value: &Value,
    ) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Integer | Self::Timestamp | Self::EntityReference, Value::Number(n)) => {
                n.is_i64() || n.is_u64()
            }
            (Self::Decimal, Value::Number(_)) => true,
            (
                Self::String | Self::StringLong | Self::Email | Self::Language | Self::Uuid,
                Value::String(_),
            ) => true,
            _ => false,
        }
    }
}

/// A single field of an entity schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// `None` for fixed system (base) fields; `Some(bundle)` for fields that
    /// were attached to a bundle, i.e. site-specific custom fields.
    #[serde(default)]
    pub bundle: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub read_only: bool,
}

impl FieldDefinition {
    pub fn base(
        name: &str,
        field_type: FieldType,
    ) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            bundle: None,
            required: false,
            read_only: false,
        }
    }

    pub fn custom(
        name: &str,
        field_type: FieldType,
        bundle: &str,
    ) -> Self {
        Self {
            bundle: Some(bundle.to_string()),
            ..Self::base(name, field_type)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn is_custom(&self) -> bool { self.bundle.is_some() }
}

/// Ordered list of field definitions. Lookups are linear; schemas are a
/// handful of fields long.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSchema(Vec<FieldDefinition>);

impl FieldSchema {
    pub fn new(fields: Vec<FieldDefinition>) -> Self { Self(fields) }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&FieldDefinition> {
        self.0.iter().find(|f| f.name == name)
    }

    pub fn custom_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.0.iter().filter(|f| f.is_custom())
    }
}

impl FromIterator<FieldDefinition> for FieldSchema {
    fn from_iter<T: IntoIterator<Item = FieldDefinition>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Names of the fields that exist on both schemas with the same name and the
/// same declared type. Only custom (bundle) fields of the voter schema are
/// considered; system fields such as `mail` or `status` are never shared.
///
/// Order follows the voter schema.
pub fn compute_shared_field_names(
    user_schema: &FieldSchema,
    voter_schema: &FieldSchema,
) -> Vec<String> {
    voter_schema
        .custom_fields()
        .filter(|f| {
            user_schema
                .get(&f.name)
                .is_some_and(|u| u.field_type == f.field_type)
        })
        .map(|f| f.name.clone())
        .collect()
}
