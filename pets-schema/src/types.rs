use serde::Serialize;

/// BSON type names accepted by the `bsonType` keyword of `$jsonSchema`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BsonKind {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "objectId")]
    ObjectId,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "object")]
    Object,
    #[serde(rename = "array")]
    Array,
}

impl BsonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BsonKind::String => "string",
            BsonKind::ObjectId => "objectId",
            BsonKind::Date => "date",
            BsonKind::Object => "object",
            BsonKind::Array => "array",
        }
    }
}

impl std::fmt::Display for BsonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural description of one document field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: BsonKind,
    pub required: bool,
    /// Allowed values when the field is a string enumeration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    pub description: String,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: BsonKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            allowed: None,
            description: description.into(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// A collection and the validator rules attached to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl CollectionDescriptor {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Names of required fields in declaration order.
    pub fn required_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name.as_str())
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Key value used in an index specification.
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "↑",
            SortDirection::Descending => "↓",
        }
    }
}

/// Single-field secondary index on a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDescriptor {
    pub collection: String,
    pub field: String,
    pub direction: SortDirection,
    pub unique: bool,
    pub sparse: bool,
}

impl IndexDescriptor {
    pub fn ascending(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
            direction: SortDirection::Ascending,
            unique: false,
            sparse: false,
        }
    }

    pub fn descending(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            direction: SortDirection::Descending,
            ..Self::ascending(collection, field)
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }

    /// Index name following the server default of `<field>_<direction>`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.field, self.direction.as_i32())
    }

    /// Human-readable option list, e.g. `unique, sparse`.
    pub fn options_label(&self) -> String {
        let mut options = Vec::new();
        if self.unique {
            options.push("unique");
        }
        if self.sparse {
            options.push("sparse");
        }
        if options.is_empty() { "—".to_string() } else { options.join(", ") }
    }
}
