use mongodb::bson::{Bson, Document, doc};

use crate::errors::{SchemaError, ValidationError, ValidationIssue, ValidationResult};
use crate::types::{BsonKind, CollectionDescriptor, FieldDescriptor};

impl CollectionDescriptor {
    /// Renders the `$jsonSchema` validator attached to the collection.
    pub fn validator(&self) -> Document {
        let mut properties = Document::new();
        for field in &self.fields {
            properties.insert(field.name.clone(), field.json_schema());
        }

        doc! {
            "$jsonSchema": {
                "bsonType": "object",
                "required": self.required_fields(),
                "properties": properties,
            }
        }
    }

    /// Checks a document against this declaration the way the server does.
    ///
    /// Unknown fields are accepted. Every problem is collected instead of
    /// stopping at the first one.
    pub fn validate(&self, document: &Document) -> ValidationResult<()> {
        let mut issues = Vec::new();

        for field in &self.fields {
            match document.get(&field.name) {
                None if field.required => issues.push(ValidationIssue::new(
                    &field.name,
                    "required",
                    format!("missing required field '{}'", field.name),
                )),
                None => {}
                Some(value) => field.check(value, &mut issues),
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(issues))
        }
    }
}

impl FieldDescriptor {
    fn json_schema(&self) -> Document {
        let mut schema = doc! { "bsonType": self.kind.as_str() };
        if let Some(allowed) = &self.allowed {
            schema.insert("enum", allowed.clone());
        }
        schema.insert("description", self.description.clone());
        schema
    }

    fn check(&self, value: &Bson, issues: &mut Vec<ValidationIssue>) {
        if !matches_kind(self.kind, value) {
            issues.push(ValidationIssue::new(
                &self.name,
                "bson_type",
                format!("expected {} but found {:?}", self.kind, value.element_type()),
            ));
            return;
        }

        if let Some(allowed) = &self.allowed
            && let Bson::String(text) = value
            && !allowed.iter().any(|candidate| candidate == text)
        {
            issues.push(ValidationIssue::new(
                &self.name,
                "enum",
                format!("'{text}' is not one of {allowed:?}"),
            ));
        }
    }
}

fn matches_kind(kind: BsonKind, value: &Bson) -> bool {
    matches!(
        (kind, value),
        (BsonKind::String, Bson::String(_))
            | (BsonKind::ObjectId, Bson::ObjectId(_))
            | (BsonKind::Date, Bson::DateTime(_))
            | (BsonKind::Object, Bson::Document(_))
            | (BsonKind::Array, Bson::Array(_))
    )
}

/// Validates a document against the declared collection named `collection`.
pub fn validate_document(collection: &str, document: &Document) -> Result<(), SchemaError> {
    let descriptor = super::collection(collection)?;
    descriptor.validate(document)?;
    Ok(())
}
