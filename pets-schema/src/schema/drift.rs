//! Comparison of live collections and indexes with their declarations.

use mongodb::IndexModel;
use mongodb::bson::{Bson, Document};
use serde::Serialize;

use crate::types::{CollectionDescriptor, IndexDescriptor};

/// How a declared collection or index compares with the live database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum LiveState {
    Missing,
    Matches,
    /// Present under the declared name with different options.
    Differs(String),
}

impl LiveState {
    pub fn is_missing(&self) -> bool {
        matches!(self, LiveState::Missing)
    }

    pub fn matches(&self) -> bool {
        matches!(self, LiveState::Matches)
    }
}

impl CollectionDescriptor {
    /// Compares the validator reported by the server with the declared one.
    pub fn validator_state(&self, live: Option<&Document>) -> LiveState {
        match live {
            None => LiveState::Differs("collection has no validator".to_string()),
            Some(live) if *live == self.validator() => LiveState::Matches,
            Some(_) => LiveState::Differs("validator differs from the declared $jsonSchema".to_string()),
        }
    }
}

impl IndexDescriptor {
    /// Key specification, e.g. `{ "created_at": -1 }`.
    pub fn keys(&self) -> Document {
        let mut keys = Document::new();
        keys.insert(self.field.clone(), self.direction.as_i32());
        keys
    }

    /// Finds this index by name among `live` and compares keys and options.
    pub fn state_in(&self, live: &[IndexModel]) -> LiveState {
        let name = self.name();
        let Some(existing) = live.iter().find(|model| index_name(model) == Some(name.as_str())) else {
            return LiveState::Missing;
        };

        let mut differences = Vec::new();
        let declared_keys = self.keys();
        if !same_keys(&existing.keys, &declared_keys) {
            differences.push(format!("keys are {}, declared {declared_keys}", existing.keys));
        }

        let options = existing.options.as_ref();
        let unique = options.and_then(|o| o.unique).unwrap_or(false);
        if unique != self.unique {
            differences.push(format!("unique is {unique}, declared {}", self.unique));
        }
        let sparse = options.and_then(|o| o.sparse).unwrap_or(false);
        if sparse != self.sparse {
            differences.push(format!("sparse is {sparse}, declared {}", self.sparse));
        }

        if differences.is_empty() {
            LiveState::Matches
        } else {
            LiveState::Differs(differences.join("; "))
        }
    }
}

fn index_name(model: &IndexModel) -> Option<&str> {
    model.options.as_ref().and_then(|options| options.name.as_deref())
}

/// Field order and directions must agree. Servers report directions as
/// int32, int64 or double depending on how the index was created.
fn same_keys(live: &Document, declared: &Document) -> bool {
    live.len() == declared.len()
        && live
            .iter()
            .zip(declared.iter())
            .all(|((live_field, live_dir), (field, dir))| live_field == field && direction(live_dir) == direction(dir))
}

fn direction(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) => Some(*v as i64),
        _ => None,
    }
}
