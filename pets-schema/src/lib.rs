//! Schema bootstrap for the `pets_search` MongoDB database.
//!
//! The library declares the `users`, `listings` and `events` collections with
//! their `$jsonSchema` validators and secondary indexes, groups the
//! declarations into versioned migrations, and applies them through a runner
//! that records each applied migration in a history collection. Typed
//! document models and a local validator let application code check
//! documents against the same rules the server enforces.

pub mod config;
pub mod errors;
pub mod executor;
pub mod migrations;
pub mod model;
pub mod schema;
pub mod types;

pub use config::Settings;
pub use errors::{SchemaError, ValidationError, ValidationIssue, is_document_validation_failure, is_duplicate_key};
pub use executor::{DeployReport, MigrationRunner, MigrationStatus};
pub use migrations::{Migration, Step};
pub use model::{Event, EventType, Listing, ListingStatus, ListingType, User};
pub use types::{BsonKind, CollectionDescriptor, FieldDescriptor, IndexDescriptor, SortDirection};

/// Message printed once every declaration has succeeded.
pub const COMPLETION_MESSAGE: &str = "MongoDB initialization completed successfully!";
