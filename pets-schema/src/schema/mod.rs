//! Declarations for the `pets_search` database.
//!
//! Collection names, field names, field kinds, enum sets, required sets and
//! the twelve index definitions are a compatibility contract with the
//! application. Change them only through a new migration.

mod drift;
mod validator;

use crate::errors::SchemaError;
use crate::model::{EventType, ListingStatus, ListingType};
use crate::types::{BsonKind, CollectionDescriptor, FieldDescriptor, IndexDescriptor};

pub use drift::LiveState;
pub use validator::validate_document;

pub const DATABASE_NAME: &str = "pets_search";

pub const USERS: &str = "users";
pub const LISTINGS: &str = "listings";
pub const EVENTS: &str = "events";

pub fn users() -> CollectionDescriptor {
    CollectionDescriptor::new(
        USERS,
        vec![
            FieldDescriptor::new("email", BsonKind::String, "User email - required").required(),
            FieldDescriptor::new("phone", BsonKind::String, "User phone number"),
            FieldDescriptor::new("name", BsonKind::String, "User display name"),
            FieldDescriptor::new("created_at", BsonKind::Date, "Creation timestamp - required").required(),
            FieldDescriptor::new("updated_at", BsonKind::Date, "Last update timestamp"),
        ],
    )
}

pub fn listings() -> CollectionDescriptor {
    CollectionDescriptor::new(
        LISTINGS,
        vec![
            FieldDescriptor::new("user_id", BsonKind::ObjectId, "Reference to user - required").required(),
            FieldDescriptor::new("type", BsonKind::String, "Listing type - required")
                .required()
                .one_of(ListingType::values()),
            FieldDescriptor::new("title", BsonKind::String, "Listing title - required").required(),
            FieldDescriptor::new("description", BsonKind::String, "Listing description"),
            FieldDescriptor::new("city", BsonKind::String, "City where pet was lost/found"),
            FieldDescriptor::new("location", BsonKind::String, "Specific location details"),
            FieldDescriptor::new("contact_phone", BsonKind::String, "Contact phone number"),
            FieldDescriptor::new("contact_tg", BsonKind::String, "Telegram contact"),
            FieldDescriptor::new("status", BsonKind::String, "Listing status - required")
                .required()
                .one_of(ListingStatus::values()),
            FieldDescriptor::new("slug", BsonKind::String, "URL slug for public page"),
            FieldDescriptor::new("images", BsonKind::Array, "Array of image URLs"),
            FieldDescriptor::new("created_at", BsonKind::Date, "Creation timestamp - required").required(),
            FieldDescriptor::new("updated_at", BsonKind::Date, "Last update timestamp"),
        ],
    )
}

pub fn events() -> CollectionDescriptor {
    CollectionDescriptor::new(
        EVENTS,
        vec![
            FieldDescriptor::new("user_id", BsonKind::ObjectId, "User who triggered the event (optional)"),
            FieldDescriptor::new("listing_id", BsonKind::ObjectId, "Related listing - required").required(),
            FieldDescriptor::new("type", BsonKind::String, "Event type - required")
                .required()
                .one_of(EventType::values()),
            FieldDescriptor::new("payload", BsonKind::Object, "Additional event data"),
            FieldDescriptor::new("ip_address", BsonKind::String, "Client IP address"),
            FieldDescriptor::new("user_agent", BsonKind::String, "Client user agent"),
            FieldDescriptor::new("created_at", BsonKind::Date, "Event timestamp - required").required(),
        ],
    )
}

/// All declared collections in creation order.
pub fn collections() -> Vec<CollectionDescriptor> {
    vec![users(), listings(), events()]
}

/// Looks up a declared collection by name.
pub fn collection(name: &str) -> Result<CollectionDescriptor, SchemaError> {
    collections()
        .into_iter()
        .find(|collection| collection.name == name)
        .ok_or_else(|| SchemaError::UnknownCollection { name: name.to_string() })
}

/// All declared indexes in creation order.
pub fn indexes() -> Vec<IndexDescriptor> {
    vec![
        IndexDescriptor::ascending(USERS, "email").unique(),
        IndexDescriptor::ascending(USERS, "phone"),
        IndexDescriptor::ascending(LISTINGS, "user_id"),
        IndexDescriptor::ascending(LISTINGS, "type"),
        IndexDescriptor::ascending(LISTINGS, "status"),
        IndexDescriptor::ascending(LISTINGS, "slug").unique().sparse(),
        IndexDescriptor::ascending(LISTINGS, "city"),
        IndexDescriptor::descending(LISTINGS, "created_at"),
        IndexDescriptor::ascending(EVENTS, "listing_id"),
        IndexDescriptor::ascending(EVENTS, "type"),
        IndexDescriptor::descending(EVENTS, "created_at"),
        IndexDescriptor::ascending(EVENTS, "user_id"),
    ]
}

/// Indexes declared on one collection.
pub fn indexes_for(collection: &str) -> Vec<IndexDescriptor> {
    indexes()
        .into_iter()
        .filter(|index| index.collection == collection)
        .collect()
}
