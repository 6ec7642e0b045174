//! Typed documents stored in the `pets_search` database.
//!
//! Enumerated fields are Rust enums that serialize to the exact strings the
//! collection validators accept. Optional fields are omitted rather than
//! written as `null`, which keeps documents without a slug out of the sparse
//! unique index.

use std::fmt;
use std::str::FromStr;

use mongodb::bson::{DateTime, Document, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// Error returned when parsing an enumerated field from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} '{value}', expected one of {allowed:?}")]
pub struct ParseEnumError {
    pub field: &'static str,
    pub value: String,
    pub allowed: Vec<&'static str>,
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Persisted string values in declaration order.
            pub fn values() -> Vec<&'static str> {
                Self::ALL.iter().map(|value| value.as_str()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        field: $field,
                        value: other.to_string(),
                        allowed: Self::values(),
                    }),
                }
            }
        }
    };
}

string_enum! {
    /// What a listing announces.
    ListingType, "listing type" {
        Lost => "lost",
        Found => "found",
        Adopt => "adopt",
    }
}

string_enum! {
    /// Publication state of a listing.
    ListingStatus, "listing status" {
        Draft => "draft",
        Active => "active",
        Archived => "archived",
    }
}

string_enum! {
    /// Kind of interaction recorded against a listing.
    EventType, "event type" {
        View => "view",
        QrScan => "qr_scan",
        ContactClick => "contact_click",
        PhoneClick => "phone_click",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            email: email.into(),
            phone: None,
            name: None,
            created_at: DateTime::now(),
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    #[serde(rename = "type")]
    pub kind: ListingType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_tg: Option<String>,
    pub status: ListingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Image URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    pub created_at: DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Listing {
    pub fn new(user_id: ObjectId, kind: ListingType, title: impl Into<String>, status: ListingStatus) -> Self {
        Self {
            id: ObjectId::new(),
            user_id,
            kind,
            title: title.into(),
            description: None,
            city: None,
            location: None,
            contact_phone: None,
            contact_tg: None,
            status,
            slug: None,
            images: Vec::new(),
            created_at: DateTime::now(),
            updated_at: None,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Absent for anonymous visitors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ObjectId>,
    pub listing_id: ObjectId,
    #[serde(rename = "type")]
    pub kind: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub created_at: DateTime,
}

impl Event {
    pub fn new(listing_id: ObjectId, kind: EventType) -> Self {
        Self {
            id: ObjectId::new(),
            user_id: None,
            listing_id,
            kind,
            payload: None,
            ip_address: None,
            user_agent: None,
            created_at: DateTime::now(),
        }
    }
}
