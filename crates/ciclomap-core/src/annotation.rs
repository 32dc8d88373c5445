//! Annotation records and their wire shape in the document store.
//!
//! A persisted document looks like:
//!
//! ```json
//! {
//!   "type": "buraco_via",
//!   "notes": "deep hole",
//!   "location": { "lat": -26.9935, "lng": -48.6346 },
//!   "userId": "Xk2s9dLq",
//!   "createdAt": "2025-05-01T12:00:00Z"
//! }
//! ```
//!
//! The id is the document key and never appears as a field.

use crate::store::RawDocument;
use crate::user_id::UserId;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Document has an empty id")]
    MissingId,

    #[error("Malformed document {id}: {source}")]
    Schema {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid location: ({latitude}, {longitude})")]
    InvalidLocation { latitude: f64, longitude: f64 },
}

pub type Result<T> = std::result::Result<T, RecordError>;

/// Kind of point a user can drop on the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Category {
    Pothole,
    DangerousSpot,
    UnlitStretch,
    RepairShop,
    /// Any key this client does not recognize, or none at all.
    #[default]
    Unknown,
}

impl Category {
    /// Selectable categories, in picker order.
    pub const ALL: [Category; 4] = [
        Category::Pothole,
        Category::DangerousSpot,
        Category::UnlitStretch,
        Category::RepairShop,
    ];

    /// Key stored in the document's `type` field.
    pub fn as_key(&self) -> &'static str {
        match self {
            Category::Pothole => "buraco_via",
            Category::DangerousSpot => "ponto_perigoso",
            Category::UnlitStretch => "sem_iluminacao",
            Category::RepairShop => "oficina",
            Category::Unknown => "desconhecido",
        }
    }

    /// Decode a stored key. Never fails: unrecognized keys become `Unknown`.
    pub fn from_key(key: &str) -> Self {
        match key {
            "buraco_via" => Category::Pothole,
            "ponto_perigoso" => Category::DangerousSpot,
            "sem_iluminacao" => Category::UnlitStretch,
            "oficina" => Category::RepairShop,
            _ => Category::Unknown,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

impl Serialize for Category {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.as_key())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let key = String::deserialize(d)?;
        Ok(Category::from_key(&key))
    }
}

/// A validated geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireGeoPoint", into = "WireGeoPoint")]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(RecordError::InvalidLocation {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

#[derive(Serialize, Deserialize)]
struct WireGeoPoint {
    lat: f64,
    lng: f64,
}

impl TryFrom<WireGeoPoint> for GeoPoint {
    type Error = RecordError;

    fn try_from(wire: WireGeoPoint) -> Result<Self> {
        GeoPoint::new(wire.lat, wire.lng)
    }
}

impl From<GeoPoint> for WireGeoPoint {
    fn from(point: GeoPoint) -> Self {
        Self {
            lat: point.latitude,
            lng: point.longitude,
        }
    }
}

/// Store-assigned document key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(String);

impl AnnotationId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(RecordError::MissingId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AnnotationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted document shape. Field names are the wire contract.
///
/// Reading is lenient: absent fields take defaults, and a blank `userId`
/// reads as no owner. Only fields of the wrong type, or an out-of-range
/// location, make a document malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationDocument {
    #[serde(rename = "type", default)]
    pub category: Category,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(
        default,
        deserialize_with = "blank_owner_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<UserId>,
    /// Undated documents read as created now.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn blank_owner_as_none<'de, D>(d: D) -> std::result::Result<Option<UserId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.and_then(|id| UserId::new(id).ok()))
}

/// An annotation built on this client that the store has not seen yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnnotation {
    pub category: Category,
    pub notes: String,
    pub location: Option<GeoPoint>,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl NewAnnotation {
    pub fn to_document(&self) -> AnnotationDocument {
        AnnotationDocument {
            category: self.category,
            notes: self.notes.clone(),
            location: self.location,
            user_id: Some(self.owner_id.clone()),
            created_at: self.created_at,
        }
    }
}

/// A persisted annotation as seen in the shared collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub category: Category,
    /// Empty means no notes.
    pub notes: String,
    /// `None` means the annotation is not rendered on the map.
    pub location: Option<GeoPoint>,
    /// `None` for legacy documents without an owner. Nobody may edit those.
    pub owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    pub fn from_document(id: AnnotationId, doc: AnnotationDocument) -> Self {
        Self {
            id,
            category: doc.category,
            notes: doc.notes,
            location: doc.location,
            owner_id: doc.user_id,
            created_at: doc.created_at,
        }
    }

    /// Parse a raw store document. The key becomes the id.
    pub fn from_raw(raw: &RawDocument) -> Result<Self> {
        let id = AnnotationId::new(raw.id.clone())?;
        let doc: AnnotationDocument =
            serde_json::from_value(raw.data.clone()).map_err(|source| RecordError::Schema {
                id: raw.id.clone(),
                source,
            })?;
        Ok(Self::from_document(id, doc))
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.owner_id.as_ref() == Some(user)
    }
}
