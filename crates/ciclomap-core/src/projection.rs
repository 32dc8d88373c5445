//! View-ready derivations of the annotation list.
//!
//! Everything here is a pure function of the controller's current list and
//! is recomputed whenever a `SnapshotApplied` event arrives.

use crate::annotation::{Annotation, AnnotationId, Category, GeoPoint};
use crate::user_id::UserId;

use serde::Serialize;

/// Label shown for categories this client does not recognize.
pub const UNKNOWN_LABEL: &str = "Ponto Desconhecido";

/// Shown in the detail dialog when an annotation has no notes.
pub const NO_NOTES_TEXT: &str = "Nenhuma observação adicionada.";

/// Marker icon resource for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlyphId {
    Pothole,
    Danger,
    Light,
    RepairShop,
    Default,
}

impl GlyphId {
    /// Drawable resource name.
    pub fn resource_name(&self) -> &'static str {
        match self {
            GlyphId::Pothole => "ic_marker_buraco",
            GlyphId::Danger => "ic_marker_perigo",
            GlyphId::Light => "ic_marker_luz",
            GlyphId::RepairShop => "ic_marker_oficina",
            GlyphId::Default => "ic_marker_default",
        }
    }
}

impl Serialize for GlyphId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.resource_name())
    }
}

pub fn display_label(category: Category) -> &'static str {
    match category {
        Category::Pothole => "Buraco na via",
        Category::DangerousSpot => "Ponto Perigoso",
        Category::UnlitStretch => "Trecho sem Iluminação",
        Category::RepairShop => "Oficina/Bicicletaria",
        Category::Unknown => UNKNOWN_LABEL,
    }
}

pub fn marker_glyph(category: Category) -> GlyphId {
    match category {
        Category::Pothole => GlyphId::Pothole,
        Category::DangerousSpot => GlyphId::Danger,
        Category::UnlitStretch => GlyphId::Light,
        Category::RepairShop => GlyphId::RepairShop,
        Category::Unknown => GlyphId::Default,
    }
}

pub fn annotations_owned_by<'a>(annotations: &'a [Annotation], user: &UserId) -> Vec<&'a Annotation> {
    annotations.iter().filter(|a| a.is_owned_by(user)).collect()
}

/// Whether the session may edit or delete `annotation`.
pub fn is_owner(annotation: &Annotation, current: Option<&UserId>) -> bool {
    current.is_some_and(|user| annotation.is_owned_by(user))
}

/// Notes to display, or `None` when blank.
pub fn notes_text(annotation: &Annotation) -> Option<&str> {
    let notes = annotation.notes.trim();
    (!notes.is_empty()).then_some(annotation.notes.as_str())
}

/// Creation date as `dd/MM/yyyy` (UTC).
pub fn created_on_label(annotation: &Annotation) -> String {
    annotation.created_at.format("%d/%m/%Y").to_string()
}

/// One rendered marker on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub id: AnnotationId,
    pub latitude: f64,
    pub longitude: f64,
    pub glyph: GlyphId,
    pub label: &'static str,
}

/// Markers for every annotation that has a location.
pub fn map_markers(annotations: &[Annotation]) -> Vec<MapMarker> {
    annotations
        .iter()
        .filter_map(|a| {
            let location: GeoPoint = a.location?;
            Some(MapMarker {
                id: a.id.clone(),
                latitude: location.latitude(),
                longitude: location.longitude(),
                glyph: marker_glyph(a.category),
                label: display_label(a.category),
            })
        })
        .collect()
}

/// A row of the profile screen's "my points" list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileEntry {
    pub id: AnnotationId,
    pub label: &'static str,
    pub notes: Option<String>,
    pub created_on: String,
}

/// The user's own annotations, newest first.
pub fn profile_view(annotations: &[Annotation], user: &UserId) -> Vec<ProfileEntry> {
    let mut owned = annotations_owned_by(annotations, user);
    owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    owned
        .into_iter()
        .map(|a| ProfileEntry {
            id: a.id.clone(),
            label: display_label(a.category),
            notes: notes_text(a).map(str::to_string),
            created_on: created_on_label(a),
        })
        .collect()
}
