//! Commands the local client understands, and how their results render.

use crate::config::MapConfig;

use ciclomap_core::projection::{self, MapMarker, ProfileEntry};
use ciclomap_core::{Annotation, Category, Operation, SyncEvent, UserId};
use clap::Subcommand;
use serde::Serialize;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show every annotation in the shared collection
    List,
    /// Show annotations created by this client
    Mine,
    /// Show the map camera and its markers
    Map,
    /// Show the categories a point can have
    Categories,
    /// Drop a new point on the map
    Add {
        /// Category key (buraco_via, ponto_perigoso, sem_iluminacao, oficina)
        #[arg(short, long, value_parser = parse_category)]
        category: Category,
        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Free-text notes
        #[arg(short, long, default_value = "")]
        notes: String,
    },
    /// Replace the notes of one of your points
    Edit {
        #[arg(long)]
        id: String,
        #[arg(short, long)]
        notes: String,
    },
    /// Delete one of your points
    Delete {
        #[arg(long)]
        id: String,
    },
}

/// Parse a category key, refusing keys this client cannot create.
pub fn parse_category(key: &str) -> Result<Category, String> {
    match Category::from_key(key) {
        Category::Unknown => {
            let valid: Vec<_> = Category::ALL.iter().map(|c| c.as_key()).collect();
            Err(format!("unknown category '{}' (expected one of: {})", key, valid.join(", ")))
        }
        category => Ok(category),
    }
}

/// Transient message for an event, as the app would show it.
pub fn notice_for(event: &SyncEvent) -> Option<String> {
    let text = match event {
        SyncEvent::AnnotationCreated { .. } => "Ponto adicionado!".to_string(),
        SyncEvent::NotesUpdated { .. } => "Ponto atualizado!".to_string(),
        SyncEvent::AnnotationDeleted { .. } => "Ponto excluído!".to_string(),
        SyncEvent::MutationFailed { operation, .. } => match operation {
            Operation::Create => "Erro ao guardar o ponto.".to_string(),
            Operation::UpdateNotes => "Erro ao atualizar o ponto.".to_string(),
            Operation::Delete => "Erro ao excluir o ponto.".to_string(),
        },
        SyncEvent::MutationRejected { reason, .. } => reason.clone(),
        SyncEvent::SnapshotApplied { .. } | SyncEvent::SnapshotFailed { .. } => return None,
    };
    Some(text)
}

/// One row of the `list` output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    #[serde(flatten)]
    pub marker: MapMarker,
    pub notes: Option<String>,
    pub owned: bool,
}

pub fn list_entries(annotations: &[Annotation], current: Option<&UserId>) -> Vec<ListEntry> {
    let mut sorted: Vec<&Annotation> = annotations.iter().collect();
    sorted.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    sorted
        .into_iter()
        .filter_map(|a| {
            let marker = projection::map_markers(std::slice::from_ref(a)).pop()?;
            Some(ListEntry {
                marker,
                notes: projection::notes_text(a).map(str::to_string),
                owned: projection::is_owner(a, current),
            })
        })
        .collect()
}

pub fn render_list(entries: &[ListEntry]) -> String {
    if entries.is_empty() {
        return "Nenhum ponto no mapa.".to_string();
    }

    entries
        .iter()
        .map(|e| {
            format!(
                "{}{}  {:<22}  {:>9.5}, {:>10.5}  {}",
                if e.owned { "*" } else { " " },
                e.marker.id,
                e.marker.label,
                e.marker.latitude,
                e.marker.longitude,
                e.notes.as_deref().unwrap_or(projection::NO_NOTES_TEXT),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// What the map screen shows: the initial camera and one marker per
/// located annotation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom: f32,
    pub markers: Vec<MapMarker>,
}

pub fn map_view(camera: &MapConfig, annotations: &[Annotation]) -> MapView {
    MapView {
        center_lat: camera.center_lat,
        center_lng: camera.center_lng,
        zoom: camera.zoom,
        markers: projection::map_markers(annotations),
    }
}

pub fn render_map(view: &MapView) -> String {
    let mut lines = vec![format!(
        "Centro: {:.4}, {:.4} (zoom {})",
        view.center_lat, view.center_lng, view.zoom
    )];
    lines.extend(view.markers.iter().map(|m| {
        format!(
            "{}  {}  {:.5}, {:.5}  {}",
            m.id,
            m.glyph.resource_name(),
            m.latitude,
            m.longitude,
            m.label
        )
    }));
    lines.join("\n")
}

pub fn render_profile(user: Option<&UserId>, entries: &[ProfileEntry]) -> String {
    let mut out = format!(
        "Seu ID de Utilizador: {}\nMeus Pontos Adicionados\n",
        user.map(UserId::as_str).unwrap_or("A carregar...")
    );
    if entries.is_empty() {
        out.push_str("Você ainda não adicionou nenhum ponto.");
        return out;
    }

    let rows: Vec<String> = entries
        .iter()
        .map(|e| {
            let mut row = format!("{}  {}  Adicionado em: {}", e.id, e.label, e.created_on);
            if let Some(notes) = &e.notes {
                row.push_str("\n    ");
                row.push_str(notes);
            }
            row
        })
        .collect();
    out.push_str(&rows.join("\n"));
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryEntry {
    pub key: &'static str,
    pub label: &'static str,
    pub glyph: projection::GlyphId,
}

pub fn category_entries() -> Vec<CategoryEntry> {
    Category::ALL
        .iter()
        .map(|c| CategoryEntry {
            key: c.as_key(),
            label: projection::display_label(*c),
            glyph: projection::marker_glyph(*c),
        })
        .collect()
}

pub fn render_categories(entries: &[CategoryEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{:<16} {}", e.key, e.label))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category() {
        assert_eq!(parse_category("oficina"), Ok(Category::RepairShop));
        let err = parse_category("radar").unwrap_err();
        assert!(err.contains("buraco_via"));
    }

    #[test]
    fn test_notices_match_outcomes() {
        let failed = SyncEvent::MutationFailed {
            operation: Operation::Delete,
            id: Some("x".into()),
            error: "offline".into(),
            timestamp: 0,
        };
        assert_eq!(notice_for(&failed).as_deref(), Some("Erro ao excluir o ponto."));

        let applied = SyncEvent::SnapshotApplied {
            count: 1,
            skipped: 0,
            timestamp: 0,
        };
        assert_eq!(notice_for(&applied), None);
    }

    #[test]
    fn test_map_view_uses_camera() {
        let camera = MapConfig::default();
        let view = map_view(&camera, &[]);

        assert_eq!(view.zoom, 14.0);
        assert!(view.markers.is_empty());
        assert_eq!(render_map(&view), "Centro: -26.9935, -48.6346 (zoom 14)");
    }

    #[test]
    fn test_empty_profile() {
        let out = render_profile(None, &[]);
        assert!(out.contains("A carregar..."));
        assert!(out.ends_with("Você ainda não adicionou nenhum ponto."));
    }
}
