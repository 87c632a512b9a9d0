use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

use crate::elements::FontWeight;

/// Family name of the faces compiled into the binary.
pub const BUNDLED_FAMILY: &str = "DejaVu Sans";

static BUNDLED_REGULAR: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
static BUNDLED_BOLD: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// Shared, read-only font database used by every render. Always holds the
/// bundled faces, so text renders even on hosts without installed fonts.
#[derive(Clone)]
pub struct FontBook {
    db: Arc<fontdb::Database>,
    custom_family: Option<String>,
}

impl FontBook {
    pub fn system() -> Self {
        let mut db = bundled_database();
        db.load_system_fonts();
        debug!("loaded {} font face(s)", db.faces().count());
        Self {
            db: Arc::new(db),
            custom_family: None,
        }
    }

    /// Only the bundled faces. Renders are identical on every host.
    pub fn bundled() -> Self {
        Self {
            db: Arc::new(bundled_database()),
            custom_family: None,
        }
    }

    /// System fonts plus an optional font file that becomes the first fallback.
    pub fn load(font_path: Option<&Path>) -> Result<Self> {
        let Some(path) = font_path else {
            return Ok(Self::system());
        };
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font: {}", path.display()))?;
        let family = family_from_data(&data)
            .ok_or_else(|| anyhow!("failed to parse font: {}", path.display()))?;

        let mut db = bundled_database();
        db.load_system_fonts();
        db.load_font_data(data);
        debug!("loaded custom font family '{}'", family);
        Ok(Self {
            db: Arc::new(db),
            custom_family: Some(family),
        })
    }

    pub fn database(&self) -> Arc<fontdb::Database> {
        Arc::clone(&self.db)
    }

    /// Picks a loaded family for `requested`: the family itself, the custom
    /// font, generic sans-serif, then the bundled face.
    pub fn resolve(&self, requested: &str, weight: FontWeight) -> String {
        let requested = requested.trim();
        if !requested.is_empty() && self.query(fontdb::Family::Name(requested), weight).is_some() {
            return requested.to_string();
        }
        if let Some(custom) = &self.custom_family {
            debug!("font '{}' unavailable, using '{}'", requested, custom);
            return custom.clone();
        }
        if let Some(family) = self.query(fontdb::Family::SansSerif, weight) {
            debug!("font '{}' unavailable, using sans-serif '{}'", requested, family);
            return family;
        }
        debug!("font '{}' unavailable, using bundled '{}'", requested, BUNDLED_FAMILY);
        BUNDLED_FAMILY.to_string()
    }

    fn query(&self, family: fontdb::Family<'_>, weight: FontWeight) -> Option<String> {
        let families = [family];
        let query = fontdb::Query {
            families: &families,
            weight: match weight {
                FontWeight::Bold => fontdb::Weight::BOLD,
                FontWeight::Normal => fontdb::Weight::NORMAL,
            },
            ..Default::default()
        };
        let id = self.db.query(&query)?;
        self.db
            .face(id)
            .and_then(|face| face.families.first())
            .map(|(name, _)| name.clone())
    }
}

fn bundled_database() -> fontdb::Database {
    let mut db = fontdb::Database::new();
    db.load_font_data(BUNDLED_REGULAR.to_vec());
    db.load_font_data(BUNDLED_BOLD.to_vec());
    db
}

fn family_from_data(data: &[u8]) -> Option<String> {
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    (0..count)
        .filter_map(|index| Face::parse(data, index).ok())
        .find_map(|face| extract_family_name(&face))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
