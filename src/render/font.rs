use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

use crate::editor::fonts::{GenericFamily, StackEntry};
use crate::editor::{FontFamily, FontWeight};

/// A parsed font face kept alongside its raw data.
#[derive(Clone)]
pub struct LoadedFont {
    data: Arc<Vec<u8>>,
    face_index: u32,
    family: Option<String>,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
}

impl std::fmt::Debug for LoadedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedFont")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl LoadedFont {
    pub fn from_data(data: Vec<u8>, face_index: u32) -> Result<Self> {
        let face = Face::parse(&data, face_index)
            .map_err(|err| anyhow!("failed to parse font data: {}", err))?;
        let family = extract_family_name(&face);
        let units_per_em = face.units_per_em().max(1);
        let ascender = face.ascender();
        let descender = face.descender();
        Ok(Self {
            data: Arc::new(data),
            face_index,
            family,
            units_per_em,
            ascender,
            descender,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font: {}", path.display()))?;
        Self::from_data(data, 0)
            .with_context(|| format!("failed to parse font: {}", path.display()))
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub(crate) fn face(&self) -> Result<Face<'_>> {
        Face::parse(&self.data, self.face_index)
            .map_err(|err| anyhow!("failed to parse font data: {}", err))
    }

    /// Distance from the top of the em box to the alphabetic baseline, in
    /// font units. The em box is split between ascent and descent in the
    /// proportion the font declares.
    pub(crate) fn em_box_ascent(&self) -> f32 {
        let ascent = self.ascender as f32;
        let descent = -(self.descender as f32);
        let total = ascent + descent;
        if total <= 0.0 {
            return self.units_per_em as f32 * 0.8;
        }
        self.units_per_em as f32 * ascent / total
    }
}

/// Horizontal advance of `text` at `font_size` pixels.
pub fn measure_text_width_px(font: &LoadedFont, text: &str, font_size: f32) -> Result<f32> {
    let face = font.face()?;
    let scale = font_size / font.units_per_em() as f32;
    let fallback_advance = font.units_per_em() / 2;
    let mut advance = 0u32;
    for ch in text.chars() {
        let glyph = face.glyph_index(ch).unwrap_or(ttf_parser::GlyphId(0));
        let glyph_advance = face.glyph_hor_advance(glyph).unwrap_or(fallback_advance);
        advance = advance.saturating_add(glyph_advance as u32);
    }
    Ok(advance as f32 * scale)
}

/// Resolves editor font choices to concrete faces.
///
/// Faces come from the system font database unless an override font is set,
/// in which case every family renders with it.
pub struct FontBook {
    db: fontdb::Database,
    override_font: Option<LoadedFont>,
    cache: Mutex<HashMap<(FontFamily, FontWeight), LoadedFont>>,
}

impl FontBook {
    pub fn system() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        debug!("font database holds {} faces", db.len());
        Self::with_database(db)
    }

    pub fn with_database(db: fontdb::Database) -> Self {
        Self {
            db,
            override_font: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_override(mut self, font: LoadedFont) -> Self {
        self.override_font = Some(font);
        self
    }

    /// System fonts, overridden by `font_path` when given.
    pub fn from_settings(font_path: Option<&str>) -> Result<Self> {
        let book = Self::system();
        match font_path {
            Some(path) => Ok(book.with_override(LoadedFont::from_path(Path::new(path))?)),
            None => Ok(book),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.override_font.is_none() && self.db.is_empty()
    }

    pub fn resolve(&self, family: FontFamily, weight: FontWeight) -> Result<LoadedFont> {
        if let Some(font) = &self.override_font {
            return Ok(font.clone());
        }
        let key = (family, weight);
        if let Some(font) = self.lock_cache().get(&key) {
            return Ok(font.clone());
        }
        let font = self.query(family, weight)?;
        self.lock_cache().insert(key, font.clone());
        Ok(font)
    }

    fn lock_cache(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<(FontFamily, FontWeight), LoadedFont>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn query(&self, family: FontFamily, weight: FontWeight) -> Result<LoadedFont> {
        let families: Vec<fontdb::Family<'_>> = family
            .stack()
            .iter()
            .map(|entry| match entry {
                StackEntry::Named(name) => fontdb::Family::Name(*name),
                StackEntry::Generic(GenericFamily::SansSerif) => fontdb::Family::SansSerif,
                StackEntry::Generic(GenericFamily::Serif) => fontdb::Family::Serif,
                StackEntry::Generic(GenericFamily::Monospace) => fontdb::Family::Monospace,
                StackEntry::Generic(GenericFamily::Cursive) => fontdb::Family::Cursive,
            })
            .collect();
        let query = fontdb::Query {
            families: &families,
            weight: fontdb::Weight(weight.numeric()),
            ..Default::default()
        };
        let id = match self.db.query(&query) {
            Some(id) => id,
            None => {
                warn!(
                    "no installed face matches '{}', using the first available font",
                    family.css_stack()
                );
                self.db
                    .faces()
                    .next()
                    .map(|face| face.id)
                    .ok_or_else(|| anyhow!("no fonts available for '{}'", family.label()))?
            }
        };
        let (data, index) = self
            .db
            .with_face_data(id, |data, index| (data.to_vec(), index))
            .ok_or_else(|| anyhow!("failed to load font data for '{}'", family.label()))?;
        LoadedFont::from_data(data, index)
    }
}

/// Font book for rendering tests. `DANKDRAFTS_TEST_FONT` pins a font file;
/// otherwise system fonts are used and their absence fails the test.
#[cfg(test)]
pub(crate) fn test_font_book() -> FontBook {
    let book = match std::env::var("DANKDRAFTS_TEST_FONT") {
        Ok(path) if !path.trim().is_empty() => {
            FontBook::from_settings(Some(path.trim())).expect("DANKDRAFTS_TEST_FONT is a font file")
        }
        _ => FontBook::system(),
    };
    assert!(
        !book.is_empty(),
        "text rendering tests need a TrueType font: install one or set DANKDRAFTS_TEST_FONT"
    );
    book
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
