//! Font metrics normalised to a 1000 unit em square.
//!
//! `FontInfo` is the record shared by every kind of font the embedder knows about. `SfntFont`
//! adds what is needed to subset and embed a TrueType or CFF flavoured OpenType font: the table
//! directory, the character map and per glyph advances.

use std::convert::TryFrom;
use std::path::Path;
use std::sync::Arc;

use bitflags::bitflags;
use log::debug;
use rustc_hash::FxHashMap;

use crate::binary::read::ReadScope;
use crate::cff::CFF;
use crate::cid_cmap::{CidCMap, Ordering};
use crate::error::{EmbedError, ParseError};
use crate::names::FontNames;
use crate::post::PostTable;
use crate::tables::cmap::{CharMap, CharMapKind, Cmap};
use crate::tables::kern::KernTable;
use crate::tables::os2::Os2;
use crate::tables::pclt::PcltTable;
use crate::tables::{
    FontTableProvider, HeadTable, HheaTable, HmtxTable, IndexToLocFormat, MaxpTable,
    OffsetTableFontProvider, OpenTypeFont, TableRecord,
};
use crate::tag;

/// Units per em of every metric in a `FontInfo`.
pub const UNITS_PER_EM: i32 = 1000;

/// Number of entries in `FontInfo::widths`.
pub const WIDTH_TABLE_SIZE: usize = 256;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct FontStyle: u8 {
        const BOLD = 0x01;
        const ITALIC = 0x02;
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Parsed metrics of a font.
#[derive(Debug, Clone, PartialEq)]
pub struct FontInfo {
    pub family_name: String,
    pub full_name: String,
    pub postscript_name: String,
    pub style: FontStyle,
    pub weight: u16,
    /// Degrees counter-clockwise from vertical
    pub italic_angle: f32,
    pub ascent: i32,
    pub descent: i32,
    pub line_gap: i32,
    pub max_advance: i32,
    pub cap_height: i32,
    pub bbox: BoundingBox,
    /// Advance widths of the characters U+0000 to U+00FF
    pub widths: Vec<i32>,
    /// Kerning adjustment of a pair of characters
    pub kerning: FxHashMap<(u32, u32), i32>,
    pub fixed_pitch: bool,
    pub encoding_scheme: String,
}

impl FontInfo {
    /// Width of `ch` from the width table, 0 outside it.
    pub fn width(&self, ch: u32) -> i32 {
        usize::try_from(ch)
            .ok()
            .and_then(|index| self.widths.get(index))
            .copied()
            .unwrap_or(0)
    }

    pub fn kerning(&self, left: u32, right: u32) -> i32 {
        self.kerning.get(&(left, right)).copied().unwrap_or(0)
    }

    pub fn is_bold(&self) -> bool {
        self.style.contains(FontStyle::BOLD)
    }

    pub fn is_italic(&self) -> bool {
        self.style.contains(FontStyle::ITALIC)
    }
}

/// Rescale `value` from a `units_per_em` grid to 1000 units per em.
///
/// Halves round away from zero. `units_per_em` must not be zero.
pub fn scale(value: i32, units_per_em: u16) -> i32 {
    let units_per_em = i64::from(units_per_em.max(1));
    let scaled = i64::from(value) * i64::from(UNITS_PER_EM);
    let magnitude = (scaled.abs() * 2 + units_per_em) / (2 * units_per_em);
    let rounded = if scaled < 0 { -magnitude } else { magnitude };
    i32::try_from(rounded).unwrap_or(if rounded < 0 { i32::MIN } else { i32::MAX })
}

/// The kind of outlines in an sfnt font.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutlineFormat {
    TrueType,
    Cff { cid_keyed: bool },
}

/// A TrueType or OpenType font face and everything needed to embed it.
#[derive(Debug)]
pub struct SfntFont {
    pub info: FontInfo,
    data: Arc<[u8]>,
    index: usize,
    tables: Vec<TableRecord>,
    num_glyphs: u16,
    units_per_em: u16,
    index_to_loc_format: IndexToLocFormat,
    outlines: OutlineFormat,
    char_map: CharMap,
    cid_cmap: Option<Arc<CidCMap>>,
    cjk_ordering: Option<&'static Ordering>,
    /// Advances in font units, indexed by glyph
    advances: Vec<u16>,
    /// CID of each glyph of a CID-keyed CFF font
    cids: Vec<u16>,
    glyphs_by_cid: FxHashMap<u16, u16>,
    advanced_typography: bool,
    restricted: bool,
}

/// Tables read from a face while building an `SfntFont`.
struct FaceTables {
    head: HeadTable,
    hhea: HheaTable,
    num_glyphs: u16,
    names: FontNames,
    os2: Option<Os2>,
    post: Option<PostTable>,
    pclt: Option<PcltTable>,
}

impl SfntFont {
    /// Parse face `index` of the font in `data`. `index` is ignored unless `data` is a collection.
    pub fn new(data: Arc<[u8]>, index: usize) -> Result<SfntFont, ParseError> {
        let font_file = ReadScope::new(&data).read::<OpenTypeFont<'_>>()?;
        let provider = font_file.table_provider(index)?;
        let tables = provider.table_records();

        let face = read_face_tables(&provider)?;
        let units_per_em = face.head.units_per_em;
        if units_per_em == 0 {
            return Err(ParseError::BadValue);
        }

        let char_map = match provider.table_data(tag::CMAP)? {
            Some(cmap_data) => {
                let cmap = ReadScope::new(&cmap_data).read::<Cmap<'_>>()?;
                match CharMap::new(&cmap) {
                    Ok(char_map) => char_map,
                    Err(ParseError::UnsuitableCmap) => CharMap::identity(),
                    Err(err) => return Err(err),
                }
            }
            None => CharMap::identity(),
        };

        let hmtx_data = provider.read_table_data(tag::HMTX)?;
        let hmtx = ReadScope::new(&hmtx_data).read_dep::<HmtxTable<'_>>((
            usize::from(face.num_glyphs),
            usize::from(face.hhea.num_h_metrics),
        ))?;
        let advances = (0..face.num_glyphs)
            .map(|glyph_id| hmtx.horizontal_advance(glyph_id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut cids = Vec::new();
        let mut cff_name = None;
        let mut cjk_ordering = None;
        let outlines = if provider.has_table(tag::CFF) {
            let cff_data = provider.read_table_data(tag::CFF)?;
            let cff = ReadScope::new(&cff_data).read::<CFF<'_>>()?;
            let font = cff.fonts.first().ok_or(ParseError::MissingValue)?;
            cff_name = cff.font_name(0).map(String::from);
            let cid_keyed = font.is_cid_keyed();
            if cid_keyed {
                if let Some(ros) = cff.ros(font)? {
                    cjk_ordering = Ordering::for_ros(&ros.registry, &ros.ordering);
                }
                cids = (0..face.num_glyphs)
                    .map(|glyph_id| font.charset.id_for_glyph(glyph_id).unwrap_or(glyph_id))
                    .collect();
            }
            OutlineFormat::Cff { cid_keyed }
        } else {
            OutlineFormat::TrueType
        };

        if cjk_ordering.is_none() && outlines != (OutlineFormat::Cff { cid_keyed: true }) {
            cjk_ordering = face
                .os2
                .as_ref()
                .filter(|os2| os2.is_cjk())
                .and_then(|os2| os2.ul_code_page_range1)
                .and_then(Ordering::for_code_pages);
        }

        let glyphs_by_cid = cids
            .iter()
            .enumerate()
            .filter_map(|(glyph_id, &cid)| Some((cid, u16::try_from(glyph_id).ok()?)))
            .collect();

        let kerning = match provider.table_data(tag::KERN)? {
            Some(kern_data) => {
                let kern = ReadScope::new(&kern_data).read::<KernTable<'_>>()?;
                kerning_pairs(&kern, &char_map, units_per_em)
            }
            None => FxHashMap::default(),
        };

        let widths = (0..WIDTH_TABLE_SIZE as u32)
            .map(|ch| {
                let glyph_id = char_map.map_char(ch);
                scale(i32::from(advance_of(&advances, glyph_id)), units_per_em)
            })
            .collect();

        let info = face_info(&face, char_map.kind(), cff_name, widths, kerning);
        let advanced_typography = provider.has_table(tag::GPOS) || provider.has_table(tag::GSUB);
        let restricted = face.os2.as_ref().map_or(false, Os2::is_restricted);

        debug!(
            "loaded font '{}' with {} glyphs ({:?})",
            info.postscript_name, face.num_glyphs, outlines
        );

        Ok(SfntFont {
            info,
            data: Arc::clone(&data),
            index,
            tables,
            num_glyphs: face.num_glyphs,
            units_per_em,
            index_to_loc_format: face.head.index_to_loc_format,
            outlines,
            char_map,
            cid_cmap: None,
            cjk_ordering,
            advances,
            cids,
            glyphs_by_cid,
            advanced_typography,
            restricted,
        })
    }

    /// Read face `index` of the font file at `path`.
    pub fn from_file(path: &Path, index: usize) -> Result<SfntFont, EmbedError> {
        let data = std::fs::read(path)?;
        Ok(SfntFont::new(Arc::from(data), index)?)
    }

    /// A table provider for the face this font was read from.
    pub fn provider(&self) -> Result<OffsetTableFontProvider<'_>, ParseError> {
        ReadScope::new(&self.data)
            .read::<OpenTypeFont<'_>>()?
            .table_provider(self.index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn table_records(&self) -> &[TableRecord] {
        &self.tables
    }

    pub fn num_glyphs(&self) -> u16 {
        self.num_glyphs
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn index_to_loc_format(&self) -> IndexToLocFormat {
        self.index_to_loc_format
    }

    pub fn outlines(&self) -> OutlineFormat {
        self.outlines
    }

    pub fn is_cff(&self) -> bool {
        matches!(self.outlines, OutlineFormat::Cff { .. })
    }

    pub fn is_cid_keyed(&self) -> bool {
        self.outlines == OutlineFormat::Cff { cid_keyed: true }
    }

    /// True if the font has `GPOS` or `GSUB` tables and so must be embedded whole.
    pub fn is_advanced_typography(&self) -> bool {
        self.advanced_typography
    }

    /// True if the license of the font forbids embedding.
    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    pub fn char_map(&self) -> &CharMap {
        &self.char_map
    }

    /// The Adobe character collection of a CJK font.
    pub fn cjk_ordering(&self) -> Option<&'static Ordering> {
        self.cjk_ordering
    }

    pub fn cid_cmap(&self) -> Option<&Arc<CidCMap>> {
        self.cid_cmap.as_ref()
    }

    /// Address the font through an external CMap instead of its `cmap` table.
    pub fn set_cid_cmap(&mut self, cid_cmap: Arc<CidCMap>) {
        self.cid_cmap = Some(cid_cmap);
    }

    /// Glyph index of `ch` through the font's own `cmap`.
    pub fn glyph_id(&self, ch: u32) -> u16 {
        self.char_map.map_char(ch)
    }

    /// CID of `ch` through the external CMap, `None` when unmapped or no CMap is attached.
    pub fn cid(&self, ch: u32) -> Option<u16> {
        self.cid_cmap.as_ref().and_then(|cmap| cmap.lookup(ch))
    }

    /// CID of `glyph_id`. For fonts that are not CID-keyed CFF this is the glyph index.
    pub fn cid_for_glyph(&self, glyph_id: u16) -> u16 {
        self.cids
            .get(usize::from(glyph_id))
            .copied()
            .unwrap_or(glyph_id)
    }

    /// Glyph with CID `cid`.
    pub fn glyph_for_cid(&self, cid: u16) -> Option<u16> {
        if self.is_cid_keyed() {
            self.glyphs_by_cid.get(&cid).copied()
        } else {
            Some(cid).filter(|glyph_id| *glyph_id < self.num_glyphs)
        }
    }

    /// Advance of `glyph_id` in 1000 units per em.
    pub fn glyph_advance(&self, glyph_id: u16) -> i32 {
        scale(
            i32::from(advance_of(&self.advances, glyph_id)),
            self.units_per_em,
        )
    }

    /// Advance of `ch` in 1000 units per em.
    pub fn char_advance(&self, ch: u32) -> i32 {
        self.glyph_advance(self.glyph_id(ch))
    }
}

/// Glyphs past the last advance share it.
fn advance_of(advances: &[u16], glyph_id: u16) -> u16 {
    advances
        .get(usize::from(glyph_id))
        .or_else(|| advances.last())
        .copied()
        .unwrap_or(0)
}

fn read_face_tables(provider: &impl FontTableProvider) -> Result<FaceTables, ParseError> {
    let head_data = provider.read_table_data(tag::HEAD)?;
    let head = ReadScope::new(&head_data).read::<HeadTable>()?;
    let hhea_data = provider.read_table_data(tag::HHEA)?;
    let hhea = ReadScope::new(&hhea_data).read::<HheaTable>()?;
    let maxp_data = provider.read_table_data(tag::MAXP)?;
    let maxp = ReadScope::new(&maxp_data).read::<MaxpTable>()?;

    let names = match provider.table_data(tag::NAME)? {
        Some(name_data) => FontNames::read(&name_data)?,
        None => FontNames::default(),
    };
    let os2 = match provider.table_data(tag::OS_2)? {
        Some(os2_data) => Some(ReadScope::new(&os2_data).read::<Os2>()?),
        None => None,
    };
    let post = match provider.table_data(tag::POST)? {
        Some(post_data) => Some(ReadScope::new(&post_data).read::<PostTable>()?),
        None => None,
    };
    let pclt = match provider.table_data(tag::PCLT)? {
        Some(pclt_data) => Some(ReadScope::new(&pclt_data).read::<PcltTable>()?),
        None => None,
    };

    Ok(FaceTables {
        head,
        hhea,
        num_glyphs: maxp.num_glyphs,
        names,
        os2,
        post,
        pclt,
    })
}

fn face_info(
    face: &FaceTables,
    cmap_kind: CharMapKind,
    cff_name: Option<String>,
    widths: Vec<i32>,
    kerning: FxHashMap<(u32, u32), i32>,
) -> FontInfo {
    let upem = face.head.units_per_em;
    let head = &face.head;
    let os2 = face.os2.as_ref();

    let italic_angle = face.post.as_ref().map_or(0.0, PostTable::italic_angle);
    let mut style = FontStyle::empty();
    let weight = os2.map_or(0, |os2| os2.us_weight_class);
    if head.is_bold() || os2.map_or(false, Os2::is_bold) || weight >= 700 {
        style |= FontStyle::BOLD;
    }
    if head.is_italic() || os2.map_or(false, Os2::is_italic) || italic_angle != 0.0 {
        style |= FontStyle::ITALIC;
    }
    let weight = match weight {
        0 if style.contains(FontStyle::BOLD) => 700,
        0 => 400,
        weight => weight,
    };

    let names = &face.names;
    let family_name = names
        .family
        .clone()
        .or_else(|| cff_name.clone())
        .unwrap_or_default();
    let full_name = names
        .full_name
        .clone()
        .unwrap_or_else(|| family_name.clone());
    let postscript_name = names
        .postscript_name
        .clone()
        .or(cff_name)
        .unwrap_or_else(|| full_name.chars().filter(|c| !c.is_whitespace()).collect());

    let ascent = scale(i32::from(face.hhea.ascender), upem);
    let cap_height = face
        .pclt
        .as_ref()
        .map_or(ascent, |pclt| scale(i32::from(pclt.cap_height), upem));

    let encoding_scheme = match cmap_kind {
        CharMapKind::Symbol => "FontSpecific",
        _ => "AdobeStandardEncoding",
    };

    FontInfo {
        family_name,
        full_name,
        postscript_name,
        style,
        weight,
        italic_angle,
        ascent,
        descent: scale(i32::from(face.hhea.descender), upem),
        line_gap: scale(i32::from(face.hhea.line_gap), upem),
        max_advance: scale(i32::from(face.hhea.advance_width_max), upem),
        cap_height,
        bbox: BoundingBox {
            x: scale(i32::from(head.x_min), upem),
            y: scale(i32::from(head.y_min), upem),
            width: scale(i32::from(head.x_max) - i32::from(head.x_min), upem),
            height: scale(i32::from(head.y_max) - i32::from(head.y_min), upem),
        },
        widths,
        kerning,
        fixed_pitch: face.post.as_ref().map_or(false, PostTable::is_fixed_pitch),
        encoding_scheme: String::from(encoding_scheme),
    }
}

/// Kerning pairs between the characters of the width table.
fn kerning_pairs(
    kern: &KernTable<'_>,
    char_map: &CharMap,
    units_per_em: u16,
) -> FxHashMap<(u32, u32), i32> {
    let mut chars_by_glyph: FxHashMap<u16, Vec<u32>> = FxHashMap::default();
    for ch in 0..WIDTH_TABLE_SIZE as u32 {
        if let Some(glyph_id) = char_map.lookup(ch) {
            chars_by_glyph.entry(glyph_id).or_default().push(ch);
        }
    }

    let mut kerning = FxHashMap::default();
    for pair in kern.horizontal_pairs() {
        let (lefts, rights) = match (
            chars_by_glyph.get(&pair.left),
            chars_by_glyph.get(&pair.right),
        ) {
            (Some(lefts), Some(rights)) => (lefts, rights),
            _ => continue,
        };
        let value = scale(i32::from(pair.value), units_per_em);
        for &left in lefts {
            for &right in rights {
                kerning.insert((left, right), value);
            }
        }
    }
    kerning
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{cid_cff_data, os2_table_data, post_table_data, TrueTypeBuilder};

    fn load(builder: &TrueTypeBuilder) -> SfntFont {
        SfntFont::new(Arc::from(builder.build()), 0).unwrap()
    }

    #[test]
    fn scale_rounds_half_away_from_zero() {
        assert_eq!(scale(1, 2000), 1);
        assert_eq!(scale(-1, 2000), -1);
        assert_eq!(scale(3, 2000), 2);
        assert_eq!(scale(1, 3000), 0);
        assert_eq!(scale(1434, 2048), 700);
        assert_eq!(scale(-410, 2048), -200);
        assert_eq!(scale(500, 1000), 500);
    }

    #[test]
    fn metrics_are_normalised_to_1000_units() {
        let font = load(
            &TrueTypeBuilder::new(4)
                .units_per_em(2048)
                .ascent_descent(1638, -410)
                .advance(1, 1229)
                .map(u32::from('A'), 1),
        );
        let info = &font.info;

        assert_eq!(info.ascent, 800);
        assert_eq!(info.descent, -200);
        assert_eq!(info.line_gap, 0);
        assert_eq!(info.max_advance, 600);
        assert_eq!(info.width(u32::from('A')), 600);
        // unmapped characters use the glyph of the same index, past the end here
        assert_eq!(info.width(u32::from('B')), scale(500, 2048));
        assert_eq!(info.widths.len(), WIDTH_TABLE_SIZE);
        assert_eq!(
            info.bbox,
            BoundingBox {
                x: -24,
                y: -200,
                width: 1024,
                height: 1000,
            }
        );
        assert_eq!(font.glyph_advance(1), 600);
        assert_eq!(font.units_per_em(), 2048);
    }

    #[test]
    fn names_and_fallbacks() {
        let font = load(&TrueTypeBuilder::new(2));
        assert_eq!(font.info.family_name, "Test Sans");
        assert_eq!(font.info.full_name, "Test Sans");
        assert_eq!(font.info.postscript_name, "TestSans");

        let font = load(
            &TrueTypeBuilder::new(2)
                .name(4, "Test Sans Bold")
                .name(6, "TestSans-Bold"),
        );
        assert_eq!(font.info.full_name, "Test Sans Bold");
        assert_eq!(font.info.postscript_name, "TestSans-Bold");
    }

    #[test]
    fn style_weight_and_angle() {
        let font = load(&TrueTypeBuilder::new(2));
        assert_eq!(font.info.style, FontStyle::empty());
        assert_eq!(font.info.weight, 400);
        assert!(!font.info.fixed_pitch);

        let font = load(
            &TrueTypeBuilder::new(2)
                .os2(Some(os2_table_data(3, 1, 700)))
                .post(Some(post_table_data(-12, true))),
        );
        assert!(font.info.is_bold());
        assert!(font.info.is_italic());
        assert_eq!(font.info.weight, 700);
        assert_eq!(font.info.italic_angle, -12.0);
        assert!(font.info.fixed_pitch);

        // macStyle italic without OS/2 or post
        let font = load(&TrueTypeBuilder::new(2).os2(None).post(None).mac_style(0x02));
        assert_eq!(font.info.style, FontStyle::ITALIC);
        assert_eq!(font.info.weight, 400);
    }

    #[test]
    fn cap_height_falls_back_to_ascent() {
        let font = load(&TrueTypeBuilder::new(2));
        assert_eq!(font.info.cap_height, 800);

        let font = load(&TrueTypeBuilder::new(2).units_per_em(2000).pclt(1400));
        assert_eq!(font.info.cap_height, 700);
    }

    #[test]
    fn kerning_is_keyed_by_character() {
        let font = load(
            &TrueTypeBuilder::new(4)
                .map(u32::from('A'), 1)
                .map(u32::from('V'), 2)
                .kern(1, 2, -80)
                .kern(2, 3, 10),
        );
        assert_eq!(font.info.kerning(u32::from('A'), u32::from('V')), -80);
        assert_eq!(font.info.kerning(u32::from('V'), u32::from('A')), 0);
        // glyph 3 has no character
        assert_eq!(font.info.kerning.len(), 1);
    }

    #[test]
    fn symbol_fonts() {
        let font = load(&TrueTypeBuilder::new(4).symbol().map(0xF041, 3));
        assert_eq!(font.info.encoding_scheme, "FontSpecific");
        assert_eq!(font.glyph_id(0x41), 3);

        let font = load(&TrueTypeBuilder::new(4).map(u32::from('A'), 3));
        assert_eq!(font.info.encoding_scheme, "AdobeStandardEncoding");
    }

    #[test]
    fn cjk_ordering_from_code_pages() {
        let font = load(&TrueTypeBuilder::new(2).os2(Some(os2_table_data(1, 1 << 18, 400))));
        assert_eq!(font.cjk_ordering().map(|ordering| ordering.name), Some("GB1"));

        let font = load(&TrueTypeBuilder::new(2));
        assert!(font.cjk_ordering().is_none());
    }

    #[test]
    fn advanced_typography_and_outlines() {
        let font = load(&TrueTypeBuilder::new(2).gsub());
        assert!(font.is_advanced_typography());
        assert_eq!(font.outlines(), OutlineFormat::TrueType);
        assert_eq!(font.index_to_loc_format(), IndexToLocFormat::Long);

        let font = load(&TrueTypeBuilder::new(2).short_loca());
        assert!(!font.is_advanced_typography());
        assert_eq!(font.index_to_loc_format(), IndexToLocFormat::Short);
    }

    #[test]
    fn cid_keyed_cff() {
        let font = load(&TrueTypeBuilder::new(3).cff(cid_cff_data(&[0, 0, 1], 100)));
        assert!(font.is_cff());
        assert!(font.is_cid_keyed());
        assert_eq!(font.cid_for_glyph(0), 0);
        assert_eq!(font.cid_for_glyph(2), 101);
        assert_eq!(font.glyph_for_cid(100), Some(1));
        assert_eq!(font.glyph_for_cid(5), None);
        // Adobe-Identity is not a CJK collection
        assert!(font.cjk_ordering().is_none());
        assert_eq!(font.info.family_name, "Test Sans");
    }

    #[test]
    fn zero_units_per_em_is_rejected() {
        let data = TrueTypeBuilder::new(2).units_per_em(0).build();
        assert_eq!(
            SfntFont::new(Arc::from(data), 0).unwrap_err(),
            ParseError::BadValue
        );
    }
}
