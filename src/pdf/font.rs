//! Font resources of a document.
//!
//! Embedding happens in two passes. While pages are generated `FontEmbedder::draw_string`
//! encodes text and records the characters and glyphs each font was used for. When the
//! document is closed `FontEmbedder::close` subsets every used font to the glyphs recorded for
//! the whole document and writes its objects once.
//!
//! Fonts are written as one of:
//!
//! * a simple `/TrueType` or `/Type1` font with `/WinAnsiEncoding` (or the built-in encoding of
//!   a symbol font) and a 256 entry `/Widths` array,
//! * a `/Type0` font for CJK fonts, addressed as UCS-2 through one of the Adobe Unicode CMaps,
//!   or by glyph index through `Identity-H` when no CMap is available.
//!
//! A font that cannot be embedded is written without a font program.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::TryFrom;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bitflags::bitflags;
use encoding_rs::WINDOWS_1252;
use log::{debug, warn};
use lopdf::{Dictionary, Object, ObjectId, Stream};
use rustc_hash::{FxHashMap, FxHasher};

use super::filter;
use super::ObjectSink;
use crate::cid_cmap::{CidCMap, ADOBE};
use crate::error::EmbedError;
use crate::font_cache::LoadedFont;
use crate::font_info::{FontInfo, SfntFont};
use crate::subset::{subset, whole_program, FontProgram};
use crate::tables::cmap::CharMapKind;

/// Written in place of characters a font cannot encode.
const REPLACEMENT: char = '?';

/// Default width of CIDs missing from `/W`.
const DEFAULT_CID_WIDTH: i32 = 1000;

/// Settings of a document that affect its fonts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedOptions {
    /// Embed font programs. When off every font is only referenced by name.
    pub embed_fonts: bool,
    /// Fonts embedded whole instead of subset, matched against the PostScript name
    /// ignoring case
    pub full_embed: Vec<String>,
    /// Embed the CMap of CJK fonts as a stream instead of referring to it by name
    pub embed_cmap: bool,
    /// Keep streams 7-bit clean by ASCII85 encoding them
    pub ascii_only: bool,
    /// Deflate streams
    pub compress: bool,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        EmbedOptions {
            embed_fonts: true,
            full_embed: Vec::new(),
            embed_cmap: false,
            ascii_only: false,
            compress: true,
        }
    }
}

impl EmbedOptions {
    pub fn is_full_embed(&self, postscript_name: &str) -> bool {
        self.full_embed
            .iter()
            .any(|name| name.eq_ignore_ascii_case(postscript_name))
    }

    fn encode_stream(&self, data: &[u8]) -> std::io::Result<filter::EncodedStream> {
        filter::encode(data, self.compress, self.ascii_only)
    }
}

bitflags! {
    /// `/Flags` of a font descriptor.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct DescriptorFlags: u32 {
        const FIXED_PITCH = 1;
        const SYMBOLIC = 1 << 2;
        const NONSYMBOLIC = 1 << 5;
        const ITALIC = 1 << 6;
    }
}

/// A font registered with a `FontEmbedder`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FontHandle(usize);

/// How text is encoded for a font.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TextEncoding {
    /// One byte per character through `/WinAnsiEncoding`
    WinAnsi,
    /// One byte per character through the font's own encoding
    Symbol,
    /// Two byte Unicode through a UCS-2 CMap
    Ucs2,
    /// Two byte glyph index, or CID for CID-keyed CFF fonts, through `Identity-H`
    Identity,
}

impl TextEncoding {
    fn is_composite(self) -> bool {
        matches!(self, TextEncoding::Ucs2 | TextEncoding::Identity)
    }
}

/// A font and what the document used it for.
#[derive(Debug)]
struct UsedFont {
    font: LoadedFont,
    resource_name: String,
    id: ObjectId,
    encoding: TextEncoding,
    chars: BTreeSet<u32>,
    /// Glyph of each character code of a simple font, or of each CID of a composite font
    glyphs: BTreeMap<u16, u16>,
    /// Character drawn for each two byte code of an `Identity-H` font
    unicode: BTreeMap<u16, u32>,
    emitted: bool,
}

/// Tracks the fonts used by one document and writes them when it is closed.
#[derive(Debug)]
pub struct FontEmbedder {
    options: EmbedOptions,
    fonts: Vec<UsedFont>,
    by_name: FxHashMap<String, FontHandle>,
    cmap_ids: FxHashMap<String, ObjectId>,
}

impl FontEmbedder {
    pub fn new(options: EmbedOptions) -> Self {
        FontEmbedder {
            options,
            fonts: Vec::new(),
            by_name: FxHashMap::default(),
            cmap_ids: FxHashMap::default(),
        }
    }

    pub fn options(&self) -> &EmbedOptions {
        &self.options
    }

    /// Start using `font` in the document.
    ///
    /// The object id of the font dictionary is reserved now so pages can refer to it. A font
    /// that is already registered, or has the same non-empty PostScript name as one that is,
    /// gets the same handle.
    pub fn register<S: ObjectSink>(&mut self, sink: &mut S, font: LoadedFont) -> FontHandle {
        if let Some(handle) = self.registered(&font) {
            return handle;
        }
        let name = font.postscript_name().to_string();
        let handle = FontHandle(self.fonts.len());
        let encoding = text_encoding(&font);
        debug!("registered font '{}' as {:?}", name, encoding);
        self.fonts.push(UsedFont {
            font,
            resource_name: format!("F{}", handle.0 + 1),
            id: sink.alloc_id(),
            encoding,
            chars: BTreeSet::new(),
            glyphs: BTreeMap::new(),
            unicode: BTreeMap::new(),
            emitted: false,
        });
        if !name.is_empty() {
            self.by_name.insert(name, handle);
        }
        handle
    }

    fn registered(&self, font: &LoadedFont) -> Option<FontHandle> {
        let name = font.postscript_name();
        if !name.is_empty() {
            if let Some(&handle) = self.by_name.get(name) {
                return Some(handle);
            }
        }
        self.fonts
            .iter()
            .position(|used| used.font.same_font(font))
            .map(FontHandle)
    }

    /// The object id of the font dictionary.
    pub fn font_id(&self, handle: FontHandle) -> Result<ObjectId, EmbedError> {
        self.used(handle).map(|used| used.id)
    }

    /// Name of the font in a page's `/Font` resources, such as `F1`.
    pub fn resource_name(&self, handle: FontHandle) -> Result<&str, EmbedError> {
        self.used(handle).map(|used| used.resource_name.as_str())
    }

    pub fn text_encoding(&self, handle: FontHandle) -> Result<TextEncoding, EmbedError> {
        self.used(handle).map(|used| used.encoding)
    }

    /// Characters drawn with the font so far.
    pub fn used_chars(&self, handle: FontHandle) -> Result<&BTreeSet<u32>, EmbedError> {
        self.used(handle).map(|used| &used.chars)
    }

    /// A `/Font` resource dictionary naming every registered font.
    pub fn resources(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        for used in &self.fonts {
            dict.set(used.resource_name.as_str(), Object::Reference(used.id));
        }
        dict
    }

    /// Encode `text` for a string operand of `Tj` and record its characters as used.
    pub fn draw_string(&mut self, handle: FontHandle, text: &str) -> Result<Vec<u8>, EmbedError> {
        let used = self
            .fonts
            .get_mut(handle.0)
            .ok_or(EmbedError::BadHandle(handle.0))?;
        let mut codes = Vec::with_capacity(text.len() * 2);
        for ch in text.chars() {
            used.draw_char(ch, &mut codes);
        }
        Ok(codes)
    }

    /// Write the objects of every font that has not been written yet.
    ///
    /// Failing to build a font program is logged and the font is written without one. Errors
    /// writing to `sink` are returned.
    pub fn close<S: ObjectSink>(&mut self, sink: &mut S) -> Result<(), EmbedError> {
        for used in self.fonts.iter_mut().filter(|used| !used.emitted) {
            used.emit(sink, &self.options, &mut self.cmap_ids)?;
            used.emitted = true;
        }
        Ok(())
    }

    fn used(&self, handle: FontHandle) -> Result<&UsedFont, EmbedError> {
        self.fonts
            .get(handle.0)
            .ok_or(EmbedError::BadHandle(handle.0))
    }
}

fn text_encoding(font: &LoadedFont) -> TextEncoding {
    match font {
        LoadedFont::Afm(afm) if afm.is_font_specific() => TextEncoding::Symbol,
        LoadedFont::Afm(_) => TextEncoding::WinAnsi,
        LoadedFont::Sfnt(sfnt) => {
            let cjk_truetype = !sfnt.is_cff() && sfnt.cjk_ordering().is_some();
            if sfnt.is_cid_keyed() || cjk_truetype {
                if sfnt.cjk_ordering().is_some() && sfnt.cid_cmap().is_some() {
                    TextEncoding::Ucs2
                } else {
                    TextEncoding::Identity
                }
            } else if sfnt.char_map().kind() == CharMapKind::Symbol {
                TextEncoding::Symbol
            } else {
                TextEncoding::WinAnsi
            }
        }
    }
}

/// The single byte code of `ch` in Windows-1252.
fn win_ansi_code(ch: char) -> Option<u8> {
    let mut buf = [0; 4];
    let (bytes, _, had_errors) = WINDOWS_1252.encode(ch.encode_utf8(&mut buf));
    match *bytes {
        [code] if !had_errors => Some(code),
        _ => None,
    }
}

/// The character of `code` in Windows-1252.
fn win_ansi_char(code: u8) -> u32 {
    let bytes = [code];
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(&bytes);
    text.chars().next().map_or(u32::from(code), u32::from)
}

/// The code of `ch` in a symbol font: U+0000 to U+00FF and the U+F000 private use copy of
/// that range.
fn symbol_code(ch: char) -> Option<u8> {
    let ch = u32::from(ch);
    let code = if (0xF000..=0xF0FF).contains(&ch) {
        ch - 0xF000
    } else {
        ch
    };
    u8::try_from(code).ok()
}

impl UsedFont {
    fn draw_char(&mut self, ch: char, codes: &mut Vec<u8>) {
        match self.encoding {
            TextEncoding::WinAnsi | TextEncoding::Symbol => {
                let (ch, code) = match self.single_byte_code(ch) {
                    Some(code) => (ch, code),
                    None => (REPLACEMENT, REPLACEMENT as u8),
                };
                self.chars.insert(u32::from(ch));
                let glyph_id = match &self.font {
                    LoadedFont::Sfnt(sfnt) if self.encoding == TextEncoding::WinAnsi => {
                        sfnt.glyph_id(win_ansi_char(code))
                    }
                    LoadedFont::Sfnt(sfnt) => sfnt.glyph_id(u32::from(code)),
                    LoadedFont::Afm(_) => 0,
                };
                self.glyphs.insert(u16::from(code), glyph_id);
                codes.push(code);
            }
            TextEncoding::Ucs2 => {
                let ch = if u32::from(ch) > 0xFFFF { REPLACEMENT } else { ch };
                let code = u32::from(ch) as u16;
                self.chars.insert(u32::from(ch));
                if let LoadedFont::Sfnt(sfnt) = &self.font {
                    if let Some(cid) = sfnt.cid(u32::from(ch)) {
                        let glyph_id = if sfnt.is_cid_keyed() {
                            sfnt.glyph_for_cid(cid).unwrap_or(0)
                        } else {
                            sfnt.glyph_id(u32::from(ch))
                        };
                        self.glyphs.insert(cid, glyph_id);
                    }
                }
                codes.extend_from_slice(&code.to_be_bytes());
            }
            TextEncoding::Identity => {
                self.chars.insert(u32::from(ch));
                let code = match &self.font {
                    LoadedFont::Sfnt(sfnt) => {
                        let glyph_id = sfnt.glyph_id(u32::from(ch));
                        let cid = sfnt.cid_for_glyph(glyph_id);
                        self.glyphs.insert(cid, glyph_id);
                        cid
                    }
                    LoadedFont::Afm(_) => 0,
                };
                self.unicode.entry(code).or_insert(u32::from(ch));
                codes.extend_from_slice(&code.to_be_bytes());
            }
        }
    }

    fn single_byte_code(&self, ch: char) -> Option<u8> {
        if self.encoding == TextEncoding::Symbol {
            symbol_code(ch)
        } else {
            win_ansi_code(ch)
        }
    }

    fn emit<S: ObjectSink>(
        &self,
        sink: &mut S,
        options: &EmbedOptions,
        cmap_ids: &mut FxHashMap<String, ObjectId>,
    ) -> Result<(), EmbedError> {
        let info = self.font.info();
        let program = match &self.font {
            LoadedFont::Sfnt(sfnt) => self.font_program(sfnt, options),
            LoadedFont::Afm(_) => None,
        };

        let mut base_font = base_font_name(info);
        if let Some((_, true)) = &program {
            base_font = format!("{}+{}", self.subset_tag(), base_font);
        }
        let font_file = match &program {
            Some((program, _)) => Some(write_font_file(sink, options, program, self.encoding)?),
            None => None,
        };

        let descriptor_id = sink.alloc_id();
        let descriptor = self.font_descriptor(&base_font, font_file);
        sink.write_object(descriptor_id, Object::Dictionary(descriptor))?;

        let dict = if self.encoding.is_composite() {
            self.composite_font(sink, options, cmap_ids, &base_font, descriptor_id)?
        } else {
            self.simple_font(&base_font, descriptor_id)
        };
        sink.write_object(self.id, Object::Dictionary(dict))?;
        debug!(
            "wrote font '{}' with {} characters",
            base_font,
            self.chars.len()
        );
        Ok(())
    }

    /// The font program to embed and whether it is a subset, `None` if it is not embedded.
    fn font_program(&self, sfnt: &SfntFont, options: &EmbedOptions) -> Option<(FontProgram, bool)> {
        let name = &sfnt.info.postscript_name;
        if !options.embed_fonts {
            return None;
        }
        if sfnt.is_restricted() {
            debug!("font '{}' does not permit embedding", name);
            return None;
        }
        let whole = options.is_full_embed(name) || sfnt.is_advanced_typography();
        let result = sfnt.provider().map_err(EmbedError::from).and_then(|provider| {
            if whole {
                Ok(whole_program(&provider)?)
            } else {
                Ok(subset(&provider, &self.subset_glyphs(sfnt))?)
            }
        });
        match result {
            Ok(program) => Some((program, !whole)),
            Err(err) => {
                warn!("unable to embed font '{}': {}", name, err);
                None
            }
        }
    }

    /// Glyph indices to keep, or CIDs for CID-keyed CFF fonts.
    fn subset_glyphs(&self, sfnt: &SfntFont) -> BTreeSet<u16> {
        if sfnt.is_cid_keyed() {
            self.glyphs.keys().copied().collect()
        } else {
            self.glyphs.values().copied().collect()
        }
    }

    /// Six capital letters derived from the glyph set, prefixed to the name of subset fonts.
    fn subset_tag(&self) -> String {
        let mut hasher = FxHasher::default();
        self.resource_name.hash(&mut hasher);
        self.glyphs.hash(&mut hasher);
        let mut value = hasher.finish();
        (0..6)
            .map(|_| {
                let letter = char::from(b'A' + (value % 26) as u8);
                value /= 26;
                letter
            })
            .collect()
    }

    fn flags(&self, info: &FontInfo) -> DescriptorFlags {
        let mut flags = match self.encoding {
            TextEncoding::WinAnsi => DescriptorFlags::NONSYMBOLIC,
            _ => DescriptorFlags::SYMBOLIC,
        };
        if info.fixed_pitch {
            flags |= DescriptorFlags::FIXED_PITCH;
        }
        if info.is_italic() {
            flags |= DescriptorFlags::ITALIC;
        }
        flags
    }

    fn font_descriptor(&self, base_font: &str, font_file: Option<(&str, ObjectId)>) -> Dictionary {
        let info = self.font.info();
        let bbox = info.bbox;
        let stem_v = (f64::from(bbox.width) * 0.13).round() as i64;
        let mut dict = typed("FontDescriptor");
        dict.set("FontName", name(base_font));
        dict.set("Flags", integer(self.flags(info).bits()));
        dict.set(
            "FontBBox",
            Object::Array(vec![
                integer(bbox.x),
                integer(bbox.y),
                integer(bbox.x + bbox.width),
                integer(bbox.y + bbox.height),
            ]),
        );
        dict.set("ItalicAngle", Object::Real(info.italic_angle));
        dict.set("Ascent", integer(info.ascent));
        dict.set("Descent", integer(info.descent));
        dict.set("CapHeight", integer(info.cap_height));
        dict.set("StemV", Object::Integer(stem_v));
        if let LoadedFont::Sfnt(sfnt) = &self.font {
            dict.set("MissingWidth", integer(sfnt.glyph_advance(0)));
        }
        if let Some((key, id)) = font_file {
            dict.set(key, Object::Reference(id));
        }
        dict
    }

    fn simple_font(&self, base_font: &str, descriptor_id: ObjectId) -> Dictionary {
        let subtype = match &self.font {
            LoadedFont::Sfnt(sfnt) if !sfnt.is_cff() => "TrueType",
            _ => "Type1",
        };
        let widths = (0..=255u8)
            .map(|code| integer(self.code_width(code)))
            .collect::<Vec<_>>();
        let mut dict = typed("Font");
        dict.set("Subtype", name(subtype));
        dict.set("BaseFont", name(base_font));
        dict.set("FirstChar", Object::Integer(0));
        dict.set("LastChar", Object::Integer(255));
        dict.set("Widths", Object::Array(widths));
        dict.set("FontDescriptor", Object::Reference(descriptor_id));
        if self.encoding == TextEncoding::WinAnsi {
            dict.set("Encoding", name("WinAnsiEncoding"));
        }
        dict
    }

    /// Width of a single byte code in 1000 units per em.
    fn code_width(&self, code: u8) -> i32 {
        let ch = match self.encoding {
            TextEncoding::WinAnsi => win_ansi_char(code),
            _ => u32::from(code),
        };
        match &self.font {
            LoadedFont::Sfnt(sfnt) => sfnt.char_advance(ch),
            LoadedFont::Afm(afm) => afm.char_width(ch).unwrap_or(0),
        }
    }

    fn composite_font<S: ObjectSink>(
        &self,
        sink: &mut S,
        options: &EmbedOptions,
        cmap_ids: &mut FxHashMap<String, ObjectId>,
        base_font: &str,
        descriptor_id: ObjectId,
    ) -> Result<Dictionary, EmbedError> {
        let sfnt = match &self.font {
            LoadedFont::Sfnt(sfnt) => sfnt,
            LoadedFont::Afm(_) => return Ok(self.simple_font(base_font, descriptor_id)),
        };
        let cid_cmap = match self.encoding {
            TextEncoding::Ucs2 => sfnt.cid_cmap(),
            _ => None,
        };

        let system_info = match (cid_cmap, sfnt.cjk_ordering()) {
            (Some(cmap), _) if !cmap.ordering().is_empty() => {
                system_info(cmap.registry(), cmap.ordering(), cmap.supplement())
            }
            (Some(_), Some(ordering)) => {
                system_info(ADOBE, ordering.name, i32::from(ordering.supplement))
            }
            _ => system_info(ADOBE, "Identity", 0),
        };

        let mut cid_font = typed("Font");
        let subtype = if sfnt.is_cff() {
            "CIDFontType0"
        } else {
            "CIDFontType2"
        };
        cid_font.set("Subtype", name(subtype));
        cid_font.set("BaseFont", name(base_font));
        cid_font.set("CIDSystemInfo", Object::Dictionary(system_info.clone()));
        cid_font.set("FontDescriptor", Object::Reference(descriptor_id));
        cid_font.set("DW", integer(DEFAULT_CID_WIDTH));
        cid_font.set("W", Object::Array(self.cid_widths(sfnt)));
        if !sfnt.is_cff() {
            let map = match cid_cmap {
                Some(_) => {
                    let id = sink.alloc_id();
                    let stream = encoded_stream(options, Dictionary::new(), &self.cid_to_gid_map())?;
                    sink.write_object(id, Object::Stream(stream))?;
                    Object::Reference(id)
                }
                None => name("Identity"),
            };
            cid_font.set("CIDToGIDMap", map);
        }
        let cid_font_id = sink.alloc_id();
        sink.write_object(cid_font_id, Object::Dictionary(cid_font))?;

        let (encoding_name, encoding) = match cid_cmap {
            Some(cmap) if options.embed_cmap => (
                cmap.name().to_string(),
                Object::Reference(embed_cmap(sink, options, cmap_ids, cmap, system_info)?),
            ),
            Some(cmap) => (cmap.name().to_string(), name(cmap.name())),
            None => (String::from("Identity-H"), name("Identity-H")),
        };
        let mut font = typed("Font");
        font.set("Subtype", name("Type0"));
        font.set("BaseFont", name(&format!("{}-{}", base_font, encoding_name)));
        font.set("Encoding", encoding);
        font.set(
            "DescendantFonts",
            Object::Array(vec![Object::Reference(cid_font_id)]),
        );
        if cid_cmap.is_none() {
            let id = sink.alloc_id();
            let stream = encoded_stream(options, Dictionary::new(), &self.to_unicode_cmap())?;
            sink.write_object(id, Object::Stream(stream))?;
            font.set("ToUnicode", Object::Reference(id));
        }
        Ok(font)
    }

    /// `/W` array listing the width of every used CID, consecutive CIDs grouped in one run.
    fn cid_widths(&self, sfnt: &SfntFont) -> Vec<Object> {
        let mut array = Vec::new();
        let mut run: Option<(u16, Vec<Object>)> = None;
        for (&cid, &glyph_id) in &self.glyphs {
            let width = integer(sfnt.glyph_advance(glyph_id));
            match run.as_mut() {
                Some((first, widths)) if usize::from(*first) + widths.len() == usize::from(cid) => {
                    widths.push(width)
                }
                _ => {
                    if let Some((first, widths)) = run.replace((cid, vec![width])) {
                        array.push(integer(first));
                        array.push(Object::Array(widths));
                    }
                }
            }
        }
        if let Some((first, widths)) = run {
            array.push(integer(first));
            array.push(Object::Array(widths));
        }
        array
    }

    /// Two bytes per CID up to the largest used CID holding its glyph index.
    fn cid_to_gid_map(&self) -> Vec<u8> {
        let len = self
            .glyphs
            .keys()
            .next_back()
            .map_or(0, |&max_cid| usize::from(max_cid) + 1);
        let mut map = vec![0; len * 2];
        for (&cid, &glyph_id) in &self.glyphs {
            let offset = usize::from(cid) * 2;
            map[offset..offset + 2].copy_from_slice(&glyph_id.to_be_bytes());
        }
        map
    }

    /// A ToUnicode CMap for the two byte codes of an `Identity-H` font.
    fn to_unicode_cmap(&self) -> Vec<u8> {
        let mut cmap = String::from(
            "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
             /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
             /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
             1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
        );
        let entries = self.unicode.iter().collect::<Vec<_>>();
        // At most 100 entries per block
        for block in entries.chunks(100) {
            cmap.push_str(&format!("{} beginbfchar\n", block.len()));
            for (code, ch) in block.iter().copied() {
                let mut units = [0u16; 2];
                let utf16 = char::from_u32(*ch)
                    .map(|ch| ch.encode_utf16(&mut units).to_vec())
                    .unwrap_or_default();
                let hex = utf16
                    .iter()
                    .map(|unit| format!("{:04X}", unit))
                    .collect::<String>();
                cmap.push_str(&format!("<{:04X}> <{}>\n", code, hex));
            }
            cmap.push_str("endbfchar\n");
        }
        cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
        cmap.into_bytes()
    }
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

fn integer<T: Into<i64>>(value: T) -> Object {
    Object::Integer(value.into())
}

/// A dictionary starting with `/Type`.
fn typed(kind: &str) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", name(kind));
    dict
}

fn system_info(registry: &str, ordering: &str, supplement: i32) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Registry", Object::string_literal(registry));
    dict.set("Ordering", Object::string_literal(ordering));
    dict.set("Supplement", integer(supplement));
    dict
}

/// The PostScript name of a font, or its full name without spaces.
fn base_font_name(info: &FontInfo) -> String {
    if !info.postscript_name.is_empty() {
        return info.postscript_name.clone();
    }
    info.full_name.split_whitespace().collect()
}

fn encoded_stream(
    options: &EmbedOptions,
    mut dict: Dictionary,
    data: &[u8],
) -> Result<Stream, EmbedError> {
    let encoded = options.encode_stream(data)?;
    if let Some(filter) = encoded.filter_object() {
        dict.set("Filter", filter);
    }
    Ok(Stream::new(dict, encoded.data))
}

/// Write the font program stream. Returns the descriptor key and id that refer to it.
fn write_font_file<S: ObjectSink>(
    sink: &mut S,
    options: &EmbedOptions,
    program: &FontProgram,
    encoding: TextEncoding,
) -> Result<(&'static str, ObjectId), EmbedError> {
    let mut dict = Dictionary::new();
    dict.set("Length1", Object::Integer(program.data().len() as i64));
    let key = match program {
        FontProgram::Sfnt(_) => "FontFile2",
        FontProgram::Cff(_) => {
            let subtype = if encoding.is_composite() {
                "CIDFontType0C"
            } else {
                "Type1C"
            };
            dict.set("Subtype", name(subtype));
            "FontFile3"
        }
    };
    let stream = encoded_stream(options, dict, program.data())?;
    let id = sink.alloc_id();
    sink.write_object(id, Object::Stream(stream))?;
    Ok((key, id))
}

/// Write `cmap` as a CMap stream, once per document.
fn embed_cmap<S: ObjectSink>(
    sink: &mut S,
    options: &EmbedOptions,
    cmap_ids: &mut FxHashMap<String, ObjectId>,
    cmap: &Arc<CidCMap>,
    system_info: Dictionary,
) -> Result<ObjectId, EmbedError> {
    if let Some(&id) = cmap_ids.get(cmap.name()) {
        return Ok(id);
    }
    let mut dict = typed("CMap");
    dict.set("CMapName", name(cmap.name()));
    dict.set("CIDSystemInfo", Object::Dictionary(system_info));
    if let Some(parent) = cmap.parent_name() {
        dict.set("UseCMap", name(parent));
    }
    let stream = encoded_stream(options, dict, cmap.source())?;
    let id = sink.alloc_id();
    sink.write_object(id, Object::Stream(stream))?;
    cmap_ids.insert(cmap.name().to_string(), id);
    Ok(id)
}
