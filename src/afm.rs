//! Adobe Font Metrics files.
//!
//! AFM files describe Type 1 fonts whose programs are not embedded. Their metrics are already
//! expressed in 1000 units per em.

use std::path::Path;

use encoding_rs::WINDOWS_1252;
use lazy_static::lazy_static;
use log::warn;
use rustc_hash::FxHashMap;

use crate::error::{EmbedError, ParseError};
use crate::font_info::{BoundingBox, FontInfo, FontStyle, WIDTH_TABLE_SIZE};

lazy_static! {
    /// Characters of the Basic Multilingual Plane by their Adobe glyph list name.
    static ref CHARS_BY_GLYPH_NAME: FxHashMap<String, u32> = {
        let mut chars = FxHashMap::default();
        for ch in 0x20..=0xFFFF {
            if let Some(name) = glyph_names::glyph_name(ch) {
                if parse_uni_name(&name).is_none() {
                    chars.entry(name.into_owned()).or_insert(ch);
                }
            }
        }
        chars
    };
}

/// Character named by an AGL name or a `uniXXXX` / `uXXXX[XX]` name.
pub fn char_for_glyph_name(name: &str) -> Option<u32> {
    CHARS_BY_GLYPH_NAME
        .get(name)
        .copied()
        .or_else(|| parse_uni_name(name))
}

fn parse_uni_name(name: &str) -> Option<u32> {
    let hex = if let Some(hex) = name.strip_prefix("uni") {
        Some(hex).filter(|hex| hex.len() == 4)
    } else if let Some(hex) = name.strip_prefix('u') {
        Some(hex).filter(|hex| (4..=6).contains(&hex.len()))
    } else {
        None
    }?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_lowercase()) {
        return None;
    }
    u32::from_str_radix(hex, 16)
        .ok()
        .filter(|&ch| char::from_u32(ch).is_some())
}

/// A font described by an AFM file.
#[derive(Debug, Clone)]
pub struct AfmFont {
    pub info: FontInfo,
    /// Advance of every character that has a metric, keyed by Unicode scalar value, or by
    /// character code for `FontSpecific` fonts
    char_widths: FxHashMap<u32, i32>,
}

#[derive(Default)]
struct Header {
    font_name: Option<String>,
    full_name: Option<String>,
    family_name: Option<String>,
    weight: Option<String>,
    italic_angle: f32,
    fixed_pitch: bool,
    bbox: Option<[i32; 4]>,
    cap_height: Option<i32>,
    ascender: Option<i32>,
    descender: Option<i32>,
    encoding_scheme: Option<String>,
}

enum Section {
    Header,
    CharMetrics,
    KernPairs,
    Other,
}

impl AfmFont {
    /// Parse the text of an AFM file.
    pub fn parse(text: &str) -> Result<AfmFont, ParseError> {
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
        match lines.next() {
            Some(line) if line.starts_with("StartFontMetrics") => {}
            _ => return Err(ParseError::BadVersion),
        }

        let mut header = Header::default();
        let mut metrics: Vec<(i32, Option<String>, i32)> = Vec::new();
        let mut kern_pairs: Vec<(String, String, i32)> = Vec::new();
        let mut section = Section::Header;

        for line in lines {
            let (key, rest) = match line.split_once(char::is_whitespace) {
                Some((key, rest)) => (key, rest.trim()),
                None => (line, ""),
            };
            match key {
                "EndFontMetrics" => break,
                "StartCharMetrics" => section = Section::CharMetrics,
                "StartKernPairs" | "StartKernPairs0" => section = Section::KernPairs,
                "EndCharMetrics" | "EndKernPairs" | "EndKernData" => section = Section::Header,
                "StartKernData" => {}
                "StartComposites" | "StartTrackKern" | "StartDirection" => {
                    section = Section::Other
                }
                "EndComposites" | "EndTrackKern" | "EndDirection" => section = Section::Header,
                _ => match section {
                    Section::Header => header.read_entry(key, rest)?,
                    Section::CharMetrics => metrics.push(parse_char_metric(line)?),
                    Section::KernPairs => {
                        if key == "KPX" {
                            kern_pairs.push(parse_kern_pair(rest)?);
                        }
                    }
                    Section::Other => {}
                },
            }
        }

        let font_specific = header.encoding_scheme.as_deref() == Some("FontSpecific");
        let mut char_widths = FxHashMap::default();
        let mut chars_by_name = FxHashMap::default();
        for (code, name, width) in &metrics {
            let ch = if font_specific {
                u32::try_from(*code).ok()
            } else {
                name.as_deref()
                    .and_then(char_for_glyph_name)
                    .or_else(|| u32::try_from(*code).ok())
            };
            let ch = match ch {
                Some(ch) => ch,
                None => continue,
            };
            char_widths.entry(ch).or_insert(*width);
            if let Some(name) = name {
                chars_by_name.insert(name.as_str(), ch);
            }
        }

        let mut kerning = FxHashMap::default();
        for (left, right, value) in &kern_pairs {
            match (
                chars_by_name.get(left.as_str()),
                chars_by_name.get(right.as_str()),
            ) {
                (Some(&left), Some(&right)) => {
                    kerning.insert((left, right), *value);
                }
                _ => warn!("kerning pair {} {} names an unknown glyph", left, right),
            }
        }

        let widths = (0..WIDTH_TABLE_SIZE as u32)
            .map(|ch| char_widths.get(&ch).copied().unwrap_or(0))
            .collect();
        let max_advance = char_widths.values().copied().max().unwrap_or(0);

        let postscript_name = header.font_name.clone().ok_or(ParseError::MissingValue)?;
        let family_name = header
            .family_name
            .clone()
            .unwrap_or_else(|| postscript_name.clone());
        let full_name = header
            .full_name
            .clone()
            .unwrap_or_else(|| postscript_name.clone());

        let [llx, lly, urx, ury] = header.bbox.unwrap_or([0, 0, 0, 0]);
        let ascent = header.ascender.unwrap_or(ury);
        let descent = header.descender.unwrap_or(lly);

        let bold = header
            .weight
            .as_deref()
            .map_or(false, |weight| weight.contains("Bold") || weight == "Black");
        let mut style = FontStyle::empty();
        if bold {
            style |= FontStyle::BOLD;
        }
        if header.italic_angle != 0.0 {
            style |= FontStyle::ITALIC;
        }

        let info = FontInfo {
            family_name,
            full_name,
            postscript_name,
            style,
            weight: if bold { 700 } else { 400 },
            italic_angle: header.italic_angle,
            ascent,
            descent,
            line_gap: 0,
            max_advance,
            cap_height: header.cap_height.unwrap_or(ascent),
            bbox: BoundingBox {
                x: llx,
                y: lly,
                width: urx - llx,
                height: ury - lly,
            },
            widths,
            kerning,
            fixed_pitch: header.fixed_pitch,
            encoding_scheme: header
                .encoding_scheme
                .unwrap_or_else(|| String::from("AdobeStandardEncoding")),
        };

        Ok(AfmFont { info, char_widths })
    }

    /// Read an AFM file. The text is decoded as Windows-1252.
    pub fn from_file(path: &Path) -> Result<AfmFont, EmbedError> {
        let data = std::fs::read(path)?;
        let (text, _had_errors) = WINDOWS_1252.decode_without_bom_handling(&data);
        Ok(AfmFont::parse(&text)?)
    }

    /// Advance of `ch`, `None` when the font has no metric for it.
    pub fn char_width(&self, ch: u32) -> Option<i32> {
        self.char_widths.get(&ch).copied()
    }

    pub fn is_font_specific(&self) -> bool {
        self.info.encoding_scheme == "FontSpecific"
    }
}

impl Header {
    fn read_entry(&mut self, key: &str, value: &str) -> Result<(), ParseError> {
        match key {
            "FontName" => self.font_name = Some(value.to_owned()),
            "FullName" => self.full_name = Some(value.to_owned()),
            "FamilyName" => self.family_name = Some(value.to_owned()),
            "Weight" => self.weight = Some(value.to_owned()),
            "ItalicAngle" => self.italic_angle = parse_number(value)?,
            "IsFixedPitch" => self.fixed_pitch = value == "true",
            "CapHeight" => self.cap_height = Some(parse_metric(value)?),
            "Ascender" => self.ascender = Some(parse_metric(value)?),
            "Descender" => self.descender = Some(parse_metric(value)?),
            "EncodingScheme" => self.encoding_scheme = Some(value.to_owned()),
            "FontBBox" => {
                let values = value
                    .split_whitespace()
                    .map(parse_metric)
                    .collect::<Result<Vec<_>, _>>()?;
                match values.as_slice() {
                    &[llx, lly, urx, ury] => self.bbox = Some([llx, lly, urx, ury]),
                    _ => return Err(ParseError::BadValue),
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn parse_number(value: &str) -> Result<f32, ParseError> {
    value.parse::<f32>().map_err(|_| ParseError::BadValue)
}

/// Metrics are integers in practice but some files carry fractions.
fn parse_metric(value: &str) -> Result<i32, ParseError> {
    parse_number(value).map(|value| value.round() as i32)
}

/// `C 65 ; WX 722 ; N A ; B 15 0 706 674 ;`
fn parse_char_metric(line: &str) -> Result<(i32, Option<String>, i32), ParseError> {
    let mut code = None;
    let mut name = None;
    let mut width = None;
    for entry in line.split(';') {
        let mut parts = entry.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("C"), Some(value)) => code = Some(parse_metric(value)?),
            (Some("CH"), Some(value)) => {
                let hex = value.trim_start_matches('<').trim_end_matches('>');
                code = Some(i32::from_str_radix(hex, 16).map_err(|_| ParseError::BadValue)?);
            }
            (Some("WX"), Some(value)) | (Some("W0X"), Some(value)) => {
                width = Some(parse_metric(value)?)
            }
            (Some("N"), Some(value)) => name = Some(value.to_owned()),
            _ => {}
        }
    }
    match (code, width) {
        (Some(code), Some(width)) => Ok((code, name, width)),
        _ => Err(ParseError::MissingValue),
    }
}

/// `KPX A V -80`, the leading key already removed
fn parse_kern_pair(rest: &str) -> Result<(String, String, i32), ParseError> {
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(left), Some(right), Some(value)) => {
            Ok((left.to_owned(), right.to_owned(), parse_metric(value)?))
        }
        _ => Err(ParseError::MissingValue),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELVETICA: &str = "StartFontMetrics 4.1
Comment Test metrics
FontName Helvetica-BoldOblique
FullName Helvetica Bold Oblique
FamilyName Helvetica
Weight Bold
ItalicAngle -12
IsFixedPitch false
FontBBox -174 -228 1114 962
CapHeight 718
Ascender 718
Descender -207
EncodingScheme AdobeStandardEncoding
StartCharMetrics 5
C 32 ; WX 278 ; N space ; B 0 0 0 0 ;
C 65 ; WX 722 ; N A ; B 20 0 702 718 ;
C 86 ; WX 667 ; N V ; B 17 0 653 718 ;
C -1 ; WX 556 ; N Euro ; B 0 0 0 0 ;
C -1 ; WX 611 ; N uni0141 ;
EndCharMetrics
StartKernData
StartKernPairs 2
KPX A V -70
KPX V A -80
EndKernPairs
EndKernData
EndFontMetrics
";

    #[test]
    fn header() {
        let font = AfmFont::parse(HELVETICA).unwrap();
        let info = &font.info;

        assert_eq!(info.postscript_name, "Helvetica-BoldOblique");
        assert_eq!(info.full_name, "Helvetica Bold Oblique");
        assert_eq!(info.family_name, "Helvetica");
        assert_eq!(info.style, FontStyle::BOLD | FontStyle::ITALIC);
        assert_eq!(info.weight, 700);
        assert_eq!(info.italic_angle, -12.0);
        assert_eq!(info.ascent, 718);
        assert_eq!(info.descent, -207);
        assert_eq!(info.cap_height, 718);
        assert_eq!(
            info.bbox,
            BoundingBox {
                x: -174,
                y: -228,
                width: 1288,
                height: 1190,
            }
        );
        assert_eq!(info.max_advance, 722);
        assert!(!info.fixed_pitch);
        assert_eq!(info.encoding_scheme, "AdobeStandardEncoding");
    }

    #[test]
    fn widths_by_glyph_name() {
        let font = AfmFont::parse(HELVETICA).unwrap();

        assert_eq!(font.info.width(u32::from('A')), 722);
        assert_eq!(font.info.width(u32::from(' ')), 278);
        assert_eq!(font.info.width(u32::from('B')), 0);
        assert_eq!(font.char_width(0x20AC), Some(556));
        assert_eq!(font.char_width(0x0141), Some(611));
        assert_eq!(font.char_width(u32::from('Z')), None);
    }

    #[test]
    fn kerning_pairs() {
        let font = AfmFont::parse(HELVETICA).unwrap();

        assert_eq!(font.info.kerning(u32::from('A'), u32::from('V')), -70);
        assert_eq!(font.info.kerning(u32::from('V'), u32::from('A')), -80);
        assert_eq!(font.info.kerning(u32::from('A'), u32::from('A')), 0);
    }

    #[test]
    fn font_specific_uses_codes() {
        let text = "StartFontMetrics 2.0
FontName Symbol
EncodingScheme FontSpecific
StartCharMetrics 1
C 97 ; WX 631 ; N alpha ;
EndCharMetrics
EndFontMetrics
";
        let font = AfmFont::parse(text).unwrap();
        assert!(font.is_font_specific());
        assert_eq!(font.info.width(97), 631);
        assert_eq!(font.info.family_name, "Symbol");
        assert_eq!(font.info.style, FontStyle::empty());
    }

    #[test]
    fn bad_files() {
        assert_eq!(
            AfmFont::parse("FontName Foo\n").unwrap_err(),
            ParseError::BadVersion
        );
        assert_eq!(
            AfmFont::parse("StartFontMetrics 4.1\nWeight Bold\nEndFontMetrics\n").unwrap_err(),
            ParseError::MissingValue
        );
        assert_eq!(
            AfmFont::parse("StartFontMetrics 4.1\nFontBBox 1 2 3\n").unwrap_err(),
            ParseError::BadValue
        );
    }

    #[test]
    fn glyph_names() {
        assert_eq!(char_for_glyph_name("A"), Some(0x41));
        assert_eq!(char_for_glyph_name("eacute"), Some(0xE9));
        assert_eq!(char_for_glyph_name("uni20AC"), Some(0x20AC));
        assert_eq!(char_for_glyph_name("u1F600"), Some(0x1F600));
        assert_eq!(char_for_glyph_name("uni20ac"), None);
        assert_eq!(char_for_glyph_name("notaglyph"), None);
    }
}
