//! Parsing of the `cmap` table and resolution of characters to glyph indices.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/cmap>

use std::convert::TryFrom;

use rustc_hash::FxHashMap;

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{I16Be, U16Be, U32Be, U8};
use crate::error::ParseError;
use crate::size;

/// Largest Unicode scalar value
const MAX_CODE_POINT: u32 = 0x10FFFF;

/// Offset of the private use area that symbol fonts map their codes into
const SYMBOL_BASE: u32 = 0xF000;

pub struct Cmap<'a> {
    pub scope: ReadScope<'a>,
    encoding_records: ReadArray<'a, EncodingRecord>,
}

#[derive(Debug, Copy, Clone)]
pub struct EncodingRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub offset: u32,
}

pub enum CmapSubtable<'a> {
    Format0 {
        language: u16,
        glyph_id_array: ReadArray<'a, U8>,
    },
    Format4 {
        language: u16,
        end_codes: ReadArray<'a, U16Be>,
        start_codes: ReadArray<'a, U16Be>,
        id_deltas: ReadArray<'a, I16Be>,
        id_range_offsets: ReadArray<'a, U16Be>,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format6 {
        language: u16,
        first_code: u16,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format12 {
        language: u32,
        groups: ReadArray<'a, SequentialMapGroup>,
    },
}

#[derive(Debug, Copy, Clone)]
pub struct SequentialMapGroup {
    start_char_code: u32,
    end_char_code: u32,
    start_glyph_id: u32,
}

impl ReadBinary for Cmap<'_> {
    type HostType<'a> = Cmap<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u16be()?;
        ctxt.check_version(version == 0)?;
        let num_tables = usize::from(ctxt.read_u16be()?);
        let encoding_records = ctxt.read_array::<EncodingRecord>(num_tables)?;
        Ok(Cmap {
            scope,
            encoding_records,
        })
    }
}

impl ReadFrom for EncodingRecord {
    type ReadType = (U16Be, U16Be, U32Be);

    fn read_from((platform_id, encoding_id, offset): (u16, u16, u32)) -> Self {
        EncodingRecord {
            platform_id,
            encoding_id,
            offset,
        }
    }
}

impl ReadBinary for CmapSubtable<'_> {
    type HostType<'a> = CmapSubtable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let subtable_format = ctxt.read_u16be()?;
        match subtable_format {
            0 => {
                let length = usize::from(ctxt.read_u16be()?);
                ctxt.check(length >= 3 * size::U16 + 256)?;
                let language = ctxt.read_u16be()?;
                let glyph_id_array = ctxt.read_array::<U8>(256)?;
                Ok(CmapSubtable::Format0 {
                    language,
                    glyph_id_array,
                })
            }
            4 => {
                let length = usize::from(ctxt.read_u16be()?);
                let language = ctxt.read_u16be()?;
                let seg_count_x2 = usize::from(ctxt.read_u16be()?);
                ctxt.check((seg_count_x2 & 1) == 0)?;
                let seg_count = seg_count_x2 >> 1;
                let _search_range = ctxt.read_u16be()?;
                let _entry_selector = ctxt.read_u16be()?;
                let _range_shift = ctxt.read_u16be()?;
                let end_codes = ctxt.read_array::<U16Be>(seg_count)?;
                let _reserved_pad = ctxt.read_u16be()?;
                let start_codes = ctxt.read_array::<U16Be>(seg_count)?;
                let id_deltas = ctxt.read_array::<I16Be>(seg_count)?;
                let id_range_offsets = ctxt.read_array::<U16Be>(seg_count)?;
                ctxt.check(length >= (8 + (4 * seg_count)) * size::U16)?;
                let remaining = length - ((8 + (4 * seg_count)) * size::U16);
                // Some fonts declare a length that runs past the end of the table, only read what
                // is actually there.
                let num_indices = (remaining >> 1).min(ctxt.scope().data().len() / size::U16);
                let glyph_id_array = ctxt.read_array::<U16Be>(num_indices)?;
                Ok(CmapSubtable::Format4 {
                    language,
                    end_codes,
                    start_codes,
                    id_deltas,
                    id_range_offsets,
                    glyph_id_array,
                })
            }
            6 => {
                let _length = ctxt.read_u16be()?;
                let language = ctxt.read_u16be()?;
                let first_code = ctxt.read_u16be()?;
                let entry_count = usize::from(ctxt.read_u16be()?);
                let glyph_id_array = ctxt.read_array::<U16Be>(entry_count)?;
                Ok(CmapSubtable::Format6 {
                    language,
                    first_code,
                    glyph_id_array,
                })
            }
            12 => {
                let reserved = ctxt.read_u16be()?;
                ctxt.check(reserved == 0)?;
                let _length = ctxt.read_u32be()?;
                let language = ctxt.read_u32be()?;
                let num_groups = usize::try_from(ctxt.read_u32be()?)?;
                let groups = ctxt.read_array::<SequentialMapGroup>(num_groups)?;
                Ok(CmapSubtable::Format12 { language, groups })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadFrom for SequentialMapGroup {
    type ReadType = (U32Be, U32Be, U32Be);

    fn read_from((start_char_code, end_char_code, start_glyph_id): (u32, u32, u32)) -> Self {
        SequentialMapGroup {
            start_char_code,
            end_char_code,
            start_glyph_id,
        }
    }
}

impl<'a> Cmap<'a> {

    pub fn encoding_records(&self) -> impl Iterator<Item = EncodingRecord> + 'a {
        self.encoding_records.iter()
    }

    /// Read the subtable referenced by `record`
    pub fn subtable(&self, record: &EncodingRecord) -> Result<CmapSubtable<'a>, ParseError> {
        let offset = usize::try_from(record.offset)?;
        self.scope.offset(offset).read::<CmapSubtable<'_>>()
    }
}

impl<'a> CmapSubtable<'a> {
    pub fn format(&self) -> u16 {
        match self {
            CmapSubtable::Format0 { .. } => 0,
            CmapSubtable::Format4 { .. } => 4,
            CmapSubtable::Format6 { .. } => 6,
            CmapSubtable::Format12 { .. } => 12,
        }
    }

    /// Map a single character code to a glyph index.
    ///
    /// Returns `Ok(None)` when the code is outside every range of the subtable.
    pub fn map_glyph(&self, ch: u32) -> Result<Option<u16>, ParseError> {
        match *self {
            CmapSubtable::Format0 {
                ref glyph_id_array, ..
            } => {
                let index = usize::try_from(ch)?;
                Ok(glyph_id_array.get_item(index).map(u16::from))
            }
            CmapSubtable::Format4 {
                ref end_codes,
                ref start_codes,
                ref id_deltas,
                ref id_range_offsets,
                ref glyph_id_array,
                ..
            } => {
                // Segments are sorted by end code so the first segment ending at or after `ch` is
                // the only candidate.
                let i = match end_codes.binary_search_by(|end| u32::from(end).cmp(&ch)) {
                    Ok(i) | Err(i) => i,
                };
                let (start_code, id_delta, id_range_offset) = match (
                    start_codes.get_item(i),
                    id_deltas.get_item(i),
                    id_range_offsets.get_item(i),
                ) {
                    (Some(start), Some(delta), Some(range_offset)) => {
                        (u32::from(start), i32::from(delta), usize::from(range_offset))
                    }
                    _ => return Ok(None),
                };
                if ch < start_code {
                    return Ok(None);
                }

                if id_range_offset == 0 {
                    let glyph_id = (((ch as i32) + id_delta) as u32) & 0xFFFF;
                    Ok(Some(glyph_id as u16))
                } else {
                    // idRangeOffset is a byte offset from its own position in the
                    // idRangeOffsets array into the glyphIdArray that follows it.
                    let glyph_id_offset = id_range_offset + i * 2 + ((ch - start_code) as usize) * 2;
                    let seg_count = id_range_offsets.len();
                    if glyph_id_offset < seg_count * 2 || (glyph_id_offset & 1) != 0 {
                        return Err(ParseError::BadIndex);
                    }
                    let index = (glyph_id_offset >> 1) - seg_count;
                    match glyph_id_array.get_item(index) {
                        Some(0) => Ok(Some(0)),
                        Some(glyph_id) => {
                            let glyph_id = ((i32::from(glyph_id) + id_delta) as u32) & 0xFFFF;
                            Ok(Some(glyph_id as u16))
                        }
                        None => Err(ParseError::BadIndex),
                    }
                }
            }
            CmapSubtable::Format6 {
                first_code,
                ref glyph_id_array,
                ..
            } => {
                let first_code = u32::from(first_code);
                if first_code <= ch {
                    let index = usize::try_from(ch - first_code)?;
                    Ok(glyph_id_array.get_item(index))
                } else {
                    Ok(None)
                }
            }
            CmapSubtable::Format12 { ref groups, .. } => {
                let index = groups.binary_search_by(|group| {
                    if group.end_char_code < ch {
                        std::cmp::Ordering::Less
                    } else if group.start_char_code > ch {
                        std::cmp::Ordering::Greater
                    } else {
                        std::cmp::Ordering::Equal
                    }
                });
                match index.ok().and_then(|index| groups.get_item(index)) {
                    Some(group) => {
                        let glyph_id = group.start_glyph_id + (ch - group.start_char_code);
                        Ok(Some(u16::try_from(glyph_id)?))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    /// Call `f` with every (character, glyph) pair mapped by this subtable.
    ///
    /// Pairs that map to glyph 0 are skipped. Codes in a format 4 segment whose glyph cannot be
    /// read are skipped as well.
    pub fn mappings<F>(&self, mut f: F) -> Result<(), ParseError>
    where
        F: FnMut(u32, u16),
    {
        match self {
            CmapSubtable::Format0 { glyph_id_array, .. } => {
                for (ch, glyph_id) in glyph_id_array.iter().enumerate() {
                    if glyph_id != 0 {
                        f(ch as u32, u16::from(glyph_id));
                    }
                }
            }
            CmapSubtable::Format4 {
                end_codes,
                start_codes,
                ..
            } => {
                for (start, end) in start_codes.iter().zip(end_codes.iter()) {
                    if start > end {
                        continue;
                    }
                    for ch in u32::from(start)..=u32::from(end) {
                        if ch == 0xFFFF {
                            break;
                        }
                        if let Ok(Some(glyph_id)) = self.map_glyph(ch) {
                            if glyph_id != 0 {
                                f(ch, glyph_id);
                            }
                        }
                    }
                }
            }
            CmapSubtable::Format6 {
                first_code,
                glyph_id_array,
                ..
            } => {
                for (i, glyph_id) in glyph_id_array.iter().enumerate() {
                    if glyph_id != 0 {
                        f(u32::from(*first_code) + i as u32, glyph_id);
                    }
                }
            }
            CmapSubtable::Format12 { groups, .. } => {
                for group in groups.iter() {
                    let end = group.end_char_code.min(MAX_CODE_POINT);
                    if group.start_char_code > end {
                        continue;
                    }
                    for ch in group.start_char_code..=end {
                        let glyph_id = group.start_glyph_id + (ch - group.start_char_code);
                        match u16::try_from(glyph_id) {
                            Ok(0) => {}
                            Ok(glyph_id) => f(ch, glyph_id),
                            Err(_) => break,
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Which kind of encoding the Unicode side of a `CharMap` came from
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CharMapKind {
    Unicode,
    Symbol,
    MacRoman,
    None,
}

/// Owned character to glyph index map built from a font's `cmap` table.
///
/// A format 0 subtable, when present, maps codes 0 to 255 directly. The chosen Unicode subtable
/// extends that map for every code the direct map leaves unmapped; it never overrides an entry
/// of the direct map.
#[derive(Debug, Clone)]
pub struct CharMap {
    direct: Option<Box<[u16; 256]>>,
    map: FxHashMap<u32, u16>,
    kind: CharMapKind,
}

/// Subtables tried in order when picking the Unicode side of a `CharMap`.
const PREFERRED_SUBTABLES: &[(u16, u16, u16, CharMapKind)] = &[
    // (platform, encoding, format, kind)
    (3, 10, 12, CharMapKind::Unicode),
    (0, 6, 12, CharMapKind::Unicode),
    (0, 4, 12, CharMapKind::Unicode),
    (3, 1, 4, CharMapKind::Unicode),
    (0, 3, 4, CharMapKind::Unicode),
    (0, 2, 4, CharMapKind::Unicode),
    (0, 1, 4, CharMapKind::Unicode),
    (0, 0, 4, CharMapKind::Unicode),
    (3, 0, 4, CharMapKind::Symbol),
    (1, 0, 6, CharMapKind::MacRoman),
];

impl CharMap {
    /// Build a `CharMap` from a parsed `cmap` table.
    pub fn new(cmap: &Cmap<'_>) -> Result<CharMap, ParseError> {
        let mut direct = None;
        for record in cmap.encoding_records() {
            if let Ok(subtable @ CmapSubtable::Format0 { .. }) = cmap.subtable(&record) {
                let mut table = Box::new([0u16; 256]);
                subtable.mappings(|ch, glyph_id| table[ch as usize] = glyph_id)?;
                direct = Some(table);
                break;
            }
        }

        let mut map = FxHashMap::default();
        let mut kind = CharMapKind::None;
        'outer: for &(platform_id, encoding_id, format, subtable_kind) in PREFERRED_SUBTABLES {
            for record in cmap.encoding_records() {
                if record.platform_id != platform_id || record.encoding_id != encoding_id {
                    continue;
                }
                let subtable = match cmap.subtable(&record) {
                    Ok(subtable) => subtable,
                    Err(_) => continue,
                };
                let acceptable = match format {
                    12 => subtable.format() == 12,
                    4 => subtable.format() == 4 || subtable.format() == 6,
                    _ => subtable.format() == 6,
                };
                if acceptable {
                    subtable.mappings(|ch, glyph_id| {
                        map.insert(ch, glyph_id);
                    })?;
                    kind = subtable_kind;
                    break 'outer;
                }
            }
        }

        if direct.is_none() && kind == CharMapKind::None {
            return Err(ParseError::UnsuitableCmap);
        }
        if kind == CharMapKind::None && direct.is_some() {
            kind = CharMapKind::MacRoman;
        }

        Ok(CharMap { direct, map, kind })
    }

    /// A `CharMap` that maps every character to the glyph with the same index
    pub fn identity() -> CharMap {
        CharMap {
            direct: None,
            map: FxHashMap::default(),
            kind: CharMapKind::None,
        }
    }

    pub fn kind(&self) -> CharMapKind {
        self.kind
    }

    /// Look up `ch`, returning `None` if the font has no explicit mapping for it.
    pub fn lookup(&self, ch: u32) -> Option<u16> {
        if let Some(direct) = &self.direct {
            if let Some(&glyph_id) = direct.get(ch as usize) {
                if glyph_id != 0 {
                    return Some(glyph_id);
                }
            }
        }
        if let Some(&glyph_id) = self.map.get(&ch) {
            return Some(glyph_id);
        }
        if self.kind == CharMapKind::Symbol && (0x20..=0xFF).contains(&ch) {
            return self.map.get(&(SYMBOL_BASE + ch)).copied();
        }
        None
    }

    /// Map `ch` to a glyph index.
    ///
    /// Characters without an entry map to the glyph with the same index, which is what symbol
    /// fonts with incomplete maps expect. Characters beyond the glyph index range map to 0.
    pub fn map_char(&self, ch: u32) -> u16 {
        self.lookup(ch)
            .unwrap_or_else(|| u16::try_from(ch).unwrap_or(0))
    }

    /// Iterate every explicitly mapped character and its glyph index.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u16)> + '_ {
        let direct = self.direct.iter().flat_map(|table| {
            table
                .iter()
                .enumerate()
                .filter(|(_, glyph_id)| **glyph_id != 0)
                .map(|(ch, &glyph_id)| (ch as u32, glyph_id))
        });
        let extended = self.map.iter().filter_map(move |(&ch, &glyph_id)| {
            match self.direct.as_ref().and_then(|table| table.get(ch as usize)) {
                Some(&direct_glyph) if direct_glyph != 0 => None,
                _ => Some((ch, glyph_id)),
            }
        });
        direct.chain(extended)
    }
}
