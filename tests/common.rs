// Builders for synthetic font data used by the unit and integration tests.
//
// Every font is assembled from scratch so that the tests do not depend on binary fixtures.

use std::collections::BTreeMap;

fn tag(name: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*name)
}

fn push_u16(data: &mut Vec<u8>, value: u16) {
    data.extend_from_slice(&value.to_be_bytes());
}

fn push_i16(data: &mut Vec<u8>, value: i16) {
    data.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(data: &mut Vec<u8>, value: u32) {
    data.extend_from_slice(&value.to_be_bytes());
}

fn pad_to_4(data: &mut Vec<u8>) {
    while data.len() % 4 != 0 {
        data.push(0);
    }
}

/// Sum of the big-endian u32 words of `data`, zero padded.
pub fn table_checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// A simple glyph with one contour holding a single on-curve point.
pub fn simple_glyph_data() -> Vec<u8> {
    let mut data = Vec::new();
    push_i16(&mut data, 1); // numberOfContours
    for value in [0i16, 0, 100, 100] {
        push_i16(&mut data, value);
    }
    push_u16(&mut data, 0); // endPtsOfContours[0]
    push_u16(&mut data, 0); // instructionLength
    data.push(0x01); // flags: on curve, 16-bit coordinates
    push_i16(&mut data, 100);
    push_i16(&mut data, 100);
    data
}

/// A composite glyph referencing `components` with 16-bit xy offsets.
pub fn composite_glyph_data(components: &[u16]) -> Vec<u8> {
    const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
    const ARGS_ARE_XY_VALUES: u16 = 0x0002;
    const MORE_COMPONENTS: u16 = 0x0020;

    let mut data = Vec::new();
    push_i16(&mut data, -1);
    for value in [0i16, 0, 200, 200] {
        push_i16(&mut data, value);
    }
    for (index, glyph_id) in components.iter().enumerate() {
        let mut flags = ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES;
        if index + 1 < components.len() {
            flags |= MORE_COMPONENTS;
        }
        push_u16(&mut data, flags);
        push_u16(&mut data, *glyph_id);
        push_i16(&mut data, 10 * index as i16);
        push_i16(&mut data, 0);
    }
    data
}

/// An `OS/2` table of the given version. Versions 2 and later have a cap height of 700.
pub fn os2_table_data(version: u16, code_page1: u32, weight: u16) -> Vec<u8> {
    let mut data = Vec::new();
    push_u16(&mut data, version);
    push_i16(&mut data, 500); // xAvgCharWidth
    push_u16(&mut data, weight);
    push_u16(&mut data, 5); // usWidthClass
    push_u16(&mut data, 0); // fsType: installable
    data.extend_from_slice(&[0; 16]); // sub and superscript metrics
    push_i16(&mut data, 50); // yStrikeoutSize
    push_i16(&mut data, 250); // yStrikeoutPosition
    push_i16(&mut data, 0); // sFamilyClass
    data.extend_from_slice(&[2, 0, 5, 3, 0, 0, 0, 0, 0, 0]); // panose
    data.extend_from_slice(&[0; 16]); // ulUnicodeRange1-4
    push_u32(&mut data, tag(b"TEST"));
    push_u16(&mut data, if weight >= 700 { 1 << 5 } else { 1 << 6 });
    push_u16(&mut data, 0x20);
    push_u16(&mut data, 0xFFFF);
    push_i16(&mut data, 800); // sTypoAscender
    push_i16(&mut data, -200); // sTypoDescender
    push_i16(&mut data, 90); // sTypoLineGap
    push_u16(&mut data, 900); // usWinAscent
    push_u16(&mut data, 250); // usWinDescent
    if version >= 1 {
        push_u32(&mut data, code_page1);
        push_u32(&mut data, 0);
    }
    if version >= 2 {
        push_i16(&mut data, 450); // sxHeight
        push_i16(&mut data, 700); // sCapHeight
        push_u16(&mut data, 0); // usDefaultChar
        push_u16(&mut data, 0x20); // usBreakChar
        push_u16(&mut data, 1); // usMaxContext
    }
    data
}

/// A version 3 `post` table.
pub fn post_table_data(angle_degrees: i32, fixed_pitch: bool) -> Vec<u8> {
    let mut data = Vec::new();
    push_u32(&mut data, 0x00030000);
    data.extend_from_slice(&(angle_degrees << 16).to_be_bytes());
    push_i16(&mut data, -100); // underlinePosition
    push_i16(&mut data, 50); // underlineThickness
    push_u32(&mut data, u32::from(fixed_pitch));
    data.extend_from_slice(&[0; 16]); // memory usage
    data
}

/// A `PCLT` table with the given cap height.
pub fn pclt_table_data(cap_height: u16) -> Vec<u8> {
    let mut data = Vec::new();
    push_u16(&mut data, 1);
    push_u16(&mut data, 0);
    push_u32(&mut data, 0x8000_0000); // fontNumber
    push_u16(&mut data, 500); // pitch
    push_u16(&mut data, 450); // xHeight
    push_u16(&mut data, 0); // style
    push_u16(&mut data, 0); // typeFamily
    push_u16(&mut data, cap_height);
    push_u16(&mut data, 0); // symbolSet
    data.extend_from_slice(&[b' '; 16]); // typeface
    data.extend_from_slice(&[0; 8]); // characterComplement
    data.extend_from_slice(&[b' '; 6]); // fileName
    data.extend_from_slice(&[0, 0, 0, 0]); // strokeWeight, widthType, serifStyle, reserved
    data
}

/// A format 0 `kern` table holding the given pairs.
pub fn kern_table_data(pairs: &[(u16, u16, i16)]) -> Vec<u8> {
    let mut pairs = pairs.to_vec();
    pairs.sort_by_key(|(left, right, _)| (*left, *right));

    let mut data = Vec::new();
    push_u16(&mut data, 0); // version
    push_u16(&mut data, 1); // nTables
    push_u16(&mut data, 0); // subtable version
    push_u16(&mut data, (14 + 6 * pairs.len()) as u16);
    push_u16(&mut data, 0x0001); // coverage: horizontal, format 0
    push_u16(&mut data, pairs.len() as u16);
    let (search_range, entry_selector, range_shift) = binary_search_params(pairs.len(), 6);
    push_u16(&mut data, search_range);
    push_u16(&mut data, entry_selector);
    push_u16(&mut data, range_shift);
    for (left, right, value) in pairs {
        push_u16(&mut data, left);
        push_u16(&mut data, right);
        push_i16(&mut data, value);
    }
    data
}

fn binary_search_params(count: usize, unit: usize) -> (u16, u16, u16) {
    let mut entry_selector = 0;
    while count >= (2 << entry_selector) {
        entry_selector += 1;
    }
    let search_range = if count == 0 { 0 } else { (1 << entry_selector) * unit };
    let range_shift = (count * unit).saturating_sub(search_range);
    (search_range as u16, entry_selector as u16, range_shift as u16)
}

/// A format 4 subtable with one segment per character.
fn cmap_format4(mappings: &BTreeMap<u32, u16>) -> Vec<u8> {
    let mut segments = mappings
        .iter()
        .filter(|(ch, _)| **ch < 0xFFFF)
        .map(|(ch, glyph)| (*ch as u16, glyph.wrapping_sub(*ch as u16)))
        .collect::<Vec<_>>();
    segments.push((0xFFFF, 1));

    let seg_count = segments.len();
    let (search_range, entry_selector, range_shift) = binary_search_params(seg_count, 2);
    let mut data = Vec::new();
    push_u16(&mut data, 4);
    push_u16(&mut data, (16 + 8 * seg_count) as u16);
    push_u16(&mut data, 0); // language
    push_u16(&mut data, (seg_count * 2) as u16);
    push_u16(&mut data, search_range);
    push_u16(&mut data, entry_selector);
    push_u16(&mut data, range_shift);
    for (ch, _) in &segments {
        push_u16(&mut data, *ch); // endCode
    }
    push_u16(&mut data, 0); // reservedPad
    for (ch, _) in &segments {
        push_u16(&mut data, *ch); // startCode
    }
    for (_, delta) in &segments {
        push_u16(&mut data, *delta);
    }
    for _ in &segments {
        push_u16(&mut data, 0); // idRangeOffset
    }
    data
}

fn cmap_format12(mappings: &BTreeMap<u32, u16>) -> Vec<u8> {
    let mut data = Vec::new();
    push_u16(&mut data, 12);
    push_u16(&mut data, 0);
    push_u32(&mut data, (16 + 12 * mappings.len()) as u32);
    push_u32(&mut data, 0); // language
    push_u32(&mut data, mappings.len() as u32);
    for (ch, glyph) in mappings {
        push_u32(&mut data, *ch);
        push_u32(&mut data, *ch);
        push_u32(&mut data, u32::from(*glyph));
    }
    data
}

fn cmap_format0(mappings: &BTreeMap<u8, u8>) -> Vec<u8> {
    let mut data = Vec::new();
    push_u16(&mut data, 0);
    push_u16(&mut data, 262);
    push_u16(&mut data, 0);
    let mut glyphs = [0u8; 256];
    for (ch, glyph) in mappings {
        glyphs[usize::from(*ch)] = *glyph;
    }
    data.extend_from_slice(&glyphs);
    data
}

/// Build a `cmap` table from (platform, encoding, subtable) triples.
pub fn cmap_table_data(subtables: &[(u16, u16, Vec<u8>)]) -> Vec<u8> {
    let mut data = Vec::new();
    push_u16(&mut data, 0);
    push_u16(&mut data, subtables.len() as u16);
    let mut offset = 4 + 8 * subtables.len();
    for (platform, encoding, subtable) in subtables {
        push_u16(&mut data, *platform);
        push_u16(&mut data, *encoding);
        push_u32(&mut data, offset as u32);
        offset += subtable.len();
    }
    for (_, _, subtable) in subtables {
        data.extend_from_slice(subtable);
    }
    data
}

/// Build a `name` table. Windows records are UTF-16BE, Macintosh records are ASCII.
pub fn name_table_data(windows: &[(u16, &str)], mac: &[(u16, &str)]) -> Vec<u8> {
    let mut records = Vec::new();
    let mut storage = Vec::new();
    for (name_id, value) in mac {
        let offset = storage.len();
        storage.extend_from_slice(value.as_bytes());
        records.push((1u16, 0u16, 0u16, *name_id, storage.len() - offset, offset));
    }
    for (name_id, value) in windows {
        let offset = storage.len();
        for unit in value.encode_utf16() {
            push_u16(&mut storage, unit);
        }
        records.push((3, 1, 0x409, *name_id, storage.len() - offset, offset));
    }

    let mut data = Vec::new();
    push_u16(&mut data, 0); // format
    push_u16(&mut data, records.len() as u16);
    push_u16(&mut data, (6 + 12 * records.len()) as u16);
    for (platform, encoding, language, name_id, length, offset) in records {
        push_u16(&mut data, platform);
        push_u16(&mut data, encoding);
        push_u16(&mut data, language);
        push_u16(&mut data, name_id);
        push_u16(&mut data, length as u16);
        push_u16(&mut data, offset as u16);
    }
    data.extend_from_slice(&storage);
    data
}

/// Assemble an sfnt from its tables, computing checksums and the `head` checksum adjustment.
pub fn assemble_sfnt(version: u32, tables: &BTreeMap<u32, Vec<u8>>) -> Vec<u8> {
    let num_tables = tables.len();
    let (search_range, entry_selector, range_shift) = binary_search_params(num_tables, 16);
    let mut data = Vec::new();
    push_u32(&mut data, version);
    push_u16(&mut data, num_tables as u16);
    push_u16(&mut data, search_range);
    push_u16(&mut data, entry_selector);
    push_u16(&mut data, range_shift);

    let mut offset = 12 + 16 * num_tables;
    for (table_tag, table) in tables {
        push_u32(&mut data, *table_tag);
        push_u32(&mut data, table_checksum(table));
        push_u32(&mut data, offset as u32);
        push_u32(&mut data, table.len() as u32);
        offset += (table.len() + 3) & !3;
    }

    let mut head_offset = None;
    for (table_tag, table) in tables {
        if *table_tag == tag(b"head") {
            head_offset = Some(data.len());
        }
        data.extend_from_slice(table);
        pad_to_4(&mut data);
    }

    if let Some(head_offset) = head_offset {
        let adjustment = 0xB1B0_AFBAu32.wrapping_sub(table_checksum(&data));
        data[head_offset + 8..head_offset + 12].copy_from_slice(&adjustment.to_be_bytes());
    }
    data
}

/// Combine complete sfnt fonts into a TrueType collection.
///
/// Each font's tables are copied after the collection header and its offsets rebased.
pub fn assemble_collection(fonts: &[Vec<u8>]) -> Vec<u8> {
    let header_len = 12 + 4 * fonts.len();
    let directory_len = fonts
        .iter()
        .map(|font| 12 + 16 * usize::from(u16::from_be_bytes([font[4], font[5]])))
        .sum::<usize>();

    let mut data = Vec::new();
    push_u32(&mut data, tag(b"ttcf"));
    push_u32(&mut data, 0x00010000);
    push_u32(&mut data, fonts.len() as u32);
    let mut directory_offset = header_len;
    for font in fonts {
        push_u32(&mut data, directory_offset as u32);
        directory_offset += 12 + 16 * usize::from(u16::from_be_bytes([font[4], font[5]]));
    }

    let mut table_data = Vec::new();
    for font in fonts {
        let num_tables = usize::from(u16::from_be_bytes([font[4], font[5]]));
        data.extend_from_slice(&font[..12]);
        for index in 0..num_tables {
            let record = &font[12 + 16 * index..28 + 16 * index];
            let offset = u32::from_be_bytes([record[8], record[9], record[10], record[11]]);
            let length = u32::from_be_bytes([record[12], record[13], record[14], record[15]]);
            let new_offset = header_len + directory_len + table_data.len();
            let start = offset as usize;
            table_data.extend_from_slice(&font[start..start + length as usize]);
            pad_to_4(&mut table_data);

            data.extend_from_slice(&record[..8]);
            push_u32(&mut data, new_offset as u32);
            push_u32(&mut data, length);
        }
    }
    data.extend_from_slice(&table_data);
    data
}

/// Builder for synthetic TrueType (or CFF flavoured OpenType) fonts.
///
/// Every glyph defaults to the simple glyph from `simple_glyph_data` with an advance of 500.
#[derive(Clone)]
pub struct TrueTypeBuilder {
    num_glyphs: u16,
    units_per_em: u16,
    ascent: i16,
    descent: i16,
    mac_style: u16,
    advances: BTreeMap<u16, u16>,
    composites: BTreeMap<u16, Vec<u16>>,
    empty_glyphs: Vec<u16>,
    unicode_cmap: BTreeMap<u32, u16>,
    symbol_cmap: bool,
    mac_cmap: BTreeMap<u8, u8>,
    windows_names: Vec<(u16, String)>,
    mac_names: Vec<(u16, String)>,
    os2: Option<Vec<u8>>,
    pclt: Option<Vec<u8>>,
    post: Option<Vec<u8>>,
    kern: Vec<(u16, u16, i16)>,
    gsub: bool,
    short_loca: bool,
    cff: Option<Vec<u8>>,
    extra_tables: Vec<(u32, Vec<u8>)>,
}

impl TrueTypeBuilder {
    pub fn new(num_glyphs: u16) -> Self {
        TrueTypeBuilder {
            num_glyphs,
            units_per_em: 1000,
            ascent: 800,
            descent: -200,
            mac_style: 0,
            advances: BTreeMap::new(),
            composites: BTreeMap::new(),
            empty_glyphs: Vec::new(),
            unicode_cmap: BTreeMap::new(),
            symbol_cmap: false,
            mac_cmap: BTreeMap::new(),
            windows_names: vec![(1, String::from("Test Sans")), (2, String::from("Regular"))],
            mac_names: Vec::new(),
            os2: Some(os2_table_data(3, 1, 400)),
            pclt: None,
            post: Some(post_table_data(0, false)),
            kern: Vec::new(),
            gsub: false,
            short_loca: false,
            cff: None,
            extra_tables: Vec::new(),
        }
    }

    pub fn units_per_em(mut self, units_per_em: u16) -> Self {
        self.units_per_em = units_per_em;
        self
    }

    pub fn ascent_descent(mut self, ascent: i16, descent: i16) -> Self {
        self.ascent = ascent;
        self.descent = descent;
        self
    }

    pub fn mac_style(mut self, mac_style: u16) -> Self {
        self.mac_style = mac_style;
        self
    }

    pub fn advance(mut self, glyph_id: u16, advance: u16) -> Self {
        self.advances.insert(glyph_id, advance);
        self
    }

    pub fn composite(mut self, glyph_id: u16, components: &[u16]) -> Self {
        self.composites.insert(glyph_id, components.to_vec());
        self
    }

    pub fn empty_glyph(mut self, glyph_id: u16) -> Self {
        self.empty_glyphs.push(glyph_id);
        self
    }

    /// Map `ch` to `glyph_id` in the Windows Unicode subtable.
    pub fn map(mut self, ch: u32, glyph_id: u16) -> Self {
        self.unicode_cmap.insert(ch, glyph_id);
        self
    }

    /// Write the Windows subtable with the Symbol encoding (3, 0) instead of Unicode.
    pub fn symbol(mut self) -> Self {
        self.symbol_cmap = true;
        self
    }

    /// Map `ch` to `glyph_id` in a Macintosh Roman format 0 subtable.
    pub fn mac_map(mut self, ch: u8, glyph_id: u8) -> Self {
        self.mac_cmap.insert(ch, glyph_id);
        self
    }

    pub fn name(mut self, name_id: u16, value: &str) -> Self {
        self.windows_names.retain(|(id, _)| *id != name_id);
        self.windows_names.push((name_id, String::from(value)));
        self
    }

    pub fn mac_name(mut self, name_id: u16, value: &str) -> Self {
        self.mac_names.push((name_id, String::from(value)));
        self
    }

    pub fn os2(mut self, os2: Option<Vec<u8>>) -> Self {
        self.os2 = os2;
        self
    }

    pub fn pclt(mut self, cap_height: u16) -> Self {
        self.pclt = Some(pclt_table_data(cap_height));
        self
    }

    pub fn post(mut self, post: Option<Vec<u8>>) -> Self {
        self.post = post;
        self
    }

    pub fn kern(mut self, left: u16, right: u16, value: i16) -> Self {
        self.kern.push((left, right, value));
        self
    }

    pub fn gsub(mut self) -> Self {
        self.gsub = true;
        self
    }

    pub fn short_loca(mut self) -> Self {
        self.short_loca = true;
        self
    }

    /// Use `data` as the `CFF ` table, producing an OpenType font without `glyf` and `loca`.
    pub fn cff(mut self, data: Vec<u8>) -> Self {
        self.cff = Some(data);
        self
    }

    pub fn table(mut self, table_tag: &[u8; 4], data: Vec<u8>) -> Self {
        self.extra_tables.push((tag(table_tag), data));
        self
    }

    fn glyph_data(&self, glyph_id: u16) -> Vec<u8> {
        if self.empty_glyphs.contains(&glyph_id) {
            Vec::new()
        } else if let Some(components) = self.composites.get(&glyph_id) {
            composite_glyph_data(components)
        } else {
            simple_glyph_data()
        }
    }

    fn head(&self) -> Vec<u8> {
        let mut data = Vec::new();
        push_u16(&mut data, 1);
        push_u16(&mut data, 0);
        push_u32(&mut data, 0x00010000); // fontRevision
        push_u32(&mut data, 0); // checkSumAdjustment
        push_u32(&mut data, 0x5F0F3CF5);
        push_u16(&mut data, 0x000B); // flags
        push_u16(&mut data, self.units_per_em);
        data.extend_from_slice(&[0; 16]); // created, modified
        push_i16(&mut data, -50);
        push_i16(&mut data, self.descent);
        push_i16(&mut data, self.units_per_em as i16);
        push_i16(&mut data, self.ascent);
        push_u16(&mut data, self.mac_style);
        push_u16(&mut data, 8); // lowestRecPPEM
        push_i16(&mut data, 2); // fontDirectionHint
        push_i16(&mut data, if self.short_loca { 0 } else { 1 });
        push_i16(&mut data, 0); // glyphDataFormat
        data
    }

    fn hhea(&self, advance_width_max: u16) -> Vec<u8> {
        let mut data = Vec::new();
        push_u32(&mut data, 0x00010000);
        push_i16(&mut data, self.ascent);
        push_i16(&mut data, self.descent);
        push_i16(&mut data, 0); // lineGap
        push_u16(&mut data, advance_width_max);
        push_i16(&mut data, 0); // minLeftSideBearing
        push_i16(&mut data, 0); // minRightSideBearing
        push_i16(&mut data, self.units_per_em as i16); // xMaxExtent
        push_i16(&mut data, 1); // caretSlopeRise
        push_i16(&mut data, 0); // caretSlopeRun
        push_i16(&mut data, 0); // caretOffset
        data.extend_from_slice(&[0; 8]);
        push_i16(&mut data, 0); // metricDataFormat
        push_u16(&mut data, self.num_glyphs);
        data
    }

    fn maxp(&self) -> Vec<u8> {
        let mut data = Vec::new();
        if self.cff.is_some() {
            push_u32(&mut data, 0x00005000);
            push_u16(&mut data, self.num_glyphs);
        } else {
            push_u32(&mut data, 0x00010000);
            push_u16(&mut data, self.num_glyphs);
            for value in [1u16, 1, 2, 2, 2, 0, 0, 0, 0, 0, 0, 2, 1] {
                push_u16(&mut data, value);
            }
        }
        data
    }

    fn cmap(&self) -> Vec<u8> {
        let mut subtables = Vec::new();
        if !self.mac_cmap.is_empty() {
            subtables.push((1, 0, cmap_format0(&self.mac_cmap)));
        }
        if !self.unicode_cmap.is_empty() || self.mac_cmap.is_empty() {
            let encoding = if self.symbol_cmap { 0 } else { 1 };
            subtables.push((3, encoding, cmap_format4(&self.unicode_cmap)));
        }
        if self.unicode_cmap.keys().any(|ch| *ch > 0xFFFF) {
            subtables.push((3, 10, cmap_format12(&self.unicode_cmap)));
        }
        cmap_table_data(&subtables)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut tables = BTreeMap::new();

        let advances = (0..self.num_glyphs)
            .map(|glyph_id| self.advances.get(&glyph_id).copied().unwrap_or(500))
            .collect::<Vec<_>>();
        let mut hmtx = Vec::new();
        for advance in &advances {
            push_u16(&mut hmtx, *advance);
            push_i16(&mut hmtx, 0);
        }

        tables.insert(tag(b"head"), self.head());
        tables.insert(
            tag(b"hhea"),
            self.hhea(advances.iter().copied().max().unwrap_or(0)),
        );
        tables.insert(tag(b"hmtx"), hmtx);
        tables.insert(tag(b"maxp"), self.maxp());
        tables.insert(tag(b"cmap"), self.cmap());
        let windows_names = self
            .windows_names
            .iter()
            .map(|(id, value)| (*id, value.as_str()))
            .collect::<Vec<_>>();
        let mac_names = self
            .mac_names
            .iter()
            .map(|(id, value)| (*id, value.as_str()))
            .collect::<Vec<_>>();
        tables.insert(tag(b"name"), name_table_data(&windows_names, &mac_names));

        if let Some(cff) = &self.cff {
            tables.insert(tag(b"CFF "), cff.clone());
        } else {
            let mut glyf = Vec::new();
            let mut loca = Vec::new();
            for glyph_id in 0..self.num_glyphs {
                if self.short_loca {
                    push_u16(&mut loca, (glyf.len() / 2) as u16);
                } else {
                    push_u32(&mut loca, glyf.len() as u32);
                }
                glyf.extend_from_slice(&self.glyph_data(glyph_id));
                pad_to_4(&mut glyf);
            }
            if self.short_loca {
                push_u16(&mut loca, (glyf.len() / 2) as u16);
            } else {
                push_u32(&mut loca, glyf.len() as u32);
            }
            tables.insert(tag(b"glyf"), glyf);
            tables.insert(tag(b"loca"), loca);
            tables.insert(tag(b"cvt "), vec![0, 10, 0, 20]);
            tables.insert(tag(b"fpgm"), vec![0xB0, 0x00]);
            tables.insert(tag(b"prep"), vec![0xB0, 0x01]);
        }

        if let Some(os2) = &self.os2 {
            tables.insert(tag(b"OS/2"), os2.clone());
        }
        if let Some(pclt) = &self.pclt {
            tables.insert(tag(b"PCLT"), pclt.clone());
        }
        if let Some(post) = &self.post {
            tables.insert(tag(b"post"), post.clone());
        }
        if !self.kern.is_empty() {
            tables.insert(tag(b"kern"), kern_table_data(&self.kern));
        }
        if self.gsub {
            tables.insert(tag(b"GSUB"), vec![0, 1, 0, 0, 0, 10, 0, 12, 0, 14, 0, 0, 0, 0, 0, 0]);
        }
        for (table_tag, data) in &self.extra_tables {
            tables.insert(*table_tag, data.clone());
        }

        let version = if self.cff.is_some() {
            tag(b"OTTO")
        } else {
            0x00010000
        };
        assemble_sfnt(version, &tables)
    }
}

/// Read the raw data of table `table_tag` from a single (non-collection) sfnt.
pub fn find_table<'a>(font: &'a [u8], table_tag: &[u8; 4]) -> Option<&'a [u8]> {
    let num_tables = usize::from(u16::from_be_bytes([font[4], font[5]]));
    (0..num_tables).find_map(|index| {
        let record = &font[12 + 16 * index..28 + 16 * index];
        if record[..4] != table_tag[..] {
            return None;
        }
        let offset = u32::from_be_bytes([record[8], record[9], record[10], record[11]]) as usize;
        let length = u32::from_be_bytes([record[12], record[13], record[14], record[15]]) as usize;
        font.get(offset..offset + length)
    })
}

// CFF construction

fn cff_index(objects: &[Vec<u8>]) -> Vec<u8> {
    let mut data = Vec::new();
    push_u16(&mut data, objects.len() as u16);
    if objects.is_empty() {
        return data;
    }
    let last = 1 + objects.iter().map(|object| object.len()).sum::<usize>();
    let off_size = match last {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x10000..=0xFF_FFFF => 3,
        _ => 4,
    };
    data.push(off_size as u8);
    let mut offset = 1;
    let push_offset = |data: &mut Vec<u8>, offset: usize| {
        data.extend_from_slice(&(offset as u32).to_be_bytes()[4 - off_size..]);
    };
    push_offset(&mut data, offset);
    for object in objects {
        offset += object.len();
        push_offset(&mut data, offset);
    }
    for object in objects {
        data.extend_from_slice(object);
    }
    data
}

/// A DICT operand in the five byte integer encoding.
fn cff_int(data: &mut Vec<u8>, value: i32) {
    data.push(29);
    data.extend_from_slice(&value.to_be_bytes());
}

fn cff_op(data: &mut Vec<u8>, operator: u16) {
    if operator >= 0x0C00 {
        data.push(12);
        data.push((operator & 0xFF) as u8);
    } else {
        data.push(operator as u8);
    }
}

fn cff_dict(entries: &[(u16, Vec<i32>)]) -> Vec<u8> {
    let mut data = Vec::new();
    for (operator, operands) in entries {
        for operand in operands {
            cff_int(&mut data, *operand);
        }
        cff_op(&mut data, *operator);
    }
    data
}

const CFF_CHARSET: u16 = 15;
const CFF_CHAR_STRINGS: u16 = 17;
const CFF_PRIVATE: u16 = 18;
const CFF_STD_HW: u16 = 10;
const CFF_SUBRS: u16 = 19;
const CFF_ROS: u16 = 0x0C1E;
const CFF_CID_COUNT: u16 = 0x0C22;
const CFF_FD_ARRAY: u16 = 0x0C24;
const CFF_FD_SELECT: u16 = 0x0C25;

const CHAR_STRING: [u8; 4] = [0x8B, 0x8B, 0x15, 0x0E];

fn private_dict_and_subrs(std_hw: i32, subr: Vec<u8>) -> (Vec<u8>, Vec<u8>) {
    // two operators with five byte operands
    let private_len = 12;
    let private = cff_dict(&[(CFF_STD_HW, vec![std_hw]), (CFF_SUBRS, vec![private_len])]);
    (private, cff_index(&[subr]))
}

/// Lay out a CFF whose Top DICT depends on offsets after it. `build_top` is called once with
/// zero offsets to size the DICT, then with the real offsets.
fn cff_font(
    name: &str,
    strings: &[&str],
    build_top: impl Fn(usize) -> Vec<u8>,
    sections: impl Fn(usize) -> Vec<u8>,
) -> Vec<u8> {
    let header = vec![1, 0, 4, 4];
    let name_index = cff_index(&[name.as_bytes().to_vec()]);
    let string_index = cff_index(
        &strings
            .iter()
            .map(|string| string.as_bytes().to_vec())
            .collect::<Vec<_>>(),
    );
    let global_subrs = cff_index(&[]);

    let top_len = cff_index(&[build_top(0)]).len();
    let base = header.len() + name_index.len() + top_len + string_index.len() + global_subrs.len();

    let mut data = header;
    data.extend_from_slice(&name_index);
    data.extend_from_slice(&cff_index(&[build_top(base)]));
    data.extend_from_slice(&string_index);
    data.extend_from_slice(&global_subrs);
    data.extend_from_slice(&sections(base));
    data
}

/// A CID-keyed CFF font named "TestCID" with ROS Adobe-Identity-0.
///
/// Glyph `g` uses Font DICT `glyph_fds[g]` and, for `g >= 1`, has CID `g + first_cid - 1`. The
/// Private DICT of Font DICT `n` has StdHW `50 + 20n` and one local subroutine
/// `[0x8B, 0xA0 + n, 0xA0 + n, 0x0B]`.
pub fn cid_cff_data(glyph_fds: &[u8], first_cid: u16) -> Vec<u8> {
    let num_glyphs = glyph_fds.len();
    let num_fds = glyph_fds.iter().copied().max().map_or(1, |fd| usize::from(fd) + 1);

    let mut charset = vec![0];
    for glyph_id in 1..num_glyphs {
        push_u16(&mut charset, glyph_id as u16 + first_cid - 1);
    }

    let mut runs: Vec<(u16, u8)> = Vec::new();
    for (glyph_id, fd) in glyph_fds.iter().enumerate() {
        if runs.last().map_or(true, |(_, last_fd)| last_fd != fd) {
            runs.push((glyph_id as u16, *fd));
        }
    }
    let mut fd_select = vec![3];
    push_u16(&mut fd_select, runs.len() as u16);
    for (first, fd) in &runs {
        push_u16(&mut fd_select, *first);
        fd_select.push(*fd);
    }
    push_u16(&mut fd_select, num_glyphs as u16);

    let char_strings = cff_index(&vec![CHAR_STRING.to_vec(); num_glyphs]);
    let privates = (0..num_fds)
        .map(|fd| {
            let n = fd as u8;
            private_dict_and_subrs(50 + 20 * fd as i32, vec![0x8B, 0xA0 + n, 0xA0 + n, 0x0B])
        })
        .collect::<Vec<_>>();

    let charset_offset = |base: usize| base;
    let fd_select_offset = |base: usize| charset_offset(base) + charset.len();
    let char_strings_offset = |base: usize| fd_select_offset(base) + fd_select.len();
    let fd_array_offset = |base: usize| char_strings_offset(base) + char_strings.len();
    let font_dicts = |base: usize| {
        let fd_array_len = cff_index(&vec![cff_dict(&[(CFF_PRIVATE, vec![0, 0])]); num_fds]).len();
        let mut offset = fd_array_offset(base) + fd_array_len;
        privates
            .iter()
            .map(|(private, subrs)| {
                let dict = cff_dict(&[(CFF_PRIVATE, vec![private.len() as i32, offset as i32])]);
                offset += private.len() + subrs.len();
                dict
            })
            .collect::<Vec<_>>()
    };

    let build_top = |base: usize| {
        cff_dict(&[
            (CFF_ROS, vec![391, 392, 0]),
            (CFF_CID_COUNT, vec![i32::from(first_cid) + num_glyphs as i32]),
            (CFF_CHARSET, vec![charset_offset(base) as i32]),
            (CFF_FD_SELECT, vec![fd_select_offset(base) as i32]),
            (CFF_CHAR_STRINGS, vec![char_strings_offset(base) as i32]),
            (CFF_FD_ARRAY, vec![fd_array_offset(base) as i32]),
        ])
    };
    let sections = |base: usize| {
        let mut data = charset.clone();
        data.extend_from_slice(&fd_select);
        data.extend_from_slice(&char_strings);
        data.extend_from_slice(&cff_index(&font_dicts(base)));
        for (private, subrs) in &privates {
            data.extend_from_slice(private);
            data.extend_from_slice(subrs);
        }
        data
    };

    cff_font("TestCID", &["Adobe", "Identity"], build_top, sections)
}

/// A name-keyed CFF font named "TestType1" with a custom charset, a Private DICT (StdHW 50) and
/// one local subroutine. Each CharString is distinct.
pub fn type1_cff_data(num_glyphs: u16) -> Vec<u8> {
    let mut charset = vec![0];
    for glyph_id in 1..num_glyphs {
        // SIDs from the standard strings, "space" onwards
        push_u16(&mut charset, glyph_id);
    }

    let objects = (0..num_glyphs)
        .map(|glyph_id| vec![0x8B, 0x8B + (glyph_id % 100) as u8, 0x15, 0x0E])
        .collect::<Vec<_>>();
    let char_strings = cff_index(&objects);
    let (private, subrs) = private_dict_and_subrs(50, vec![0x8B, 0x8B, 0x0B]);

    let charset_offset = |base: usize| base;
    let char_strings_offset = |base: usize| charset_offset(base) + charset.len();
    let private_offset = |base: usize| char_strings_offset(base) + char_strings.len();

    let build_top = |base: usize| {
        cff_dict(&[
            (CFF_CHARSET, vec![charset_offset(base) as i32]),
            (CFF_CHAR_STRINGS, vec![char_strings_offset(base) as i32]),
            (
                CFF_PRIVATE,
                vec![private.len() as i32, private_offset(base) as i32],
            ),
        ])
    };
    let sections = |_base: usize| {
        let mut data = charset.clone();
        data.extend_from_slice(&char_strings);
        data.extend_from_slice(&private);
        data.extend_from_slice(&subrs);
        data
    };

    cff_font("TestType1", &[], build_top, sections)
}
