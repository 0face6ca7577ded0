#![deny(missing_docs)]

//! `kern` table parsing.
//!
//! Only horizontal format 0 subtables (ordered glyph pairs) are read. Other formats are skipped.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/kern>

use log::debug;

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{I16Be, U16Be};
use crate::error::ParseError;

/// `kern` Kerning Table.
pub struct KernTable<'a> {
    /// Number of subtables in the kerning table.
    table_count: u16,
    data: &'a [u8],
}

/// Sub-table within `kern` table.
pub struct KernSubtable<'a> {
    coverage: u16,
    /// Pairs of a format 0 subtable, `None` for other formats.
    pairs: Option<ReadArray<'a, KernPair>>,
}

/// Kerning value for glyph pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KernPair {
    /// The glyph index for the left-hand glyph in the kerning pair.
    pub left: u16,
    /// The glyph index for the right-hand glyph in the kerning pair.
    pub right: u16,
    /// The kerning value for the above pair, in font design units. Negative values move the
    /// glyphs closer together.
    pub value: i16,
}

impl ReadBinary for KernTable<'_> {
    type HostType<'a> = KernTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let version = ctxt.read_u16be()?;
        ctxt.check_version(version == 0)?;
        let table_count = ctxt.read_u16be()?;

        // Validate that there is enough data present to read all the subtables, and determine a
        // length to read.
        let start = ctxt.scope();
        let mut len = 0;
        for _ in 0..table_count {
            let version = ctxt.read_u16be()?;
            ctxt.check_version(version == 0)?;
            let subtable_length = ctxt.read_u16be().map(usize::from)?;
            ctxt.check(subtable_length >= 6)?;
            let _ = ctxt.read_slice(subtable_length - 4)?;
            len += subtable_length;
        }

        let data = start.ctxt().read_slice(len)?;

        Ok(KernTable { table_count, data })
    }
}

impl<'a> KernTable<'a> {
    /// Iterate over the sub-tables of this `kern` table.
    pub fn sub_tables(&self) -> impl Iterator<Item = Result<KernSubtable<'a>, ParseError>> + 'a {
        let mut ctxt = ReadScope::new(self.data).ctxt();
        (0..self.table_count).map(move |_| {
            let _version = ctxt.read_u16be()?;
            let length = ctxt.read_u16be().map(usize::from)?;
            let coverage = ctxt.read_u16be()?;
            let body = ctxt.read_slice(length - 6)?;
            let format = coverage >> 8;
            let pairs = match format {
                0 => Some(Self::read_format0(&mut ReadScope::new(body).ctxt())?),
                _ => {
                    debug!("skipping kern subtable format {}", format);
                    None
                }
            };

            Ok(KernSubtable { coverage, pairs })
        })
    }

    fn read_format0(ctxt: &mut ReadCtxt<'a>) -> Result<ReadArray<'a, KernPair>, ParseError> {
        let n_pairs = ctxt.read_u16be()?;
        let _search_range = ctxt.read_u16be()?;
        let _entry_selector = ctxt.read_u16be()?;
        let _range_shift = ctxt.read_u16be()?;
        ctxt.read_array(usize::from(n_pairs))
    }

    /// All pairs of the horizontal, non-minimum format 0 subtables.
    ///
    /// Subtables that fail to parse are skipped.
    pub fn horizontal_pairs(&self) -> Vec<KernPair> {
        self.sub_tables()
            .filter_map(Result::ok)
            .filter(|subtable| subtable.is_horizontal() && !subtable.is_minimum())
            .flat_map(|subtable| subtable.pairs.map(|pairs| pairs.to_vec()).unwrap_or_default())
            .collect()
    }
}

impl<'a> KernSubtable<'a> {
    /// True if table has horizontal data, false if vertical.
    pub fn is_horizontal(&self) -> bool {
        self.coverage & 1 != 0
    }

    /// If true the table has minimum values, otherwise the table has kerning values.
    pub fn is_minimum(&self) -> bool {
        self.coverage & (1 << 1) != 0
    }

    /// Lookup the kerning for a pair of glyphs.
    pub fn lookup(&self, left: u16, right: u16) -> Option<i16> {
        let pairs = self.pairs.as_ref()?;
        // Pairs are ordered by left then right glyph, treated as a single 32-bit key.
        let needle = (u32::from(left) << 16) | u32::from(right);
        pairs
            .binary_search_by(|pair| pair.search_key().cmp(&needle))
            .ok()
            .and_then(|index| pairs.get_item(index))
            .map(|pair| pair.value)
    }
}

impl KernPair {
    fn search_key(&self) -> u32 {
        (u32::from(self.left) << 16) | u32::from(self.right)
    }
}

impl ReadFrom for KernPair {
    type ReadType = (U16Be, U16Be, I16Be);

    fn read_from((left, right, value): (u16, u16, i16)) -> Self {
        KernPair { left, right, value }
    }
}
