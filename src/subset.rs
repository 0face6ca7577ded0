//! Subsetting of font programs and re-assembly of sfnt files.
//!
//! Glyph indices are preserved by every subset: glyphs that are not needed become empty rather
//! than being removed, so `cmap`, `hmtx` and the PDF's glyph references stay valid unchanged.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::TryFrom;
use std::num::Wrapping;

use itertools::Itertools;
use log::debug;

use crate::binary::read::ReadScope;
use crate::binary::write::{Placeholder, WriteBinary, WriteBinaryDep, WriteBuffer, WriteContext};
use crate::binary::{long_align, U16Be, U32Be};
use crate::cff::subset_cff;
use crate::error::{ReadWriteError, WriteError};
use crate::tables::glyf::GlyfTable;
use crate::tables::loca::{self, LocaTable};
use crate::tables::{
    FontTableProvider, HeadTable, IndexToLocFormat, MaxpTable, TableRecord, CFF_MAGIC, TTF_MAGIC,
};
use crate::{checksum, tag};

/// Tables other than `head`, `glyf` and `loca` that are copied into a TrueType subset.
const COPIED_TABLES: [u32; 7] = [
    tag::CMAP,
    tag::CVT,
    tag::FPGM,
    tag::HHEA,
    tag::HMTX,
    tag::MAXP,
    tag::PREP,
];

/// Tables a TrueType subset cannot do without.
const REQUIRED_TABLES: [u32; 3] = [tag::HHEA, tag::HMTX, tag::MAXP];

/// A font program ready to be embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontProgram {
    /// A complete sfnt file, embedded as `/FontFile2`
    Sfnt(Vec<u8>),
    /// A bare CFF table, embedded as `/FontFile3`
    Cff(Vec<u8>),
}

impl FontProgram {
    pub fn data(&self) -> &[u8] {
        match self {
            FontProgram::Sfnt(data) | FontProgram::Cff(data) => data,
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        match self {
            FontProgram::Sfnt(data) | FontProgram::Cff(data) => data,
        }
    }
}

/// Writes the tables of an sfnt font and lays them out with a table directory.
pub struct FontBuilder {
    sfnt_version: u32,
    tables: BTreeMap<u32, WriteBuffer>,
}

/// A `FontBuilder` that has been given its `head` table.
pub struct FontBuilderWithHead {
    inner: FontBuilder,
    check_sum_adjustment: Placeholder<U32Be, u32>,
    index_to_loc_format: IndexToLocFormat,
}

struct TaggedBuffer {
    tag: u32,
    buffer: WriteBuffer,
}

struct OrderedTables {
    tables: Vec<TaggedBuffer>,
    checksum: Wrapping<u32>,
}

/// Subset the font from `provider` so that it holds glyph 0, the glyphs in `glyph_ids` and every
/// glyph those reference.
///
/// CFF flavoured fonts produce a bare CFF table, for CID-keyed ones `glyph_ids` holds CIDs.
/// TrueType fonts produce a complete sfnt file.
pub fn subset(
    provider: &impl FontTableProvider,
    glyph_ids: &BTreeSet<u16>,
) -> Result<FontProgram, ReadWriteError> {
    if provider.has_table(tag::CFF) {
        let cff_data = provider.read_table_data(tag::CFF)?;
        let cff = subset_cff(&cff_data, glyph_ids)?;
        debug!("CFF subset {} -> {} bytes", cff_data.len(), cff.len());
        Ok(FontProgram::Cff(cff))
    } else {
        subset_ttf(provider, glyph_ids).map(FontProgram::Sfnt)
    }
}

/// The complete font from `provider` in the form it is embedded in.
///
/// CFF flavoured fonts produce their CFF table unchanged. TrueType fonts are rebuilt from every
/// table of the face, which turns a member of a collection into a standalone font.
pub fn whole_program(provider: &impl FontTableProvider) -> Result<FontProgram, ReadWriteError> {
    if provider.has_table(tag::CFF) {
        let cff_data = provider.read_table_data(tag::CFF)?;
        Ok(FontProgram::Cff(cff_data.into_owned()))
    } else {
        whole_font(provider, &provider.table_tags()).map(FontProgram::Sfnt)
    }
}

/// Build a TrueType subset holding only the tables needed to render the retained glyphs.
///
/// The `loca` table keeps an entry for every glyph of the original font. Glyphs that are not
/// retained have zero length.
pub fn subset_ttf(
    provider: &impl FontTableProvider,
    glyph_ids: &BTreeSet<u16>,
) -> Result<Vec<u8>, ReadWriteError> {
    let head = ReadScope::new(&provider.read_table_data(tag::HEAD)?).read::<HeadTable>()?;
    let maxp = ReadScope::new(&provider.read_table_data(tag::MAXP)?).read::<MaxpTable>()?;
    let loca_data = provider.read_table_data(tag::LOCA)?;
    let loca = ReadScope::new(&loca_data)
        .read_dep::<LocaTable<'_>>((maxp.num_glyphs, head.index_to_loc_format))?;
    let glyf_data = provider.read_table_data(tag::GLYF)?;
    let glyf = ReadScope::new(&glyf_data).read_dep::<GlyfTable<'_>>(&loca)?;

    let subset_glyphs = glyf.subset(glyph_ids);
    debug!(
        "retaining {} of {} glyphs",
        subset_glyphs.records.iter().filter(|record| !record.is_empty()).count(),
        maxp.num_glyphs
    );

    let mut builder = FontBuilder::new(TTF_MAGIC);
    for table_tag in COPIED_TABLES {
        let data = if REQUIRED_TABLES.contains(&table_tag) {
            Some(provider.read_table_data(table_tag)?)
        } else {
            provider.table_data(table_tag)?
        };
        if let Some(data) = data {
            builder.add_table::<_, ReadScope<'_>>(table_tag, ReadScope::new(&data), ())?;
        }
    }
    let mut builder = builder.add_head_table(&head)?;
    builder.add_glyf_table(subset_glyphs)?;
    builder.data()
}

/// Construct a complete font from the supplied provider and tags.
pub fn whole_font<F: FontTableProvider>(
    provider: &F,
    tags: &[u32],
) -> Result<Vec<u8>, ReadWriteError> {
    let head = ReadScope::new(&provider.read_table_data(tag::HEAD)?).read::<HeadTable>()?;
    let maxp = ReadScope::new(&provider.read_table_data(tag::MAXP)?).read::<MaxpTable>()?;

    let sfnt_version = if tags.contains(&tag::CFF) {
        CFF_MAGIC
    } else {
        TTF_MAGIC
    };
    let mut builder = FontBuilder::new(sfnt_version);
    let mut wants_glyf = false;
    for &tag in tags {
        match tag {
            tag::GLYF => wants_glyf = true,
            tag::HEAD | tag::MAXP | tag::LOCA => (),
            _ => {
                builder.add_table::<_, ReadScope<'_>>(
                    tag,
                    ReadScope::new(&provider.read_table_data(tag)?),
                    (),
                )?;
            }
        }
    }
    // maxp and head are required for the font to be usable, so they're always added.
    builder.add_table::<_, MaxpTable>(tag::MAXP, &maxp, ())?;
    let mut builder_with_head = builder.add_head_table(&head)?;

    // glyf implies loca
    if wants_glyf {
        let loca_data = provider.read_table_data(tag::LOCA)?;
        let loca = ReadScope::new(&loca_data)
            .read_dep::<LocaTable<'_>>((maxp.num_glyphs, head.index_to_loc_format))?;
        let glyf_data = provider.read_table_data(tag::GLYF)?;
        let glyf = ReadScope::new(&glyf_data).read_dep::<GlyfTable<'_>>(&loca)?;
        builder_with_head.add_glyf_table(glyf)?;
    }
    builder_with_head.data()
}

impl FontBuilder {
    pub fn new(sfnt_version: u32) -> Self {
        FontBuilder {
            sfnt_version,
            tables: BTreeMap::new(),
        }
    }

    /// Write `table` as the table `tag`.
    ///
    /// `head`, `glyf` and `loca` are rejected, they are added through `add_head_table` and
    /// `add_glyf_table` which keep them consistent with each other.
    pub fn add_table<HostType, T: WriteBinaryDep<HostType>>(
        &mut self,
        tag: u32,
        table: HostType,
        args: T::Args,
    ) -> Result<T::Output, ReadWriteError> {
        if [tag::HEAD, tag::GLYF, tag::LOCA].contains(&tag) {
            return Err(ReadWriteError::Write(WriteError::BadValue));
        }

        self.add_table_inner::<HostType, T>(tag, table, args)
    }

    fn add_table_inner<HostType, T: WriteBinaryDep<HostType>>(
        &mut self,
        tag: u32,
        table: HostType,
        args: T::Args,
    ) -> Result<T::Output, ReadWriteError> {
        let mut buffer = WriteBuffer::new();
        let output = T::write_dep(&mut buffer, table, args)?;
        self.tables.insert(tag, buffer);

        Ok(output)
    }

    pub fn add_head_table(
        mut self,
        table: &HeadTable,
    ) -> Result<FontBuilderWithHead, ReadWriteError> {
        let placeholder = self.add_table_inner::<_, HeadTable>(tag::HEAD, table, ())?;

        Ok(FontBuilderWithHead {
            inner: self,
            check_sum_adjustment: placeholder,
            index_to_loc_format: table.index_to_loc_format,
        })
    }
}

impl FontBuilderWithHead {
    /// Write `table` and the `loca` table locating its glyphs.
    pub fn add_glyf_table(&mut self, table: GlyfTable<'_>) -> Result<(), ReadWriteError> {
        let loca = self.inner.add_table_inner::<_, GlyfTable<'_>>(
            tag::GLYF,
            table,
            self.index_to_loc_format,
        )?;
        self.inner.add_table_inner::<_, loca::owned::LocaTable>(
            tag::LOCA,
            loca,
            self.index_to_loc_format,
        )?;

        Ok(())
    }

    /// Returns a `Vec<u8>` containing the built font
    pub fn data(mut self) -> Result<Vec<u8>, ReadWriteError> {
        let mut font = WriteBuffer::new();

        self.write_offset_table(&mut font)?;
        let table_offset =
            long_align(self.inner.tables.len() * TableRecord::SIZE + font.bytes_written());

        let mut ordered_tables = self.write_table_directory(&mut font)?;

        let length = font.bytes_written();
        let padded_length = long_align(length);
        if padded_length != table_offset {
            return Err(ReadWriteError::Write(WriteError::PlaceholderMismatch));
        }
        font.write_zeros(padded_length - length)?;

        // The whole font, including the adjustment itself, must sum to 0xB1B0AFBA.
        let headers_checksum = checksum::table_checksum(font.bytes())?;
        let checksum = Wrapping(0xB1B0AFBA) - (headers_checksum + ordered_tables.checksum);

        let mut placeholder = Some(self.check_sum_adjustment);
        for TaggedBuffer { tag, buffer } in ordered_tables.tables.iter_mut() {
            if *tag == tag::HEAD {
                if let Some(placeholder) = placeholder.take() {
                    buffer.write_placeholder(placeholder, checksum.0)?;
                }
            }
            font.write_bytes(buffer.bytes())?;
        }

        Ok(font.into_inner())
    }

    fn write_offset_table(&self, font: &mut WriteBuffer) -> Result<(), WriteError> {
        let num_tables = u16::try_from(self.inner.tables.len())?;
        let n = max_power_of_2(num_tables);
        let search_range = (1 << n) * 16;
        let entry_selector = n;
        let range_shift = num_tables * 16 - search_range;

        U32Be::write(font, self.inner.sfnt_version)?;
        U16Be::write(font, num_tables)?;
        U16Be::write(font, search_range)?;
        U16Be::write(font, entry_selector)?;
        U16Be::write(font, range_shift)?;

        Ok(())
    }

    /// Pad each table, record its checksum and write the directory in tag order.
    fn write_table_directory(
        &mut self,
        font: &mut WriteBuffer,
    ) -> Result<OrderedTables, ReadWriteError> {
        let mut tables = Vec::with_capacity(self.inner.tables.len());
        let mut checksum = Wrapping(0);
        let mut table_offset =
            long_align(self.inner.tables.len() * TableRecord::SIZE + font.bytes_written());

        let tags = self.inner.tables.keys().cloned().collect_vec();
        for tag in tags {
            if let Some(mut table) = self.inner.tables.remove(&tag) {
                let length = table.len();
                let padded_length = long_align(length);
                table.write_zeros(padded_length - length)?;

                let table_checksum = checksum::table_checksum(table.bytes())?;
                checksum += table_checksum;

                let record = TableRecord {
                    table_tag: tag,
                    checksum: table_checksum.0,
                    offset: u32::try_from(table_offset).map_err(WriteError::from)?,
                    length: u32::try_from(length).map_err(WriteError::from)?,
                };

                table_offset += padded_length;
                TableRecord::write(font, &record)?;
                tables.push(TaggedBuffer { tag, buffer: table });
            }
        }

        Ok(OrderedTables { tables, checksum })
    }
}

/// Calculate the maximum power of 2 that is <= num
fn max_power_of_2(num: u16) -> u16 {
    15u16.saturating_sub(num.leading_zeros() as u16)
}
