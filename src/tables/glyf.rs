//! Reading and writing of the `glyf` table.
//!
//! Glyph outlines are carried as opaque byte ranges. Only the component references of
//! composite glyphs are decoded, which is all subsetting needs.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/glyf>

mod subset;

use std::convert::TryFrom;

use bitflags::bitflags;
use itertools::Itertools;
use log::warn;

use crate::binary::read::{ReadBinary, ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::write::{WriteBinary, WriteBinaryDep, WriteContext};
use crate::binary::{word_align, I16Be, U16Be};
use crate::error::{ParseError, WriteError};
use crate::tables::loca::{owned, LocaTable};
use crate::tables::{F2Dot14, IndexToLocFormat};

pub use subset::closure;

/// Size of the glyph header: numberOfContours followed by the bounding box.
const GLYPH_HEADER_SIZE: usize = 10;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct CompositeGlyphFlag: u16 {
        /// Bit 0: If this is set, the arguments are 16-bit (uint16 or int16); otherwise, they are
        /// bytes (uint8 or int8).
        const ARG_1_AND_2_ARE_WORDS = 0x0001;
        /// Bit 1: If this is set, the arguments are signed xy values; otherwise, they are unsigned
        /// point numbers.
        const ARGS_ARE_XY_VALUES = 0x0002;
        /// Bit 2: For the xy values if the preceding is true.
        const ROUND_XY_TO_GRID = 0x0004;
        /// Bit 3: This indicates that there is a simple scale for the component. Otherwise, scale = 1.0.
        const WE_HAVE_A_SCALE = 0x0008;
        /// Bit 5: Indicates at least one more glyph after this one.
        const MORE_COMPONENTS = 0x0020;
        /// Bit 6: The x direction will use a different scale from the y direction.
        const WE_HAVE_AN_X_AND_Y_SCALE = 0x0040;
        /// Bit 7: There is a 2 by 2 transformation that will be used to scale the component.
        const WE_HAVE_A_TWO_BY_TWO = 0x0080;
        /// Bit 8: Following the last component are instructions for the composite character.
        const WE_HAVE_INSTRUCTIONS = 0x0100;
        /// Bit 9: Use the advance width and side bearings of this component for the composite.
        const USE_MY_METRICS = 0x0200;
        /// Bit 10: The components of the compound glyph overlap.
        const OVERLAP_COMPOUND = 0x0400;
        /// Bit 11: The composite is designed to have the component offset scaled.
        const SCALED_COMPONENT_OFFSET = 0x0800;
        /// Bit 12: The composite is designed not to have the component offset scaled.
        const UNSCALED_COMPONENT_OFFSET = 0x1000;
    }
}

/// `glyf` table
#[derive(Debug, PartialEq)]
pub struct GlyfTable<'a> {
    pub records: Vec<GlyfRecord<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum GlyfRecord<'a> {
    Empty,
    Present {
        number_of_contours: i16,
        scope: ReadScope<'a>,
    },
}

#[derive(Debug, PartialEq, Clone)]
pub struct CompositeGlyph {
    pub flags: CompositeGlyphFlag,
    pub glyph_index: u16,
    pub argument1: CompositeGlyphArgument,
    pub argument2: CompositeGlyphArgument,
    pub scale: Option<CompositeGlyphScale>,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum CompositeGlyphArgument {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum CompositeGlyphScale {
    Scale(F2Dot14),
    XY { x_scale: F2Dot14, y_scale: F2Dot14 },
    Matrix([[F2Dot14; 2]; 2]),
}

/// The components of a composite glyph, in the order they appear.
pub struct CompositeGlyphs {
    pub glyphs: Vec<CompositeGlyph>,
    pub have_instructions: bool,
}

impl ReadBinaryDep for GlyfTable<'_> {
    type Args<'a> = &'a LocaTable<'a>;
    type HostType<'a> = GlyfTable<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        loca: Self::Args<'a>,
    ) -> Result<Self::HostType<'a>, ParseError> {
        if loca.offsets.len() < 2 {
            return Err(ParseError::BadIndex);
        }

        let table_len = ctxt.scope().data().len();
        let glyph_records = loca
            .offsets
            .iter()
            .tuple_windows()
            .map(|(start, end)| match end.checked_sub(start) {
                Some(0) => Ok(GlyfRecord::Empty),
                Some(length) => {
                    let offset = usize::try_from(start)?;
                    let mut length = usize::try_from(length)?;
                    if offset + length > table_len && offset < table_len {
                        // Some fonts have a final loca offset a little past the end of the
                        // table. Keep what is actually there.
                        warn!("glyph length out of bounds, truncating");
                        length = table_len - offset;
                    }
                    let scope = ctxt.scope().offset_length(offset, length)?;
                    let number_of_contours = scope.read::<I16Be>()?;
                    Ok(GlyfRecord::Present {
                        number_of_contours,
                        scope,
                    })
                }
                None => Err(ParseError::BadOffset),
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        Ok(GlyfTable {
            records: glyph_records,
        })
    }
}

impl<'a> WriteBinaryDep<Self> for GlyfTable<'a> {
    type Output = owned::LocaTable;
    type Args = IndexToLocFormat;

    /// Write this glyf table into `ctxt`, returning the matching `loca` offsets.
    ///
    /// Glyphs are padded to 16-bit alignment when `index_to_loc_format` is short, since short
    /// offsets are stored divided by two. Long offsets are written without padding.
    fn write_dep<C: WriteContext>(
        ctxt: &mut C,
        table: GlyfTable<'a>,
        index_to_loc_format: IndexToLocFormat,
    ) -> Result<Self::Output, WriteError> {
        let mut offsets: Vec<u32> = Vec::with_capacity(table.records.len() + 1);

        let start = ctxt.bytes_written();
        for record in table.records {
            let offset = ctxt.bytes_written();
            offsets.push(u32::try_from(offset - start)?);

            match record {
                GlyfRecord::Empty => (),
                GlyfRecord::Present { scope, .. } => ReadScope::write(ctxt, scope)?,
            }

            if index_to_loc_format == IndexToLocFormat::Short {
                let length = ctxt.bytes_written() - offset;
                let padded_length = word_align(length);
                ctxt.write_zeros(padded_length - length)?;
            }
        }

        // The final entry marks the end of the last glyph
        offsets.push(u32::try_from(ctxt.bytes_written() - start)?);

        Ok(owned::LocaTable { offsets })
    }
}

impl ReadBinary for CompositeGlyphs {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let mut have_instructions = false;
        let mut glyphs = Vec::new();
        loop {
            let flags = ctxt.read::<CompositeGlyphFlag>()?;
            let data = ctxt.read_dep::<CompositeGlyph>(flags)?;

            if flags.we_have_instructions() {
                have_instructions = true;
            }

            glyphs.push(data);

            if !flags.more_components() {
                break;
            }
        }

        Ok(CompositeGlyphs {
            glyphs,
            have_instructions,
        })
    }
}

impl ReadFrom for CompositeGlyphFlag {
    type ReadType = U16Be;

    fn read_from(flag: u16) -> Self {
        CompositeGlyphFlag::from_bits_truncate(flag)
    }
}

impl ReadBinaryDep for CompositeGlyphArgument {
    type Args<'a> = CompositeGlyphFlag;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, flags: Self::Args<'a>) -> Result<Self, ParseError> {
        let arg = match (flags.arg_1_and_2_are_words(), flags.args_are_xy_values()) {
            (true, true) => CompositeGlyphArgument::I16(ctxt.read_i16be()?),
            (true, false) => CompositeGlyphArgument::U16(ctxt.read_u16be()?),
            (false, true) => CompositeGlyphArgument::I8(ctxt.read_i8()?),
            (false, false) => CompositeGlyphArgument::U8(ctxt.read_u8()?),
        };

        Ok(arg)
    }
}

impl ReadBinaryDep for CompositeGlyph {
    type Args<'a> = CompositeGlyphFlag;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, flags: Self::Args<'a>) -> Result<Self, ParseError> {
        let glyph_index = ctxt.read_u16be()?;
        let argument1 = ctxt.read_dep::<CompositeGlyphArgument>(flags)?;
        let argument2 = ctxt.read_dep::<CompositeGlyphArgument>(flags)?;

        let scale = if flags.we_have_a_scale() {
            Some(CompositeGlyphScale::Scale(ctxt.read::<F2Dot14>()?))
        } else if flags.we_have_an_x_and_y_scale() {
            Some(CompositeGlyphScale::XY {
                x_scale: ctxt.read::<F2Dot14>()?,
                y_scale: ctxt.read::<F2Dot14>()?,
            })
        } else if flags.we_have_a_two_by_two() {
            Some(CompositeGlyphScale::Matrix([
                [ctxt.read::<F2Dot14>()?, ctxt.read::<F2Dot14>()?],
                [ctxt.read::<F2Dot14>()?, ctxt.read::<F2Dot14>()?],
            ]))
        } else {
            None
        };

        Ok(CompositeGlyph {
            flags,
            glyph_index,
            argument1,
            argument2,
            scale,
        })
    }
}

impl<'a> GlyfRecord<'a> {
    pub fn number_of_contours(&self) -> i16 {
        match self {
            GlyfRecord::Empty => 0,
            GlyfRecord::Present {
                number_of_contours, ..
            } => *number_of_contours,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.number_of_contours() < 0
    }

    /// The glyph indices referenced by this glyph if it is a composite.
    ///
    /// Simple and empty glyphs have no components.
    pub fn components(&self) -> Result<Vec<u16>, ParseError> {
        match self {
            GlyfRecord::Present { scope, .. } if self.is_composite() => {
                let composite = scope
                    .offset(GLYPH_HEADER_SIZE)
                    .read::<CompositeGlyphs>()?;
                Ok(composite
                    .glyphs
                    .iter()
                    .map(|component| component.glyph_index)
                    .collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Length in bytes of the glyph description
    pub fn len(&self) -> usize {
        match self {
            GlyfRecord::Empty => 0,
            GlyfRecord::Present { scope, .. } => scope.data().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CompositeGlyphFlag {
    pub fn arg_1_and_2_are_words(self) -> bool {
        self.contains(Self::ARG_1_AND_2_ARE_WORDS)
    }

    pub fn args_are_xy_values(self) -> bool {
        self.contains(Self::ARGS_ARE_XY_VALUES)
    }

    pub fn we_have_a_scale(self) -> bool {
        self.contains(Self::WE_HAVE_A_SCALE)
    }

    pub fn we_have_an_x_and_y_scale(self) -> bool {
        self.contains(Self::WE_HAVE_AN_X_AND_Y_SCALE)
    }

    pub fn we_have_a_two_by_two(self) -> bool {
        self.contains(Self::WE_HAVE_A_TWO_BY_TWO)
    }

    pub fn more_components(self) -> bool {
        self.contains(Self::MORE_COMPONENTS)
    }

    pub fn we_have_instructions(self) -> bool {
        self.contains(Self::WE_HAVE_INSTRUCTIONS)
    }
}

impl From<CompositeGlyphArgument> for i32 {
    fn from(arg: CompositeGlyphArgument) -> Self {
        match arg {
            CompositeGlyphArgument::U8(value) => i32::from(value),
            CompositeGlyphArgument::I8(value) => i32::from(value),
            CompositeGlyphArgument::U16(value) => i32::from(value),
            CompositeGlyphArgument::I16(value) => i32::from(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::binary::write::WriteBuffer;
    use crate::tests::{composite_glyph_data, simple_glyph_data};

    #[test]
    fn read_composite_components() {
        let data = composite_glyph_data(&[40, 41]);
        let record = GlyfRecord::Present {
            number_of_contours: -1,
            scope: ReadScope::new(&data),
        };
        assert!(record.is_composite());
        assert_eq!(record.components().unwrap(), vec![40, 41]);
    }

    #[test]
    fn simple_glyph_has_no_components() {
        let data = simple_glyph_data();
        let record = GlyfRecord::Present {
            number_of_contours: 1,
            scope: ReadScope::new(&data),
        };
        assert_eq!(record.components().unwrap(), Vec::<u16>::new());
    }

    #[test]
    fn write_glyf_table_loca_sanity_check() {
        let glyf = GlyfTable {
            records: vec![GlyfRecord::Empty, GlyfRecord::Empty],
        };
        let num_glyphs = glyf.records.len();
        let mut buffer = WriteBuffer::new();
        let loca = GlyfTable::write_dep(&mut buffer, glyf, IndexToLocFormat::Long).unwrap();
        assert_eq!(loca.offsets.len(), num_glyphs + 1);
    }

    #[test]
    fn read_glyph_offsets_correctly() {
        // Glyph data that doesn't start at the beginning of the table must be located using the
        // offsets from `loca`, not relative to the previous glyph.
        let glyph = simple_glyph_data();
        let mut data = vec![0xAA; 366];
        data.extend_from_slice(&glyph);
        let loca_data = [0u32, 366, 366 + glyph.len() as u32]
            .iter()
            .flat_map(|offset| offset.to_be_bytes())
            .collect::<Vec<_>>();
        let loca = ReadScope::new(&loca_data)
            .read_dep::<LocaTable<'_>>((2, IndexToLocFormat::Long))
            .unwrap();
        let glyf = ReadScope::new(&data)
            .read_dep::<GlyfTable<'_>>(&loca)
            .unwrap();

        assert_eq!(glyf.records.len(), 2);
        match &glyf.records[1] {
            GlyfRecord::Present { scope, .. } => assert_eq!(scope.data(), glyph.as_slice()),
            GlyfRecord::Empty => panic!("expected glyph 1 to be present"),
        }
    }

    #[test]
    fn short_format_pads_odd_glyphs() {
        let odd = [0u8, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let glyf = GlyfTable {
            records: vec![
                GlyfRecord::Present {
                    number_of_contours: 1,
                    scope: ReadScope::new(&odd),
                },
                GlyfRecord::Empty,
            ],
        };
        let mut buffer = WriteBuffer::new();
        let loca = GlyfTable::write_dep(&mut buffer, glyf, IndexToLocFormat::Short).unwrap();
        assert_eq!(loca.offsets, vec![0, 12, 12]);
        assert_eq!(buffer.len(), 12);
    }
}
