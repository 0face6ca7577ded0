//! `post` table parsing.
//!
//! Only the fixed header is read. Glyph names are not needed for embedding.

use crate::binary::read::{ReadBinary, ReadCtxt};
use crate::error::ParseError;
use crate::tables::Fixed;

pub struct PostTable {
    pub header: Header,
}

pub struct Header {
    pub version: i32,
    pub italic_angle: Fixed,
    pub underline_position: i16,
    pub underline_thickness: i16,
    pub is_fixed_pitch: u32,
}

impl ReadBinary for PostTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let version = ctxt.read_i32be()?;
        match version {
            0x00010000 | 0x00020000 | 0x00025000 | 0x00030000 | 0x00040000 => {}
            _ => return Err(ParseError::BadVersion),
        }
        let italic_angle = Fixed::new(ctxt.read_i32be()?);
        let underline_position = ctxt.read_i16be()?;
        let underline_thickness = ctxt.read_i16be()?;
        let is_fixed_pitch = ctxt.read_u32be()?;

        Ok(PostTable {
            header: Header {
                version,
                italic_angle,
                underline_position,
                underline_thickness,
                is_fixed_pitch,
            },
        })
    }
}

impl PostTable {
    pub fn is_fixed_pitch(&self) -> bool {
        self.header.is_fixed_pitch != 0
    }

    /// Italic angle in degrees counter-clockwise from vertical
    pub fn italic_angle(&self) -> f32 {
        f32::from(self.header.italic_angle)
    }
}
