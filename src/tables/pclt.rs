//! Reading of the `PCLT` table.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/pclt>

use crate::binary::read::{ReadBinary, ReadCtxt};
use crate::error::ParseError;

/// The leading fields of the `PCLT` table, up to and including `capHeight`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PcltTable {
    pub font_number: u32,
    pub pitch: u16,
    pub x_height: u16,
    pub style: u16,
    pub type_family: u16,
    pub cap_height: u16,
}

impl ReadBinary for PcltTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let major_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1)?;
        let _minor_version = ctxt.read_u16be()?;
        let font_number = ctxt.read_u32be()?;
        let pitch = ctxt.read_u16be()?;
        let x_height = ctxt.read_u16be()?;
        let style = ctxt.read_u16be()?;
        let type_family = ctxt.read_u16be()?;
        let cap_height = ctxt.read_u16be()?;

        Ok(PcltTable {
            font_number,
            pitch,
            x_height,
            style,
            type_family,
            cap_height,
        })
    }
}
