//! Reading of the `OS/2` table.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/os2>

use crate::binary::read::{ReadBinary, ReadCtxt};
use crate::error::ParseError;

/// Bits of `ulCodePageRange1` for the CJK code pages: JIS/Japan, Chinese Simplified, Korean
/// Wansung, Chinese Traditional and Korean Johab.
const CJK_CODE_PAGES: u32 = 0b11111 << 17;

/// `OS/2` table
///
/// Fields beyond version 2 are not read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Os2 {
    pub version: u16,
    pub x_avg_char_width: i16,
    pub us_weight_class: u16,
    pub us_width_class: u16,
    pub fs_type: u16,
    pub y_strikeout_size: i16,
    pub y_strikeout_position: i16,
    pub s_family_class: i16,
    pub panose: [u8; 10],
    pub ach_vend_id: u32,
    pub fs_selection: u16,
    pub us_first_char_index: u16,
    pub us_last_char_index: u16,

    // Some legacy version 0 tables stop at usLastCharIndex, so the remaining fields are only
    // read when present.
    pub s_typo_ascender: Option<i16>,
    pub s_typo_descender: Option<i16>,
    pub s_typo_line_gap: Option<i16>,
    pub us_win_ascent: Option<u16>,
    pub us_win_descent: Option<u16>,
    pub ul_code_page_range1: Option<u32>,
    pub ul_code_page_range2: Option<u32>,
    pub sx_height: Option<i16>,
    pub s_cap_height: Option<i16>,
}

impl ReadBinary for Os2 {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let version = ctxt.read_u16be()?;
        let x_avg_char_width = ctxt.read_i16be()?;
        let us_weight_class = ctxt.read_u16be()?;
        let us_width_class = ctxt.read_u16be()?;
        let fs_type = ctxt.read_u16be()?;
        // subscript and superscript metrics
        ctxt.skip(8 * 2)?;
        let y_strikeout_size = ctxt.read_i16be()?;
        let y_strikeout_position = ctxt.read_i16be()?;
        let s_family_class = ctxt.read_i16be()?;
        let mut panose = [0u8; 10];
        panose.copy_from_slice(ctxt.read_slice(10)?);
        // ulUnicodeRange1-4
        ctxt.skip(4 * 4)?;
        let ach_vend_id = ctxt.read_u32be()?;
        let fs_selection = ctxt.read_u16be()?;
        let us_first_char_index = ctxt.read_u16be()?;
        let us_last_char_index = ctxt.read_u16be()?;

        let mut table = Os2 {
            version,
            x_avg_char_width,
            us_weight_class,
            us_width_class,
            fs_type,
            y_strikeout_size,
            y_strikeout_position,
            s_family_class,
            panose,
            ach_vend_id,
            fs_selection,
            us_first_char_index,
            us_last_char_index,
            s_typo_ascender: None,
            s_typo_descender: None,
            s_typo_line_gap: None,
            us_win_ascent: None,
            us_win_descent: None,
            ul_code_page_range1: None,
            ul_code_page_range2: None,
            sx_height: None,
            s_cap_height: None,
        };

        if !ctxt.bytes_available() {
            return Ok(table);
        }
        table.s_typo_ascender = Some(ctxt.read_i16be()?);
        table.s_typo_descender = Some(ctxt.read_i16be()?);
        table.s_typo_line_gap = Some(ctxt.read_i16be()?);
        table.us_win_ascent = Some(ctxt.read_u16be()?);
        table.us_win_descent = Some(ctxt.read_u16be()?);

        if version >= 1 {
            table.ul_code_page_range1 = Some(ctxt.read_u32be()?);
            table.ul_code_page_range2 = Some(ctxt.read_u32be()?);
        }
        if version >= 2 {
            table.sx_height = Some(ctxt.read_i16be()?);
            table.s_cap_height = Some(ctxt.read_i16be()?);
        }

        Ok(table)
    }
}

impl Os2 {
    /// True if the font declares support for a Chinese, Japanese or Korean code page.
    pub fn is_cjk(&self) -> bool {
        self.ul_code_page_range1
            .map_or(false, |range| range & CJK_CODE_PAGES != 0)
    }

    /// True if the font may not be embedded (restricted license embedding).
    pub fn is_restricted(&self) -> bool {
        self.fs_type & 0x000F == 0x0002
    }

    pub fn is_italic(&self) -> bool {
        self.fs_selection & 1 != 0
    }

    pub fn is_bold(&self) -> bool {
        self.fs_selection & (1 << 5) != 0
    }
}
