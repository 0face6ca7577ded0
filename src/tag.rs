//! Font table tags.

use std::fmt;

/// Generate a 4-byte font table tag from byte string
macro_rules! tag {
    ($w:expr) => {
        tag(*$w)
    };
}

/// Wrapper type for a tag that implements `Display`
///
/// ```
/// use fontembed::tag::{self, DisplayTag};
///
/// assert_eq!(DisplayTag(tag::GLYF).to_string(), "glyf");
/// assert_eq!(DisplayTag(0x0102_0304).to_string(), "0x01020304");
/// ```
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct DisplayTag(pub u32);

const fn tag(chars: [u8; 4]) -> u32 {
    ((chars[3] as u32) << 0)
        | ((chars[2] as u32) << 8)
        | ((chars[1] as u32) << 16)
        | ((chars[0] as u32) << 24)
}

impl fmt::Display for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.0;
        let mut s = String::with_capacity(4);
        s.push(char::from((tag >> 24) as u8));
        s.push(char::from(((tag >> 16) & 255) as u8));
        s.push(char::from(((tag >> 8) & 255) as u8));
        s.push(char::from((tag & 255) as u8));
        if s.chars().any(|c| !c.is_ascii() || c.is_ascii_control()) {
            write!(f, "0x{:08x}", tag)
        } else {
            s.fmt(f)
        }
    }
}

impl fmt::Debug for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_string().fmt(f)
    }
}

pub const CFF: u32 = tag!(b"CFF ");
pub const CMAP: u32 = tag!(b"cmap");
pub const CVT: u32 = tag!(b"cvt ");
pub const FPGM: u32 = tag!(b"fpgm");
pub const GLYF: u32 = tag!(b"glyf");
pub const GPOS: u32 = tag!(b"GPOS");
pub const GSUB: u32 = tag!(b"GSUB");
pub const HEAD: u32 = tag!(b"head");
pub const HHEA: u32 = tag!(b"hhea");
pub const HMTX: u32 = tag!(b"hmtx");
pub const KERN: u32 = tag!(b"kern");
pub const LOCA: u32 = tag!(b"loca");
pub const MAXP: u32 = tag!(b"maxp");
pub const NAME: u32 = tag!(b"name");
pub const OS_2: u32 = tag!(b"OS/2");
pub const OTTO: u32 = tag!(b"OTTO");
pub const PCLT: u32 = tag!(b"PCLT");
pub const POST: u32 = tag!(b"post");
pub const PREP: u32 = tag!(b"prep");
pub const TRUE: u32 = tag!(b"true");
pub const TTCF: u32 = tag!(b"ttcf");
