//! Lookup of strings in the `name` table.
//!
//! A font usually holds several records for each name: one per platform, encoding and
//! language. The first record of a name that can be decoded is the one used, regardless of the
//! platform it belongs to.

use encoding_rs::{DecoderResult, Encoding, MACINTOSH, UTF_16BE};

use crate::binary::read::ReadScope;
use crate::error::ParseError;
use crate::tables::{NameRecord, NameTable};

pub const FAMILY_NAME: u16 = 1;
pub const SUBFAMILY_NAME: u16 = 2;
pub const FULL_NAME: u16 = 4;
pub const POSTSCRIPT_NAME: u16 = 6;

const MACINTOSH_PLATFORM: u16 = 1;

/// The names of a font that are needed to describe it in a PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontNames {
    pub family: Option<String>,
    pub subfamily: Option<String>,
    pub full_name: Option<String>,
    pub postscript_name: Option<String>,
}

impl FontNames {
    /// Read the family, subfamily, full and PostScript names from `name` table data.
    pub fn read(name_table_data: &[u8]) -> Result<FontNames, ParseError> {
        let name_table = ReadScope::new(name_table_data).read::<NameTable<'_>>()?;

        Ok(FontNames {
            family: first_name(&name_table, FAMILY_NAME),
            subfamily: first_name(&name_table, SUBFAMILY_NAME),
            full_name: first_name(&name_table, FULL_NAME),
            postscript_name: first_name(&name_table, POSTSCRIPT_NAME),
        })
    }
}

/// The first record for `name_id` in table order that decodes without error.
pub fn first_name(name_table: &NameTable<'_>, name_id: u16) -> Option<String> {
    name_table
        .name_records
        .iter()
        .filter(|record| record.name_id == name_id)
        .find_map(|record| {
            let data = name_table.string_data(&record).ok()?;
            decode_name(record_encoding(&record), data)
        })
}

fn record_encoding(record: &NameRecord) -> &'static Encoding {
    if record.platform_id == MACINTOSH_PLATFORM {
        MACINTOSH
    } else {
        UTF_16BE
    }
}

fn decode_name(encoding: &'static Encoding, data: &[u8]) -> Option<String> {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let size = decoder.max_utf8_buffer_length_without_replacement(data.len())?;
    let mut s = String::with_capacity(size);
    let (res, _read) = decoder.decode_to_string_without_replacement(data, &mut s, true);
    match res {
        DecoderResult::InputEmpty => Some(s),
        DecoderResult::OutputFull | DecoderResult::Malformed(_, _) => None,
    }
}
