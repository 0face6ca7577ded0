#![deny(missing_docs)]

use std::num::Wrapping;

use crate::binary::read::ReadScope;
use crate::binary::U32Be;
use crate::error::ParseError;

/// Calculate the OpenType checksum of `data`.
///
/// The checksum is the sum of the big-endian 32-bit words of the data, wrapping at 32 bits. Data
/// that is not a multiple of four bytes long is treated as if it were zero padded.
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/otff#calculating-checksums>
pub fn table_checksum(data: &[u8]) -> Result<Wrapping<u32>, ParseError> {
    let whole_words = data.len() / 4;
    let mut ctxt = ReadScope::new(data).ctxt();
    let array = ctxt.read_array::<U32Be>(whole_words)?;
    let mut sum: Wrapping<u32> = array.iter().map(Wrapping).sum();

    let tail = &data[whole_words * 4..];
    if !tail.is_empty() {
        let mut last = [0u8; 4];
        last[..tail.len()].copy_from_slice(tail);
        sum += Wrapping(u32::from_be_bytes(last));
    }

    Ok(sum)
}
