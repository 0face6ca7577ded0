/// Read binary data
pub mod read;

/// Write binary data
pub mod write;

/// Calculate the length required to 32-bit (long) align data of length `len`
///
/// Tables in an sfnt file start on 4-byte boundaries and are zero padded to a multiple of four
/// bytes before their checksum is calculated.
///
/// ```
/// use fontembed::binary::long_align;
///
/// assert_eq!(long_align(123), 124);
/// assert_eq!(long_align(124), 124);
/// ```
pub const fn long_align(len: usize) -> usize {
    (len + 3) / 4 * 4
}

/// Calculate the length required to 16-bit (word) align data of length `len`
///
/// Glyph records in a short format `loca` table must start on even offsets.
///
/// ```
/// use fontembed::binary::word_align;
///
/// assert_eq!(word_align(123), 124);
/// ```
pub const fn word_align(len: usize) -> usize {
    (len + 1) / 2 * 2
}

#[derive(Copy, Clone)]
pub enum U8 {}

#[derive(Copy, Clone)]
pub enum I8 {}

#[derive(Copy, Clone)]
pub enum U16Be {}

#[derive(Copy, Clone)]
pub enum I16Be {}

#[derive(Copy, Clone)]
pub enum U24Be {}

#[derive(Copy, Clone)]
pub enum U32Be {}

#[derive(Copy, Clone)]
pub enum I32Be {}

#[derive(Copy, Clone)]
pub enum I64Be {}
