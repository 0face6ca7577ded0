#![warn(rust_2018_idioms)]

//! Font parsing, subsetting and embedding for PDF output.
//!
//! Fonts are found by name through a `font_cache::FontCache`, their metrics are exposed as
//! `font_info::FontInfo` normalised to 1000 units per em, and `pdf::font::FontEmbedder` writes
//! the font objects of a document, subsetting TrueType and CFF programs to the glyphs that were
//! drawn.

pub mod afm;
/// Reading and writing of binary data.
pub mod binary;
pub mod cff;
/// Checksum calculation routines.
pub mod checksum;
pub mod cid_cmap;
pub mod error;
pub mod font_cache;
pub mod font_info;
pub mod names;
pub mod pdf;
pub mod post;
pub mod size;
/// Font subsetting.
pub mod subset;
pub mod tables;
pub mod tag;
