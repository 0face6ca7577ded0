//! Subsetting of CFF fonts.
//!
//! Glyph ids are preserved: every CharString keeps its slot in the CharStrings INDEX and the
//! charset and FDSelect are carried over unchanged. The CharStrings of glyphs that are not
//! retained are replaced with a single byte so that no two entries share an offset.

use std::collections::BTreeSet;
use std::convert::TryFrom;

use log::debug;

use super::{owned, CFFVariant, Font, MaybeOwnedIndex, Operator, PrivateDict, CFF};
use crate::binary::read::ReadScope;
use crate::binary::write::{WriteBinary, WriteBuffer};
use crate::error::{ParseError, ReadWriteError};

/// The CharString written in place of each glyph that is not retained.
pub const OMITTED_CHAR_STRING: [u8; 1] = [0x0F];

impl<'a> CFF<'a> {
    /// Returns a copy of this CFF that only holds the CharStrings of glyph 0 and `used`.
    ///
    /// For CID-keyed fonts `used` holds CIDs, which are mapped to glyphs through the charset.
    /// For other fonts `used` holds glyph ids. The Private DICT and local subroutines of Font
    /// DICTs that no retained glyph refers to are dropped; the Font DICT itself is kept with an
    /// empty Private DICT so that FDSelect remains valid.
    pub fn subset(&self, used: &BTreeSet<u16>) -> Result<CFF<'a>, ParseError> {
        let mut cff = self.clone();
        for font in cff.fonts.iter_mut() {
            subset_font(font, used)?;
        }
        Ok(cff)
    }
}

/// Parse the CFF font in `data`, retain the glyphs of `used` and write out the result.
pub fn subset_cff(data: &[u8], used: &BTreeSet<u16>) -> Result<Vec<u8>, ReadWriteError> {
    let cff = ReadScope::new(data).read::<CFF<'_>>()?;
    let subset = cff.subset(used)?;

    let mut buffer = WriteBuffer::new();
    CFF::write(&mut buffer, &subset)?;
    debug!(
        "subset CFF with {} used ids from {} to {} bytes",
        used.len(),
        data.len(),
        buffer.len()
    );

    Ok(buffer.into_inner())
}

fn subset_font(font: &mut Font<'_>, used: &BTreeSet<u16>) -> Result<(), ParseError> {
    let n_glyphs = font.char_strings_index.len();
    let mut char_strings = Vec::with_capacity(n_glyphs);
    let mut used_font_dicts = BTreeSet::new();

    for index in 0..n_glyphs {
        let glyph_id = u16::try_from(index)?;
        if !is_retained(font, glyph_id, used) {
            char_strings.push(OMITTED_CHAR_STRING.to_vec());
            continue;
        }

        let data = font
            .char_strings_index
            .read_object(index)
            .ok_or(ParseError::BadIndex)?;
        char_strings.push(data.to_vec());

        if let CFFVariant::CID(cid) = &font.data {
            let font_dict_index = cid
                .fd_select
                .font_dict_index(glyph_id)
                .ok_or(ParseError::BadIndex)?;
            used_font_dicts.insert(usize::from(font_dict_index));
        }
    }

    font.char_strings_index = MaybeOwnedIndex::Owned(owned::Index { data: char_strings });

    if let CFFVariant::CID(cid) = &mut font.data {
        for (font_dict_index, (private_dict, local_subr_index)) in cid
            .private_dicts
            .iter_mut()
            .zip(cid.local_subr_indices.iter_mut())
            .enumerate()
        {
            if !used_font_dicts.contains(&font_dict_index) {
                debug!("dropping Private DICT of unused Font DICT {}", font_dict_index);
                *private_dict = PrivateDict::new();
                *local_subr_index = None;
            } else if local_subr_index.is_none() {
                private_dict.remove(Operator::Subrs);
            }
        }
    }

    Ok(())
}

fn is_retained(font: &Font<'_>, glyph_id: u16, used: &BTreeSet<u16>) -> bool {
    if glyph_id == 0 {
        return true;
    }

    if font.is_cid_keyed() {
        font.charset
            .id_for_glyph(glyph_id)
            .map_or(false, |cid| used.contains(&cid))
    } else {
        used.contains(&glyph_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cff::{Charset, Operand};
    use crate::tests::{cid_cff_data, type1_cff_data};

    fn char_strings(cff: &CFF<'_>) -> Vec<Vec<u8>> {
        cff.fonts[0]
            .char_strings_index
            .iter()
            .map(|data| data.to_vec())
            .collect()
    }

    #[test]
    fn type1_retains_glyph_ids() {
        let data = type1_cff_data(6);
        let used = [2, 4].iter().copied().collect();
        let subset = subset_cff(&data, &used).unwrap();

        let cff = ReadScope::new(&subset).read::<CFF<'_>>().unwrap();
        let original = ReadScope::new(&data).read::<CFF<'_>>().unwrap();
        let expected = char_strings(&original);
        let actual = char_strings(&cff);

        assert_eq!(actual.len(), 6);
        for (glyph_id, char_string) in actual.iter().enumerate() {
            if [0, 2, 4].contains(&glyph_id) {
                assert_eq!(char_string, &expected[glyph_id]);
            } else {
                assert_eq!(char_string.as_slice(), &OMITTED_CHAR_STRING);
            }
        }
    }

    #[test]
    fn type1_keeps_private_dict_and_subrs() {
        let data = type1_cff_data(4);
        let subset = subset_cff(&data, &[1].iter().copied().collect()).unwrap();
        let cff = ReadScope::new(&subset).read::<CFF<'_>>().unwrap();

        match &cff.fonts[0].data {
            CFFVariant::Type1(type1) => {
                assert!(type1.private_dict.get(Operator::StdHW).is_some());
                assert_eq!(type1.local_subr_index.as_ref().map(|index| index.len()), Some(1));
            }
            CFFVariant::CID(_) => panic!("expected Type 1 font"),
        }
    }

    #[test]
    fn cid_membership_is_by_cid() {
        // CIDs are glyph id + 99, glyphs 0..=2 use FD 0 and 3..=5 use FD 1
        let data = cid_cff_data(&[0, 0, 0, 1, 1, 1], 100);
        let used = [103, 3].iter().copied().collect();
        let subset = subset_cff(&data, &used).unwrap();
        let cff = ReadScope::new(&subset).read::<CFF<'_>>().unwrap();

        let retained = char_strings(&cff)
            .iter()
            .enumerate()
            .filter(|(_, char_string)| char_string.as_slice() != OMITTED_CHAR_STRING)
            .map(|(glyph_id, _)| glyph_id)
            .collect::<Vec<_>>();
        // CID 3 does not exist in the font
        assert_eq!(retained, vec![0, 4]);

        match &cff.fonts[0].charset {
            Charset::Custom(custom) => assert_eq!(custom.id_for_glyph(4), Some(103)),
            _ => panic!("expected custom charset"),
        }
    }

    #[test]
    fn unreferenced_font_dicts_lose_private_data() {
        // .notdef and the used glyphs are all in FD 1
        let data = cid_cff_data(&[1, 0, 0, 1, 1], 1);
        let used = [3, 4].iter().copied().collect();
        let subset = subset_cff(&data, &used).unwrap();
        let cff = ReadScope::new(&subset).read::<CFF<'_>>().unwrap();

        match &cff.fonts[0].data {
            CFFVariant::CID(cid) => {
                assert_eq!(cid.font_dicts.len(), 2);
                assert!(cid.private_dicts[0].is_empty());
                assert!(cid.local_subr_indices[0].is_none());
                assert_eq!(
                    cid.private_dicts[1].get(Operator::StdHW),
                    Some([Operand::Integer(70)].as_ref())
                );
                let subrs = cid.local_subr_indices[1].as_ref().unwrap();
                assert_eq!(subrs.read_object(0), Some([0x8B, 0xA1, 0xA1, 0x0B].as_ref()));
            }
            CFFVariant::Type1(_) => panic!("expected CID font"),
        }

        // FD 0's subroutine does not appear anywhere in the output
        let fd0_subr = [0x8B, 0xA0, 0xA0, 0x0B];
        assert!(subset.windows(4).all(|window| window != fd0_subr));
        assert!(data.windows(4).any(|window| window == fd0_subr));
    }

    #[test]
    fn subset_is_idempotent() {
        let data = cid_cff_data(&[0, 0, 1, 1], 1);
        let used = [1, 3].iter().copied().collect();
        let once = subset_cff(&data, &used).unwrap();
        let twice = subset_cff(&once, &used).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn subset_rejects_truncated_data() {
        let data = type1_cff_data(3);
        let used = BTreeSet::new();

        assert!(subset_cff(&data[..data.len() / 2], &used).is_err());
    }
}
