use std::collections::{BTreeSet, VecDeque};

use log::warn;

use super::{GlyfRecord, GlyfTable};

impl<'a> GlyfTable<'a> {
    /// Returns a copy of this table that keeps the glyphs in `glyph_ids`, and every glyph they
    /// reference through composites, at their original indices. All other glyphs are emptied.
    ///
    /// Glyph 0 is always kept. Indices beyond the end of the table are ignored.
    pub fn subset(&self, glyph_ids: &BTreeSet<u16>) -> GlyfTable<'a> {
        let keep = closure(self, glyph_ids);
        let records = self
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                if keep.contains(&(index as u16)) {
                    record.clone()
                } else {
                    GlyfRecord::Empty
                }
            })
            .collect();

        GlyfTable { records }
    }
}

/// Compute the set of glyphs needed to render `glyph_ids`.
///
/// Composite glyphs are expanded breadth first until no new components are found. A composite
/// whose component list cannot be read contributes only itself.
pub fn closure(glyf: &GlyfTable<'_>, glyph_ids: &BTreeSet<u16>) -> BTreeSet<u16> {
    let num_glyphs = glyf.records.len();
    let mut keep = BTreeSet::new();
    let mut queue = VecDeque::new();

    for &glyph_id in std::iter::once(&0).chain(glyph_ids.iter()) {
        if usize::from(glyph_id) < num_glyphs && keep.insert(glyph_id) {
            queue.push_back(glyph_id);
        }
    }

    while let Some(glyph_id) = queue.pop_front() {
        let record = &glyf.records[usize::from(glyph_id)];
        let components = match record.components() {
            Ok(components) => components,
            Err(err) => {
                warn!("unable to read components of glyph {}: {}", glyph_id, err);
                continue;
            }
        };
        for component in components {
            if usize::from(component) >= num_glyphs {
                warn!(
                    "glyph {} references glyph {} which is out of range",
                    glyph_id, component
                );
                continue;
            }
            if keep.insert(component) {
                queue.push_back(component);
            }
        }
    }

    keep
}
