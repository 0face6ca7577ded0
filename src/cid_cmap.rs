//! External CMap resources for CID-keyed CJK fonts.
//!
//! CJK fonts are not addressed through their own `cmap` table. Characters are instead mapped to
//! CIDs of one of the Adobe character collections using the Unicode CMaps that Adobe publishes
//! (`UniJIS-UCS2-H` and friends). The same CMap names are used as the `/Encoding` of the Type0
//! fonts in the PDF, so text is written as UCS-2.
//!
//! Only the parts of the PostScript CMap syntax that carry mappings are interpreted:
//! `cidrange` and `cidchar` blocks, the `CIDSystemInfo` entries, `CMapName` and `usecmap`.

use std::cmp::Ordering as CmpOrdering;
use std::convert::TryFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lazy_static::lazy_static;
use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::error::{EmbedError, ParseError};

/// The registry of every character collection in `ORDERINGS`.
pub const ADOBE: &str = "Adobe";

/// Nesting limit for `usecmap` chains.
const MAX_USECMAP_DEPTH: usize = 4;

/// An Adobe CJK character collection.
#[derive(Debug, PartialEq, Eq)]
pub struct Ordering {
    pub name: &'static str,
    pub supplement: u16,
    /// The horizontal UCS-2 CMap mapping Unicode to this collection.
    pub ucs2_cmap: &'static str,
    /// `ulCodePageRange1` bits of the `OS/2` table that select this collection.
    code_pages: u32,
}

static ORDERING_TABLE: [Ordering; 4] = [
    Ordering {
        name: "Japan1",
        supplement: 6,
        ucs2_cmap: "UniJIS-UCS2-H",
        code_pages: 1 << 17,
    },
    Ordering {
        name: "GB1",
        supplement: 4,
        ucs2_cmap: "UniGB-UCS2-H",
        code_pages: 1 << 18,
    },
    Ordering {
        name: "Korea1",
        supplement: 2,
        ucs2_cmap: "UniKS-UCS2-H",
        code_pages: 1 << 19 | 1 << 21,
    },
    Ordering {
        name: "CNS1",
        supplement: 4,
        ucs2_cmap: "UniCNS-UCS2-H",
        code_pages: 1 << 20,
    },
];

lazy_static! {
    static ref ORDERINGS: FxHashMap<&'static str, &'static Ordering> = ORDERING_TABLE
        .iter()
        .flat_map(|ordering| vec![(ordering.name, ordering), (ordering.ucs2_cmap, ordering)])
        .collect();
}

impl Ordering {
    /// Look up a collection by its ordering name (`Japan1`) or its UCS-2 CMap name.
    pub fn by_name(name: &str) -> Option<&'static Ordering> {
        ORDERINGS.get(name).copied()
    }

    /// The collection for a font declaring the `OS/2` code pages in `code_page_range1`.
    pub fn for_code_pages(code_page_range1: u32) -> Option<&'static Ordering> {
        ORDERING_TABLE
            .iter()
            .find(|ordering| ordering.code_pages & code_page_range1 != 0)
    }

    /// The collection named by a CFF `ROS` operator, if it is one of the Adobe CJK ones.
    pub fn for_ros(registry: &str, ordering: &str) -> Option<&'static Ordering> {
        if registry != ADOBE {
            return None;
        }
        ORDERING_TABLE.iter().find(|known| known.name == ordering)
    }
}

/// A contiguous range of codes mapping to consecutive CIDs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CidRange {
    pub low: u32,
    pub high: u32,
    pub cid: u16,
}

/// A parsed CMap resource mapping character codes to CIDs.
#[derive(Debug)]
pub struct CidCMap {
    name: String,
    registry: String,
    ordering: String,
    supplement: i32,
    /// Sorted by `low`, non-overlapping.
    ranges: Vec<CidRange>,
    parent_name: Option<String>,
    parent: Option<Arc<CidCMap>>,
    source: Vec<u8>,
}

impl CidCMap {
    /// Parse the text of a CMap resource.
    ///
    /// A `usecmap` reference is recorded but not resolved, see `CidCMap::load`.
    pub fn parse(data: &[u8]) -> Result<CidCMap, ParseError> {
        let mut cmap = CidCMap {
            name: String::new(),
            registry: String::new(),
            ordering: String::new(),
            supplement: 0,
            ranges: Vec::new(),
            parent_name: None,
            parent: None,
            source: data.to_vec(),
        };

        let mut tokens = Tokenizer::new(data);
        let mut pending_key: Option<&str> = None;
        let mut last_int = None;
        while let Some(token) = tokens.next_token()? {
            match token {
                Token::Name(name) => {
                    if let Some(key) = pending_key.take() {
                        cmap.set_entry(key, Token::Name(name));
                    } else {
                        pending_key = Some(name);
                    }
                    continue;
                }
                Token::Str(_) | Token::Int(_) => {
                    if let Some(key) = pending_key.take() {
                        cmap.set_entry(key, token);
                    }
                    if let Token::Int(value) = token {
                        last_int = Some(value);
                        continue;
                    }
                }
                Token::Keyword("begincidrange") => {
                    let count = count_operand(last_int)?;
                    for _ in 0..count {
                        let low = tokens.expect_hex()?;
                        let high = tokens.expect_hex()?;
                        let cid = tokens.expect_cid()?;
                        if low > high {
                            return Err(ParseError::BadValue);
                        }
                        cmap.ranges.push(CidRange { low, high, cid });
                    }
                    tokens.expect_keyword("endcidrange")?;
                }
                Token::Keyword("begincidchar") => {
                    let count = count_operand(last_int)?;
                    for _ in 0..count {
                        let code = tokens.expect_hex()?;
                        let cid = tokens.expect_cid()?;
                        cmap.ranges.push(CidRange {
                            low: code,
                            high: code,
                            cid,
                        });
                    }
                    tokens.expect_keyword("endcidchar")?;
                }
                _ => {}
            }
            if let (Some(parent), Token::Keyword("usecmap")) = (pending_key, token) {
                cmap.parent_name = Some(parent.to_string());
            }
            pending_key = None;
            last_int = None;
        }

        cmap.ranges = resolve_redefinitions(cmap.ranges);
        Ok(cmap)
    }

    /// Load the CMap called `name` from the first of `dirs` holding a file of that name.
    ///
    /// CMaps it refers to through `usecmap` are loaded from the same directories.
    pub fn load(dirs: &[PathBuf], name: &str) -> Result<CidCMap, EmbedError> {
        load_with_depth(dirs, name, 0)
    }

    /// The CID of `code`, or `None` if this CMap and its parents have no mapping for it.
    pub fn lookup(&self, code: u32) -> Option<u16> {
        let found = self.ranges.binary_search_by(|range| {
            if range.high < code {
                CmpOrdering::Less
            } else if range.low > code {
                CmpOrdering::Greater
            } else {
                CmpOrdering::Equal
            }
        });
        match found {
            Ok(index) => {
                let range = &self.ranges[index];
                u16::try_from(code - range.low)
                    .ok()
                    .and_then(|delta| range.cid.checked_add(delta))
            }
            Err(_) => self.parent.as_ref().and_then(|parent| parent.lookup(code)),
        }
    }

    /// The value of `CMapName`, or the name it was loaded under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn ordering(&self) -> &str {
        &self.ordering
    }

    pub fn supplement(&self) -> i32 {
        self.supplement
    }

    pub fn ranges(&self) -> &[CidRange] {
        &self.ranges
    }

    /// The CMap this one extends through `usecmap`.
    pub fn parent_name(&self) -> Option<&str> {
        self.parent_name.as_deref()
    }

    /// The text of the resource, for embedding it as a CMap stream.
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    fn set_entry(&mut self, key: &str, value: Token<'_>) {
        match (key, value) {
            ("CMapName", Token::Name(name)) => self.name = name.to_string(),
            ("Registry", Token::Str(registry)) => self.registry = registry.to_string(),
            ("Ordering", Token::Str(ordering)) => self.ordering = ordering.to_string(),
            ("Supplement", Token::Int(supplement)) => {
                self.supplement = i32::try_from(supplement).unwrap_or(0)
            }
            _ => {}
        }
    }
}

/// Sort mappings given in file order into non-overlapping ranges. A code mapped more than once
/// keeps its first mapping.
fn resolve_redefinitions(entries: Vec<CidRange>) -> Vec<CidRange> {
    let mut ranges: Vec<CidRange> = Vec::with_capacity(entries.len());
    for entry in entries {
        let start = ranges.partition_point(|range| range.high < entry.low);
        let mut pieces = Vec::new();
        let mut next = Some(entry.low);
        for defined in ranges[start..].iter().take_while(|range| range.low <= entry.high) {
            let low = match next {
                Some(low) => low,
                None => break,
            };
            if defined.low > low {
                pieces.extend(entry.piece(low, defined.low - 1));
            }
            next = defined
                .high
                .checked_add(1)
                .filter(|&low| low <= entry.high);
        }
        if let Some(low) = next {
            pieces.extend(entry.piece(low, entry.high));
        }

        let whole = matches!(pieces.as_slice(), [piece] if *piece == entry);
        if !whole {
            warn!(
                "redefinition of codes <{:04x}> to <{:04x}> ignored",
                entry.low, entry.high
            );
        }
        for piece in pieces {
            let index = ranges.partition_point(|range| range.low < piece.low);
            ranges.insert(index, piece);
        }
    }
    ranges
}

impl CidRange {
    /// The part of this range from `low` to `high`, `None` if its CIDs do not fit in 16 bits.
    fn piece(&self, low: u32, high: u32) -> Option<CidRange> {
        let cid = u32::from(self.cid) + (low - self.low);
        u16::try_from(cid)
            .ok()
            .map(|cid| CidRange { low, high, cid })
    }
}

fn load_with_depth(dirs: &[PathBuf], name: &str, depth: usize) -> Result<CidCMap, EmbedError> {
    if depth > MAX_USECMAP_DEPTH {
        warn!("usecmap chain too deep at CMap '{}'", name);
        return Err(EmbedError::CMap(name.to_string()));
    }

    let path = find_cmap_file(dirs, name).ok_or_else(|| EmbedError::CMap(name.to_string()))?;
    let data = std::fs::read(&path)?;
    let mut cmap = CidCMap::parse(&data).map_err(|err| {
        warn!("unable to parse CMap {}: {}", path.display(), err);
        EmbedError::CMap(name.to_string())
    })?;
    if cmap.name.is_empty() {
        cmap.name = name.to_string();
    }
    if let Some(parent_name) = cmap.parent_name.clone() {
        let parent = load_with_depth(dirs, &parent_name, depth + 1)?;
        cmap.parent = Some(Arc::new(parent));
    }

    debug!(
        "loaded CMap '{}' with {} ranges from {}",
        cmap.name,
        cmap.ranges.len(),
        path.display()
    );
    Ok(cmap)
}

fn find_cmap_file(dirs: &[PathBuf], name: &str) -> Option<PathBuf> {
    // CMap names never contain path separators
    if name.contains(|c: char| c == '/' || c == '\\') || name.is_empty() {
        return None;
    }
    dirs.iter()
        .map(|dir| dir.join(name))
        .find(|path| Path::is_file(path))
}

fn count_operand(count: Option<i64>) -> Result<usize, ParseError> {
    count
        .ok_or(ParseError::MissingValue)
        .and_then(|count| usize::try_from(count).map_err(ParseError::from))
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Token<'a> {
    Hex(u32),
    Int(i64),
    Name(&'a str),
    Str(&'a str),
    Keyword(&'a str),
    Delimiter,
}

struct Tokenizer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Tokenizer { data, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.peek().map_or(false, &pred) {
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>, ParseError> {
        loop {
            self.take_while(|b| b.is_ascii_whitespace());
            match self.peek() {
                None => return Ok(None),
                Some(b'%') => {
                    self.take_while(|b| b != b'\n' && b != b'\r');
                }
                Some(_) => break,
            }
        }

        let token = match self.data[self.pos] {
            b'<' if self.data.get(self.pos + 1) == Some(&b'<') => {
                self.pos += 2;
                Token::Delimiter
            }
            b'>' if self.data.get(self.pos + 1) == Some(&b'>') => {
                self.pos += 2;
                Token::Delimiter
            }
            b'<' => {
                self.pos += 1;
                let digits = self.take_while(|b| b != b'>');
                if self.peek() != Some(b'>') {
                    return Err(ParseError::BadEof);
                }
                self.pos += 1;
                Token::Hex(parse_hex(digits)?)
            }
            b'(' => {
                self.pos += 1;
                let string = self.take_while(|b| b != b')');
                if self.peek() != Some(b')') {
                    return Err(ParseError::BadEof);
                }
                self.pos += 1;
                Token::Str(as_str(string)?)
            }
            b'/' => {
                self.pos += 1;
                Token::Name(as_str(self.take_while(is_regular))?)
            }
            b'[' | b']' | b'{' | b'}' | b'>' | b')' => {
                self.pos += 1;
                Token::Delimiter
            }
            _ => {
                let word = as_str(self.take_while(is_regular))?;
                match word.parse::<i64>() {
                    Ok(value) => Token::Int(value),
                    Err(_) => Token::Keyword(word),
                }
            }
        };

        Ok(Some(token))
    }

    fn expect_hex(&mut self) -> Result<u32, ParseError> {
        match self.next_token()? {
            Some(Token::Hex(value)) => Ok(value),
            Some(_) => Err(ParseError::BadValue),
            None => Err(ParseError::BadEof),
        }
    }

    fn expect_cid(&mut self) -> Result<u16, ParseError> {
        match self.next_token()? {
            Some(Token::Int(value)) => u16::try_from(value).map_err(ParseError::from),
            Some(_) => Err(ParseError::BadValue),
            None => Err(ParseError::BadEof),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        match self.next_token()? {
            Some(Token::Keyword(word)) if word == keyword => Ok(()),
            Some(_) => Err(ParseError::BadValue),
            None => Err(ParseError::BadEof),
        }
    }
}

fn is_regular(b: u8) -> bool {
    !b.is_ascii_whitespace() && !b"()<>[]{}/%".contains(&b)
}

fn as_str(bytes: &[u8]) -> Result<&str, ParseError> {
    std::str::from_utf8(bytes).map_err(|_| ParseError::BadValue)
}

fn parse_hex(digits: &[u8]) -> Result<u32, ParseError> {
    let digits = as_str(digits)?;
    if digits.is_empty() || digits.len() > 8 {
        return Err(ParseError::BadValue);
    }
    u32::from_str_radix(digits, 16).map_err(|_| ParseError::BadValue)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UCS2_CMAP: &str = r#"%!PS-Adobe-3.0 Resource-CMap
/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo 3 dict dup begin
  /Registry (Adobe) def
  /Ordering (Japan1) def
  /Supplement 6 def
end def
/CMapName /UniJIS-UCS2-H def
/CMapType 1 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
3 begincidchar
<0020> 1
<00a5> 61
<4e00> 1200
endcidchar
2 begincidrange
<0021> <007e> 2
<3041> <3093> 842
endcidrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end
"#;

    #[test]
    fn parse_header() {
        let cmap = CidCMap::parse(UCS2_CMAP.as_bytes()).unwrap();

        assert_eq!(cmap.name(), "UniJIS-UCS2-H");
        assert_eq!(cmap.registry(), "Adobe");
        assert_eq!(cmap.ordering(), "Japan1");
        assert_eq!(cmap.supplement(), 6);
        assert_eq!(cmap.ranges().len(), 5);
        assert_eq!(cmap.parent_name(), None);
    }

    #[test]
    fn lookup_ranges_and_chars() {
        let cmap = CidCMap::parse(UCS2_CMAP.as_bytes()).unwrap();

        assert_eq!(cmap.lookup(0x20), Some(1));
        assert_eq!(cmap.lookup(0x21), Some(2));
        assert_eq!(cmap.lookup(0x41), Some(34));
        assert_eq!(cmap.lookup(0x7E), Some(95));
        assert_eq!(cmap.lookup(0xA5), Some(61));
        assert_eq!(cmap.lookup(0x3041), Some(842));
        assert_eq!(cmap.lookup(0x3093), Some(842 + 0x52));
        assert_eq!(cmap.lookup(0x4E00), Some(1200));
    }

    #[test]
    fn unmapped_codes() {
        let cmap = CidCMap::parse(UCS2_CMAP.as_bytes()).unwrap();

        assert_eq!(cmap.lookup(0x1F), None);
        assert_eq!(cmap.lookup(0x7F), None);
        assert_eq!(cmap.lookup(0x3094), None);
        assert_eq!(cmap.lookup(0x10000), None);
    }

    #[test]
    fn overlapping_ranges_keep_the_first_mapping() {
        let data = "2 begincidrange <0020> <0030> 1 <0030> <0040> 20 endcidrange";
        let cmap = CidCMap::parse(data.as_bytes()).unwrap();
        assert_eq!(cmap.lookup(0x30), Some(17));
        assert_eq!(cmap.lookup(0x31), Some(21));
        assert_eq!(cmap.lookup(0x40), Some(36));
        assert_eq!(
            cmap.ranges(),
            &[
                CidRange {
                    low: 0x20,
                    high: 0x30,
                    cid: 1
                },
                CidRange {
                    low: 0x31,
                    high: 0x40,
                    cid: 21
                },
            ]
        );
    }

    #[test]
    fn redefined_chars_are_ignored() {
        let data = "1 begincidrange <4e00> <4e05> 100 endcidrange\n\
                    1 begincidchar <4e02> 500 endcidchar";
        let cmap = CidCMap::parse(data.as_bytes()).unwrap();
        assert_eq!(cmap.lookup(0x4E02), Some(102));
        assert_eq!(cmap.ranges().len(), 1);

        // A char defined first splits the range that redefines it
        let data = "1 begincidchar <4e02> 500 endcidchar\n\
                    1 begincidrange <4e00> <4e05> 100 endcidrange";
        let cmap = CidCMap::parse(data.as_bytes()).unwrap();
        assert_eq!(cmap.lookup(0x4E01), Some(101));
        assert_eq!(cmap.lookup(0x4E02), Some(500));
        assert_eq!(cmap.lookup(0x4E03), Some(103));
        assert_eq!(cmap.lookup(0x4E05), Some(105));
        assert_eq!(cmap.ranges().len(), 3);
    }

    #[test]
    fn redefinition_covering_a_range() {
        let data = "3 begincidrange <0040> <0041> 10 <0050> <0050> 20 \
                    <0030> <0060> 100 endcidrange";
        let cmap = CidCMap::parse(data.as_bytes()).unwrap();
        assert_eq!(cmap.lookup(0x30), Some(100));
        assert_eq!(cmap.lookup(0x40), Some(10));
        assert_eq!(cmap.lookup(0x42), Some(118));
        assert_eq!(cmap.lookup(0x50), Some(20));
        assert_eq!(cmap.lookup(0x60), Some(148));
        let ranges = cmap.ranges();
        assert_eq!(ranges.len(), 5);
        assert!(ranges.windows(2).all(|pair| pair[0].high < pair[1].low));
    }

    #[test]
    fn truncated_block() {
        let data = "2 begincidrange <0020> <0030> 1";
        assert!(CidCMap::parse(data.as_bytes()).is_err());
    }

    #[test]
    fn usecmap_is_recorded() {
        let data = "/UniJIS-UCS2-H usecmap\n1 begincidchar <3000> 633 endcidchar";
        let cmap = CidCMap::parse(data.as_bytes()).unwrap();
        assert_eq!(cmap.parent_name(), Some("UniJIS-UCS2-H"));
        assert_eq!(cmap.lookup(0x3000), Some(633));
    }

    #[test]
    fn orderings() {
        assert_eq!(Ordering::by_name("GB1").map(|o| o.ucs2_cmap), Some("UniGB-UCS2-H"));
        assert_eq!(Ordering::by_name("UniKS-UCS2-H").map(|o| o.name), Some("Korea1"));
        assert_eq!(Ordering::for_code_pages(1 << 17).map(|o| o.name), Some("Japan1"));
        assert_eq!(Ordering::for_code_pages(1 << 21).map(|o| o.name), Some("Korea1"));
        assert_eq!(Ordering::for_code_pages(1), None);
        assert_eq!(Ordering::for_ros("Adobe", "CNS1").map(|o| o.supplement), Some(4));
        assert_eq!(Ordering::for_ros("Adobe", "Identity"), None);
    }

    #[test]
    fn load_resolves_usecmap() {
        let dir = std::env::temp_dir().join(format!("fontembed-cmap-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("UniJIS-UCS2-H"), UCS2_CMAP).unwrap();
        std::fs::write(
            dir.join("UniJIS-UCS2-HW-H"),
            "/CMapName /UniJIS-UCS2-HW-H def\n/UniJIS-UCS2-H usecmap\n1 begincidrange <0020> <007e> 231 endcidrange",
        )
        .unwrap();

        let cmap = CidCMap::load(&[dir.clone()], "UniJIS-UCS2-HW-H").unwrap();
        assert_eq!(cmap.lookup(0x41), Some(231 + 0x21));
        assert_eq!(cmap.lookup(0x4E00), Some(1200));

        match CidCMap::load(&[dir.clone()], "UniGB-UCS2-H") {
            Err(EmbedError::CMap(name)) => assert_eq!(name, "UniGB-UCS2-H"),
            _ => panic!("expected CMap error"),
        }
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn usecmap_chains_are_limited() {
        let dir = std::env::temp_dir().join(format!("fontembed-chain-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        // Chain-0 uses Chain-1 and so on up to Chain-6
        for level in 0..=6u16 {
            let parent = if level < 6 {
                format!("/Chain-{} usecmap\n", level + 1)
            } else {
                String::new()
            };
            let text = format!(
                "{}1 begincidchar <{:04x}> {} endcidchar",
                parent,
                0x100 + level,
                level + 1
            );
            std::fs::write(dir.join(format!("Chain-{}", level)), text).unwrap();
        }
        std::fs::write(dir.join("Loop-H"), "/Loop-H usecmap").unwrap();

        let cmap = CidCMap::load(&[dir.clone()], "Chain-2").unwrap();
        assert_eq!(cmap.name(), "Chain-2");
        assert_eq!(cmap.lookup(0x102), Some(3));
        assert_eq!(cmap.lookup(0x106), Some(7));
        assert_eq!(cmap.lookup(0x101), None);

        assert!(matches!(
            CidCMap::load(&[dir.clone()], "Chain-1"),
            Err(EmbedError::CMap(_))
        ));
        assert!(matches!(
            CidCMap::load(&[dir.clone()], "Loop-H"),
            Err(EmbedError::CMap(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
