//! Font lookup by name over the configured font directories.
//!
//! The cache is created from a `FontConfig` snapshot. Directories are scanned once, fonts are
//! parsed the first time they are asked for, and `refresh` rescans everything when the
//! configuration changes. The cache can be shared between threads generating different
//! documents.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};
use rustc_hash::FxHashMap;

use crate::afm::AfmFont;
use crate::binary::read::ReadScope;
use crate::cid_cmap::CidCMap;
use crate::error::EmbedError;
use crate::font_info::{FontInfo, FontStyle, SfntFont};
use crate::names::FontNames;
use crate::tables::{FontTableProvider, OpenTypeFont};
use crate::tag;

/// Separator of the directories in a search path string.
pub const SEARCH_PATH_SEPARATOR: char = ';';

/// Substituted for fonts that are missing or cannot be read.
pub const DEFAULT_FONT: &str = "Times-Roman";

/// Depth of sub-directories searched below each font directory.
const MAX_SCAN_DEPTH: usize = 4;

/// Where to look for fonts and CMap resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontConfig {
    pub truetype_dirs: Vec<PathBuf>,
    pub afm_dirs: Vec<PathBuf>,
    pub cmap_dirs: Vec<PathBuf>,
}

impl FontConfig {
    /// Build a configuration from `;` separated directory lists. Empty entries are skipped.
    pub fn from_search_paths(truetype: &str, afm: &str, cmap: &str) -> FontConfig {
        FontConfig {
            truetype_dirs: split_search_path(truetype),
            afm_dirs: split_search_path(afm),
            cmap_dirs: split_search_path(cmap),
        }
    }
}

fn split_search_path(path: &str) -> Vec<PathBuf> {
    path.split(SEARCH_PATH_SEPARATOR)
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// A font returned by the cache.
#[derive(Debug, Clone)]
pub enum LoadedFont {
    Sfnt(Arc<SfntFont>),
    Afm(Arc<AfmFont>),
}

impl LoadedFont {
    pub fn info(&self) -> &FontInfo {
        match self {
            LoadedFont::Sfnt(font) => &font.info,
            LoadedFont::Afm(font) => &font.info,
        }
    }

    pub fn postscript_name(&self) -> &str {
        &self.info().postscript_name
    }

    /// True if both refer to the same loaded font.
    pub fn same_font(&self, other: &LoadedFont) -> bool {
        match (self, other) {
            (LoadedFont::Sfnt(a), LoadedFont::Sfnt(b)) => Arc::ptr_eq(a, b),
            (LoadedFont::Afm(a), LoadedFont::Afm(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FontSource {
    Sfnt { path: PathBuf, index: usize },
    Afm(PathBuf),
}

#[derive(Default)]
struct CacheState {
    config: FontConfig,
    /// Lowercased font names
    sources: FxHashMap<String, FontSource>,
    /// Lowercased family name and style
    families: FxHashMap<(String, FontStyle), FontSource>,
    fonts: FxHashMap<FontSource, LoadedFont>,
    cmaps: FxHashMap<String, Option<Arc<CidCMap>>>,
}

/// Fonts found in the configured directories, parsed on first use.
pub struct FontCache {
    state: Mutex<CacheState>,
}

impl FontCache {
    /// Create a cache and scan the directories of `config`.
    pub fn new(config: FontConfig) -> FontCache {
        let mut state = CacheState::default();
        state.scan(config);
        FontCache {
            state: Mutex::new(state),
        }
    }

    /// Drop every cached font and rescan with `config`.
    pub fn refresh(&self, config: FontConfig) {
        let mut state = self.lock();
        *state = CacheState::default();
        state.scan(config);
        info!("font cache refreshed, {} font names", state.sources.len());
    }

    pub fn config(&self) -> FontConfig {
        self.lock().config.clone()
    }

    /// Every known font name, lowercased and sorted.
    pub fn font_names(&self) -> Vec<String> {
        let mut names = self.lock().sources.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().sources.contains_key(&name.to_lowercase())
    }

    /// The font called `name`. Names are matched case-insensitively against the PostScript,
    /// full and family names of every font found.
    pub fn get(&self, name: &str) -> Result<LoadedFont, EmbedError> {
        let mut state = self.lock();
        let source = state
            .sources
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| EmbedError::UnknownFont(name.to_string()))?;
        state.load(source)
    }

    /// The font called `name`, or `DEFAULT_FONT` when it is unknown or cannot be read.
    pub fn get_or_default(&self, name: &str) -> Result<LoadedFont, EmbedError> {
        self.get(name).or_else(|err| {
            warn!("using {} in place of '{}': {}", DEFAULT_FONT, name, err);
            self.get(DEFAULT_FONT)
        })
    }

    /// The font of `family` with `style`, or the font called `family` if the family has no
    /// such member.
    pub fn get_styled(&self, family: &str, style: FontStyle) -> Result<LoadedFont, EmbedError> {
        let source = self
            .lock()
            .families
            .get(&(family.to_lowercase(), style))
            .cloned();
        match source {
            Some(source) => self.lock().load(source),
            None => self.get(family),
        }
    }

    /// The CMap resource called `name` from the CMap directories.
    pub fn cmap(&self, name: &str) -> Option<Arc<CidCMap>> {
        self.lock().cmap(name)
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // The state is rebuilt wholesale or extended by idempotent inserts, a panic while the
        // lock was held leaves it usable
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CacheState {
    fn scan(&mut self, config: FontConfig) {
        for dir in &config.truetype_dirs {
            for path in font_files(dir, &["ttf", "otf", "ttc", "otc"]) {
                if let Err(err) = self.index_sfnt(&path) {
                    warn!("skipping font {}: {}", path.display(), err);
                }
            }
        }
        for dir in &config.afm_dirs {
            for path in font_files(dir, &["afm"]) {
                match AfmFont::from_file(&path) {
                    Ok(font) => {
                        let source = FontSource::Afm(path);
                        let info = font.info.clone();
                        self.add_names(&info, source.clone());
                        self.fonts.insert(source, LoadedFont::Afm(Arc::new(font)));
                    }
                    Err(err) => warn!("skipping AFM {}: {}", path.display(), err),
                }
            }
        }
        debug!(
            "scanned {} font directories, {} font names",
            config.truetype_dirs.len() + config.afm_dirs.len(),
            self.sources.len()
        );
        self.config = config;
    }

    fn index_sfnt(&mut self, path: &Path) -> Result<(), EmbedError> {
        let data = fs::read(path)?;
        let font_file = ReadScope::new(&data).read::<OpenTypeFont<'_>>()?;
        for index in 0..font_file.num_fonts() {
            let provider = font_file.table_provider(index)?;
            let names = match provider.table_data(tag::NAME)? {
                Some(name_data) => FontNames::read(&name_data)?,
                None => continue,
            };
            let source = FontSource::Sfnt {
                path: path.to_path_buf(),
                index,
            };
            let style = subfamily_style(names.subfamily.as_deref());
            for name in [&names.postscript_name, &names.full_name]
                .into_iter()
                .flatten()
            {
                self.add_name(name, source.clone());
            }
            if let Some(family) = &names.family {
                self.families
                    .entry((family.to_lowercase(), style))
                    .or_insert_with(|| source.clone());
                if style.is_empty() {
                    self.add_name(family, source);
                }
            }
        }
        Ok(())
    }

    fn add_names(&mut self, info: &FontInfo, source: FontSource) {
        self.add_name(&info.postscript_name, source.clone());
        self.add_name(&info.full_name, source.clone());
        self.families
            .entry((info.family_name.to_lowercase(), info.style))
            .or_insert_with(|| source.clone());
        if info.style.is_empty() {
            self.add_name(&info.family_name, source);
        }
    }

    /// The first font found under a name keeps it.
    fn add_name(&mut self, name: &str, source: FontSource) {
        if name.is_empty() {
            return;
        }
        self.sources.entry(name.to_lowercase()).or_insert(source);
    }

    fn load(&mut self, source: FontSource) -> Result<LoadedFont, EmbedError> {
        if let Some(font) = self.fonts.get(&source) {
            return Ok(font.clone());
        }
        let font = match &source {
            FontSource::Sfnt { path, index } => {
                let mut font = SfntFont::from_file(path, *index).map_err(|err| {
                    warn!("unable to load font {}: {}", path.display(), err);
                    err
                })?;
                if let Some(ordering) = font.cjk_ordering() {
                    match self.cmap(ordering.ucs2_cmap) {
                        Some(cmap) => font.set_cid_cmap(cmap),
                        None => debug!(
                            "no CMap {} for {}, using Identity-H",
                            ordering.ucs2_cmap, font.info.postscript_name
                        ),
                    }
                }
                LoadedFont::Sfnt(Arc::new(font))
            }
            FontSource::Afm(path) => LoadedFont::Afm(Arc::new(AfmFont::from_file(path)?)),
        };
        self.fonts.insert(source, font.clone());
        Ok(font)
    }

    fn cmap(&mut self, name: &str) -> Option<Arc<CidCMap>> {
        if let Some(cmap) = self.cmaps.get(name) {
            return cmap.clone();
        }
        let cmap = match CidCMap::load(&self.config.cmap_dirs, name) {
            Ok(cmap) => Some(Arc::new(cmap)),
            Err(err) => {
                warn!("{}", err);
                None
            }
        };
        self.cmaps.insert(name.to_string(), cmap.clone());
        cmap
    }
}

/// Bold and italic as named by a `name` table subfamily such as "Bold Italic".
fn subfamily_style(subfamily: Option<&str>) -> FontStyle {
    let subfamily = subfamily.unwrap_or("").to_lowercase();
    let mut style = FontStyle::empty();
    if subfamily.contains("bold") {
        style |= FontStyle::BOLD;
    }
    if subfamily.contains("italic") || subfamily.contains("oblique") {
        style |= FontStyle::ITALIC;
    }
    style
}

/// Files below `dir` with one of `extensions`, in sorted order.
fn font_files(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_files(dir, extensions, 0, &mut files);
    files.sort();
    files
}

fn collect_files(dir: &Path, extensions: &[&str], depth: usize, files: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("unable to read font directory {}: {}", dir.display(), err);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if depth < MAX_SCAN_DEPTH {
                collect_files(&path, extensions, depth + 1, files);
            }
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| {
                extensions
                    .iter()
                    .any(|wanted| ext.eq_ignore_ascii_case(wanted))
            });
        if matches {
            files.push(path);
        }
    }
}
