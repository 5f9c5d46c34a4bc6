use std::path::{Path, PathBuf};

use rand::{Rng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

/// Selects numbered sound files in one directory, e.g. `normalized/inhale_3.wav`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPattern {
    /// Directory relative to the sound root.
    pub dir: PathBuf,
    /// File name prefix; it must be followed directly by a digit.
    pub prefix: String,
    pub extension: String,
}

impl AssetPattern {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.to_owned(),
            extension: extension.to_owned(),
        }
    }

    /// Returns `true` if the entry is a file named `<prefix><digit>...<.extension>`.
    fn matches(&self, dir_entry: &DirEntry) -> bool {
        if !dir_entry.file_type().is_file() {
            return false;
        }

        let path = dir_entry.path();
        let has_extension = path.extension().is_some_and(|ext| ext == self.extension.as_str());

        let numbered = dir_entry
            .file_name()
            .to_str()
            .and_then(|name| name.strip_prefix(self.prefix.as_str()))
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c.is_ascii_digit());

        has_extension && numbered
    }
}

/// Lists the files under `root` matching `pattern`, sorted by path.
pub fn list_assets(root: &Path, pattern: &AssetPattern) -> Vec<PathBuf> {
    let dir = root.join(&pattern.dir);
    if !dir.is_dir() {
        warn!("Sound directory {} does not exist", dir.display());
        return Vec::new();
    }

    let mut assets: Vec<PathBuf> = WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| pattern.matches(e))
        .map(DirEntry::into_path)
        .collect();
    assets.sort();
    assets
}

/// An immutable set of interchangeable sounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoundPool {
    assets: Vec<PathBuf>,
}

impl SoundPool {
    pub fn new(assets: Vec<PathBuf>) -> Self {
        Self { assets }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn assets(&self) -> &[PathBuf] {
        &self.assets
    }

    /// Picks a sound uniformly at random.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Path> {
        self.assets.choose(rng).map(PathBuf::as_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundLayout {
    pub inhale: AssetPattern,
    pub exhale: AssetPattern,
    pub stems: AssetPattern,
    /// The ambient loop, relative to the sound root.
    pub ambient: PathBuf,
}

impl Default for SoundLayout {
    fn default() -> Self {
        Self {
            inhale: AssetPattern::new("normalized", "inhale_", "wav"),
            exhale: AssetPattern::new("normalized", "exhale_", "wav"),
            stems: AssetPattern::new("stems", "stem_", "wav"),
            ambient: PathBuf::from("ambient/loop.wav"),
        }
    }
}

/// Every sound the installation plays, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct Sounds {
    pub inhale: SoundPool,
    pub exhale: SoundPool,
    pub stems: SoundPool,
    pub ambient: Option<PathBuf>,
}

impl Sounds {
    pub fn discover(root: &Path, layout: &SoundLayout) -> Self {
        let sounds = Self {
            inhale: SoundPool::new(list_assets(root, &layout.inhale)),
            exhale: SoundPool::new(list_assets(root, &layout.exhale)),
            stems: SoundPool::new(list_assets(root, &layout.stems)),
            ambient: Some(root.join(&layout.ambient)).filter(|path| path.is_file()),
        };

        info!(
            "Found {} inhale, {} exhale and {} stem sounds in {}",
            sounds.inhale.len(),
            sounds.exhale.len(),
            sounds.stems.len(),
            root.display()
        );
        match &sounds.ambient {
            Some(ambient) => info!("Ambient loop: {}", ambient.display()),
            None => warn!("No ambient loop at {}", root.join(&layout.ambient).display()),
        }

        sounds
    }
}
