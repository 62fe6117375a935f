//! Version tags embedded in names (`shot_v012.blend`, `render_v003/`) and
//! allocation of the next free version number in a folder.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_v(\d+)").unwrap());

// The tag right before the extension, or at the very end when there is none
static TRAILING_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_v\d+((?:\.[^.]+)?)$").unwrap());

/// Returns the number in the first `_v<digits>` tag of `name`, or `0` if there is none.
///
/// Numbers that do not fit a `u32` are treated like a missing tag.
pub fn extract_version(name: &str) -> u32 {
    VERSION_RE
        .captures(name)
        .and_then(|captures| captures.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
        .unwrap_or(0)
}

/// Removes the version tag from `name`, keeping the extension.
///
/// Only a tag placed directly before the extension (or at the end of an
/// extensionless name) is removed. Names without such a tag are returned unchanged.
pub fn strip_version(name: &str) -> String {
    TRAILING_VERSION_RE.replace(name, "${1}").into_owned()
}

/// `extract_version(name) + 1`, saturating at `u32::MAX`.
pub fn next_version(name: &str) -> u32 {
    extract_version(name).saturating_add(1)
}

/// Formats a version as it appears in names and listings, e.g. `v007`.
pub fn format_version(version: u32) -> String {
    format!("v{:03}", version)
}

/// Builds `<stem>_v<NNN>.<ext>`, or `<stem>_v<NNN>` when `ext` is empty.
pub fn compose_versioned_name(stem: &str, version: u32, ext: &str) -> String {
    let ext = ext.trim_start_matches('.');
    if ext.is_empty() {
        format!("{}_{}", stem, format_version(version))
    } else {
        format!("{}_{}.{}", stem, format_version(version), ext)
    }
}

/// Which directory entries count towards the version maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryFilter {
    /// Only regular files (work files in `wip/`).
    #[default]
    Files,
    /// Only directories (version folders in `versions/`).
    Directories,
    All,
}

/// Options for [`latest_version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionScan {
    pub recursive: bool,
    pub entries: EntryFilter,
}

impl VersionScan {
    pub fn files() -> Self {
        VersionScan { recursive: false, entries: EntryFilter::Files }
    }

    pub fn directories() -> Self {
        VersionScan { recursive: false, entries: EntryFilter::Directories }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

/// Returns the highest version tag found among the entries of `scope`, or `0`.
///
/// With `scan.recursive` every subdirectory is visited too and the maximum is taken
/// over the whole subtree. Directories that cannot be read are skipped.
#[instrument(skip(scope), fields(scope = %scope.display()))]
pub async fn latest_version(scope: &Path, scan: VersionScan) -> u32 {
    let mut latest = 0;
    let mut pending: VecDeque<PathBuf> = VecDeque::from([scope.to_path_buf()]);

    while let Some(dir) = pending.pop_front() {
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Directory not found, no versions: {}", dir.display());
                continue;
            }
            Err(e) => {
                warn!("Failed to read directory '{}': {}", dir.display(), e);
                continue;
            }
        };

        loop {
            let entry = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read entry in '{}': {}", dir.display(), e);
                    break;
                }
            };

            let Ok(file_type) = entry.file_type().await else { continue };
            let is_dir = file_type.is_dir();
            if is_dir && scan.recursive {
                pending.push_back(entry.path());
            }

            let counted = match scan.entries {
                EntryFilter::Files => file_type.is_file(),
                EntryFilter::Directories => is_dir,
                EntryFilter::All => true,
            };
            if counted {
                let version = extract_version(&entry.file_name().to_string_lossy());
                latest = latest.max(version);
            }
        }
    }

    debug!("Latest version: {}", latest);
    latest
}

/// Returns `max(version) + 1` over the files in `scope` (optionally the whole
/// subtree), or `1` when nothing versioned is found. Saturates at `u32::MAX`.
pub async fn next_global_version(scope: &Path, recursive: bool) -> u32 {
    latest_version(scope, VersionScan::files().recursive(recursive))
        .await
        .saturating_add(1)
}

/// Returns a name for the next version of `base_name` among the files in `scope`.
///
/// `make_versioned_name("scene.blend", dir)` yields `scene_v008.blend` when the
/// highest existing version in `dir` is 7.
pub async fn make_versioned_name(base_name: &str, scope: &Path) -> String {
    make_versioned_name_in(base_name, scope, VersionScan::files()).await
}

pub async fn make_versioned_name_in(base_name: &str, scope: &Path, scan: VersionScan) -> String {
    let (stem, ext) = split_extension(base_name);
    let version = latest_version(scope, scan).await.saturating_add(1);
    compose_versioned_name(stem, version, ext)
}

/// Splits at the last dot. A leading dot (hidden file) is part of the stem.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx + 1..]),
        _ => (name, ""),
    }
}
