use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::queue::{Job, JobKind};

pub fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

pub fn is_hidden(name: &OsStr) -> bool {
    name.as_encoded_bytes().starts_with(b".")
}

/// Output location for a path relative to the source root: markdown becomes
/// `.html`, everything else keeps its name.
pub fn output_path(relative: &Path) -> PathBuf {
    if is_markdown(relative) {
        relative.with_extension("html")
    } else {
        relative.to_path_buf()
    }
}

/// Whether `dst` has to be regenerated from `src`.
///
/// True when the destination is missing, is not a regular file, or was
/// modified strictly before the source.
pub fn needs_rebuild(src: &Path, dst: &Path) -> bool {
    let (Ok(src_meta), Ok(dst_meta)) = (fs::metadata(src), fs::metadata(dst)) else {
        return true;
    };
    if !dst_meta.is_file() {
        return true;
    }
    FileTime::from_last_modification_time(&dst_meta) < FileTime::from_last_modification_time(&src_meta)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    pub jobs: usize,
    /// Files whose destination was already fresh
    pub skipped: usize,
}

/// Depth-first, non-following walk of a source tree that mirrors its
/// directories into the destination and emits one job per stale file.
pub struct TreeWalker {
    source: PathBuf,
    destination: PathBuf,
    /// Destination relative to the source when it is nested inside it
    nested_destination: Option<PathBuf>,
}

impl TreeWalker {
    pub fn new<S: AsRef<Path>, D: AsRef<Path>>(source: S, destination: D) -> Self {
        let source = source.as_ref().to_path_buf();
        let destination = destination.as_ref().to_path_buf();
        let nested_destination = match (fs::canonicalize(&source), fs::canonicalize(&destination)) {
            (Ok(src), Ok(dst)) => dst.strip_prefix(&src).ok().map(Path::to_path_buf),
            _ => None,
        };

        Self {
            source,
            destination,
            nested_destination,
        }
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        if is_hidden(entry.file_name()) {
            return true;
        }
        match &self.nested_destination {
            Some(nested) if entry.file_type().is_dir() => {
                entry.path().strip_prefix(&self.source).is_ok_and(|rel| rel == nested)
            }
            _ => false,
        }
    }

    pub fn walk<F: FnMut(Job)>(&self, mut emit: F) -> WalkStats {
        let mut stats = WalkStats::default();
        let entries = WalkDir::new(&self.source)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e));

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.source) else {
                continue;
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                let dir = self.destination.join(relative);
                if let Err(e) = create_dir(&dir) {
                    warn!("mkdir {} failed: {}", dir.display(), e);
                }
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let destination = self.destination.join(output_path(relative));
            if let Some(parent) = destination.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    warn!("mkdir {} failed: {}", parent.display(), e);
                }
            }

            if !needs_rebuild(entry.path(), &destination) {
                stats.skipped += 1;
                continue;
            }

            let kind = if is_markdown(relative) { JobKind::Render } else { JobKind::Copy };
            debug!("Queueing {:?} {} -> {}", kind, entry.path().display(), destination.display());
            stats.jobs += 1;
            emit(Job {
                kind,
                source: entry.into_path(),
                destination,
            });
        }

        stats
    }
}

fn create_dir(path: &Path) -> io::Result<()> {
    match fs::create_dir(path) {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        result => result,
    }
}
