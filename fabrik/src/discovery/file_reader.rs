//! The `FileReader` capability Discovery uses for orientation: enumerate a
//! tree (bounded) and read individual files best-effort.

use std::path::{Path, PathBuf};

const MAX_FILES: usize = 200;
const MAX_DEPTH: usize = 4;
const EXCLUDED_DIRS: [&str; 6] = [
    "node_modules",
    ".git",
    ".hg",
    ".svn",
    "target",
    "dist",
];

/// One file found by [`FileReader::list_tree`].
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub path: String,
}

/// Abstraction over reading a local codebase, so discovery's orientation
/// step can be exercised against a fixture tree without touching the real
/// filesystem in tests.
pub trait FileReader: Send + Sync {
    fn list_tree(&self, root: &Path) -> Vec<FileEntry>;
    fn read_to_string(&self, path: &Path) -> Option<String>;
}

/// Walks the real filesystem, rooted wherever `root` points.
pub struct LocalFileReader;

impl FileReader for LocalFileReader {
    fn list_tree(&self, root: &Path) -> Vec<FileEntry> {
        let mut entries = Vec::new();
        walk(root, root, 0, &mut entries);
        entries
    }

    fn read_to_string(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }
}

fn walk(root: &Path, dir: &Path, depth: usize, entries: &mut Vec<FileEntry>) {
    if depth > MAX_DEPTH || entries.len() >= MAX_FILES {
        return;
    }
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return;
    };
    let mut children: Vec<PathBuf> = read_dir.filter_map(|e| e.ok().map(|e| e.path())).collect();
    children.sort();

    for path in children {
        if entries.len() >= MAX_FILES {
            return;
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if path.is_dir() {
            if EXCLUDED_DIRS.contains(&name) {
                continue;
            }
            walk(root, &path, depth + 1, entries);
        } else if let Ok(relative) = path.strip_prefix(root) {
            entries.push(FileEntry {
                path: relative.to_string_lossy().replace('\\', "/"),
            });
        }
    }
}

/// Best-effort read of the first existing candidate (used for README and
/// manifest lookups, both of which are tolerated absent).
pub fn read_first_existing(
    reader: &dyn FileReader,
    root: &Path,
    candidates: &[&str],
) -> Option<String> {
    candidates
        .iter()
        .find_map(|name| reader.read_to_string(&root.join(name)))
}
