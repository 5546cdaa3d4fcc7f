//! Flattens an uploaded ZIP archive into path-addressed entries.
//!
//! Nothing is filtered here: directory markers, platform artifacts and
//! unknown file types are all yielded so that the ingestion layer can decide
//! what to do with them.

use std::io::{Cursor, Read};

use crate::config::IngestConfig;
use crate::error::ArchiveError;

/// One entry of an uploaded archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    path: String,
    is_dir: bool,
    data: Vec<u8>,
    size: u64,
}

impl ArchiveEntry {
    /// A file entry. The declared size is the length of `data`.
    pub fn file(path: &str, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self {
            path: normalize_path(path),
            is_dir: false,
            size: data.len() as u64,
            data,
        }
    }

    /// A directory marker.
    pub fn directory(path: &str) -> Self {
        Self {
            path: normalize_path(path),
            is_dir: true,
            data: Vec::new(),
            size: 0,
        }
    }

    /// Full slash-separated path, directory components preserved.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Decompressed content. Always empty for directories.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size declared by the archive's directory record.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Last path component.
    pub fn file_name(&self) -> &str {
        match self.path.rfind('/') {
            Some(pos) => &self.path[pos + 1..],
            None => &self.path,
        }
    }

    /// Containing directory, `""` for top-level entries.
    pub fn directory_path(&self) -> &str {
        match self.path.rfind('/') {
            Some(pos) => &self.path[..pos],
            None => "",
        }
    }

    /// Directory components from the archive root down to the containing
    /// directory. For a directory marker this includes the directory itself.
    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        let dirs = if self.is_dir {
            self.path.as_str()
        } else {
            self.directory_path()
        };
        dirs.split('/').filter(|c| !c.is_empty())
    }

    /// Splits the file name into `(stem, extension)` on its final dot.
    ///
    /// Returns `None` for names without an extension or with an empty stem
    /// (dotfiles such as `.levelgen`).
    pub fn split_extension(&self) -> Option<(&str, &str)> {
        match self.file_name().rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Some((stem, ext)),
            _ => None,
        }
    }
}

/// Converts an archive-native name into a slash-separated relative path.
///
/// Backslashes become slashes, and leading `./` or `/` prefixes plus any
/// trailing slash are stripped.
pub fn normalize_path(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let mut path = unified.as_str();
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest;
        } else {
            break;
        }
    }
    path.trim_end_matches('/').to_string()
}

/// An opened ZIP archive.
///
/// Iteration is restartable only by calling [`Archive::entries`] again.
pub struct Archive<'a> {
    inner: zip::ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Archive<'a> {
    /// Open an archive from its raw bytes.
    pub fn open(data: &'a [u8]) -> Result<Self, ArchiveError> {
        let inner = zip::ZipArchive::new(Cursor::new(data))
            .map_err(|e| ArchiveError::Unreadable(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Number of entries recorded in the archive's central directory.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Lazily decompress entries in archive order, enforcing size limits.
    pub fn entries(&mut self, config: &IngestConfig) -> Entries<'_, 'a> {
        Entries {
            archive: &mut self.inner,
            index: 0,
            max_file_size: config.max_file_size,
            max_total_size: config.max_total_size,
            total: 0,
        }
    }
}

/// Iterator over the entries of an [`Archive`].
pub struct Entries<'r, 'a> {
    archive: &'r mut zip::ZipArchive<Cursor<&'a [u8]>>,
    index: usize,
    max_file_size: u64,
    max_total_size: u64,
    total: u64,
}

impl Entries<'_, '_> {
    fn read_entry(&mut self, index: usize) -> Result<ArchiveEntry, ArchiveError> {
        let file = self
            .archive
            .by_index(index)
            .map_err(|e| ArchiveError::Unreadable(format!("ZIP read error: {e}")))?;

        let raw_name = file.name().to_string();
        if file.is_dir() || raw_name.ends_with('/') || raw_name.ends_with('\\') {
            return Ok(ArchiveEntry::directory(&raw_name));
        }

        let declared = file.size();
        let path = normalize_path(&raw_name);

        let mut buf = Vec::new();
        file.take(self.max_file_size.saturating_add(1))
            .read_to_end(&mut buf)
            .map_err(|e| ArchiveError::Unreadable(format!("Failed to read '{path}': {e}")))?;

        if buf.len() as u64 > self.max_file_size {
            return Err(ArchiveError::FileTooLarge {
                path,
                limit: self.max_file_size,
            });
        }

        self.total = self.total.saturating_add(buf.len() as u64);
        if self.total > self.max_total_size {
            return Err(ArchiveError::TotalTooLarge {
                limit: self.max_total_size,
            });
        }

        Ok(ArchiveEntry {
            path,
            is_dir: false,
            data: buf,
            size: declared,
        })
    }
}

impl Iterator for Entries<'_, '_> {
    type Item = Result<ArchiveEntry, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.archive.len() {
            return None;
        }
        let index = self.index;
        self.index += 1;
        Some(self.read_entry(index))
    }
}

/// Open `data` and read every entry, failing on the first unreadable one.
pub fn read_entries(data: &[u8], config: &IngestConfig) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let mut archive = Archive::open(data)?;
    archive.entries(config).collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::build_zip;
    use super::*;

    #[test]
    fn normalize_path_unifies_separators() {
        assert_eq!(normalize_path("dir\\sub\\a.level"), "dir/sub/a.level");
        assert_eq!(normalize_path("./a.level"), "a.level");
        assert_eq!(normalize_path("/abs/a.level"), "abs/a.level");
        assert_eq!(normalize_path("dir/"), "dir");
    }

    #[test]
    fn entry_path_helpers() {
        let entry = ArchiveEntry::file("maps/pack/arena.level", "LevelName Arena");
        assert_eq!(entry.file_name(), "arena.level");
        assert_eq!(entry.directory_path(), "maps/pack");
        assert_eq!(entry.ancestors().collect::<Vec<_>>(), vec!["maps", "pack"]);
        assert_eq!(entry.split_extension(), Some(("arena", "level")));
        assert_eq!(entry.size(), 15);

        let top = ArchiveEntry::file("one.level", "");
        assert_eq!(top.directory_path(), "");
        assert_eq!(top.ancestors().count(), 0);

        let dir = ArchiveEntry::directory("maps/pack/");
        assert_eq!(dir.path(), "maps/pack");
        assert_eq!(dir.ancestors().collect::<Vec<_>>(), vec!["maps", "pack"]);
    }

    #[test]
    fn split_extension_rejects_dotfiles_and_bare_names() {
        assert_eq!(ArchiveEntry::file(".levelgen", "").split_extension(), None);
        assert_eq!(ArchiveEntry::file("README", "").split_extension(), None);
        assert_eq!(
            ArchiveEntry::file("a.b.levelgen", "").split_extension(),
            Some(("a.b", "levelgen"))
        );
    }

    #[test]
    fn walks_every_entry_in_archive_order() {
        let data = build_zip(&[
            ("one.level", "LevelName one"),
            ("dir/", ""),
            ("dir/two.levelgen", "script"),
            ("dir/notes.txt", "hello"),
        ]);

        let entries = read_entries(&data, &IngestConfig::default()).unwrap();
        let summary: Vec<(&str, bool)> = entries.iter().map(|e| (e.path(), e.is_dir())).collect();
        assert_eq!(
            summary,
            vec![
                ("one.level", false),
                ("dir", true),
                ("dir/two.levelgen", false),
                ("dir/notes.txt", false),
            ]
        );
        assert_eq!(entries[2].data(), b"script");
        assert_eq!(entries[2].size(), 6);
        assert!(entries[1].data().is_empty());
    }

    #[test]
    fn entries_can_be_restarted() {
        let data = build_zip(&[("a.level", "x"), ("b.level", "y")]);
        let config = IngestConfig::default();
        let mut archive = Archive::open(&data).unwrap();
        assert_eq!(archive.len(), 2);

        let first: Vec<_> = archive.entries(&config).map(|e| e.unwrap()).collect();
        let second: Vec<_> = archive.entries(&config).map(|e| e.unwrap()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn garbage_is_unreadable() {
        let result = read_entries(b"definitely not a zip", &IngestConfig::default());
        assert!(matches!(result, Err(ArchiveError::Unreadable(_))));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let data = build_zip(&[("big.level", "0123456789")]);
        let config = IngestConfig {
            max_file_size: 4,
            ..Default::default()
        };
        let result = read_entries(&data, &config);
        assert!(matches!(
            result,
            Err(ArchiveError::FileTooLarge { ref path, limit: 4 }) if path == "big.level"
        ));
    }

    #[test]
    fn oversized_total_is_rejected() {
        let data = build_zip(&[("a.level", "12345"), ("b.level", "12345")]);
        let config = IngestConfig {
            max_file_size: 8,
            max_total_size: 8,
            ..Default::default()
        };
        let result = read_entries(&data, &config);
        assert!(matches!(result, Err(ArchiveError::TotalTooLarge { limit: 8 })));
    }

    #[test]
    fn unbounded_limits_read_every_entry() {
        let data = build_zip(&[("a.level", "LevelName A"), ("b.levelgen", "spawn()")]);
        let config = IngestConfig {
            max_file_size: u64::MAX,
            max_total_size: u64::MAX,
            ..Default::default()
        };
        let entries = read_entries(&data, &config).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].data(), b"LevelName A");
    }
}
