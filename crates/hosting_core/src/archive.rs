//! Archive inspection
//!
//! Opens an uploaded zip archive, enumerates its entries once, and locates
//! the engine's required marker files. The marker locations determine the
//! entry root: the path prefix inside the archive under which real game
//! content starts. Scanning is read-only; nothing touches the filesystem.

use crate::error::{ValidationError, ValidationResult};
use std::io::Cursor;
use std::path::PathBuf;
use zip::ZipArchive;

/// Entries under this prefix are macOS resource-fork noise and are ignored
/// for both validation and extraction.
pub const MACOS_RESOURCE_FORK_PREFIX: &str = "__MACOSX/";

/// Read-only view of a single archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry path with `/` separators, decoded per the upload's charset
    pub path: String,
    pub is_dir: bool,
}

/// The path prefix inside an archive under which game content begins.
///
/// Empty when the markers sit at the archive root; otherwise a prefix with a
/// trailing `/` (e.g. `data/`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRoot(String);

impl EntryRoot {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_archive_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The root as a relative filesystem path (empty for the archive root).
    pub fn rel_path(&self) -> PathBuf {
        safe_relative_path(&self.0).unwrap_or_default()
    }
}

impl std::fmt::Display for EntryRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("<archive root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Open an uploaded archive from its raw bytes.
pub fn open_archive(bytes: &[u8]) -> ValidationResult<ZipArchive<Cursor<&[u8]>>> {
    ZipArchive::new(Cursor::new(bytes)).map_err(ValidationError::BadArchive)
}

/// Enumerate all entries, decoding names per the optional legacy charset.
///
/// Without a charset the zip crate's own UTF-8/cp437 handling applies. With
/// one (e.g. `Shift_JIS` for old Japanese games), raw name bytes are decoded
/// through that encoding and undecodable names fail validation.
pub fn list_entries<R: std::io::Read + std::io::Seek>(
    zip: &mut ZipArchive<R>,
    charset: Option<&str>,
) -> ValidationResult<Vec<ArchiveEntry>> {
    let mut entries = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let file = zip.by_index(index)?;
        let path = match charset {
            Some(cs) => decode_entry_name(file.name_raw(), index, cs)?,
            None => file.name().to_string(),
        };
        let is_dir = file.is_dir() || path.ends_with('/');
        entries.push(ArchiveEntry { path, is_dir });
    }
    Ok(entries)
}

/// Decode a raw entry name through an explicit legacy charset.
pub(crate) fn decode_entry_name(
    raw: &[u8],
    index: usize,
    charset: &str,
) -> ValidationResult<String> {
    let encoding = encoding_rs::Encoding::for_label(charset.as_bytes())
        .ok_or_else(|| ValidationError::UnsupportedCharset(charset.to_string()))?;
    let (decoded, _, had_errors) = encoding.decode(raw);
    if had_errors {
        return Err(ValidationError::EntryNameEncoding {
            index,
            charset: charset.to_string(),
        });
    }
    Ok(decoded.into_owned())
}

/// Locate every required marker and derive the entry root.
///
/// A marker matches a file entry whose name ends with the marker string and
/// which is not inside `__MACOSX/`. All missing markers are collected into a
/// single error so the caller can report every problem at once. When several
/// markers are required they must all strip down to the same root; a
/// disagreement is an explicit validation failure, never last-write-wins.
pub fn find_entry_root(
    entries: &[ArchiveEntry],
    markers: &[&str],
) -> ValidationResult<EntryRoot> {
    let mut missing = Vec::new();
    let mut roots: Vec<(&str, String)> = Vec::new();

    for &marker in markers {
        let hit = entries.iter().find(|entry| {
            !entry.is_dir
                && !entry.path.starts_with(MACOS_RESOURCE_FORK_PREFIX)
                && entry.path.ends_with(marker)
        });
        match hit {
            Some(entry) => {
                let root = entry.path[..entry.path.len() - marker.len()].to_string();
                roots.push((marker, root));
            }
            None => missing.push(marker.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(ValidationError::MissingMarkers(missing));
    }
    let Some((_, first)) = roots.first() else {
        return Ok(EntryRoot(String::new()));
    };
    let first = first.clone();
    if roots.iter().any(|(_, root)| *root != first) {
        let conflicts = roots
            .iter()
            .map(|(marker, root)| {
                if root.is_empty() {
                    format!("{marker} -> <archive root>")
                } else {
                    format!("{marker} -> {root}")
                }
            })
            .collect();
        return Err(ValidationError::AmbiguousEntryRoot(conflicts));
    }

    Ok(EntryRoot(first))
}

/// One-shot validation pass: open, enumerate, locate markers.
///
/// Returns the entry listing alongside the root so extraction can reuse the
/// already-decoded names instead of decoding twice.
pub fn validate(
    bytes: &[u8],
    markers: &[&str],
    charset: Option<&str>,
) -> ValidationResult<(Vec<ArchiveEntry>, EntryRoot)> {
    let mut zip = open_archive(bytes)?;
    let entries = list_entries(&mut zip, charset)?;
    let root = find_entry_root(&entries, markers)?;
    Ok((entries, root))
}

/// Normalize an entry name into a relative path that cannot escape its
/// extraction root. Returns `None` for `..` traversal; absolute prefixes and
/// empty components are dropped.
pub(crate) fn safe_relative_path(name: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in name.split('/') {
        match component {
            "" | "." => continue,
            ".." => return None,
            normal => out.push(normal),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str) -> ArchiveEntry {
        ArchiveEntry {
            path: path.to_string(),
            is_dir: path.ends_with('/'),
        }
    }

    const EASY_RPG_MARKERS: [&str; 3] = ["RPG_RT.lmt", "RPG_RT.ldb", "RPG_RT.ini"];

    #[test]
    fn derives_root_from_nested_markers() {
        let entries = vec![
            entry("data/"),
            entry("data/RPG_RT.lmt"),
            entry("data/RPG_RT.ldb"),
            entry("data/RPG_RT.ini"),
            entry("data/Music/theme.mid"),
        ];
        let root = find_entry_root(&entries, &EASY_RPG_MARKERS).unwrap();
        assert_eq!(root.as_str(), "data/");
        assert_eq!(root.rel_path(), PathBuf::from("data"));
    }

    #[test]
    fn root_level_marker_yields_empty_root() {
        let entries = vec![entry("index.html"), entry("assets/app.js")];
        let root = find_entry_root(&entries, &["index.html"]).unwrap();
        assert!(root.is_archive_root());
        assert_eq!(root.rel_path(), PathBuf::new());
    }

    #[test]
    fn reports_every_missing_marker() {
        let entries = vec![entry("data/RPG_RT.ini")];
        let err = find_entry_root(&entries, &EASY_RPG_MARKERS).unwrap_err();
        match err {
            ValidationError::MissingMarkers(missing) => {
                assert_eq!(missing, vec!["RPG_RT.lmt", "RPG_RT.ldb"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn resource_fork_entries_are_ignored() {
        // Marker only under __MACOSX must fail validation.
        let entries = vec![entry("__MACOSX/index.html"), entry("readme.txt")];
        let err = find_entry_root(&entries, &["index.html"]).unwrap_err();
        assert!(matches!(err, ValidationError::MissingMarkers(_)));

        // Noise next to a real marker is skipped.
        let entries = vec![entry("__MACOSX/game/index.html"), entry("game/index.html")];
        let root = find_entry_root(&entries, &["index.html"]).unwrap();
        assert_eq!(root.as_str(), "game/");
    }

    #[test]
    fn conflicting_roots_fail_the_cross_check() {
        let entries = vec![
            entry("a/RPG_RT.lmt"),
            entry("b/RPG_RT.ldb"),
            entry("a/RPG_RT.ini"),
        ];
        let err = find_entry_root(&entries, &EASY_RPG_MARKERS).unwrap_err();
        match err {
            ValidationError::AmbiguousEntryRoot(conflicts) => {
                assert!(conflicts.iter().any(|c| c.contains("b/")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn directory_entries_never_match_markers() {
        let entries = vec![entry("index.html/")];
        assert!(find_entry_root(&entries, &["index.html"]).is_err());
    }

    #[test]
    fn decodes_legacy_charset_names() {
        let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode("データ/ゲーム.ini");
        let decoded = decode_entry_name(&encoded, 0, "Shift_JIS").unwrap();
        assert_eq!(decoded, "データ/ゲーム.ini");
    }

    #[test]
    fn unknown_charset_is_rejected() {
        let err = decode_entry_name(b"abc", 0, "klingon").unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedCharset(_)));
    }

    #[test]
    fn traversal_paths_are_rejected() {
        assert!(safe_relative_path("../evil").is_none());
        assert!(safe_relative_path("ok/../../evil").is_none());
        assert_eq!(
            safe_relative_path("/abs/path").unwrap(),
            PathBuf::from("abs/path")
        );
        assert_eq!(
            safe_relative_path("a/./b").unwrap(),
            PathBuf::from("a/b")
        );
    }

    #[test]
    fn validate_reads_real_zip_bytes() {
        use std::io::Write;
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        writer.add_directory("data/", options).unwrap();
        writer.start_file("data/RPG_RT.lmt", options).unwrap();
        writer.write_all(b"lmt").unwrap();
        writer.start_file("data/RPG_RT.ldb", options).unwrap();
        writer.write_all(b"ldb").unwrap();
        writer.start_file("data/RPG_RT.ini", options).unwrap();
        writer.write_all(b"[RPG_RT]\nGameTitle=test\n").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let (entries, root) = validate(&bytes, &EASY_RPG_MARKERS, None).unwrap();
        assert_eq!(root.as_str(), "data/");
        assert_eq!(entries.iter().filter(|e| !e.is_dir).count(), 3);
    }

    #[test]
    fn garbage_bytes_are_a_bad_archive() {
        let err = validate(b"not a zip at all", &["index.html"], None).unwrap_err();
        assert!(matches!(err, ValidationError::BadArchive(_)));
    }
}
