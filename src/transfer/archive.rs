//! In-memory zip expansion for expand-on-upload

use std::io::{Cursor, Read};
use tracing::{debug, warn};

/// One file read out of an archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name exactly as stored in the archive
    pub name: String,
    /// Decompressed content
    pub bytes: Vec<u8>,
}

/// Remote directory an archive is expanded into: `name` minus a trailing `.zip`
pub fn archive_directory_name(file_name: &str) -> &str {
    file_name.strip_suffix(".zip").unwrap_or(file_name)
}

/// Intermediate directories of an entry name, outermost first
///
/// `a/b/c.xml` yields `a` then `a/b`; a flat name yields nothing.
pub fn parent_directories(entry_name: &str) -> impl Iterator<Item = &str> {
    entry_name
        .match_indices('/')
        .map(move |(index, _)| &entry_name[..index])
        .filter(|prefix| !prefix.is_empty() && !prefix.ends_with('/'))
}

/// Read every file entry of a zip archive held in memory
///
/// Entries come back in archive order. Directory entries carry no content
/// and are skipped, as are entries whose path would escape the target
/// directory (`../`, absolute paths).
pub fn expand_zip_entries(bytes: &[u8]) -> zip::result::ZipResult<Vec<ArchiveEntry>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;

        if file.is_dir() {
            continue;
        }

        if file.enclosed_name().is_none() {
            warn!(entry = %file.name(), "skipping archive entry with unsafe path");
            continue;
        }

        let name = file.name().to_string();
        let mut content = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut content)?;

        entries.push(ArchiveEntry {
            name,
            bytes: content,
        });
    }

    debug!(entries = entries.len(), "archive expanded");
    Ok(entries)
}
