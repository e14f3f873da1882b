//! Zip archive access and the archive's file layout.
//!
//! A clio archive holds one top-level directory named after the feed:
//!
//! ```text
//! <feed>/_json/data/feedinfo.js          owner descriptor
//! <feed>/_json/data/entries/<hex8>.js    one file per entry
//! <feed>/_json/data/images.tsv           media url -> image file name
//! <feed>/_json/data/files.tsv            media url -> file name
//! <feed>/images/media/...                bundled images and thumbnails
//! <feed>/files/...                       bundled files
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;
use regex::Regex;
use zip::ZipArchive;

use clio_core::{ArchiveSource, Error, RawEntry, Result, UserRef};

pub static FEEDINFO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+/_json/data/feedinfo\.js$").unwrap());

pub static ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+/_json/data/entries/[0-9a-f]{8}\.js$").unwrap());

/// Archive backed by a zip file. Reads are serialized through a mutex.
pub struct ZipArchiveSource<R = File> {
    archive: Mutex<ZipArchive<R>>,
    names: Vec<String>,
    sizes: HashMap<String, u64>,
}

impl ZipArchiveSource<File> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::Archive(format!("cannot open {}: {}", path.display(), e)))?;
        Self::new(file)
    }
}

impl<R: Read + Seek> ZipArchiveSource<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader).map_err(|e| Error::Archive(e.to_string()))?;

        let mut names = Vec::with_capacity(archive.len());
        let mut sizes = HashMap::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive.by_index(i).map_err(|e| Error::Archive(e.to_string()))?;
            if file.is_dir() {
                continue;
            }
            names.push(file.name().to_string());
            sizes.insert(file.name().to_string(), file.size());
        }

        Ok(Self {
            archive: Mutex::new(archive),
            names,
            sizes,
        })
    }
}

impl<R: Read + Seek + Send> ArchiveSource for ZipArchiveSource<R> {
    fn file_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let mut archive = self.archive.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = archive
            .by_name(name)
            .map_err(|e| Error::Archive(format!("{}: {}", name, e)))?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)
            .map_err(|e| Error::Archive(format!("{}: {}", name, e)))?;
        Ok(data)
    }

    fn size(&self, name: &str) -> Option<u64> {
        self.sizes.get(name).copied()
    }
}

/// Archive username of the feed owner, from `feedinfo.js`.
pub fn find_owner(source: &dyn ArchiveSource) -> Result<String> {
    let name = source
        .file_names()
        .into_iter()
        .find(|n| FEEDINFO_RE.is_match(n))
        .ok_or_else(|| Error::Archive("cannot find feedinfo.js".to_string()))?;

    let user: UserRef = serde_json::from_slice(&source.read(&name)?)?;
    if user.kind != "user" {
        return Err(Error::Archive(format!(
            "@{} is not a user ({})",
            user.username, user.kind
        )));
    }
    Ok(user.username)
}

/// Names of the entry records, in archive order.
pub fn entry_names(source: &dyn ArchiveSource) -> Vec<String> {
    source
        .file_names()
        .into_iter()
        .filter(|n| ENTRY_RE.is_match(n))
        .collect()
}

pub fn read_entry(source: &dyn ArchiveSource, name: &str) -> Result<RawEntry> {
    let data = source.read(name)?;
    serde_json::from_slice(&data)
        .map_err(|e| Error::InvalidInput(format!("malformed entry {}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::zip_source;

    const ENTRY: &[u8] = br#"{
        "name": "e/0123abcd",
        "date": "2009-05-01T10:00:00Z",
        "body": "hello",
        "from": {"id": "alice", "type": "user"}
    }"#;

    #[test]
    fn test_file_names_and_sizes() {
        let source = zip_source(&[("alice/_json/data/feedinfo.js", b"{}"), ("alice/files/a.txt", b"abc")]);
        assert_eq!(source.file_names().len(), 2);
        assert_eq!(source.size("alice/files/a.txt"), Some(3));
        assert_eq!(source.read("alice/files/a.txt").unwrap(), b"abc");
        assert!(source.read("missing").is_err());
    }

    #[test]
    fn test_find_owner() {
        let source = zip_source(&[(
            "alice/_json/data/feedinfo.js",
            br#"{"id": "alice", "type": "user", "name": "Alice"}"#,
        )]);
        assert_eq!(find_owner(&source).unwrap(), "alice");
    }

    #[test]
    fn test_find_owner_rejects_groups() {
        let source = zip_source(&[(
            "friends/_json/data/feedinfo.js",
            br#"{"id": "friends", "type": "group"}"#,
        )]);
        let err = find_owner(&source).unwrap_err();
        assert!(err.to_string().contains("is not a user"));
    }

    #[test]
    fn test_find_owner_missing() {
        let source = zip_source(&[("alice/readme.txt", b"hi")]);
        assert!(matches!(find_owner(&source), Err(Error::Archive(_))));
    }

    #[test]
    fn test_entry_names_follow_layout() {
        let source = zip_source(&[
            ("alice/_json/data/entries/0123abcd.js", ENTRY),
            ("alice/_json/data/entries/notes.txt", b""),
            ("alice/_json/data/entries/0123ABCD.js", ENTRY),
            ("alice/_json/data/feedinfo.js", b"{}"),
        ]);
        assert_eq!(entry_names(&source), vec!["alice/_json/data/entries/0123abcd.js"]);
    }

    #[test]
    fn test_read_entry() {
        let source = zip_source(&[
            ("alice/_json/data/entries/0123abcd.js", ENTRY),
            ("alice/_json/data/entries/00000000.js", b"{not json"),
        ]);
        let entry = read_entry(&source, "alice/_json/data/entries/0123abcd.js").unwrap();
        assert_eq!(entry.name, "e/0123abcd");
        assert_eq!(entry.from.username, "alice");

        let err = read_entry(&source, "alice/_json/data/entries/00000000.js").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
