//! In-memory catalog of the logical directory tree.
//!
//! The master stores no file bytes. This catalog records which paths exist,
//! their sizes and checksums, and which storage nodes hold each file. It is
//! shared by every session, so all access goes through one internal lock
//! held only for the duration of a single lookup or mutation.

use crate::config::VfsConfig;
use crate::constants::FILE_NAME_REGEX;
use crate::core_vfs::error::VfsError;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FileMeta {
    pub size: u64,
    /// Checksum reported by the node that received the file, if any.
    pub crc32: Option<u32>,
    pub owner: String,
    pub modified: DateTime<Utc>,
    /// Wall-clock time the upload took, kept for speed statistics.
    pub transfer_time: Duration,
    /// Names of the storage nodes holding a replica.
    pub nodes: Vec<String>,
    /// True while an upload is still materializing the file.
    pub pending: bool,
}

#[derive(Debug, Clone)]
struct DirMeta {
    owner: String,
    modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum Entry {
    Dir(DirMeta),
    File(FileMeta),
}

/// One row of a directory listing, ready for LIST formatting.
#[derive(Debug, Clone)]
pub struct ListingRow {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub owner: String,
    pub modified: DateTime<Utc>,
}

pub struct VfsCatalog {
    entries: Mutex<BTreeMap<String, Entry>>,
    file_name: Regex,
    upload_allow: Vec<String>,
    download_deny: Vec<String>,
}

impl VfsCatalog {
    pub fn new(cfg: &VfsConfig) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "/".to_string(),
            Entry::Dir(DirMeta {
                owner: "root".to_string(),
                modified: Utc::now(),
            }),
        );
        let catalog = VfsCatalog {
            entries: Mutex::new(entries),
            file_name: Regex::new(FILE_NAME_REGEX).expect("valid file name pattern"),
            upload_allow: cfg.upload_allow.clone(),
            download_deny: cfg.download_deny.clone(),
        };
        for section in &cfg.sections {
            let path = Self::resolve("/", section);
            // Sections may nest; create missing ancestors first.
            let mut built = String::new();
            for part in path.split('/').filter(|p| !p.is_empty()) {
                built.push('/');
                built.push_str(part);
                let _ = catalog.make_dir(&built, "root");
            }
        }
        catalog
    }

    /// Joins a command argument onto the working directory and collapses
    /// `.` and `..` components. The result is always absolute.
    pub fn resolve(cwd: &str, arg: &str) -> String {
        let joined = if arg.starts_with('/') {
            arg.to_string()
        } else if cwd.ends_with('/') {
            format!("{}{}", cwd, arg)
        } else {
            format!("{}/{}", cwd, arg)
        };
        let mut parts: Vec<&str> = Vec::new();
        for part in joined.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        if parts.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", parts.join("/"))
        }
    }

    /// Splits an absolute path into its parent directory and final name.
    pub fn parent_and_name(path: &str) -> (String, String) {
        match path.rfind('/') {
            Some(0) => ("/".to_string(), path[1..].to_string()),
            Some(idx) => (path[..idx].to_string(), path[idx + 1..].to_string()),
            None => ("/".to_string(), path.to_string()),
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(
            self.entries.lock().unwrap().get(path),
            Some(Entry::Dir(_))
        )
    }

    pub fn make_dir(&self, path: &str, owner: &str) -> Result<(), VfsError> {
        let (parent, name) = Self::parent_and_name(path);
        if name.is_empty() {
            return Err(VfsError::AlreadyExists("/".to_string()));
        }
        let mut entries = self.entries.lock().unwrap();
        match entries.get(&parent) {
            Some(Entry::Dir(_)) => {}
            Some(_) => return Err(VfsError::NotADirectory(parent)),
            None => return Err(VfsError::NotFound(parent)),
        }
        if entries.contains_key(path) {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }
        entries.insert(
            path.to_string(),
            Entry::Dir(DirMeta {
                owner: owner.to_string(),
                modified: Utc::now(),
            }),
        );
        Ok(())
    }

    /// Looks up a completed plain file. Directories and still-uploading
    /// placeholders are not downloadable.
    pub fn lookup_plain_file(&self, path: &str) -> Result<FileMeta, VfsError> {
        match self.entries.lock().unwrap().get(path) {
            Some(Entry::File(meta)) if !meta.pending => Ok(meta.clone()),
            Some(Entry::File(_)) => Err(VfsError::NotFound(path.to_string())),
            Some(Entry::Dir(_)) => Err(VfsError::NotAPlainFile(path.to_string())),
            None => Err(VfsError::NotFound(path.to_string())),
        }
    }

    pub fn legal_upload_name(&self, path: &str) -> Result<(), VfsError> {
        let (_, name) = Self::parent_and_name(path);
        if self.file_name.is_match(&name) {
            Ok(())
        } else {
            Err(VfsError::NameNotAllowed(name))
        }
    }

    pub fn ensure_dir(&self, dir: &str) -> Result<(), VfsError> {
        match self.entries.lock().unwrap().get(dir) {
            Some(Entry::Dir(_)) => Ok(()),
            Some(_) => Err(VfsError::NotADirectory(dir.to_string())),
            None => Err(VfsError::NotFound(dir.to_string())),
        }
    }

    pub fn ensure_absent(&self, path: &str) -> Result<(), VfsError> {
        if self.entries.lock().unwrap().contains_key(path) {
            Err(VfsError::AlreadyExists(path.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn may_upload(&self, dir: &str) -> Result<(), VfsError> {
        if self.upload_allow.is_empty()
            || self.upload_allow.iter().any(|p| path_has_prefix(dir, p))
        {
            Ok(())
        } else {
            Err(VfsError::AccessDenied(dir.to_string()))
        }
    }

    pub fn may_download(&self, path: &str) -> Result<(), VfsError> {
        if self.download_deny.iter().any(|p| path_has_prefix(path, p)) {
            Err(VfsError::AccessDenied(path.to_string()))
        } else {
            Ok(())
        }
    }

    /// Registers the zero-length placeholder a STOR creates before any data
    /// flows, so concurrent listings see the upload in progress.
    pub fn register_pending(&self, path: &str, owner: &str, node: &str) -> Result<(), VfsError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(path) {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }
        entries.insert(
            path.to_string(),
            Entry::File(FileMeta {
                size: 0,
                crc32: None,
                owner: owner.to_string(),
                modified: Utc::now(),
                transfer_time: Duration::ZERO,
                nodes: vec![node.to_string()],
                pending: true,
            }),
        );
        Ok(())
    }

    pub fn finalize_upload(
        &self,
        path: &str,
        size: u64,
        crc32: Option<u32>,
        elapsed: Duration,
    ) -> Result<(), VfsError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(path) {
            Some(Entry::File(meta)) => {
                meta.size = size;
                meta.crc32 = crc32;
                meta.modified = Utc::now();
                meta.transfer_time = elapsed;
                meta.pending = false;
                Ok(())
            }
            _ => Err(VfsError::NotFound(path.to_string())),
        }
    }

    pub fn remove_file(&self, path: &str) -> Result<FileMeta, VfsError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(path) {
            Some(Entry::File(_)) => {}
            Some(Entry::Dir(_)) => return Err(VfsError::NotAPlainFile(path.to_string())),
            None => return Err(VfsError::NotFound(path.to_string())),
        }
        match entries.remove(path) {
            Some(Entry::File(meta)) => Ok(meta),
            _ => Err(VfsError::NotFound(path.to_string())),
        }
    }

    /// Stores a checksum observed during a download if none was cached.
    /// Returns the previously cached value, if any.
    pub fn cache_checksum(&self, path: &str, crc32: u32) -> Result<Option<u32>, VfsError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(path) {
            Some(Entry::File(meta)) => {
                let prior = meta.crc32;
                if prior.is_none() {
                    meta.crc32 = Some(crc32);
                }
                Ok(prior)
            }
            _ => Err(VfsError::NotFound(path.to_string())),
        }
    }

    pub fn list_dir(&self, dir: &str) -> Result<Vec<ListingRow>, VfsError> {
        let entries = self.entries.lock().unwrap();
        match entries.get(dir) {
            Some(Entry::Dir(_)) => {}
            Some(_) => return Err(VfsError::NotADirectory(dir.to_string())),
            None => return Err(VfsError::NotFound(dir.to_string())),
        }
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{}/", dir)
        };
        let mut rows = Vec::new();
        for (path, entry) in entries.range(prefix.clone()..) {
            if !path.starts_with(&prefix) {
                break;
            }
            let rest = &path[prefix.len()..];
            if rest.is_empty() || rest.contains('/') {
                continue;
            }
            let row = match entry {
                Entry::Dir(meta) => ListingRow {
                    name: rest.to_string(),
                    is_dir: true,
                    size: 0,
                    owner: meta.owner.clone(),
                    modified: meta.modified,
                },
                Entry::File(meta) => ListingRow {
                    name: rest.to_string(),
                    is_dir: false,
                    size: meta.size,
                    owner: meta.owner.clone(),
                    modified: meta.modified,
                },
            };
            rows.push(row);
        }
        Ok(rows)
    }

    /// Finds the archive manifest in a directory, if one has been uploaded.
    pub fn manifest_in(&self, dir: &str) -> Option<(String, FileMeta)> {
        let rows = self.list_dir(dir).ok()?;
        for row in rows {
            if !row.is_dir && row.name.to_ascii_lowercase().ends_with(".sfv") {
                let path = if dir == "/" {
                    format!("/{}", row.name)
                } else {
                    format!("{}/{}", dir, row.name)
                };
                if let Ok(meta) = self.lookup_plain_file(&path) {
                    return Some((path, meta));
                }
            }
        }
        None
    }
}

fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path == prefix || path.starts_with(&format!("{}/", prefix))
}
