//! SFV archive-manifest parsing.
//!
//! An SFV file lists `<filename> <crc32-hex>` pairs, one per line, with
//! `;` comment lines. Matching is case-insensitive on the file name, as
//! manifests routinely disagree with uploads on case.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SfvManifest {
    entries: HashMap<String, u32>,
}

impl SfvManifest {
    /// Parses manifest bytes leniently: undecodable bytes are replaced,
    /// malformed lines are skipped, later duplicates win.
    pub fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let mut entries = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            let Some((name, checksum)) = line.rsplit_once(char::is_whitespace) else {
                continue;
            };
            let name = name.trim();
            let checksum = checksum.trim();
            if name.is_empty() || checksum.is_empty() || checksum.len() > 8 {
                continue;
            }
            if let Ok(value) = u32::from_str_radix(checksum, 16) {
                entries.insert(name.to_ascii_lowercase(), value);
            }
        }
        SfvManifest { entries }
    }

    pub fn lookup(&self, file_name: &str) -> Option<u32> {
        self.entries.get(&file_name.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
