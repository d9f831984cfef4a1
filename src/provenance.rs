//! Download provenance recorded by the operating system.
//!
//! Browsers on Windows tag downloaded files with a `Zone.Identifier` alternate
//! data stream holding `key=value` lines. When such files are copied off NTFS
//! (WSL, Samba, archive tools) the stream shows up as a sibling file named
//! `<file>:Zone.Identifier`. Both are read through the same path.

use crate::config::ZONE_IDENTIFIER_SUFFIX;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

const HOST_URL_KEY: &str = "HostUrl=";

/// Looks up the URL a file was downloaded from.
pub trait ProvenanceReader: Send + Sync {
    /// Returns the origin URL, or `None` when it is unknown. Never fails.
    fn origin_url(&self, file: &Path) -> Option<String>;
}

/// Reads the `HostUrl` entry of the `Zone.Identifier` stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZoneIdentifierReader;

impl ZoneIdentifierReader {
    /// Path of the stream attached to `file`.
    pub fn stream_path(file: &Path) -> PathBuf {
        let mut raw = OsString::from(file.as_os_str());
        raw.push(ZONE_IDENTIFIER_SUFFIX);
        PathBuf::from(raw)
    }
}

impl ProvenanceReader for ZoneIdentifierReader {
    fn origin_url(&self, file: &Path) -> Option<String> {
        let stream = Self::stream_path(file);
        let bytes = match fs::read(&stream) {
            Ok(bytes) => bytes,
            Err(e) => {
                trace!(path = %stream.display(), error = %e, "no provenance stream");
                return None;
            }
        };
        parse_host_url(&String::from_utf8_lossy(&bytes))
    }
}

/// Extracts the `HostUrl=` value from the body of a `Zone.Identifier` stream.
pub fn parse_host_url(content: &str) -> Option<String> {
    content
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(HOST_URL_KEY))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
