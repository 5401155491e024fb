//! Tarball download and extraction.
//!
//! The download is streamed straight through gzip and tar, so the archive is
//! never held in memory. Every entry path loses its first segment (the
//! wrapper directory, usually `package/`) before it is joined onto the
//! destination.

use super::error::PkgError;
use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tar::{Archive, EntryType};

/// Maximum tarball size (200 MB).
pub const MAX_TARBALL_SIZE: u64 = 200 * 1024 * 1024;

/// Default download timeout in seconds. The body is read while extracting,
/// so this bounds the whole extraction.
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Mode for parent directories created implicitly for file entries.
const PARENT_DIR_MODE: u32 = 0o755;

/// What to do with an entry that has no wrapper directory.
///
/// A single-segment *directory* entry is the wrapper itself and always maps
/// onto the destination root. The policy only decides what happens to
/// single-segment *files*.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BareEntryPolicy {
    /// Leave the file out and count it as skipped.
    #[default]
    Skip,
    /// Abort extraction.
    Reject,
}

/// Extraction options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub bare_entries: BareEntryPolicy,
    /// Maximum number of compressed bytes read from the source.
    pub max_bytes: u64,
    /// Time allowed for the download, from connecting until the last body
    /// byte has been read.
    pub timeout: Duration,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            bare_entries: BareEntryPolicy::default(),
            max_bytes: MAX_TARBALL_SIZE,
            timeout: Duration::from_secs(DOWNLOAD_TIMEOUT_SECS),
        }
    }
}

/// Counts of what an extraction did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub files: u64,
    pub directories: u64,
    pub skipped: u64,
    pub bytes_written: u64,
}

/// Download a tarball and extract it into `dest`.
///
/// `dest` is only created once the server has answered with a success
/// status, so a failed request leaves the filesystem untouched. A failure
/// part-way through extraction leaves whatever was already written.
///
/// # Errors
/// Returns an error if the URL is empty, the request fails, the server
/// answers with a non-success status, the tarball exceeds
/// `options.max_bytes`, or extraction fails.
pub fn download_and_extract(
    client: &Client,
    url: &str,
    dest: &Path,
    options: &ExtractOptions,
) -> Result<ExtractReport, PkgError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(PkgError::download_failed("Tarball URL is empty"));
    }

    tracing::info!(url, "downloading tarball");

    let response = client
        .get(url)
        .timeout(options.timeout)
        .send()
        .map_err(|e| PkgError::download_failed(format!("Failed to download '{url}': {e}")))?;

    if !response.status().is_success() {
        return Err(PkgError::download_failed(format!(
            "Download failed with status {} for '{url}'",
            response.status()
        )));
    }

    // Check content length if available
    if let Some(len) = response.content_length() {
        if len > options.max_bytes {
            return Err(PkgError::download_failed(format!(
                "Tarball too large: {len} bytes (max: {})",
                options.max_bytes
            )));
        }
    }

    fs::create_dir_all(dest).map_err(|e| {
        PkgError::io(format!(
            "Failed to create destination '{}': {e}",
            dest.display()
        ))
    })?;

    extract_tgz(LimitedReader::new(response, options.max_bytes), dest, options)
}

/// Extract a gzip-compressed tar stream into `dest`.
///
/// Entries are processed in archive order. Each entry's first path segment
/// is dropped; parents of file entries are created on demand. Symlinks,
/// hard links and device entries are skipped.
///
/// # Errors
/// Returns an error on malformed gzip or tar data, unsafe entry paths, a
/// bare file under [`BareEntryPolicy::Reject`], or any filesystem failure.
pub fn extract_tgz<R: Read>(
    reader: R,
    dest: &Path,
    options: &ExtractOptions,
) -> Result<ExtractReport, PkgError> {
    let gz = GzDecoder::new(reader);
    let mut archive = Archive::new(gz);
    let mut report = ExtractReport::default();

    let entries = archive
        .entries()
        .map_err(|e| PkgError::extract_failed(format!("Failed to read tarball entries: {e}")))?;

    for entry in entries {
        let mut entry = entry
            .map_err(|e| PkgError::extract_failed(format!("Failed to read tarball entry: {e}")))?;

        let raw_path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let entry_type = entry.header().entry_type();
        let is_dir = entry_type.is_dir();

        if is_metadata(entry_type) {
            tracing::trace!(path = %raw_path, kind = ?entry_type, "metadata record");
            continue;
        }

        let relative = match strip_wrapper(&raw_path)? {
            Some(relative) => relative,
            None if is_dir => {
                // The wrapper directory itself.
                continue;
            }
            None => match options.bare_entries {
                BareEntryPolicy::Skip => {
                    tracing::warn!(path = %raw_path, "skipping entry outside wrapper directory");
                    report.skipped += 1;
                    continue;
                }
                BareEntryPolicy::Reject => {
                    return Err(PkgError::extract_failed(format!(
                        "Tarball entry '{raw_path}' is not inside a top-level directory"
                    )));
                }
            },
        };

        let dest_path = dest.join(&relative);
        let mode = entry.header().mode().ok();

        if is_dir {
            tracing::trace!(path = %relative.display(), "directory");
            ensure_dir(&dest_path)?;
            if let Some(mode) = mode {
                set_mode(&dest_path, mode | 0o700)?;
            }
            report.directories += 1;
            continue;
        }

        if !is_regular_file(entry_type) {
            tracing::warn!(
                path = %raw_path,
                kind = ?entry_type,
                "skipping unsupported entry type"
            );
            report.skipped += 1;
            continue;
        }

        if let Some(parent) = dest_path.parent() {
            ensure_dir(parent)?;
        }

        let written = write_file(&mut entry, &dest_path, mode)?;
        tracing::trace!(path = %relative.display(), bytes = written, "file");

        report.files += 1;
        report.bytes_written += written;
    }

    tracing::info!(
        files = report.files,
        directories = report.directories,
        skipped = report.skipped,
        "extracted tarball into {}",
        dest.display()
    );

    Ok(report)
}

/// Drop the first `/`-separated segment of an archive path.
///
/// Returns `Ok(None)` when nothing is left (a top-level entry), and
/// `Ok(Some(path))` with the remaining segments otherwise. Empty and `.`
/// segments are ignored.
///
/// # Errors
/// Returns an error for absolute paths and for paths with `..` or other
/// non-plain segments.
pub fn strip_wrapper(raw: &str) -> Result<Option<PathBuf>, PkgError> {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return Err(PkgError::extract_failed(format!(
            "Tarball contains absolute path: {raw}"
        )));
    }

    let mut segments = raw.split('/').filter(|s| !s.is_empty() && *s != ".");

    let Some(first) = segments.next() else {
        return Ok(None);
    };
    check_segment(raw, first)?;

    let mut relative = PathBuf::new();
    for segment in segments {
        check_segment(raw, segment)?;
        relative.push(segment);
    }

    if relative.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(relative))
    }
}

/// A segment must be a single plain path component on this platform.
fn check_segment(raw: &str, segment: &str) -> Result<(), PkgError> {
    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) => Err(PkgError::extract_failed(format!(
            "Tarball contains path traversal: {raw}"
        ))),
        _ => Err(PkgError::extract_failed(format!(
            "Tarball contains unsafe path: {raw}"
        ))),
    }
}

/// Pax global headers describe the whole archive and are never written.
///
/// Per-entry pax records and GNU long-name records are folded into the
/// following entry by the tar reader, so they never show up here.
fn is_metadata(entry_type: EntryType) -> bool {
    entry_type == EntryType::XGlobalHeader
}

fn is_regular_file(entry_type: EntryType) -> bool {
    matches!(entry_type, EntryType::Regular | EntryType::Continuous)
}

/// Create a directory and any missing parents. Existing directories are fine.
fn ensure_dir(path: &Path) -> Result<(), PkgError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(PARENT_DIR_MODE);
    }

    builder.create(path).map_err(|e| {
        PkgError::io(format!(
            "Failed to create directory '{}': {e}",
            path.display()
        ))
    })
}

fn write_file(entry: &mut impl Read, path: &Path, mode: Option<u32>) -> Result<u64, PkgError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if let Some(mode) = mode {
            options.mode(mode | 0o600);
        }
    }

    let mut file = options
        .open(path)
        .map_err(|e| PkgError::io(format!("Failed to create '{}': {e}", path.display())))?;

    let written = io::copy(entry, &mut file)
        .map_err(|e| PkgError::extract_failed(format!("Failed to write '{}': {e}", path.display())))?;

    // The file may have existed with other permissions, and umask applies on create.
    if let Some(mode) = mode {
        set_mode(path, mode | 0o600)?;
    }

    Ok(written)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), PkgError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)).map_err(|e| {
        PkgError::io(format!(
            "Failed to set permissions on '{}': {e}",
            path.display()
        ))
    })
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), PkgError> {
    Ok(())
}

/// Reader that fails once more than `limit` bytes have been read.
struct LimitedReader<R> {
    inner: R,
    limit: u64,
    remaining: u64,
}

impl<R> LimitedReader<R> {
    fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            limit,
            remaining: limit,
        }
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.remaining == 0 {
            let mut probe = [0u8; 1];
            return match self.inner.read(&mut probe)? {
                0 => Ok(0),
                _ => Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("tarball exceeds {} bytes", self.limit),
                )),
            };
        }

        let max = usize::try_from(self.remaining)
            .unwrap_or(usize::MAX)
            .min(buf.len());
        let n = self.inner.read(&mut buf[..max])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}
