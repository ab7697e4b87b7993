//! Downloading, unpacking and removing the Kafka distribution.

use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;

use crate::error::{ArchiveError, FetchError};

/// Source of remote bytes.
pub trait Fetch: Send + Sync {
    /// Streams the body behind `url` into `sink`, returning the byte count.
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError>;
}

/// Blocking HTTP(S) fetcher.
pub struct Http {
    client: reqwest::blocking::Client,
}

impl Http {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for Http {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for Http {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
        let http = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(http)?;

        response.copy_to(sink).map_err(http)
    }
}

/// Whether [`ensure_archive`] had to go to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cached {
    Hit,
    Downloaded(u64),
}

/// Makes sure a regular file exists at `path`, downloading it from `url` if
/// it doesn't.
///
/// The body is written to a sibling `.part` file which is renamed into place
/// only once the transfer has finished, so a failed download never looks
/// like a cache hit on the next run.
pub fn ensure_archive(
    path: &Utf8Path,
    url: &str,
    fetch: &dyn Fetch,
) -> Result<Cached, ArchiveError> {
    if path.is_file() {
        tracing::info!("using {} from cache: {}", file_name(path), path);
        return Ok(Cached::Hit);
    }

    if let Some(parent) = path.parent() {
        tracing::info!("create work dir: {}", parent);
        fs::create_dir_all(parent).map_err(|e| ArchiveError::FileSystem(parent.to_owned(), e))?;
    }

    tracing::info!("download {} archive from: {}", file_name(path), url);

    let part = part_path(path);
    let result = download_to(&part, url, fetch);

    match result {
        Ok(bytes) => {
            fs::rename(&part, path).map_err(|e| ArchiveError::FileSystem(path.to_owned(), e))?;
            tracing::debug!("downloaded {} bytes into {}", bytes, path);
            Ok(Cached::Downloaded(bytes))
        }
        Err(err) => {
            if let Err(e) = fs::remove_file(&part)
                && e.kind() != io::ErrorKind::NotFound
            {
                tracing::warn!("couldn't remove partial download {}: {}", part, e);
            }
            Err(err)
        }
    }
}

fn download_to(part: &Utf8Path, url: &str, fetch: &dyn Fetch) -> Result<u64, ArchiveError> {
    let file = fs::File::create(part).map_err(|e| ArchiveError::FileSystem(part.to_owned(), e))?;
    let mut writer = io::BufWriter::new(file);

    let bytes = fetch.fetch(url, &mut writer)?;

    writer
        .into_inner()
        .map_err(|e| ArchiveError::FileSystem(part.to_owned(), e.into_error()))?
        .sync_all()
        .map_err(|e| ArchiveError::FileSystem(part.to_owned(), e))?;

    Ok(bytes)
}

fn part_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut part = path.as_str().to_owned();
    part.push_str(".part");
    Utf8PathBuf::from(part)
}

fn file_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}

/// Unpacks a gzip compressed tarball into `destination`, overwriting files
/// that already exist.
pub fn extract(archive: &Utf8Path, destination: &Utf8Path) -> Result<(), ArchiveError> {
    let file = fs::File::open(archive).map_err(|e| ArchiveError::FileSystem(archive.to_owned(), e))?;

    fs::create_dir_all(destination)
        .map_err(|e| ArchiveError::FileSystem(destination.to_owned(), e))?;

    let mut tar = tar::Archive::new(GzDecoder::new(io::BufReader::new(file)));
    tar.set_overwrite(true);
    tar.set_preserve_permissions(true);

    tar.unpack(destination)
        .map_err(|e| ArchiveError::Corrupt(archive.to_owned(), e))
}

/// Deletes a file, a directory tree, or a symlink without following it.
///
/// Returns `false` if nothing existed at `path`.
pub fn remove(path: &Utf8Path) -> Result<bool, ArchiveError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(ArchiveError::FileSystem(path.to_owned(), e)),
    };

    // `remove_dir_all` unlinks symlinks inside the tree instead of descending.
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|e| ArchiveError::FileSystem(path.to_owned(), e))?;
    Ok(true)
}
