//! Archive extraction into the staging area.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, warn};

use crate::error::{LauncherError, Result};

/// Archive formats the launcher can unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    /// ZIP archive, the default release format.
    Zip,
    /// gzip-compressed tarball.
    TarGz,
}

impl ArchiveType {
    /// Detect the type from a file name or URL. Anything unrecognised is ZIP.
    #[must_use]
    pub fn detect(name: &str) -> Self {
        let lower = name
            .split(['?', '#'])
            .next()
            .unwrap_or(name)
            .to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else {
            Self::Zip
        }
    }

    /// File extension used for downloads of this type.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }
}

impl std::fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Zip => "ZIP",
            Self::TarGz => "tar.gz",
        })
    }
}

/// Extract `archive` into a fresh `staging_dir`.
///
/// An existing staging directory is removed first; failures to remove it
/// are ignored and extraction overwrites whatever is left.
pub fn unpack(archive: &Path, staging_dir: &Path) -> Result<()> {
    if !archive.is_file() {
        return Err(LauncherError::ArchiveNotFound(archive.to_path_buf()));
    }

    if staging_dir.exists() {
        warn!(path = %staging_dir.display(), "Removing stale staging directory");
        let _ = fs::remove_dir_all(staging_dir);
    }
    fs::create_dir_all(staging_dir).map_err(|e| {
        LauncherError::UnpackFailed(format!("failed to create {}: {e}", staging_dir.display()))
    })?;

    let archive_type = ArchiveType::detect(&archive.to_string_lossy());
    debug!(%archive_type, archive = %archive.display(), "Extracting");

    match archive_type {
        ArchiveType::Zip => extract_zip(archive, staging_dir),
        ArchiveType::TarGz => extract_tar_gz(archive, staging_dir),
    }
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))?;
    zip.extract(dest)?;
    Ok(())
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)?;
    let mut tar = Archive::new(GzDecoder::new(BufReader::new(file)));
    tar.unpack(dest)
        .map_err(|e| LauncherError::UnpackFailed(format!("tar.gz extraction failed: {e}")))
}

/// Find `exe_name` under `root`, shallowest match first.
///
/// Release archives sometimes wrap everything in one extra directory.
#[must_use]
pub fn find_executable(root: &Path, exe_name: &str) -> Option<PathBuf> {
    let mut queue = VecDeque::from([root.to_path_buf()]);

    while let Some(dir) = queue.pop_front() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .collect();
        paths.sort();

        for path in paths {
            if path.is_dir() {
                queue.push_back(path);
            } else if path.is_file() && path.file_name().is_some_and(|n| n == exe_name) {
                return Some(path);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, data) in files {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_detect_archive_type() {
        assert_eq!(ArchiveType::detect("a/b/pkg.zip"), ArchiveType::Zip);
        assert_eq!(ArchiveType::detect("pkg.TAR.GZ"), ArchiveType::TarGz);
        assert_eq!(
            ArchiveType::detect("https://cdn/pkg.tgz?token=1"),
            ArchiveType::TarGz
        );
        assert_eq!(ArchiveType::detect("https://cdn/download/42"), ArchiveType::Zip);
    }

    #[test]
    fn test_unpack_zip_replaces_stale_staging() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("pkg.zip");
        write_zip(&archive, &[("app/CrawlProgram.exe", "bin"), ("readme.txt", "hi")]);

        let staging = dir.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("leftover.txt"), b"old").unwrap();

        unpack(&archive, &staging).unwrap();

        assert!(!staging.join("leftover.txt").exists());
        assert_eq!(fs::read(staging.join("app/CrawlProgram.exe")).unwrap(), b"bin");
        assert_eq!(fs::read(staging.join("readme.txt")).unwrap(), b"hi");
    }

    #[test]
    fn test_unpack_tar_gz() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("pkg.tar.gz");
        {
            let file = File::create(&archive).unwrap();
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let data = b"binary";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, "CrawlProgram.exe", &data[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let staging = dir.path().join("staging");
        unpack(&archive, &staging).unwrap();
        assert_eq!(fs::read(staging.join("CrawlProgram.exe")).unwrap(), b"binary");
    }

    #[test]
    fn test_unpack_missing_archive() {
        let dir = TempDir::new().unwrap();
        let result = unpack(&dir.path().join("absent.zip"), &dir.path().join("staging"));
        assert!(matches!(result, Err(LauncherError::ArchiveNotFound(_))));
    }

    #[test]
    fn test_unpack_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("pkg.zip");
        fs::write(&archive, b"this is not a zip file").unwrap();

        let result = unpack(&archive, &dir.path().join("staging"));
        assert!(matches!(result, Err(LauncherError::UnpackFailed(_))));
    }

    #[test]
    fn test_find_executable_prefers_shallow_match() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/CrawlProgram.exe"), b"deep").unwrap();
        fs::write(dir.path().join("a/CrawlProgram.exe"), b"shallow").unwrap();

        let found = find_executable(dir.path(), "CrawlProgram.exe").unwrap();
        assert_eq!(found, dir.path().join("a/CrawlProgram.exe"));
        assert_eq!(find_executable(dir.path(), "missing.exe"), None);
        assert_eq!(find_executable(&dir.path().join("nope"), "CrawlProgram.exe"), None);
    }
}
