//! Compression strategies
//!
//! Archives are written with entry names relative to the backed-up root, so
//! extraction reproduces the original layout without leading directory
//! components from wherever the tool happened to run.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("cannot determine archive entry name for {0:?}")]
    EntryName(PathBuf),
}

/// Known compression engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compressor {
    Zip,
}

impl Compressor {
    /// Resolve an engine by name; unknown names yield `None`
    pub fn resolve(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "zip" => Some(Self::Zip),
            _ => {
                info!("No compression strategy found for '{}', skipping", name);
                None
            }
        }
    }

    /// Compress a single file into an archive at `dest`
    pub fn compress_file(&self, source: &Path, dest: &Path) -> Result<(), ArchiveError> {
        match self {
            Self::Zip => zip_file(source, dest),
        }
    }

    /// Compress a directory subtree into an archive at `dest`
    pub fn compress_dir(&self, source: &Path, dest: &Path) -> Result<(), ArchiveError> {
        match self {
            Self::Zip => zip_dir(source, dest),
        }
    }
}

fn zip_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644)
}

fn zip_file(source: &Path, dest: &Path) -> Result<(), ArchiveError> {
    info!("Compressing (zip) file {}...", source.display());

    let entry_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ArchiveError::EntryName(source.to_path_buf()))?;

    let mut writer = ZipWriter::new(File::create(dest)?);
    writer.start_file(entry_name, zip_options())?;
    io::copy(&mut File::open(source)?, &mut writer)?;
    writer.finish()?;

    info!("Compress done.");
    Ok(())
}

fn zip_dir(source: &Path, dest: &Path) -> Result<(), ArchiveError> {
    info!("Compressing (zip) directory {}...", source.display());

    let mut writer = ZipWriter::new(File::create(dest)?);
    add_dir_entries(&mut writer, source, source)?;
    writer.finish()?;

    info!("Compress done.");
    Ok(())
}

fn add_dir_entries(
    writer: &mut ZipWriter<File>,
    root: &Path,
    dir: &Path,
) -> Result<(), ArchiveError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let rel_path = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        if path.is_dir() {
            writer.add_directory(format!("{}/", rel_path), zip_options())?;
            add_dir_entries(writer, root, &path)?;
        } else {
            writer.start_file(rel_path, zip_options())?;
            io::copy(&mut File::open(&path)?, writer)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    #[test]
    fn test_resolve_known_engine() {
        assert_eq!(Compressor::resolve("zip"), Some(Compressor::Zip));
        assert_eq!(Compressor::resolve("ZIP"), Some(Compressor::Zip));
    }

    #[test]
    fn test_resolve_unknown_engine_is_none() {
        assert_eq!(Compressor::resolve("7z"), None);
        assert_eq!(Compressor::resolve(""), None);
    }

    #[test]
    fn test_compress_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("notes.txt");
        fs::write(&source, b"important notes").unwrap();
        let dest = temp_dir.path().join("notes.zip");

        Compressor::Zip.compress_file(&source, &dest).unwrap();

        let mut archive = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "notes.txt");
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"important notes");
    }

    #[test]
    fn test_compress_dir_uses_relative_entry_names() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("site");
        fs::create_dir_all(root.join("assets/img")).unwrap();
        fs::write(root.join("index.html"), b"<html>").unwrap();
        fs::write(root.join("assets/app.css"), b"body {}").unwrap();
        fs::write(root.join("assets/img/logo.png"), b"\x89PNG").unwrap();
        let dest = temp_dir.path().join("site.zip");

        Compressor::Zip.compress_dir(&root, &dest).unwrap();

        let mut archive = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();

        for expected in [
            "index.html",
            "assets/",
            "assets/app.css",
            "assets/img/",
            "assets/img/logo.png",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {}", expected);
        }
        // No entry carries the backed-up root's own path
        assert!(names.iter().all(|n| !n.contains("site")));
    }

    #[test]
    fn test_compress_dir_extraction_reproduces_content() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("data");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/payload.bin"), [42u8; 512]).unwrap();
        let dest = temp_dir.path().join("data.zip");

        Compressor::Zip.compress_dir(&root, &dest).unwrap();

        let mut archive = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut entry = archive.by_name("sub/payload.bin").unwrap();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, [42u8; 512]);
    }

    #[test]
    fn test_compress_missing_source_fails() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("out.zip");

        let result = Compressor::Zip.compress_file(Path::new("/nonexistent/file"), &dest);
        assert!(matches!(result, Err(ArchiveError::Io(_))));

        let result = Compressor::Zip.compress_dir(Path::new("/nonexistent/dir"), &dest);
        assert!(result.is_err());
    }
}
