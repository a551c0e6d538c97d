use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::extraction::SourceFormat;

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @generates: `<stem>.<lang>.<ext>` next to the output dir
    // @params: input_file, output_dir, target_language
    pub fn generate_output_path<P1: AsRef<Path>, P2: AsRef<Path>>(
        input_file: P1,
        output_dir: P2,
        target_language: &str,
    ) -> PathBuf {
        let input_file = input_file.as_ref();
        let file_name = Self::localized_file_name(input_file, target_language);
        output_dir.as_ref().join(file_name)
    }

    // @generates: `<stem>.<lang>.<ext>` for a bare file name
    pub fn localized_file_name<P: AsRef<Path>>(input_file: P, target_language: &str) -> String {
        let input_file = input_file.as_ref();
        let stem = input_file.file_stem().unwrap_or_default().to_string_lossy();

        match input_file.extension() {
            Some(ext) => format!("{}.{}.{}", stem, target_language, ext.to_string_lossy()),
            None => format!("{}.{}", stem, target_language),
        }
    }

    /// Whether the file name already carries the `.<lang>` suffix this tool writes
    pub fn is_localized_output<P: AsRef<Path>>(path: P, target_language: &str) -> bool {
        let stem = path.as_ref().file_stem().unwrap_or_default().to_string_lossy().to_lowercase();
        let suffix = format!(".{}", target_language.to_lowercase());
        stem.len() > suffix.len() && stem.ends_with(&suffix)
    }

    /// Find every file whose extension maps to a supported source format
    pub fn find_script_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() && SourceFormat::from_path(path).is_ok() {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// Path of `path` under `root`, with forward slashes
    pub fn relative_path<P1: AsRef<Path>, P2: AsRef<Path>>(root: P1, path: P2) -> String {
        let path = path.as_ref();
        let relative = path.strip_prefix(root.as_ref()).unwrap_or(path);

        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write through a sibling temp file and rename, so readers never see
    /// a half-written file
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(&parent)
            .with_context(|| format!("Failed to create temp file in {:?}", parent))?;
        temp.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write temp file for {:?}", path))?;
        temp.persist(path)
            .map_err(|e| anyhow::anyhow!("Failed to replace {:?}: {}", path, e.error))?;

        Ok(())
    }

    /// Bundle `(relative path, content)` pairs into a zip archive
    pub fn write_archive<P: AsRef<Path>>(path: P, entries: &[(String, String)]) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            Self::ensure_dir(parent)?;
        }

        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create archive: {:?}", path))?;
        let mut archive = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, content) in entries {
            let name = Self::archive_entry_name(name)?;
            archive
                .start_file(name.as_str(), options)
                .with_context(|| format!("Failed to start archive entry: {}", name))?;
            archive
                .write_all(content.as_bytes())
                .with_context(|| format!("Failed to write archive entry: {}", name))?;
        }

        archive.finish().context("Failed to finalize archive")?;
        Ok(())
    }

    // @validates: Archive entry names stay inside the archive root
    fn archive_entry_name(name: &str) -> Result<String> {
        let cleaned = name.replace('\\', "/");
        let cleaned = cleaned.trim_start_matches('/');
        if cleaned.is_empty() || cleaned.split('/').any(|part| part == "..") {
            return Err(anyhow::anyhow!("Invalid archive entry path: {}", name));
        }
        Ok(cleaned.to_string())
    }
}
