//! Crash-safe file replacement.
//!
//! Content is written to a temporary file in the destination directory,
//! flushed to disk and then renamed over the target, so readers see either
//! the old file or the complete new one.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace `path` with whatever `write` produces.
///
/// Parent directories are created as needed. On error the target is left
/// untouched and the reason is returned as text.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<(), String>
where
    F: FnOnce(&mut File) -> Result<(), String>,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| e.to_string())?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| e.to_string())?;
    write(temp.as_file_mut())?;
    temp.as_file_mut().flush().map_err(|e| e.to_string())?;
    temp.as_file().sync_all().map_err(|e| e.to_string())?;
    temp.persist(path).map_err(|e| e.error.to_string())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a").join("b").join("out.txt");

        write_atomically(&path, |file| file.write_all(b"hello").map_err(|e| e.to_string()))
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn failed_write_keeps_old_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.txt");
        fs::write(&path, "old").unwrap();

        let result = write_atomically(&path, |file| {
            file.write_all(b"partial").map_err(|e| e.to_string())?;
            Err("encoder failed".to_string())
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
    }
}
