//! Atomic file writes.
//!
//! Content lands in a uniquely named sibling temp file first and is renamed
//! into place, so a reader never observes a half-written artifact or scaffold
//! file, and concurrent writers in one directory never share a temp file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

const TEMP_PREFIX: &str = ".prdflow-";
const TEMP_SUFFIX: &str = ".tmp";

fn temp_beside(path: &Path) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tempfile::Builder::new().prefix(TEMP_PREFIX).suffix(TEMP_SUFFIX).tempfile_in(dir)
}

/// Write `contents` to `path` atomically (write to temp, then rename).
///
/// An existing file keeps its permissions.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut temp = temp_beside(path)?;
    temp.write_all(contents)?;
    if let Ok(meta) = fs::metadata(path) {
        temp.as_file().set_permissions(meta.permissions())?;
    }

    // Dropping the temp file on error removes it
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Copy `src` over `dst` atomically, preserving the source permissions.
pub fn copy_atomic(src: &Path, dst: &Path) -> io::Result<()> {
    let mut source = File::open(src)?;
    let permissions = source.metadata()?.permissions();

    let mut temp = temp_beside(dst)?;
    io::copy(&mut source, temp.as_file_mut())?;
    temp.as_file().set_permissions(permissions)?;

    temp.persist(dst).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(TEMP_PREFIX))
            .collect()
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_copy_atomic() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        let dst = dir.path().join("b.txt");
        fs::write(&src, "hello").unwrap();
        fs::write(&dst, "old").unwrap();

        copy_atomic(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(&dst).unwrap(), "hello");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_write_atomic_missing_parent_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("file.md");

        assert!(write_atomic(&path, b"x").is_err());
    }

    #[test]
    fn test_concurrent_copies_with_suffix_like_names() {
        let staged = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let names = ["a", "a.tmp", "a.prdflow-tmp", ".prdflow-a.tmp"];
        for name in names {
            fs::write(staged.path().join(name), name.repeat(4096)).unwrap();
        }

        thread::scope(|scope| {
            for name in names {
                let (src, dst) = (staged.path().join(name), target.path().join(name));
                scope.spawn(move || {
                    for _ in 0..20 {
                        copy_atomic(&src, &dst).unwrap();
                    }
                });
            }
        });

        for name in names {
            assert_eq!(fs::read_to_string(target.path().join(name)).unwrap(), name.repeat(4096));
        }
    }
}
