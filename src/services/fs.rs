//! Filesystem capability used by the fixer.
//!
//! Everything that touches the disk goes through [`ModFileSystem`], so the host
//! application can hand in its own implementation and tests can mock it.

use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use std::time::SystemTime;

/// One entry returned by [`ModFileSystem::list_dir`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: Utf8PathBuf,
    pub is_dir: bool,
    pub is_file: bool,
}

/// Narrow read/write/list/rename operations on mod files.
#[cfg_attr(test, mockall::automock)]
pub trait ModFileSystem {
    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String>;

    fn write(&self, path: &Utf8Path, contents: &str) -> io::Result<()>;

    fn rename(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<()>;

    fn remove_file(&self, path: &Utf8Path) -> io::Result<()>;

    fn exists(&self, path: &Utf8Path) -> bool;

    fn is_dir(&self, path: &Utf8Path) -> bool;

    fn is_file(&self, path: &Utf8Path) -> bool;

    /// Entries of a directory, sorted by name.
    fn list_dir(&self, path: &Utf8Path) -> io::Result<Vec<DirEntry>>;

    fn modified(&self, path: &Utf8Path) -> io::Result<SystemTime>;

    /// Size of a raw buffer file in bytes
    fn file_len(&self, path: &Utf8Path) -> io::Result<u64>;
}

/// [`ModFileSystem`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl ModFileSystem for StdFileSystem {
    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Utf8Path, contents: &str) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn rename(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove_file(&self, path: &Utf8Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn exists(&self, path: &Utf8Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Utf8Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Utf8Path) -> bool {
        path.is_file()
    }

    fn list_dir(&self, path: &Utf8Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in path.read_dir_utf8()? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            entries.push(DirEntry {
                name: entry.file_name().to_string(),
                path: entry.path().to_path_buf(),
                is_dir: file_type.is_dir(),
                is_file: file_type.is_file(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn modified(&self, path: &Utf8Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    fn file_len(&self, path: &Utf8Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_std_file_system_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let fs = StdFileSystem;

        let file = root.join("mod.ini");
        fs.write(&file, "[A]\n").unwrap();
        std::fs::create_dir(root.join("sub")).unwrap();

        assert!(fs.is_file(&file));
        assert_eq!(fs.read_to_string(&file).unwrap(), "[A]\n");
        assert_eq!(fs.file_len(&file).unwrap(), 4);

        let entries = fs.list_dir(&root).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "mod.ini");
        assert!(entries[1].is_dir);

        let moved = root.join("moved.ini");
        fs.rename(&file, &moved).unwrap();
        assert!(!fs.exists(&file));
        fs.remove_file(&moved).unwrap();
        assert!(!fs.exists(&moved));
    }
}
