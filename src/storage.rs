use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{
    error::{AltSendError, Result},
    models::EntryKind,
};

pub trait Storage: Send + Sync + 'static {
    /// Total size of a file, or of every regular file under a directory.
    fn measure(&self, path: &Path) -> Result<(u64, EntryKind)>;

    fn content_id(&self, path: &Path) -> Result<String>;

    fn prepare_output(&self, dir: &Path) -> Result<()>;

    /// Materialises a received entry named `name` under `dir` and returns its path.
    fn write_received(&self, dir: &Path, name: &str) -> Result<PathBuf>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn measure(&self, path: &Path) -> Result<(u64, EntryKind)> {
        if !path.exists() {
            return Err(AltSendError::PathNotFound(path.to_path_buf()));
        }

        let metadata = path.metadata()?;
        if !metadata.is_dir() {
            return Ok((metadata.len(), EntryKind::File));
        }

        let mut total = 0;
        for entry in WalkDir::new(path) {
            let entry = entry?;
            if entry.file_type().is_file() {
                total += entry.metadata()?.len();
            }
        }
        Ok((total, EntryKind::Directory))
    }

    fn content_id(&self, path: &Path) -> Result<String> {
        if !path.is_dir() {
            return Ok(sha256::try_digest(path)?);
        }

        // sorted so the listing, and therefore the digest, is stable
        let mut listing = Vec::new();
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(path)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            let size = entry.metadata()?.len();
            let digest = sha256::try_digest(entry.path())?;
            listing.push(format!("{rel}:{size}:{digest}"));
        }
        Ok(sha256::digest(listing.join("\n")))
    }

    fn prepare_output(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        Ok(())
    }

    fn write_received(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        self.prepare_output(dir)?;
        // only the last component of a remote-supplied name is used
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| crate::ticket::DEFAULT_FILE_NAME.into());
        let path = dir.join(file_name);
        if !path.exists() {
            std::fs::File::create(&path)?;
        }
        log::debug!("received entry materialised at {path:?}");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measures_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.bin");
        std::fs::write(&file, vec![0u8; 1500]).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/b.bin"), vec![1u8; 500]).unwrap();

        assert_eq!(FsStorage.measure(&file).unwrap(), (1500, EntryKind::File));
        assert_eq!(
            FsStorage.measure(dir.path()).unwrap(),
            (2000, EntryKind::Directory)
        );
    }

    #[test]
    fn missing_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            FsStorage.measure(&missing),
            Err(AltSendError::PathNotFound(p)) if p == missing
        ));
    }

    #[test]
    fn content_id_follows_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "same").unwrap();
        std::fs::write(&b, "same").unwrap();

        let id_a = FsStorage.content_id(&a).unwrap();
        assert_eq!(id_a.len(), 64);
        assert_eq!(id_a, FsStorage.content_id(&b).unwrap());

        let before = FsStorage.content_id(dir.path()).unwrap();
        std::fs::write(&b, "different").unwrap();
        assert_ne!(before, FsStorage.content_id(dir.path()).unwrap());
    }

    #[test]
    fn write_received_strips_directories_from_name() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("downloads");
        let path = FsStorage.write_received(&out, "../../etc/report.pdf").unwrap();
        assert_eq!(path, out.join("report.pdf"));
        assert!(path.exists());
    }
}
