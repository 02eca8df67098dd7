//! File system operations (read, write, directory, identity).

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::{FileIdentity, RealRuntime};

impl RealRuntime {
    #[tracing::instrument(skip(self, contents))]
    pub(crate) fn write_impl(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents).context("Failed to write to file")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_to_string_impl(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).context("Failed to read file to string")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn create_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).context("Failed to create directory")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_file_impl(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).context("Failed to remove file")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).context("Failed to remove directory and its contents")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn exists_impl(&self, path: &Path) -> bool {
        path.exists()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn file_identity_impl(&self, path: &Path) -> Result<FileIdentity> {
        let metadata = fs::symlink_metadata(path).context("Failed to read file metadata")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Ok(FileIdentity {
                dev: metadata.dev(),
                ino: metadata.ino(),
                links: metadata.nlink(),
                is_dir: metadata.is_dir(),
            })
        }
        #[cfg(not(unix))]
        {
            // Stable file indexes are not exposed by std here; the canonical path
            // stands in for the inode and the link count is unknown.
            use std::collections::hash_map::DefaultHasher;
            use std::hash::{Hash, Hasher};

            let canonical: PathBuf = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            let mut hasher = DefaultHasher::new();
            canonical.hash(&mut hasher);
            Ok(FileIdentity {
                dev: 0,
                ino: hasher.finish(),
                links: 1,
                is_dir: metadata.is_dir(),
            })
        }
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn canonicalize_impl(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).context("Failed to canonicalize path")
    }
}
