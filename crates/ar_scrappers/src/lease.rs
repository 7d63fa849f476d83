use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::warn;

use ar_core::Result;

/// Exclusive claim on one seed article for the lifetime of a run.
///
/// Backed by an advisory lock on `seed-<id>.lock`. The OS drops the lock when
/// the holding process exits, however it exits, so a file left behind by a
/// killed run is simply locked again by the next one. The file itself is kept.
#[derive(Debug)]
pub struct SeedLease {
    path: PathBuf,
    file: File,
}

impl SeedLease {
    /// Returns `None` when another live run holds the seed.
    pub fn acquire(dir: &Path, seed_id: i64) -> Result<Option<Self>> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("seed-{}.lock", seed_id));
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Ok(None);
            }
            return Err(e.into());
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Some(Self { path, file }))
    }

    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("ar-leases")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SeedLease {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!("Failed to release lease {}: {}", self.path.display(), e);
        }
    }
}
