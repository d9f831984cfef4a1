//! Location of the per-user state directory and the files kept in it.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable overriding the state directory.
pub const HOME_ENV: &str = "RESHELF_HOME";

const APP_DIR_NAME: &str = "reshelf";

/// All persisted state lives under a single directory, scoped to one user
/// profile on one machine.
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub dir: PathBuf,
    pub undo_stack: PathBuf,
    pub undo_lock: PathBuf,
    pub boot_id: PathBuf,
    pub user_presets: PathBuf,
    pub default_presets: PathBuf,
    pub public_suffix_list: PathBuf,
    pub config: PathBuf,
}

impl StatePaths {
    /// Builds the layout rooted at `dir`.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            undo_stack: dir.join("undo_stack.json"),
            undo_lock: dir.join("undo_stack.json.lock"),
            boot_id: dir.join("boot_id.txt"),
            user_presets: dir.join("user_presets.json"),
            default_presets: dir.join("default_presets.json"),
            public_suffix_list: dir.join("public_suffix_list.dat"),
            config: dir.join("config.toml"),
            dir,
        }
    }

    /// Resolves the state directory from `RESHELF_HOME`, falling back to the
    /// platform data directory.
    pub fn resolve() -> io::Result<Self> {
        if let Ok(value) = env::var(HOME_ENV)
            && !value.trim().is_empty()
        {
            return Ok(Self::at(value.trim()));
        }

        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no data directory"))?;
        Ok(Self::at(base.join(APP_DIR_NAME)))
    }

    /// Creates the state directory if it does not exist yet.
    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
