use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::profile::{Profile, ProfileBook};

const PROFILES_FILE: &str = "profiles.json";

/// Where the profile book lives between runs.
pub trait ProfileRepository {
    fn load(&self) -> anyhow::Result<ProfileBook>;
    fn save(&self, book: &ProfileBook) -> anyhow::Result<()>;
}

#[derive(Debug)]
pub struct JsonFileRepository {
    pub data_dir: PathBuf,
    pub profiles_path: PathBuf,
}

impl JsonFileRepository {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let profiles_path = data_dir.join(PROFILES_FILE);

        info!(
            data_dir = %data_dir.display(),
            profiles = %profiles_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            profiles_path,
        })
    }
}

impl ProfileRepository for JsonFileRepository {
    #[tracing::instrument(skip(self))]
    fn load(&self) -> anyhow::Result<ProfileBook> {
        if !self.profiles_path.exists() {
            debug!(file = %self.profiles_path.display(), "no profiles file yet; using default book");
            return Ok(ProfileBook::default());
        }

        let raw = fs::read_to_string(&self.profiles_path)
            .with_context(|| format!("failed reading {}", self.profiles_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(ProfileBook::default());
        }

        let book: ProfileBook = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.profiles_path.display()))?;
        debug!(profiles = book.profiles().len(), "loaded profile book");
        Ok(book)
    }

    #[tracing::instrument(skip(self, book))]
    fn save(&self, book: &ProfileBook) -> anyhow::Result<()> {
        save_json_atomic(&self.profiles_path, book)
            .with_context(|| format!("failed to save {PROFILES_FILE}"))
    }
}

/// Keeps the book in memory; handy for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    book: RefCell<Option<ProfileBook>>,
}

impl MemoryRepository {
    pub fn new(book: ProfileBook) -> Self {
        Self {
            book: RefCell::new(Some(book)),
        }
    }
}

impl ProfileRepository for MemoryRepository {
    fn load(&self) -> anyhow::Result<ProfileBook> {
        Ok(self.book.borrow().clone().unwrap_or_default())
    }

    fn save(&self, book: &ProfileBook) -> anyhow::Result<()> {
        *self.book.borrow_mut() = Some(book.clone());
        Ok(())
    }
}

/// Writes one profile as a standalone, human-readable snapshot.
#[tracing::instrument(skip(profile), fields(profile = %profile.name, trips = profile.trips.len()))]
pub fn export_profile(path: &Path, profile: &Profile) -> anyhow::Result<()> {
    save_json_atomic(path, profile)
        .with_context(|| format!("failed to export profile to {}", path.display()))?;
    info!(file = %path.display(), "exported profile");
    Ok(())
}

/// Reads a snapshot written by [`export_profile`]; trips are validated.
#[tracing::instrument]
pub fn import_profile(path: &Path) -> anyhow::Result<Profile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("import: {} is empty", path.display()));
    }

    let profile: Profile = serde_json::from_str(trimmed)
        .with_context(|| format!("failed parsing profile snapshot {}", path.display()))?;
    info!(profile = %profile.name, trips = profile.trips.len(), "read profile snapshot");
    Ok(profile)
}

#[tracing::instrument(skip(path, value))]
fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    debug!(file = %path.display(), "saving json atomically");

    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, value)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
