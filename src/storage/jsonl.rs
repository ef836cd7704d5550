//! JSONL (JSON Lines) storage.
//!
//! JSONL is the source of truth for the result ledger.
//! Each line is a valid JSON object representing one entity.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::{StorageConfig, StorageError};

/// Entity types for JSONL storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    LedgerRecord,
    PlayerProfile,
}

impl EntityType {
    /// Get the filename for this entity type.
    pub fn filename(&self) -> &'static str {
        match self {
            EntityType::LedgerRecord => "results.jsonl",
            EntityType::PlayerProfile => "players.jsonl",
        }
    }

    /// Directory holding this entity's file.
    pub fn dir(&self, config: &StorageConfig) -> PathBuf {
        match self {
            EntityType::LedgerRecord => config.ledger_dir(),
            EntityType::PlayerProfile => config.profiles_dir(),
        }
    }
}

/// Get the path for an entity file.
pub fn entity_path(config: &StorageConfig, entity: EntityType) -> PathBuf {
    entity.dir(config).join(entity.filename())
}

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    /// Create a new JSONL writer for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Create a writer for a specific entity type.
    pub fn for_entity(config: &StorageConfig, entity: EntityType) -> Self {
        Self::new(entity_path(config, entity))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists.
    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Cut off a torn final line left by a crash mid-append.
    ///
    /// Truncates the file back to just after its last newline so the next
    /// append starts a fresh line. Returns the number of bytes dropped.
    pub fn repair_tail(&self) -> Result<u64, StorageError> {
        if !self.path.exists() {
            return Ok(0);
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let len = file.metadata()?.len();
        let mut contents = Vec::with_capacity(len as usize);
        file.read_to_end(&mut contents)?;

        let keep = contents
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |pos| pos as u64 + 1);
        if keep == len {
            return Ok(0);
        }

        file.set_len(keep)?;
        file.sync_data()?;
        warn!(
            "Truncated {} bytes of torn tail from {:?}",
            len - keep,
            self.path
        );
        Ok(len - keep)
    }

    /// Append a single entity and fsync before returning.
    ///
    /// The line is serialized up front and written in one call, so a
    /// crash leaves at most a torn final line, which readers skip.
    pub fn append(&self, entity: &T) -> Result<(), StorageError> {
        self.ensure_dir()?;

        let mut line = serde_json::to_string(entity)?;
        line.push('\n');

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_data()?;

        debug!("Appended entity to {:?}", self.path);
        Ok(())
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    /// Create a new JSONL reader for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Create a reader for a specific entity type.
    pub fn for_entity(config: &StorageConfig, entity: EntityType) -> Self {
        Self::new(entity_path(config, entity))
    }

    /// Read all entities from the file, skipping lines that don't parse.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entities = Vec::new();
        let mut line_num = 0;

        for line in reader.lines() {
            line_num += 1;
            let line = line?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    warn!(
                        "Failed to parse line {} in {:?}: {}",
                        line_num, self.path, e
                    );
                }
            }
        }

        debug!("Read {} entities from {:?}", entities.len(), self.path);
        Ok(entities)
    }
}
