//! Player profile lookups.
//!
//! Profiles are owned by another service. The ranking core only reads
//! display fields and country codes through [`ProfileSource`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;

use super::{EntityType, JsonlReader, StorageConfig, StorageError};
use crate::models::{PlayerId, PlayerProfile};

/// Read-only access to player profiles.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Profiles for the given ids. Unknown ids are simply absent.
    async fn profiles(
        &self,
        ids: &[PlayerId],
    ) -> Result<HashMap<PlayerId, PlayerProfile>, StorageError>;

    /// Every player whose country matches `code` (upper-case alpha-2).
    async fn players_in_country(&self, code: &str) -> Result<HashSet<PlayerId>, StorageError>;

    /// Every known profile, in no particular order.
    async fn all_profiles(&self) -> Result<Vec<PlayerProfile>, StorageError>;
}

/// Profiles held in memory, optionally loaded from `profiles/players.jsonl`.
#[derive(Default)]
pub struct MemoryProfiles {
    profiles: DashMap<PlayerId, PlayerProfile>,
}

impl MemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = PlayerProfile>) -> Self {
        let source = Self::new();
        for profile in profiles {
            source.insert(profile);
        }
        source
    }

    /// Load the profile snapshot. A missing file yields an empty source.
    pub fn load(config: &StorageConfig) -> Result<Self, StorageError> {
        let reader = JsonlReader::<PlayerProfile>::for_entity(config, EntityType::PlayerProfile);
        let source = Self::from_profiles(reader.read_all()?);
        info!("Loaded {} player profiles", source.len());
        Ok(source)
    }

    /// Insert or replace a profile.
    pub fn insert(&self, profile: PlayerProfile) {
        self.profiles.insert(profile.player_id.clone(), profile);
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl ProfileSource for MemoryProfiles {
    async fn profiles(
        &self,
        ids: &[PlayerId],
    ) -> Result<HashMap<PlayerId, PlayerProfile>, StorageError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.profiles.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }

    async fn players_in_country(&self, code: &str) -> Result<HashSet<PlayerId>, StorageError> {
        Ok(self
            .profiles
            .iter()
            .filter(|p| {
                p.country
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(code))
            })
            .map(|p| p.player_id.clone())
            .collect())
    }

    async fn all_profiles(&self) -> Result<Vec<PlayerProfile>, StorageError> {
        Ok(self.profiles.iter().map(|p| p.value().clone()).collect())
    }
}
