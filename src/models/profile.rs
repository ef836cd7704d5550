//! Player display data supplied by the profile service.

use serde::{Deserialize, Serialize};

use super::PlayerId;

fn default_level() -> u32 {
    1
}

fn default_ranking_points() -> i64 {
    1000
}

/// A player's public profile, already filtered for privacy upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub player_id: PlayerId,

    pub username: String,

    /// ISO 3166-1 alpha-2 code, upper case
    #[serde(default)]
    pub country: Option<String>,

    #[serde(default)]
    pub avatar: Option<String>,

    /// Account level
    #[serde(default = "default_level")]
    pub level: u32,

    /// ELO-like rating maintained elsewhere
    #[serde(default = "default_ranking_points")]
    pub ranking_points: i64,
}

impl PlayerProfile {
    pub fn new(player_id: PlayerId, username: String) -> Self {
        Self {
            player_id,
            username,
            country: None,
            avatar: None,
            level: default_level(),
            ranking_points: default_ranking_points(),
        }
    }

    /// Builder method to set the country code.
    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_ascii_uppercase());
        self
    }

    /// Builder method to set ranking points.
    pub fn with_ranking_points(mut self, points: i64) -> Self {
        self.ranking_points = points;
        self
    }
}

/// Display fields attached to ranked rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub username: Option<String>,
    pub country: Option<String>,
    pub avatar: Option<String>,
    pub level: Option<u32>,
    pub ranking_points: Option<i64>,
}

impl PlayerSummary {
    /// Summary for a player the profile service knows nothing about.
    pub fn anonymous(id: PlayerId) -> Self {
        Self {
            id,
            username: None,
            country: None,
            avatar: None,
            level: None,
            ranking_points: None,
        }
    }
}

impl From<&PlayerProfile> for PlayerSummary {
    fn from(profile: &PlayerProfile) -> Self {
        Self {
            id: profile.player_id.clone(),
            username: Some(profile.username.clone()),
            country: profile.country.clone(),
            avatar: profile.avatar.clone(),
            level: Some(profile.level),
            ranking_points: Some(profile.ranking_points),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_defaults_from_json() {
        let json = r#"{"player_id": "p1", "username": "blockhead"}"#;
        let profile: PlayerProfile = serde_json::from_str(json).unwrap();

        assert_eq!(profile.level, 1);
        assert_eq!(profile.ranking_points, 1000);
        assert!(profile.country.is_none());
    }

    #[test]
    fn test_with_country_uppercases() {
        let profile = PlayerProfile::new("p1".into(), "a".to_string()).with_country("fr");
        assert_eq!(profile.country.as_deref(), Some("FR"));
    }

    #[test]
    fn test_summary_from_profile() {
        let profile = PlayerProfile::new("p1".into(), "blockhead".to_string())
            .with_country("DE")
            .with_ranking_points(1234);
        let summary = PlayerSummary::from(&profile);

        assert_eq!(summary.username.as_deref(), Some("blockhead"));
        assert_eq!(summary.country.as_deref(), Some("DE"));
        assert_eq!(summary.ranking_points, Some(1234));
    }

    #[test]
    fn test_anonymous_summary() {
        let summary = PlayerSummary::anonymous("ghost".into());
        assert_eq!(summary.id.as_str(), "ghost");
        assert!(summary.username.is_none());
    }
}
