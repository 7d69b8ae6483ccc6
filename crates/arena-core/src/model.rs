//! Match and participant records handed to the core by the request layer

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A match: one trusted server plus an ordered list of participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Match id, also the seed for every derived resource name
    pub id: Uuid,

    /// Server container image
    pub server_image: String,

    /// Opaque config blob mounted into the server
    pub server_config: String,

    /// Participants in launch order
    #[serde(default)]
    pub participants: Vec<Participant>,
}

/// One bot taking part in a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable participant id
    pub id: Uuid,

    /// Display name exposed to the server, if any
    #[serde(default)]
    pub name: Option<String>,

    /// Git URL the participant's code is fetched from
    pub repo_url: String,

    /// Container image the participant runs in
    pub image: String,
}

impl Participant {
    /// Display name, treating an empty string as unset
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_display_name_is_unset() {
        let mut participant = Participant {
            id: Uuid::new_v4(),
            name: Some(String::new()),
            repo_url: "https://example.com/bot.git".into(),
            image: "bot:latest".into(),
        };
        assert_eq!(participant.display_name(), None);

        participant.name = Some("Alice".into());
        assert_eq!(participant.display_name(), Some("Alice"));
    }

    #[test]
    fn participants_default_to_empty() {
        let json = format!(
            r#"{{"id":"{}","server_image":"server:1","server_config":"{{}}"}}"#,
            Uuid::nil()
        );
        let game: Match = serde_json::from_str(&json).unwrap();
        assert!(game.participants.is_empty());
    }
}
