//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Persona and faction records as authored in world data files

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Faction a character belongs to.
///
/// `World` holds lore shared by every faction. Older data files refer to it
/// by the identifier `"1"`, which is still accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    Raccoon,
    Jellyfish,
    Ants,
    Apes,
    Chameleon,
    Fennek,
    #[serde(alias = "1")]
    World,
}

impl Faction {
    /// Every faction, world included.
    pub const ALL: [Faction; 7] = [
        Faction::Raccoon,
        Faction::Jellyfish,
        Faction::Ants,
        Faction::Apes,
        Faction::Chameleon,
        Faction::Fennek,
        Faction::World,
    ];

    /// Identifier used in record metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Faction::Raccoon => "raccoon",
            Faction::Jellyfish => "jellyfish",
            Faction::Ants => "ants",
            Faction::Apes => "apes",
            Faction::Chameleon => "chameleon",
            Faction::Fennek => "fennek",
            Faction::World => "world",
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised faction identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFaction(pub String);

impl fmt::Display for UnknownFaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown faction '{}'", self.0)
    }
}

impl std::error::Error for UnknownFaction {}

impl FromStr for Faction {
    type Err = UnknownFaction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "1" {
            return Ok(Faction::World);
        }
        Faction::ALL
            .into_iter()
            .find(|faction| faction.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownFaction(s.to_string()))
    }
}

/// A character persona as authored in world data.
///
/// This is the raw, unvalidated shape. The server validates it into an
/// immutable character before any conversation starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaRecord {
    pub name: String,
    pub faction: Faction,
    /// Compact bracketed persona description
    #[serde(alias = "pl_list")]
    pub persona_sheet: String,
    /// Example dialogue lines used as a style exemplar
    #[serde(default, alias = "ali_chat")]
    pub example_dialogue: String,
    #[serde(default)]
    pub knowledge: String,
    #[serde(default)]
    pub past: String,
    #[serde(default)]
    pub relations: String,
    /// Starting attitude towards the player, `<sentiment>` or `<sentiment>: <reasoning>`
    #[serde(default)]
    pub sentiment: String,
}

impl PersonaRecord {
    /// Stable identifier for records derived from this persona
    pub fn entity_id(&self) -> String {
        entity_id(self.faction, &self.name)
    }
}

/// Builds the identifier shared by every memory record of a character.
pub fn entity_id(faction: Faction, name: &str) -> String {
    let slug = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();
    format!("{}-{}", faction, slug)
}

/// Lore shared by every member of a faction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionLore {
    pub faction: Faction,
    pub lore: String,
}

/// Contents of a world data file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldData {
    #[serde(default)]
    pub characters: Vec<PersonaRecord>,
    #[serde(default)]
    pub lore: Vec<FactionLore>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faction_parses_world_alias() {
        assert_eq!("1".parse::<Faction>(), Ok(Faction::World));
        assert_eq!("Raccoon".parse::<Faction>(), Ok(Faction::Raccoon));
        assert!("badgers".parse::<Faction>().is_err());

        let faction: Faction = serde_json::from_str("\"1\"").unwrap();
        assert_eq!(faction, Faction::World);
    }

    #[test]
    fn test_unknown_faction_is_rejected_on_deserialize() {
        let yaml = "name: Tom\nfaction: badgers\npersona_sheet: '[Tom: sly]'\n";
        let result: Result<PersonaRecord, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_persona_accepts_legacy_field_names() {
        let yaml = r#"
name: Tom
faction: raccoon
pl_list: "[Tom: sly, curious]"
ali_chat: "Tom: Well well."
sentiment: "skeptical: strangers rarely bring good news"
"#;
        let record: PersonaRecord = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(record.persona_sheet, "[Tom: sly, curious]");
        assert_eq!(record.example_dialogue, "Tom: Well well.");
        assert!(record.knowledge.is_empty());
        assert_eq!(record.entity_id(), "raccoon-tom");
    }

    #[test]
    fn test_entity_id_slugs_name() {
        assert_eq!(entity_id(Faction::Apes, "Old  Grey Bob"), "apes-old_grey_bob");
    }

    #[test]
    fn test_world_data_defaults() {
        let data: WorldData = serde_yaml::from_str("lore:\n  - faction: \"1\"\n    lore: The sea is rising.\n").unwrap();
        assert!(data.characters.is_empty());
        assert_eq!(data.lore[0].faction, Faction::World);
    }
}
