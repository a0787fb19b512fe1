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

//! Validated characters and the catalog they are looked up in

use super::state::SentimentState;
use npcmind_common::persona::entity_id;
use npcmind_common::{Faction, FactionLore, PersonaRecord, WorldData};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while loading or validating persona data
#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("Persona field '{field}' is blank for '{name}'")]
    MissingField { name: String, field: &'static str },

    #[error("Persona '{name}' has an unrecognised sentiment '{value}'")]
    InvalidSentiment { name: String, value: String },

    #[error("Situation is blank")]
    BlankSituation,

    #[error("Failed to read world data {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse world data {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// An immutable character, built from a validated persona record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    name: String,
    faction: Faction,
    persona_sheet: String,
    example_dialogue: String,
    situation: String,
    initial_sentiment: SentimentState,
}

impl Character {
    /// Validate `record` for a conversation taking place in `situation`.
    ///
    /// Name, persona sheet and situation must not be blank. A blank
    /// sentiment defaults to neutral; otherwise its leading word must be a
    /// known sentiment.
    pub fn from_record(
        record: &PersonaRecord,
        situation: impl Into<String>,
    ) -> Result<Self, PersonaError> {
        let name = record.name.trim();
        if name.is_empty() {
            return Err(PersonaError::MissingField {
                name: record.name.clone(),
                field: "name",
            });
        }
        if record.persona_sheet.trim().is_empty() {
            return Err(PersonaError::MissingField {
                name: name.to_string(),
                field: "persona_sheet",
            });
        }

        let situation = situation.into();
        if situation.trim().is_empty() {
            return Err(PersonaError::BlankSituation);
        }

        let initial_sentiment = if record.sentiment.trim().is_empty() {
            SentimentState::default()
        } else {
            SentimentState::parse(&record.sentiment).ok_or_else(|| {
                PersonaError::InvalidSentiment {
                    name: name.to_string(),
                    value: record.sentiment.clone(),
                }
            })?
        };

        Ok(Self {
            name: name.to_string(),
            faction: record.faction,
            persona_sheet: record.persona_sheet.trim().to_string(),
            example_dialogue: record.example_dialogue.trim().to_string(),
            situation: situation.trim().to_string(),
            initial_sentiment,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn faction(&self) -> Faction {
        self.faction
    }

    pub fn persona_sheet(&self) -> &str {
        &self.persona_sheet
    }

    pub fn example_dialogue(&self) -> &str {
        &self.example_dialogue
    }

    pub fn situation(&self) -> &str {
        &self.situation
    }

    /// Sentiment declared in the persona record
    pub fn initial_sentiment(&self) -> &SentimentState {
        &self.initial_sentiment
    }

    /// Identifier shared with the character's seeded memory records
    pub fn entity_id(&self) -> String {
        entity_id(self.faction, &self.name)
    }
}

/// Personas and lore available to the server
#[derive(Debug, Clone, Default)]
pub struct PersonaCatalog {
    characters: Vec<PersonaRecord>,
    lore: Vec<FactionLore>,
}

impl PersonaCatalog {
    pub fn new(data: WorldData) -> Self {
        Self {
            characters: data.characters,
            lore: data.lore,
        }
    }

    /// Load a YAML world data file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersonaError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| PersonaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let data: WorldData = serde_yaml::from_reader(file).map_err(|source| PersonaError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        for record in &data.characters {
            if let Err(error) = Character::from_record(record, "-") {
                warn!(character = %record.name, %error, "Persona will be rejected at session start");
            }
        }
        info!(
            characters = data.characters.len(),
            lore = data.lore.len(),
            path = %path.display(),
            "World data loaded"
        );
        Ok(Self::new(data))
    }

    /// Case-insensitive lookup by name
    pub fn find(&self, name: &str) -> Option<&PersonaRecord> {
        let name = name.trim();
        self.characters
            .iter()
            .find(|record| record.name.trim().eq_ignore_ascii_case(name))
    }

    pub fn characters(&self) -> &[PersonaRecord] {
        &self.characters
    }

    pub fn lore(&self) -> &[FactionLore] {
        &self.lore
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::Sentiment;
    use std::io::Write;

    fn record() -> PersonaRecord {
        PersonaRecord {
            name: "Tom".to_string(),
            faction: Faction::Raccoon,
            persona_sheet: "[Tom: sly, curious; smuggler]".to_string(),
            example_dialogue: "Tom: Well well, what have we here?".to_string(),
            knowledge: String::new(),
            past: String::new(),
            relations: String::new(),
            sentiment: "skeptical: strangers rarely bring good news".to_string(),
        }
    }

    #[test]
    fn test_valid_record_becomes_character() {
        let character = Character::from_record(&record(), "The docks at dusk").unwrap();
        assert_eq!(character.name(), "Tom");
        assert_eq!(character.faction(), Faction::Raccoon);
        assert_eq!(character.initial_sentiment().value, Sentiment::Skeptical);
        assert_eq!(character.entity_id(), "raccoon-tom");
    }

    #[test]
    fn test_blank_fields_rejected() {
        let mut bad = record();
        bad.persona_sheet = "  ".to_string();
        assert!(matches!(
            Character::from_record(&bad, "x"),
            Err(PersonaError::MissingField { field: "persona_sheet", .. })
        ));

        assert!(matches!(
            Character::from_record(&record(), " "),
            Err(PersonaError::BlankSituation)
        ));
    }

    #[test]
    fn test_sentiment_validation() {
        let mut blank = record();
        blank.sentiment = String::new();
        let character = Character::from_record(&blank, "x").unwrap();
        assert_eq!(character.initial_sentiment().value, Sentiment::Neutral);

        let mut odd = record();
        odd.sentiment = "grumpy".to_string();
        assert!(matches!(
            Character::from_record(&odd, "x"),
            Err(PersonaError::InvalidSentiment { .. })
        ));
    }

    #[test]
    fn test_catalog_load_and_lookup() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
characters:
  - name: Tom
    faction: raccoon
    persona_sheet: "[Tom: sly]"
lore:
  - faction: "1"
    lore: The sea is rising.
"#
        )
        .unwrap();

        let catalog = PersonaCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.find("tOM").map(|r| r.faction), Some(Faction::Raccoon));
        assert!(catalog.find("Jerry").is_none());
        assert_eq!(catalog.lore()[0].faction, Faction::World);
    }

    #[test]
    fn test_catalog_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "characters: [{{name: Tom, faction: badgers}}]").unwrap();
        assert!(matches!(
            PersonaCatalog::load(file.path()),
            Err(PersonaError::Parse { .. })
        ));
        assert!(matches!(
            PersonaCatalog::load("/nonexistent/world.yaml"),
            Err(PersonaError::Io { .. })
        ));
    }
}
