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

//! Maps cognitive actions onto memory filters

use super::actions::CognitiveAction;
use crate::memory::{Conjunction, FilterClause, MetadataCategory, MetadataField};
use npcmind_common::Faction;
use tracing::warn;

/// Builds retrieval filters scoped to one character.
///
/// | action                         | records searched                      |
/// |--------------------------------|---------------------------------------|
/// | remember                       | own memories, own past                |
/// | research, recall_knowledge     | faction lore, world lore              |
/// | social_interaction             | own relations, own sentiment          |
/// | introspect, plan               | nothing                               |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CognitiveActionResolver {
    name: String,
    faction: Faction,
}

impl CognitiveActionResolver {
    pub fn new(name: impl Into<String>, faction: Faction) -> Self {
        Self {
            name: name.into(),
            faction,
        }
    }

    /// Records of `category` about this character
    pub fn character_scope(&self, category: MetadataCategory) -> Conjunction {
        [
            (MetadataField::Name, self.name.as_str()),
            (MetadataField::Category, category.as_str()),
        ]
        .into_iter()
        .collect()
    }

    /// Lore records of `faction`
    pub fn lore_scope(faction: Faction) -> Conjunction {
        [
            (MetadataField::Faction, faction.as_str()),
            (MetadataField::Category, MetadataCategory::Lore.as_str()),
        ]
        .into_iter()
        .collect()
    }

    /// Filter over this character's sentiment records
    pub fn sentiment_filter(&self) -> FilterClause {
        FilterClause::All(self.character_scope(MetadataCategory::Sentiment))
    }

    /// Everything this character may draw on before the player has spoken:
    /// its own records plus its faction's lore and world lore.
    pub fn greeting_filter(&self) -> FilterClause {
        let mut groups: Vec<Conjunction> = [
            MetadataCategory::Knowledge,
            MetadataCategory::Past,
            MetadataCategory::Memory,
            MetadataCategory::Relations,
            MetadataCategory::Sentiment,
        ]
        .into_iter()
        .map(|category| self.character_scope(category))
        .collect();
        groups.push(Self::lore_scope(self.faction));
        if self.faction != Faction::World {
            groups.push(Self::lore_scope(Faction::World));
        }
        FilterClause::Any(groups)
    }

    fn contribution(&self, action: CognitiveAction) -> Vec<Conjunction> {
        match action {
            CognitiveAction::Remember => vec![
                self.character_scope(MetadataCategory::Memory),
                self.character_scope(MetadataCategory::Past),
            ],
            CognitiveAction::Research | CognitiveAction::RecallKnowledge => vec![
                Self::lore_scope(self.faction),
                Self::lore_scope(Faction::World),
            ],
            CognitiveAction::SocialInteraction => vec![
                self.character_scope(MetadataCategory::Relations),
                self.character_scope(MetadataCategory::Sentiment),
            ],
            CognitiveAction::Introspect | CognitiveAction::Plan => Vec::new(),
        }
    }

    /// OR of the contributions of `actions`. `None` means unrestricted.
    pub fn resolve(&self, actions: &[CognitiveAction]) -> Option<FilterClause> {
        FilterClause::any(
            actions
                .iter()
                .flat_map(|action| self.contribution(*action)),
        )
    }

    /// Resolve raw action tags, dropping unknown ones with a warning
    pub fn resolve_tags<S: AsRef<str>>(&self, tags: &[S]) -> Option<FilterClause> {
        let actions: Vec<CognitiveAction> = tags
            .iter()
            .filter_map(|tag| {
                let tag = tag.as_ref();
                match tag.trim().parse::<CognitiveAction>() {
                    Ok(action) => Some(action),
                    Err(()) => {
                        warn!(character = %self.name, tag, "Dropping unknown cognitive action");
                        None
                    }
                }
            })
            .collect();
        self.resolve(&actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RecordMetadata;
    use serde_json::json;

    fn tom() -> CognitiveActionResolver {
        CognitiveActionResolver::new("Tom", Faction::Raccoon)
    }

    #[test]
    fn test_empty_and_unknown_yield_none() {
        let empty: [&str; 0] = [];
        assert!(tom().resolve_tags(&empty).is_none());
        assert!(tom().resolve_tags(&["dance", "sing"]).is_none());
        assert!(tom().resolve(&[CognitiveAction::Introspect, CognitiveAction::Plan]).is_none());
    }

    #[test]
    fn test_remember_scopes_to_character() {
        let filter = tom().resolve_tags(&["remember"]).unwrap();
        assert_eq!(
            filter.to_where_document(),
            json!({"$or": [
                {"$and": [{"name": "Tom"}, {"category": "memory"}]},
                {"$and": [{"name": "Tom"}, {"category": "past"}]},
            ]})
        );
    }

    #[test]
    fn test_research_and_recall_share_lore_groups() {
        let filter = tom()
            .resolve_tags(&["research", "recall_knowledge", "bogus"])
            .unwrap();
        assert_eq!(
            filter.to_where_document(),
            json!({"$or": [
                {"$and": [{"faction": "raccoon"}, {"category": "lore"}]},
                {"$and": [{"faction": "world"}, {"category": "lore"}]},
            ]})
        );
    }

    #[test]
    fn test_world_faction_lore_collapses() {
        let hermit = CognitiveActionResolver::new("Hermit", Faction::World);
        let filter = hermit.resolve(&[CognitiveAction::Research]).unwrap();
        assert_eq!(
            filter.to_where_document(),
            json!({"$and": [{"faction": "world"}, {"category": "lore"}]})
        );
    }

    #[test]
    fn test_greeting_filter_excludes_other_characters() {
        let filter = tom().greeting_filter();
        assert_eq!(filter.groups().len(), 7);
        assert_eq!(
            filter.groups()[6],
            CognitiveActionResolver::lore_scope(Faction::World)
        );

        let own = RecordMetadata::character(Faction::Raccoon, "Tom", MetadataCategory::Past);
        let other = RecordMetadata::character(Faction::Chameleon, "Vesk", MetadataCategory::Past);
        let kin = RecordMetadata::character(Faction::Raccoon, "Mira", MetadataCategory::Knowledge);
        let world = RecordMetadata::faction(Faction::World, MetadataCategory::Lore);
        let foreign = RecordMetadata::faction(Faction::Apes, MetadataCategory::Lore);
        assert!(filter.matches(&own));
        assert!(filter.matches(&world));
        assert!(!filter.matches(&other));
        assert!(!filter.matches(&kin));
        assert!(!filter.matches(&foreign));
    }

    #[test]
    fn test_combined_actions_or_together() {
        let filter = tom()
            .resolve(&[CognitiveAction::SocialInteraction, CognitiveAction::Remember])
            .unwrap();
        assert_eq!(filter.groups().len(), 4);
        assert_eq!(
            filter.groups()[0],
            tom().character_scope(MetadataCategory::Relations)
        );
    }
}
