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

//! Metadata filters for retrieval
//!
//! A [`FilterClause`] is either a single AND-group of equality predicates or
//! an OR of such groups. There is no negation and no range comparison. The
//! clause renders to the `$and` / `$or` where-document understood by
//! document stores, and evaluates directly against [`RecordMetadata`].

use super::RecordMetadata;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::fmt;

/// Metadata field a predicate compares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataField {
    Faction,
    Name,
    Type,
    Category,
}

impl MetadataField {
    /// Key of the field in the stored metadata object
    pub fn key(&self) -> &'static str {
        match self {
            MetadataField::Faction => "faction",
            MetadataField::Name => "name",
            MetadataField::Type => "type",
            MetadataField::Category => "category",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// `field == value`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Predicate {
    pub field: MetadataField,
    pub value: String,
}

impl Predicate {
    pub fn new(field: MetadataField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        metadata.value_of(self.field) == Some(self.value.as_str())
    }

    fn to_where_document(&self) -> Value {
        let mut object = Map::new();
        object.insert(self.field.key().to_string(), Value::String(self.value.clone()));
        Value::Object(object)
    }
}

/// AND of equality predicates
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Conjunction(Vec<Predicate>);

impl Conjunction {
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self(predicates)
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.0
    }

    /// An empty conjunction matches every record.
    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        self.0.iter().all(|predicate| predicate.matches(metadata))
    }

    fn to_where_document(&self) -> Value {
        match self.0.as_slice() {
            [single] => single.to_where_document(),
            predicates => json!({
                "$and": predicates.iter().map(Predicate::to_where_document).collect::<Vec<_>>()
            }),
        }
    }
}

impl<S: Into<String>> FromIterator<(MetadataField, S)> for Conjunction {
    fn from_iter<I: IntoIterator<Item = (MetadataField, S)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, value)| Predicate::new(field, value))
                .collect(),
        )
    }
}

/// Boolean metadata filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterClause {
    /// Every predicate of the group must hold
    All(Conjunction),
    /// At least one group must hold
    Any(Vec<Conjunction>),
}

impl FilterClause {
    /// A single AND-group
    pub fn all<S, I>(predicates: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (MetadataField, S)>,
    {
        FilterClause::All(predicates.into_iter().collect())
    }

    /// OR of groups with duplicates removed, preserving first occurrence.
    ///
    /// Returns `None` for no groups and collapses a single group into
    /// [`FilterClause::All`].
    pub fn any(groups: impl IntoIterator<Item = Conjunction>) -> Option<Self> {
        let mut unique: Vec<Conjunction> = Vec::new();
        for group in groups {
            if !unique.contains(&group) {
                unique.push(group);
            }
        }
        match unique.len() {
            0 => None,
            1 => unique.pop().map(FilterClause::All),
            _ => Some(FilterClause::Any(unique)),
        }
    }

    /// The AND-groups of this clause, in order
    pub fn groups(&self) -> &[Conjunction] {
        match self {
            FilterClause::All(group) => std::slice::from_ref(group),
            FilterClause::Any(groups) => groups,
        }
    }

    /// Split into one single-group clause per OR branch
    pub fn split_groups(&self) -> Vec<FilterClause> {
        self.groups().iter().cloned().map(FilterClause::All).collect()
    }

    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        self.groups().iter().any(|group| group.matches(metadata))
    }

    /// Render as a document-store where clause, e.g.
    /// `{"$or": [{"$and": [{"name": "Tom"}, {"category": "past"}]}, ...]}`
    pub fn to_where_document(&self) -> Value {
        match self {
            FilterClause::All(group) => group.to_where_document(),
            FilterClause::Any(groups) => json!({
                "$or": groups.iter().map(Conjunction::to_where_document).collect::<Vec<_>>()
            }),
        }
    }
}

impl Serialize for FilterClause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_where_document().serialize(serializer)
    }
}

impl fmt::Display for FilterClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_where_document())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MetadataCategory, RecordMetadata};
    use npcmind_common::Faction;

    fn past_of(name: &str) -> Conjunction {
        [
            (MetadataField::Name, name),
            (MetadataField::Category, "past"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_single_predicate_renders_flat() {
        let clause = FilterClause::all([(MetadataField::Category, "lore")]);
        assert_eq!(clause.to_where_document(), json!({"category": "lore"}));
    }

    #[test]
    fn test_conjunction_renders_and() {
        let clause = FilterClause::All(past_of("Tom"));
        assert_eq!(
            clause.to_where_document(),
            json!({"$and": [{"name": "Tom"}, {"category": "past"}]})
        );
    }

    #[test]
    fn test_disjunction_renders_or_of_and() {
        let clause = FilterClause::any([past_of("Tom"), past_of("Ana")]).unwrap();
        assert_eq!(
            serde_json::to_value(&clause).unwrap(),
            json!({"$or": [
                {"$and": [{"name": "Tom"}, {"category": "past"}]},
                {"$and": [{"name": "Ana"}, {"category": "past"}]},
            ]})
        );
    }

    #[test]
    fn test_any_deduplicates_and_collapses() {
        assert!(FilterClause::any(Vec::new()).is_none());
        let clause = FilterClause::any([past_of("Tom"), past_of("Tom")]).unwrap();
        assert_eq!(clause, FilterClause::All(past_of("Tom")));
        assert_eq!(clause.groups().len(), 1);
    }

    #[test]
    fn test_matches_metadata() {
        let tom_past = RecordMetadata::character(Faction::Raccoon, "Tom", MetadataCategory::Past);
        let tom_lore = RecordMetadata::faction(Faction::Raccoon, MetadataCategory::Lore);
        let clause = FilterClause::any([
            past_of("Tom"),
            [
                (MetadataField::Faction, "world"),
                (MetadataField::Category, "lore"),
            ]
            .into_iter()
            .collect(),
        ])
        .unwrap();

        assert!(clause.matches(&tom_past));
        assert!(!clause.matches(&tom_lore));
        assert_eq!(clause.split_groups().len(), 2);
    }
}
