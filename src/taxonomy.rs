use crate::errors::EngineError;
use crate::feed::SourceId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::{Index, IndexMut};

/// Dense index of an entity inside its taxonomy, assigned in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(u16);

impl EntityId {
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Category,
    Town,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Tokens only matched as plain substrings, after every bounded match failed.
    #[serde(default)]
    pub legacy_tokens: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    #[serde(default)]
    pub categories: Vec<EntityConfig>,
    #[serde(default)]
    pub towns: Vec<EntityConfig>,
    /// Per-source display spellings, keyed by entity id.
    #[serde(default)]
    pub source_labels: BTreeMap<SourceId, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyEntity {
    pub id: EntityId,
    pub key: String,
    pub display_label: String,
    pub match_tokens: Vec<String>,
    pub legacy_tokens: Vec<String>,
}

/// Ordered, read-only list of entities of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    entities: Vec<TaxonomyEntity>,
    by_key: HashMap<String, EntityId>,
}

impl Taxonomy {
    pub fn new(kind: EntityKind, configs: &[EntityConfig]) -> Result<Self, EngineError> {
        if configs.len() > usize::from(u16::MAX) {
            return Err(EngineError::Taxonomy(format!(
                "too many {kind:?} entities: {}",
                configs.len()
            )));
        }
        let mut entities = Vec::with_capacity(configs.len());
        let mut by_key = HashMap::with_capacity(configs.len());
        for (index, config) in configs.iter().enumerate() {
            let key = config.id.trim().to_string();
            if key.is_empty() {
                return Err(EngineError::Taxonomy(format!("{kind:?} #{index} has an empty id")));
            }
            let id = EntityId(index as u16);
            if by_key.insert(key.clone(), id).is_some() {
                return Err(EngineError::Taxonomy(format!("duplicate {kind:?} id '{key}'")));
            }
            let match_tokens = clean_tokens(&config.tokens);
            let legacy_tokens = clean_tokens(&config.legacy_tokens);
            if match_tokens.is_empty() && legacy_tokens.is_empty() {
                return Err(EngineError::Taxonomy(format!("{kind:?} '{key}' has no match tokens")));
            }
            let display_label = if config.label.trim().is_empty() {
                key.clone()
            } else {
                config.label.trim().to_string()
            };
            entities.push(TaxonomyEntity {
                id,
                key,
                display_label,
                match_tokens,
                legacy_tokens,
            });
        }
        Ok(Self { entities, by_key })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[TaxonomyEntity] {
        &self.entities
    }

    pub fn get(&self, id: EntityId) -> &TaxonomyEntity {
        &self.entities[id.index()]
    }

    pub fn lookup(&self, key: &str) -> Option<EntityId> {
        self.by_key.get(key.trim()).copied()
    }
}

fn clean_tokens(tokens: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let token = token.trim().to_lowercase();
        if !token.is_empty() && !cleaned.contains(&token) {
            cleaned.push(token);
        }
    }
    cleaned
}

/// One value per entity of a taxonomy, indexed by `EntityId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTable<T> {
    values: Vec<T>,
}

impl<T: Clone> EntityTable<T> {
    pub fn filled(taxonomy: &Taxonomy, value: T) -> Self {
        Self {
            values: vec![value; taxonomy.len()],
        }
    }
}

impl<T> EntityTable<T> {
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.values
            .iter()
            .enumerate()
            .map(|(index, value)| (EntityId(index as u16), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T> Index<EntityId> for EntityTable<T> {
    type Output = T;

    fn index(&self, id: EntityId) -> &T {
        &self.values[id.index()]
    }
}

impl<T> IndexMut<EntityId> for EntityTable<T> {
    fn index_mut(&mut self, id: EntityId) -> &mut T {
        &mut self.values[id.index()]
    }
}

/// Both taxonomies plus per-source label spellings, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub categories: Taxonomy,
    pub towns: Taxonomy,
    source_labels: BTreeMap<SourceId, BTreeMap<String, String>>,
}

impl Catalog {
    pub fn from_config(config: &TaxonomyConfig) -> Result<Self, EngineError> {
        Ok(Self {
            categories: Taxonomy::new(EntityKind::Category, &config.categories)?,
            towns: Taxonomy::new(EntityKind::Town, &config.towns)?,
            source_labels: config.source_labels.clone(),
        })
    }

    /// Label `source` uses for an entity, falling back to the configured display label.
    pub fn label_for<'a>(&'a self, source: SourceId, entity: &'a TaxonomyEntity) -> &'a str {
        self.source_labels
            .get(&source)
            .and_then(|labels| labels.get(&entity.key))
            .map(String::as_str)
            .unwrap_or(entity.display_label.as_str())
    }
}
