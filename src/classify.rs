use crate::taxonomy::{EntityId, Taxonomy};
use std::collections::HashMap;

/// Lower-cased pathname of a URL or bare path: no scheme, host, query or fragment.
pub fn normalize_path(raw: &str) -> String {
    let mut rest = raw.trim();
    if let Some(index) = rest.find("://") {
        rest = &rest[index + 3..];
        rest = rest.find('/').map_or("", |slash| &rest[slash..]);
    }
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    let path = rest[..end].to_lowercase();
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

fn is_delimiter(c: char) -> bool {
    matches!(c, '/' | '-' | '_')
}

/// True when `token` occurs with a delimiter or the path edge on both sides.
/// The two sides need not use the same delimiter.
fn is_bounded(path: &str, token: &str) -> bool {
    !token.is_empty()
        && path.match_indices(token).any(|(index, _)| {
            let before = path[..index].chars().next_back();
            let after = path[index + token.len()..].chars().next();
            before.is_none_or(is_delimiter) && after.is_none_or(is_delimiter)
        })
}

#[derive(Debug)]
struct EntityMatcher {
    id: EntityId,
    tokens: Vec<String>,
    legacy: Vec<String>,
}

/// Maps normalized paths to the first matching entity in declaration order.
#[derive(Debug)]
pub struct PathClassifier {
    matchers: Vec<EntityMatcher>,
}

impl PathClassifier {
    pub fn new(taxonomy: &Taxonomy) -> Self {
        let matchers = taxonomy
            .entities()
            .iter()
            .map(|entity| EntityMatcher {
                id: entity.id,
                tokens: entity.match_tokens.clone(),
                legacy: entity.legacy_tokens.clone(),
            })
            .collect();
        Self { matchers }
    }

    /// Classify an already normalized path. Bounded segment matches across all
    /// entities are tried before any legacy substring token.
    pub fn classify(&self, path: &str) -> Option<EntityId> {
        self.matchers
            .iter()
            .find(|m| m.tokens.iter().any(|token| is_bounded(path, token)))
            .or_else(|| {
                self.matchers
                    .iter()
                    .find(|m| m.legacy.iter().any(|token| path.contains(token.as_str())))
            })
            .map(|m| m.id)
    }

    pub fn classify_raw(&self, raw: &str) -> Option<EntityId> {
        self.classify(&normalize_path(raw))
    }
}

/// Per-pass memo of raw path classifications.
#[derive(Debug)]
pub struct CachedClassifier<'a> {
    inner: &'a PathClassifier,
    memo: HashMap<String, Option<EntityId>>,
}

impl<'a> CachedClassifier<'a> {
    pub fn new(inner: &'a PathClassifier) -> Self {
        Self {
            inner,
            memo: HashMap::new(),
        }
    }

    pub fn classify(&mut self, raw: &str) -> Option<EntityId> {
        if let Some(hit) = self.memo.get(raw) {
            return *hit;
        }
        let result = self.inner.classify_raw(raw);
        self.memo.insert(raw.to_string(), result);
        result
    }
}
