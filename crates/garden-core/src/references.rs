//! `[[...]]` entity reference tokens in free-form content.
//!
//! Two token forms are recognized:
//!
//! - `[[X]]` names an entity.
//! - `[[D][Y]]` shows `D` and targets `Y`, which is an entity id or a name.
//!
//! Storage rewrites names to ids (`[[<id>]]`, `[[D][<id>]]`). Display rewrites
//! ids to Markdown links (`[name](/entities/<id>)`, `[D](/entities/<id>)`).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{NewEntityReference, ENTITY_TYPE_GENERAL};
use crate::traits::EntityLookup;

static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[(.*?)(?:\]\[([^\]]+))?\]\]").expect("reference pattern is valid")
});

/// One parsed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceToken {
    /// `[[name]]`
    Name(String),
    /// `[[display][target]]`
    Display { display: String, target: String },
}

impl ReferenceToken {
    /// Text recorded on the reference row.
    pub fn reference_text(&self) -> &str {
        match self {
            ReferenceToken::Name(name) => name,
            ReferenceToken::Display { display, .. } => display,
        }
    }

    fn rewrite(&self, entity_id: Uuid) -> String {
        match self {
            ReferenceToken::Name(_) => format!("[[{}]]", entity_id),
            ReferenceToken::Display { display, .. } => format!("[[{}][{}]]", display, entity_id),
        }
    }
}

/// A token with its byte span in the scanned content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMatch {
    pub start: usize,
    pub end: usize,
    pub token: ReferenceToken,
}

/// Every token in `content`, in order of appearance.
pub fn parse_references(content: &str) -> Vec<ReferenceMatch> {
    REFERENCE_RE
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let first = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let token = match caps.get(2) {
                Some(second) => ReferenceToken::Display {
                    display: first.to_string(),
                    target: second.as_str().to_string(),
                },
                None => ReferenceToken::Name(first.to_string()),
            };
            Some(ReferenceMatch {
                start: whole.start(),
                end: whole.end(),
                token,
            })
        })
        .collect()
}

/// Content rewritten for storage plus the references it records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub content: String,
    pub references: Vec<NewEntityReference>,
}

/// Replace tokens whose resolution is `Some(id)`; others are left as written.
///
/// `resolutions` is parallel to `matches`.
pub fn apply_resolutions(
    content: &str,
    matches: &[ReferenceMatch],
    resolutions: &[Option<Uuid>],
) -> ResolvedContent {
    let mut out = String::with_capacity(content.len());
    let mut references = Vec::new();
    let mut cursor = 0;

    for (m, resolved) in matches.iter().zip(resolutions) {
        let Some(entity_id) = resolved else {
            continue;
        };
        out.push_str(&content[cursor..m.start]);
        out.push_str(&m.token.rewrite(*entity_id));
        cursor = m.end;
        references.push(NewEntityReference {
            entity_id: *entity_id,
            reference_text: m.token.reference_text().to_string(),
            position: i32::try_from(m.start).ok(),
        });
    }
    out.push_str(&content[cursor..]);

    ResolvedContent {
        content: out,
        references,
    }
}

/// Resolve every token in `content` against `lookup` and rewrite it for storage.
///
/// Names are looked up, then created as `general` entities when absent. A
/// `[[D][<uuid>]]` target must already exist. A `[[<uuid>]]` token that names
/// an existing entity is kept, so storing already-rewritten content is stable.
/// Tokens that fail to resolve are left unchanged.
pub async fn resolve_for_storage<L>(lookup: &mut L, content: &str) -> Result<ResolvedContent>
where
    L: EntityLookup + ?Sized,
{
    let matches = parse_references(content);
    let mut resolutions = Vec::with_capacity(matches.len());

    for m in &matches {
        let resolved = match resolve_token(lookup, &m.token).await {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    reference = m.token.reference_text(),
                    error = %e,
                    "Skipping unresolved reference"
                );
                None
            }
        };
        resolutions.push(resolved);
    }

    let resolved = apply_resolutions(content, &matches, &resolutions);
    debug!(
        token_count = matches.len(),
        reference_count = resolved.references.len(),
        "Resolved references"
    );
    Ok(resolved)
}

async fn resolve_token<L>(lookup: &mut L, token: &ReferenceToken) -> Result<Option<Uuid>>
where
    L: EntityLookup + ?Sized,
{
    match token {
        ReferenceToken::Name(name) => {
            if name.trim().is_empty() {
                return Ok(None);
            }
            if let Ok(id) = Uuid::try_parse(name) {
                if lookup.entity_exists(id).await? {
                    return Ok(Some(id));
                }
            }
            lookup_or_create(lookup, name).await.map(Some)
        }
        ReferenceToken::Display { target, .. } => match Uuid::try_parse(target) {
            Ok(id) => Ok(lookup.entity_exists(id).await?.then_some(id)),
            Err(_) => lookup_or_create(lookup, target).await.map(Some),
        },
    }
}

async fn lookup_or_create<L>(lookup: &mut L, name: &str) -> Result<Uuid>
where
    L: EntityLookup + ?Sized,
{
    match lookup.find_entity_by_name(name).await? {
        Some(id) => Ok(id),
        None => lookup.create_entity(name, ENTITY_TYPE_GENERAL).await,
    }
}

/// Entity ids targeted by tokens of stored content.
pub fn referenced_ids(content: &str) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = parse_references(content)
        .iter()
        .filter_map(|m| match &m.token {
            ReferenceToken::Name(name) => Uuid::try_parse(name).ok(),
            ReferenceToken::Display { target, .. } => Uuid::try_parse(target).ok(),
        })
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Rewrite stored tokens to Markdown links.
///
/// `names` maps existing entity ids to their names; tokens whose id is not
/// in the map are left unchanged.
pub fn render_for_display(content: &str, names: &HashMap<Uuid, String>) -> String {
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;

    for m in parse_references(content) {
        let link = match &m.token {
            ReferenceToken::Name(id) => Uuid::try_parse(id)
                .ok()
                .and_then(|id| names.get(&id).map(|name| format!("[{}](/entities/{})", name, id))),
            ReferenceToken::Display { display, target } => Uuid::try_parse(target)
                .ok()
                .filter(|id| names.contains_key(id))
                .map(|id| format!("[{}](/entities/{})", display, id)),
        };
        if let Some(link) = link {
            out.push_str(&content[cursor..m.start]);
            out.push_str(&link);
            cursor = m.end;
        }
    }
    out.push_str(&content[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use async_trait::async_trait;

    /// In-memory entity table.
    #[derive(Default)]
    struct FakeLookup {
        entities: Vec<(Uuid, String, String)>,
        fail_create: bool,
    }

    impl FakeLookup {
        fn with(names: &[&str]) -> Self {
            Self {
                entities: names
                    .iter()
                    .map(|n| (Uuid::new_v4(), n.to_string(), "general".to_string()))
                    .collect(),
                fail_create: false,
            }
        }

        fn id_of(&self, name: &str) -> Option<Uuid> {
            self.entities
                .iter()
                .find(|(_, n, _)| n == name)
                .map(|(id, _, _)| *id)
        }

        fn names(&self) -> HashMap<Uuid, String> {
            self.entities
                .iter()
                .map(|(id, n, _)| (*id, n.clone()))
                .collect()
        }
    }

    #[async_trait]
    impl EntityLookup for FakeLookup {
        async fn entity_exists(&mut self, id: Uuid) -> Result<bool> {
            Ok(self.entities.iter().any(|(e, _, _)| *e == id))
        }

        async fn find_entity_by_name(&mut self, name: &str) -> Result<Option<Uuid>> {
            Ok(self.id_of(name))
        }

        async fn create_entity(&mut self, name: &str, entity_type: &str) -> Result<Uuid> {
            if self.fail_create {
                return Err(Error::Internal("insert failed".into()));
            }
            let id = Uuid::new_v4();
            self.entities
                .push((id, name.to_string(), entity_type.to_string()));
            Ok(id)
        }
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn test_parse_both_forms() {
        let found = parse_references("Met [[Alice]] and [[shorthand][Bob]] today");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].token, ReferenceToken::Name("Alice".into()));
        assert_eq!(
            found[1].token,
            ReferenceToken::Display {
                display: "shorthand".into(),
                target: "Bob".into()
            }
        );
        assert_eq!(found[0].start, 4);
    }

    #[test]
    fn test_parse_ignores_single_brackets() {
        assert!(parse_references("[not] a [link](x)").is_empty());
    }

    #[test]
    fn test_reference_text_per_form() {
        let found = parse_references("[[X]] [[D][Y]]");
        assert_eq!(found[0].token.reference_text(), "X");
        assert_eq!(found[1].token.reference_text(), "D");
    }

    // =========================================================================
    // Storage rewrite
    // =========================================================================

    #[tokio::test]
    async fn test_rewrite_existing_and_new_entities() {
        let mut lookup = FakeLookup::with(&["Alice"]);
        let alice = lookup.id_of("Alice").unwrap();

        let resolved = resolve_for_storage(&mut lookup, "Met [[Alice]] and [[shorthand][Bob]] today")
            .await
            .unwrap();

        let bob = lookup.id_of("Bob").expect("Bob created");
        assert_eq!(
            resolved.content,
            format!("Met [[{}]] and [[shorthand][{}]] today", alice, bob)
        );
        assert_eq!(resolved.references.len(), 2);
        assert_eq!(resolved.references[0].entity_id, alice);
        assert_eq!(resolved.references[0].reference_text, "Alice");
        assert_eq!(resolved.references[1].entity_id, bob);
        assert_eq!(resolved.references[1].reference_text, "shorthand");

        let created = lookup.entities.iter().find(|(id, _, _)| *id == bob).unwrap();
        assert_eq!(created.2, ENTITY_TYPE_GENERAL);
    }

    #[tokio::test]
    async fn test_unknown_uuid_target_is_skipped() {
        let mut lookup = FakeLookup::default();
        let missing = Uuid::new_v4();
        let body = format!("see [[here][{}]]", missing);

        let resolved = resolve_for_storage(&mut lookup, &body).await.unwrap();

        assert_eq!(resolved.content, body);
        assert!(resolved.references.is_empty());
        assert!(lookup.entities.is_empty());
    }

    #[tokio::test]
    async fn test_existing_uuid_target_is_kept() {
        let mut lookup = FakeLookup::with(&["Carol"]);
        let carol = lookup.id_of("Carol").unwrap();
        let body = format!("ask [[her][{}]]", carol);

        let resolved = resolve_for_storage(&mut lookup, &body).await.unwrap();

        assert_eq!(resolved.content, body);
        assert_eq!(resolved.references[0].entity_id, carol);
    }

    #[tokio::test]
    async fn test_restoring_rewritten_content_is_stable() {
        let mut lookup = FakeLookup::with(&["Alice"]);
        let first = resolve_for_storage(&mut lookup, "[[Alice]]").await.unwrap();
        let count = lookup.entities.len();

        let second = resolve_for_storage(&mut lookup, &first.content).await.unwrap();

        assert_eq!(second.content, first.content);
        assert_eq!(lookup.entities.len(), count);
    }

    #[tokio::test]
    async fn test_create_failure_skips_token() {
        let mut lookup = FakeLookup::with(&["Alice"]);
        lookup.fail_create = true;

        let resolved = resolve_for_storage(&mut lookup, "[[Alice]] and [[Nobody]]")
            .await
            .unwrap();

        assert_eq!(resolved.references.len(), 1);
        assert!(resolved.content.ends_with("and [[Nobody]]"));
    }

    #[tokio::test]
    async fn test_repeated_name_resolves_to_one_entity() {
        let mut lookup = FakeLookup::default();
        let resolved = resolve_for_storage(&mut lookup, "[[Dan]] then [[Dan]]")
            .await
            .unwrap();
        assert_eq!(lookup.entities.len(), 1);
        assert_eq!(resolved.references.len(), 2);
        assert_eq!(resolved.references[0].entity_id, resolved.references[1].entity_id);
    }

    // =========================================================================
    // Display rewrite
    // =========================================================================

    #[tokio::test]
    async fn test_storage_then_display_round_trip() {
        let mut lookup = FakeLookup::with(&["Alice", "Eve"]);
        let stored = resolve_for_storage(&mut lookup, "[[Alice]] met [[Eve]].")
            .await
            .unwrap();

        let display = render_for_display(&stored.content, &lookup.names());

        let alice = lookup.id_of("Alice").unwrap();
        let eve = lookup.id_of("Eve").unwrap();
        assert_eq!(
            display,
            format!("[Alice](/entities/{}) met [Eve](/entities/{}).", alice, eve)
        );
    }

    #[test]
    fn test_display_form_uses_display_text() {
        let id = Uuid::new_v4();
        let names = HashMap::from([(id, "Robert".to_string())]);
        let display = render_for_display(&format!("hi [[Bob][{}]]", id), &names);
        assert_eq!(display, format!("hi [Bob](/entities/{})", id));
    }

    #[test]
    fn test_display_leaves_unresolved_tokens() {
        let id = Uuid::new_v4();
        let body = format!("[[{}]] and [[plain name]]", id);
        assert_eq!(render_for_display(&body, &HashMap::new()), body);
    }

    #[test]
    fn test_referenced_ids_are_deduplicated() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let body = format!("[[{a}]] [[x][{b}]] [[{a}]] [[Name]]");
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(referenced_ids(&body), expected);
    }
}
