//! Entity extraction for the knowledge-graph leg of a search.
//!
//! Two extractors are provided. [`PromptEntityExtractor`] asks a language
//! model through a [`Completer`] and parses its free-text answer.
//! [`DictionaryExtractor`] matches a fixed vocabulary against the query and
//! needs no network, which suits offline graphs and tests.

use anyhow::Result;
use tracing::{debug, error, info};

use crate::source::{Completer, EntityExtractor};

/// Prompt sent to the completion backend. `{query}` is replaced verbatim.
pub const ENTITY_PROMPT: &str = "\
Extract all entities (people, organizations, agencies, policies, programs, laws, etc.)
mentioned in this query. Return ONLY the entity names as a comma-separated list.
If no entities are found, return \"NONE\".

Query: {query}

Entities:";

/// Answers a model gives when it found nothing.
const FILLER_ANSWERS: [&str; 3] = ["none", "n/a", "no entities"];

/// Render [`ENTITY_PROMPT`] for `query`.
#[must_use]
pub fn entity_prompt(query: &str) -> String {
    ENTITY_PROMPT.replace("{query}", query)
}

/// Parse a model's entity answer.
///
/// `NONE` in any case means no entities. Otherwise the text is split on
/// commas, or on newlines when it has no commas (models sometimes answer
/// with one entity per line). Blank items and filler answers such as `n/a`
/// are dropped.
///
/// # Examples
///
/// ```
/// use braid_search::entities::parse_entity_list;
///
/// assert_eq!(parse_entity_list("EPA, Clean Air Act"), vec!["EPA", "Clean Air Act"]);
/// assert!(parse_entity_list("none").is_empty());
/// ```
#[must_use]
pub fn parse_entity_list(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("none") {
        return Vec::new();
    }

    if text.contains(',') {
        keep_entities(text.split(','))
    } else {
        keep_entities(text.lines())
    }
}

fn keep_entities<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    parts
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter(|part| {
            !FILLER_ANSWERS
                .iter()
                .any(|filler| part.eq_ignore_ascii_case(filler))
        })
        .map(str::to_string)
        .collect()
}

/// Extracts entities by prompting a completion backend.
///
/// Completion failures are logged and reported as "no entities", so a
/// model outage only costs the graph leg of a search.
pub struct PromptEntityExtractor<C> {
    completer: C,
}

impl<C: Completer> PromptEntityExtractor<C> {
    pub const fn new(completer: C) -> Self {
        Self { completer }
    }
}

impl<C: Completer> EntityExtractor for PromptEntityExtractor<C> {
    fn extract(&self, query: &str) -> Result<Vec<String>> {
        match self.completer.complete(&entity_prompt(query)) {
            Ok(answer) => {
                let entities = parse_entity_list(&answer);
                info!(?entities, "extracted entities from query");
                Ok(entities)
            }
            Err(err) => {
                error!("entity extraction failed: {err:#}");
                Ok(Vec::new())
            }
        }
    }
}

/// Matches a known vocabulary of entity names inside the query.
///
/// Matching is a case-insensitive substring test. Results are ordered by
/// where they first appear in the query; when one name contains another
/// at the same position, the longer name comes first.
#[derive(Debug, Clone, Default)]
pub struct DictionaryExtractor {
    names: Vec<String>,
}

impl DictionaryExtractor {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names
            .into_iter()
            .map(Into::into)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        names.sort_by_key(|name| name.to_lowercase());
        names.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        Self { names }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl EntityExtractor for DictionaryExtractor {
    fn extract(&self, query: &str) -> Result<Vec<String>> {
        let haystack = query.to_lowercase();
        let mut found: Vec<(usize, &String)> = self
            .names
            .iter()
            .filter_map(|name| {
                haystack
                    .find(&name.to_lowercase())
                    .map(|position| (position, name))
            })
            .collect();
        found.sort_by(|(pa, a), (pb, b)| pa.cmp(pb).then_with(|| b.len().cmp(&a.len())));

        let entities: Vec<String> = found.into_iter().map(|(_, name)| name.clone()).collect();
        debug!(?entities, "dictionary entities");
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedCompleter {
        answer: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedCompleter {
        fn answering(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                answer: Err("rate limited".to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl Completer for ScriptedCompleter {
        fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().expect("prompts lock").push(prompt.to_string());
            self.answer.clone().map_err(anyhow::Error::msg)
        }
    }

    #[test]
    fn none_answer_means_no_entities() {
        assert!(parse_entity_list("NONE").is_empty());
        assert!(parse_entity_list("  None \n").is_empty());
    }

    #[test]
    fn comma_separated_answer_is_trimmed() {
        assert_eq!(
            parse_entity_list(" EPA ,Clean Air Act,, "),
            vec!["EPA", "Clean Air Act"]
        );
    }

    #[test]
    fn filler_items_are_dropped() {
        assert_eq!(parse_entity_list("EPA, n/a, No Entities"), vec!["EPA"]);
    }

    #[test]
    fn single_line_answer_is_one_entity() {
        assert_eq!(parse_entity_list("Department of Energy"), vec!["Department of Energy"]);
    }

    #[test]
    fn answer_without_commas_splits_on_newlines() {
        assert_eq!(parse_entity_list("EPA\n\nNASA\n"), vec!["EPA", "NASA"]);
        assert!(parse_entity_list("n/a\n").is_empty());
        assert!(parse_entity_list(" , ").is_empty());
    }

    #[test]
    fn prompt_embeds_query() {
        let completer = ScriptedCompleter::answering("EPA");
        let extractor = PromptEntityExtractor::new(completer);
        let entities = extractor.extract("What did the EPA issue?").expect("extract");

        assert_eq!(entities, vec!["EPA"]);
        let prompts = extractor.completer.prompts.lock().expect("prompts lock");
        assert!(prompts[0].contains("Query: What did the EPA issue?"));
        assert!(prompts[0].contains("\"NONE\""));
    }

    #[test]
    fn completion_failure_yields_no_entities() {
        let extractor = PromptEntityExtractor::new(ScriptedCompleter::failing());
        assert!(extractor.extract("anything").expect("extract").is_empty());
    }

    #[test]
    fn dictionary_matches_case_insensitively_in_query_order() {
        let extractor = DictionaryExtractor::new(["Clean Air Act", "EPA", "NASA", "epa"]);
        assert_eq!(extractor.len(), 3);

        let entities = extractor
            .extract("how does the clean air act constrain epa rules")
            .expect("extract");
        assert_eq!(entities, vec!["Clean Air Act", "EPA"]);
    }

    #[test]
    fn dictionary_without_matches_is_empty() {
        let extractor = DictionaryExtractor::new(["NASA"]);
        assert!(extractor.extract("tax credits").expect("extract").is_empty());
    }
}
