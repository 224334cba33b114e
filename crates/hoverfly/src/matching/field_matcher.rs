//! Field matcher evaluation.
//!
//! A [`FieldMatcher`] is the ordered matcher list declared for one request
//! attribute; it matches if any entry does. A [`KeyedFieldMatcher`] applies
//! one such list per key of a multi-valued collection (headers, query,
//! form fields); every declared key must match.

use super::matchers::{CompiledMatcher, MatcherKind};
use crate::model::MatcherView;
use std::collections::BTreeMap;

/// Key that matches against whichever key is present.
pub const WILDCARD_KEY: &str = "*";

/// Points for one matching entry.
const ENTRY_SCORE: u32 = 1;
/// Extra points for an `exact` entry.
const EXACT_BONUS: u32 = 1;

/// OR-combination of matcher entries for a single attribute.
#[derive(Debug, Clone, Default)]
pub struct FieldMatcher {
    entries: Vec<CompiledMatcher>,
}

impl FieldMatcher {
    pub fn compile(views: &[MatcherView]) -> Self {
        Self {
            entries: views
                .iter()
                .map(CompiledMatcher::compile_or_fail_closed)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Score of `actual` against this field, `None` when no entry matches.
    ///
    /// An empty field is unconstrained and scores zero.
    pub fn evaluate(&self, actual: &str) -> Option<u32> {
        if self.entries.is_empty() {
            return Some(0);
        }
        let score: u32 = self
            .entries
            .iter()
            .filter(|entry| entry.evaluate(actual))
            .map(entry_score)
            .sum();
        (score > 0).then_some(score)
    }

    /// Score for a keyed field whose key is absent from the request. Only
    /// `negate` entries can be satisfied by an absent value, and an empty
    /// list stays unconstrained.
    fn evaluate_absent(&self) -> Option<u32> {
        if self.entries.is_empty() {
            return Some(0);
        }
        let negations = self
            .entries
            .iter()
            .filter(|entry| entry.kind() == Some(MatcherKind::Negate))
            .count() as u32;
        (negations > 0).then_some(negations * ENTRY_SCORE)
    }
}

fn entry_score(entry: &CompiledMatcher) -> u32 {
    match entry.kind() {
        Some(MatcherKind::Exact) => ENTRY_SCORE + EXACT_BONUS,
        _ => ENTRY_SCORE,
    }
}

/// AND-combination of per-key field matchers over a multi-valued map.
#[derive(Debug, Clone, Default)]
pub struct KeyedFieldMatcher {
    fields: Vec<(String, FieldMatcher)>,
    case_insensitive_keys: bool,
}

impl KeyedFieldMatcher {
    pub fn compile(fields: &BTreeMap<String, Vec<MatcherView>>, case_insensitive_keys: bool) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(key, views)| (key.clone(), FieldMatcher::compile(views)))
                .collect(),
            case_insensitive_keys,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Summed score across declared keys, `None` if any key fails.
    ///
    /// Multiple values under one key are joined with `;` before matching.
    pub fn evaluate(&self, actual: &BTreeMap<String, Vec<String>>) -> Option<u32> {
        let mut total = 0;
        for (key, field) in &self.fields {
            let score = if field.is_empty() {
                0
            } else if key == WILDCARD_KEY {
                actual
                    .values()
                    .filter_map(|values| field.evaluate(&values.join(";")))
                    .max()?
            } else {
                match self.lookup(actual, key) {
                    Some(values) => field.evaluate(&values.join(";"))?,
                    None => field.evaluate_absent()?,
                }
            };
            total += score;
        }
        Some(total)
    }

    fn lookup<'a>(
        &self,
        actual: &'a BTreeMap<String, Vec<String>>,
        key: &str,
    ) -> Option<&'a Vec<String>> {
        if self.case_insensitive_keys {
            actual
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        } else {
            actual.get(key)
        }
    }
}
