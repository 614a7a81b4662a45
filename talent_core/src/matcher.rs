//! Intent matcher - binds a query to the first applicable rule
//!
//! A rule applies when one of its phrases is a substring of the lowercased,
//! trimmed query and every column it targets exists in the table. Entity
//! lookups additionally need an entity reference in the query. Rules whose
//! columns are missing are skipped, so one rule table serves tables with
//! different optional columns.

use crate::entities::EntityExtractor;
use crate::rules::RuleSet;
use crate::schema::normalize_header;
use crate::types::{IntentMatch, IntentRule, MatchOutcome, Operation};
use ahash::AHashSet;
use tracing::debug;

pub struct IntentMatcher {
    rules: RuleSet,
    extractor: EntityExtractor,
}

impl IntentMatcher {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            extractor: EntityExtractor::new(),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Match a query against the rule table for a table with `columns`.
    pub fn match_intent<S: AsRef<str>>(&self, input: &str, columns: &[S]) -> MatchOutcome {
        match_intent(input, columns, &self.rules, &self.extractor)
    }
}

impl Default for IntentMatcher {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}

/// Match user input against the rule table
///
/// Returns the first rule (in priority order) that applies, or `NoMatch`.
pub fn match_intent<S: AsRef<str>>(
    input: &str,
    columns: &[S],
    rules: &RuleSet,
    extractor: &EntityExtractor,
) -> MatchOutcome {
    let input_normalized = input.trim().to_lowercase();
    if input_normalized.is_empty() || rules.is_empty() {
        return MatchOutcome::NoMatch;
    }

    let schema: AHashSet<String> = columns.iter().map(|c| normalize_header(c.as_ref())).collect();
    let entity = extractor.extract_first(&input_normalized);

    for rule in rules.rules() {
        let Some(trigger) = find_trigger(&input_normalized, rule) else {
            continue;
        };

        if let Some(missing) = rule.target_columns.iter().find(|c| !schema.contains(*c)) {
            debug!("rule {} skipped: column {:?} not in table", rule.id, missing);
            continue;
        }

        if rule.operation == Operation::EntityLookup && entity.is_none() {
            continue;
        }

        debug!("rule {} matched on {:?}", rule.id, trigger);
        let entity = match rule.operation {
            Operation::EntityLookup => entity,
            _ => None,
        };
        return MatchOutcome::Matched(IntentMatch::new(
            rule.clone(),
            trigger.to_string(),
            entity,
            input.to_string(),
        ));
    }

    MatchOutcome::NoMatch
}

/// First phrase of the rule contained in the query
fn find_trigger<'a>(input: &str, rule: &'a IntentRule) -> Option<&'a str> {
    rule.phrases().find(|p| !p.is_empty() && input.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChartKind, Operation};

    const COLUMNS: &[&str] = &[
        "talent_name",
        "email",
        "department",
        "deployment_status",
        "training_status",
    ];

    fn matched(outcome: MatchOutcome) -> IntentMatch {
        match outcome {
            MatchOutcome::Matched(m) => m,
            MatchOutcome::NoMatch => panic!("Expected match"),
        }
    }

    #[test]
    fn test_status_filter() {
        let matcher = IntentMatcher::default();
        let m = matched(matcher.match_intent("Who is ON BENCH?", COLUMNS));
        assert_eq!(m.rule.id, "on_bench");
        assert_eq!(m.rule.operation, Operation::FilterCount);
        assert!(m.entity.is_none());
    }

    #[test]
    fn test_synonym_expansion() {
        let matcher = IntentMatcher::default();
        assert_eq!(
            matched(matcher.match_intent("who is sitting free", COLUMNS)).rule.id,
            "on_bench"
        );
        assert_eq!(
            matched(matcher.match_intent("ongoing training please", COLUMNS)).rule.id,
            "training_in_progress"
        );
    }

    #[test]
    fn test_priority_order() {
        let matcher = IntentMatcher::default();
        // "not deployed" also contains "deployed"; the earlier rule wins
        let m = matched(matcher.match_intent("list people not deployed", COLUMNS));
        assert_eq!(m.rule.id, "on_bench");
        assert_eq!(m.trigger, "not deployed");
    }

    #[test]
    fn test_entity_lookup_needs_entity_and_field() {
        let matcher = IntentMatcher::default();
        let m = matched(matcher.match_intent("talent_3 department", COLUMNS));
        assert_eq!(m.rule.id, "entity_department");
        assert_eq!(m.entity.as_ref().map(|e| e.numeric_id), Some(3));

        let m = matched(matcher.match_intent("Email of Talent 4", COLUMNS));
        assert_eq!(m.rule.id, "entity_email");

        // Field keyword without an entity does not trigger a lookup
        assert!(matches!(
            matcher.match_intent("which department", COLUMNS),
            MatchOutcome::NoMatch
        ));
        // Entity without a field keyword does not either
        assert!(matches!(
            matcher.match_intent("talent_3", COLUMNS),
            MatchOutcome::NoMatch
        ));
    }

    #[test]
    fn test_rule_with_missing_column_skipped() {
        let matcher = IntentMatcher::default();
        let columns = ["talent_name", "department"];
        // Status columns are absent: no filter rule applies
        assert!(matches!(
            matcher.match_intent("who is on bench", &columns),
            MatchOutcome::NoMatch
        ));
        // Email column absent: lookup falls through
        assert!(matches!(
            matcher.match_intent("email of talent_4", &columns),
            MatchOutcome::NoMatch
        ));
    }

    #[test]
    fn test_columns_are_normalized_before_checking() {
        let matcher = IntentMatcher::default();
        let columns = ["Deployment Status"];
        let m = matched(matcher.match_intent("on bench", &columns));
        assert_eq!(m.rule.id, "on_bench");
    }

    #[test]
    fn test_static_and_generic_charts() {
        let matcher = IntentMatcher::default();
        let m = matched(matcher.match_intent("show pie chart of department", COLUMNS));
        assert_eq!(m.rule.id, "department_pie");
        assert_eq!(m.rule.chart_kind, Some(ChartKind::Pie));

        let m = matched(matcher.match_intent("bar graph of email", COLUMNS));
        assert_eq!(m.rule.id, "chart");
        assert!(m.rule.target_columns.is_empty());
    }

    #[test]
    fn test_narrative_rule() {
        let matcher = IntentMatcher::default();
        let m = matched(matcher.match_intent("summarize the workforce", COLUMNS));
        assert_eq!(m.rule.operation, Operation::Narrative);
    }

    #[test]
    fn test_no_match() {
        let matcher = IntentMatcher::default();
        for q in ["completely unrelated query", "", "   ", "hello"] {
            assert!(matches!(matcher.match_intent(q, COLUMNS), MatchOutcome::NoMatch));
        }
    }
}
