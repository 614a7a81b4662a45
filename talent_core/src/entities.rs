//! Entity extraction from user input

use crate::types::EntityRef;
use regex::Regex;

/// Extract entity references such as `talent_3`, `talent 3` or `talent3`.
pub struct EntityExtractor {
    patterns: Vec<(Regex, String)>, // (pattern, entity kind)
}

impl EntityExtractor {
    pub fn new() -> Self {
        // Compiled once; the patterns are literals and cannot fail
        let patterns = vec![(
            Regex::new(r"\btalent[_\s]?(\d+)").expect("Invalid regex pattern"),
            "talent".to_string(),
        )];

        Self { patterns }
    }

    /// All references in the text, in order of appearance.
    pub fn extract(&self, text: &str) -> Vec<EntityRef> {
        let text_lower = text.to_lowercase();
        let mut entities = Vec::new();

        for (pattern, kind) in &self.patterns {
            for cap in pattern.captures_iter(&text_lower) {
                let (Some(whole), Some(digits)) = (cap.get(0), cap.get(1)) else {
                    continue;
                };
                // Ids too long for u64 cannot name a row
                if let Ok(id) = digits.as_str().parse::<u64>() {
                    entities.push(EntityRef::new(kind, id, whole.start(), whole.end()));
                }
            }
        }

        entities.sort_by_key(|e| e.start);
        entities
    }

    /// First reference in the text, if any.
    pub fn extract_first(&self, text: &str) -> Option<EntityRef> {
        self.extract(text).into_iter().next()
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_spellings() {
        let extractor = EntityExtractor::new();
        for text in [
            "talent_3 department",
            "Talent 3 email",
            "what about talent3?",
            "talent_3_department",
        ] {
            let entity = extractor.extract_first(text).unwrap();
            assert_eq!(entity.kind, "talent");
            assert_eq!(entity.numeric_id, 3);
        }
    }

    #[test]
    fn test_extract_position() {
        let extractor = EntityExtractor::new();
        let entity = extractor.extract_first("email of talent_42").unwrap();
        assert_eq!(entity.numeric_id, 42);
        assert_eq!(entity.start, 9);
        assert_eq!(entity.end, 18);
    }

    #[test]
    fn test_no_entity() {
        let extractor = EntityExtractor::new();
        assert!(extractor.extract("who is on bench").is_empty());
        assert!(extractor.extract("talents on bench").is_empty());
        assert!(extractor.extract_first("talented 5").is_none());
    }

    #[test]
    fn test_multiple_entities() {
        let extractor = EntityExtractor::new();
        let entities = extractor.extract("compare talent_1 and talent 2");
        let ids: Vec<u64> = entities.iter().map(|e| e.numeric_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
