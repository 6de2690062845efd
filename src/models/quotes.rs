use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};

use crate::constants::{ALL_CATEGORIES, UNKNOWN_AUTHOR};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum QuoteId {
    Number(i64),
    Text(String),
}

impl QuoteId {
    /// a fresh id for a quote that was created on this side.
    pub fn local() -> Self {
        QuoteId::Text(format!("local-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteId::Number(id) => write!(f, "{id}"),
            QuoteId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for QuoteId {
    fn from(id: i64) -> Self {
        QuoteId::Number(id)
    }
}

impl From<i32> for QuoteId {
    fn from(id: i32) -> Self {
        QuoteId::Number(i64::from(id))
    }
}

impl From<&str> for QuoteId {
    fn from(id: &str) -> Self {
        QuoteId::Text(id.to_string())
    }
}

fn unknown_author() -> String {
    UNKNOWN_AUTHOR.to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Quote {
    pub id: QuoteId,
    pub text: String,
    pub category: String,
    #[serde(default = "unknown_author")]
    pub author: String,
}

impl Quote {
    pub fn new(
        id: impl Into<QuoteId>,
        text: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Quote {
            id: id.into(),
            text: text.into(),
            category: category.into(),
            author: unknown_author(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }
}

/// a quote as it appears in persisted data or an imported file, where the id may be missing.
#[derive(Clone, Debug, Deserialize)]
pub struct QuoteRecord {
    #[serde(default)]
    pub id: Option<QuoteId>,
    pub text: String,
    pub category: String,
    #[serde(default)]
    pub author: Option<String>,
}

impl QuoteRecord {
    /// turns the record into a quote whose id is not in `taken`, minting a local one if needed.
    /// returns whether the id had to be (re)assigned.
    pub fn admit(self, taken: &mut HashSet<QuoteId>) -> (Quote, bool) {
        let (id, rekeyed) = match self.id {
            Some(id) if !taken.contains(&id) => (id, false),
            _ => (QuoteId::local(), true),
        };

        taken.insert(id.clone());

        let quote = Quote {
            id,
            text: self.text,
            category: self.category,
            author: self.author.unwrap_or_else(unknown_author),
        };

        (quote, rekeyed)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Category(String),
}

impl CategoryFilter {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();

        if input.is_empty() || input == ALL_CATEGORIES {
            CategoryFilter::All
        } else {
            CategoryFilter::Category(input.to_string())
        }
    }

    pub fn matches(&self, quote: &Quote) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Category(category) => quote.category == *category,
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str(ALL_CATEGORIES),
            CategoryFilter::Category(category) => f.write_str(category),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_as_numbers_or_strings() {
        let ids: Vec<QuoteId> = serde_json::from_str(r#"[5, "local-abc"]"#).unwrap();

        assert_eq!(ids, vec![QuoteId::Number(5), QuoteId::from("local-abc")]);
        assert_eq!(serde_json::to_string(&ids).unwrap(), r#"[5,"local-abc"]"#);
    }

    #[test]
    fn local_ids_are_unique() {
        assert_ne!(QuoteId::local(), QuoteId::local());
    }

    #[test]
    fn missing_author_defaults_to_unknown() {
        let quote: Quote =
            serde_json::from_str(r#"{"id": 1, "text": "X", "category": "Life"}"#).unwrap();

        assert_eq!(quote.author, UNKNOWN_AUTHOR);
    }

    #[test]
    fn admitting_records_keeps_ids_unique() {
        let mut taken = HashSet::from([QuoteId::Number(1)]);

        let records: Vec<QuoteRecord> = serde_json::from_str(
            r#"[
                {"id": 1, "text": "dupe", "category": "Life"},
                {"text": "legacy", "category": "Life"},
                {"id": 2, "text": "fresh", "category": "Work", "author": "Me"}
            ]"#,
        )
        .unwrap();

        let admitted: Vec<_> = records.into_iter().map(|r| r.admit(&mut taken)).collect();

        assert!(admitted[0].1);
        assert_ne!(admitted[0].0.id, QuoteId::Number(1));
        assert!(admitted[1].1);
        assert!(!admitted[2].1);
        assert_eq!(admitted[2].0.id, QuoteId::Number(2));
        assert_eq!(admitted[2].0.author, "Me");
        assert_eq!(taken.len(), 4);
    }

    #[test]
    fn filter_parsing() {
        assert_eq!(CategoryFilter::parse("all"), CategoryFilter::All);
        assert_eq!(CategoryFilter::parse("  "), CategoryFilter::All);
        assert_eq!(
            CategoryFilter::parse(" Life "),
            CategoryFilter::Category("Life".into())
        );
        assert_eq!(CategoryFilter::parse("All").to_string(), "All");
    }

    #[test]
    fn filter_matching_is_case_sensitive() {
        let quote = Quote::new(1, "X", "Life");

        assert!(CategoryFilter::All.matches(&quote));
        assert!(CategoryFilter::parse("Life").matches(&quote));
        assert!(!CategoryFilter::parse("life").matches(&quote));
    }
}
