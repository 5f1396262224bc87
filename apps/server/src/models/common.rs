use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt::Display, str::FromStr};

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_PAGE_SIZE: i64 = 12;

/// One page of results together with the unpaged total.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<T> {
    pub total_amount: i64,
    pub entities: Vec<T>,
}

impl<T> SearchResult<T> {
    pub fn empty() -> Self {
        Self {
            total_amount: 0,
            entities: Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> SearchResult<U> {
        SearchResult {
            total_amount: self.total_amount,
            entities: self.entities.into_iter().map(f).collect(),
        }
    }
}

impl<T> Default for SearchResult<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Offset paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetFilter {
    #[serde(default)]
    pub from: i64,
    #[serde(default = "default_size")]
    pub size: i64,
}

fn default_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for OffsetFilter {
    fn default() -> Self {
        Self {
            from: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl OffsetFilter {
    pub fn new(from: Option<i64>, size: Option<i64>) -> Self {
        Self {
            from: from.unwrap_or(0),
            size: size.unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }

    /// Rejects negative offsets and page sizes outside `1..=MAX_PAGE_SIZE`.
    pub fn validate(&self) -> crate::Result<()> {
        if self.from < 0 {
            return Err(crate::Error::OutOfRange(format!(
                "from must be >= 0, got {}",
                self.from
            )));
        }
        if self.size < 1 || self.size > MAX_PAGE_SIZE {
            return Err(crate::Error::OutOfRange(format!(
                "size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.size
            )));
        }
        Ok(())
    }
}

/// Splits a free-text query into lower-cased, NFC-normalized words.
///
/// Words are separated by whitespace and commas; empty fragments are dropped.
pub fn split_search_words(search: &str) -> Vec<String> {
    use unicode_normalization::UnicodeNormalization;

    search
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .map(|w| w.nfc().collect::<String>().to_lowercase())
        .collect()
}

/// Deserializes a comma-separated query value (`status=Pending,Approved`) into a list.
pub fn comma_separated<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(serde::de::Error::custom))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_filter_bounds() {
        assert!(OffsetFilter::default().validate().is_ok());
        assert!(OffsetFilter { from: -1, size: 10 }.validate().is_err());
        assert!(OffsetFilter { from: 0, size: 0 }.validate().is_err());
        assert!(OffsetFilter {
            from: 0,
            size: MAX_PAGE_SIZE + 1
        }
        .validate()
        .is_err());
    }

    #[test]
    fn search_words_split_on_spaces_and_commas() {
        assert_eq!(
            split_search_words("  Школа, Мистецтв  42 "),
            vec!["школа", "мистецтв", "42"]
        );
        assert!(split_search_words(" , ").is_empty());
    }

    #[derive(Debug, Deserialize)]
    struct ListQuery {
        #[serde(default, deserialize_with = "comma_separated")]
        ids: Vec<i64>,
    }

    #[test]
    fn comma_separated_lists_skip_blank_items() {
        let query: ListQuery = serde_json::from_value(serde_json::json!({ "ids": "1, 2,,3" })).unwrap();
        assert_eq!(query.ids, vec![1, 2, 3]);

        let empty: ListQuery = serde_json::from_str("{}").unwrap();
        assert!(empty.ids.is_empty());

        let bad = serde_json::from_value::<ListQuery>(serde_json::json!({ "ids": "1,x" }));
        assert!(bad.is_err());
    }

    #[test]
    fn search_words_are_nfc_normalized() {
        // "й" written as base letter + combining breve.
        let decomposed = "\u{0438}\u{0306}";
        assert_eq!(split_search_words(decomposed), vec!["\u{0439}"]);
    }
}
