//! Keyword classification and price extraction for post titles.
//!
//! Matching is plain substring search over lowercased text. Category
//! priority is the order of [`PartKeywordTable`], which is fixed when the
//! table is built and never depends on hash ordering.

use crate::config::CategoryKeywords;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

static PRICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\d+(?:\.\d{1,2})?").expect("price pattern is valid"));

/// Returns the first `$123` / `$123.45` token in `title`, or an empty string.
pub fn extract_price(title: &str) -> String {
    PRICE_PATTERN
        .find(title)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Ordered keyword to category lookup.
///
/// Built by walking categories in configured order and their keywords in
/// listed order. A keyword declared twice keeps the position of its first
/// declaration and takes the category of its last one.
#[derive(Debug, Clone, Default)]
pub struct PartKeywordTable {
    entries: Vec<(String, String)>,
}

impl PartKeywordTable {
    pub fn from_categories(categories: &[CategoryKeywords]) -> Self {
        let mut entries: Vec<(String, String)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for category in categories {
            for keyword in &category.keywords {
                let keyword = keyword.trim().to_lowercase();
                if keyword.is_empty() {
                    continue;
                }

                match positions.get(&keyword) {
                    Some(&index) => {
                        let previous = &entries[index].1;
                        if previous != &category.name {
                            warn!(
                                "Keyword '{}' listed under both '{}' and '{}'; using '{}'",
                                keyword, previous, category.name, category.name
                            );
                        }
                        entries[index].1 = category.name.clone();
                    }
                    None => {
                        positions.insert(keyword.clone(), entries.len());
                        entries.push((keyword, category.name.clone()));
                    }
                }
            }
        }

        Self { entries }
    }

    /// First keyword (in table order) contained in `lowered_title`.
    pub fn lookup(&self, lowered_title: &str) -> Option<(&str, &str)> {
        self.entries
            .iter()
            .find(|(keyword, _)| lowered_title.contains(keyword.as_str()))
            .map(|(keyword, category)| (keyword.as_str(), category.as_str()))
    }

    pub fn category_of(&self, keyword: &str) -> Option<&str> {
        let keyword = keyword.to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == keyword)
            .map(|(_, category)| category.as_str())
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(keyword, _)| keyword.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TargetModelList {
    models: Vec<String>,
}

impl TargetModelList {
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            models: models
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, lowered_title: &str) -> bool {
        self.models
            .iter()
            .any(|model| lowered_title.contains(model.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'a> {
    Category { name: &'a str, is_target: bool },
    Uncategorized,
}

impl Classification<'_> {
    pub fn category(&self) -> Option<&str> {
        match self {
            Classification::Category { name, .. } => Some(name),
            Classification::Uncategorized => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    table: PartKeywordTable,
    targets: TargetModelList,
}

impl Classifier {
    pub fn new(table: PartKeywordTable, targets: TargetModelList) -> Self {
        Self { table, targets }
    }

    /// `lowered_title` must already be lowercase.
    pub fn classify<'a>(&'a self, lowered_title: &str) -> Classification<'a> {
        match self.table.lookup(lowered_title) {
            Some((_, category)) => Classification::Category {
                name: category,
                is_target: self.targets.matches(lowered_title),
            },
            None => Classification::Uncategorized,
        }
    }

    pub fn classify_title<'a>(&'a self, title: &str) -> Classification<'a> {
        self.classify(&title.to_lowercase())
    }

    pub fn table(&self) -> &PartKeywordTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn category(name: &str, keywords: &[&str]) -> CategoryKeywords {
        CategoryKeywords {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn default_classifier() -> Classifier {
        let config = AppConfig::default();
        Classifier::new(
            PartKeywordTable::from_categories(&config.matching.categories),
            TargetModelList::new(&config.matching.target_models),
        )
    }

    #[test]
    fn test_extract_price() {
        assert_eq!(extract_price("RTX 4080 for $999.99 today"), "$999.99");
        assert_eq!(extract_price("no price here"), "");
    }

    #[test]
    fn test_extract_price_first_match_only() {
        assert_eq!(extract_price("was $120, now $89.5"), "$120");
        assert_eq!(extract_price("$1299 bundle"), "$1299");
    }

    #[test]
    fn test_extract_price_stops_after_two_decimals() {
        assert_eq!(extract_price("odd $12.345 pricing"), "$12.34");
        assert_eq!(extract_price("trailing dot $40. ok"), "$40");
        assert_eq!(extract_price("bare $ sign"), "");
    }

    #[test]
    fn test_table_lowercases_keywords() {
        let table = PartKeywordTable::from_categories(&[category("CPU", &["14900K"])]);
        assert_eq!(table.category_of("14900k"), Some("CPU"));
        assert_eq!(table.lookup("intel 14900k deal"), Some(("14900k", "CPU")));
    }

    #[test]
    fn test_table_duplicate_keyword_last_category_wins_first_position_kept() {
        let table = PartKeywordTable::from_categories(&[
            category("A", &["alpha", "shared"]),
            category("B", &["beta", "shared"]),
        ]);

        let keywords: Vec<&str> = table.keywords().collect();
        assert_eq!(keywords, vec!["alpha", "shared", "beta"]);
        assert_eq!(table.category_of("shared"), Some("B"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_first_keyword_in_table_order_wins() {
        let classifier = default_classifier();
        // "4080" (GPU) comes before "ddr5" (RAM) in the default table
        let result = classifier.classify("ddr5 ram + 4080 bundle");
        assert_eq!(result.category(), Some("GPU"));
    }

    #[test]
    fn test_single_category_without_target() {
        let classifier = default_classifier();
        let result = classifier.classify_title("[RAM] G.Skill DDR5 6000 CL30 $89");
        assert_eq!(
            result,
            Classification::Category {
                name: "RAM",
                is_target: false
            }
        );
    }

    #[test]
    fn test_target_model_sets_highlight() {
        let classifier = default_classifier();
        let result = classifier.classify_title("[CPU] Intel Core i5-14600K $199");
        assert_eq!(
            result,
            Classification::Category {
                name: "CPU",
                is_target: true
            }
        );
    }

    #[test]
    fn test_overlapping_keywords_follow_table_order() {
        let classifier = default_classifier();
        // "7800" is a GPU keyword listed before the CPU keyword "7800x3d"
        let result = classifier.classify_title("[CPU] AMD Ryzen 7 7800X3D - $339");
        assert_eq!(result.category(), Some("GPU"));
    }

    #[test]
    fn test_no_keyword_is_uncategorized() {
        let classifier = default_classifier();
        assert_eq!(
            classifier.classify_title("Logitech wireless keyboard"),
            Classification::Uncategorized
        );
    }

    #[test]
    fn test_target_alone_does_not_categorize() {
        let classifier = Classifier::new(
            PartKeywordTable::from_categories(&[category("GPU", &["gpu"])]),
            TargetModelList::new(["noctua"]),
        );
        assert_eq!(
            classifier.classify_title("Noctua NH-D15"),
            Classification::Uncategorized
        );
    }
}
