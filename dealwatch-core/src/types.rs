use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// A single post fetched from a forum source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub url: String,
    pub source: String,
    pub flair: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Post {
    pub fn flair_text(&self) -> &str {
        self.flair.as_deref().unwrap_or("")
    }
}

/// One accepted match as it is written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRecord {
    pub highlight: bool,
    pub category: String,
    pub created: String,
    pub price: String,
    pub title: String,
    pub url: String,
    pub source: String,
    pub flair: String,
}

impl DealRecord {
    pub fn from_post(post: &Post, category: &str, price: String, highlight: bool) -> Self {
        Self {
            highlight,
            category: category.to_string(),
            created: post.created_utc.format(CREATED_FORMAT).to_string(),
            price,
            title: post.title.clone(),
            url: post.url.clone(),
            source: post.source.clone(),
            flair: post.flair_text().to_string(),
        }
    }

    pub fn highlight_label(&self) -> &'static str {
        if self.highlight {
            "YES"
        } else {
            ""
        }
    }
}

/// Identifiers of posts that have already been through the pipeline.
///
/// Ids are only ever added; there is deliberately no removal API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenIdSet {
    ids: HashSet<String>,
}

impl SeenIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns `true` if the id was not present before.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Ids in lexical order, used to keep the persisted file stable between saves.
    pub fn sorted(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.iter().collect();
        ids.sort_unstable();
        ids
    }
}

impl FromIterator<String> for SeenIdSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

impl Extend<String> for SeenIdSet {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.ids.extend(iter);
    }
}
