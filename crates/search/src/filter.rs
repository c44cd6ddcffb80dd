use canvas_protocol::FlatRecord;

/// Normalized free-text query; blank input matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    needle: Option<String>,
}

impl SearchQuery {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        Self {
            needle: (!trimmed.is_empty()).then(|| trimmed.to_lowercase()),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.needle.is_none()
    }

    /// Case-insensitive substring match against title, url or domain.
    pub fn matches(&self, record: &FlatRecord) -> bool {
        let Some(needle) = self.needle.as_deref() else {
            return true;
        };
        [&record.title, &record.url, &record.domain]
            .into_iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Order-preserving subsequence of `records` matching `query`.
pub fn filter<'a>(records: &'a [FlatRecord], query: &str) -> Vec<&'a FlatRecord> {
    let query = SearchQuery::parse(query);
    if query.is_empty() {
        return records.iter().collect();
    }
    records.iter().filter(|record| query.matches(record)).collect()
}
