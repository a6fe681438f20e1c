//! Search query composition.

/// One text-search request. All fields except `text` are optional filters;
/// each active filter contributes one clause, ANDed together by the API's
/// space-separated filter syntax.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub cc0_only: bool,
    /// Upper bound in seconds; ignored when not positive.
    pub max_duration: f64,
    /// Comma-separated tag list; empty entries are skipped.
    pub tags: String,
    /// Category clause; skipped when empty or `any` (case-insensitive).
    pub category: String,
    pub page: u32,
    pub sort: String,
    /// Extra raw filter appended verbatim (used by the favorites lookup).
    pub extra_filter: Option<String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cc0_only: false,
            max_duration: 0.0,
            tags: String::new(),
            category: String::new(),
            page: 1,
            sort: String::new(),
            extra_filter: None,
        }
    }

    /// Compose the filter expression, or `None` when no filter is active.
    pub fn filter_expression(&self) -> Option<String> {
        let mut clauses = Vec::new();
        if self.cc0_only {
            clauses.push("license:\"Creative Commons 0\"".to_string());
        }
        if self.max_duration > 0.0 {
            clauses.push(format!("duration:[* TO {}]", self.max_duration));
        }
        for tag in self.tags.split(',') {
            let tag = tag.trim();
            if !tag.is_empty() {
                clauses.push(format!("tag:\"{tag}\""));
            }
        }
        if !self.category.is_empty() && !self.category.eq_ignore_ascii_case("any") {
            clauses.push(format!("category:\"{}\"", self.category));
        }
        if let Some(extra) = &self.extra_filter {
            clauses.push(extra.clone());
        }

        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" "))
        }
    }
}
