//! Uniform match record built from typed API results.

use {serde::Serialize, serde_json::Value};

use crate::{
    backend::SauceNaoResult,
    error::{Result, SearchError},
};

/// Shown for any missing field, and as the whole reply when nothing matched.
pub const NO_RESULT: &str = "没有检索到哦~";

const PIXIV_USER_URL: &str = "https://www.pixiv.net/users/";

/// The seven display fields of the best match. `None` means the backend had
/// nothing for that field; formatting substitutes [`NO_RESULT`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResultRecord {
    pub title: Option<String>,
    /// Numeric text without the percent sign.
    pub similarity: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub author_url: Option<String>,
    pub index_name: Option<String>,
    pub source: Option<String>,
}

/// Normalize the best (first) API result. The list is taken in backend order.
pub fn normalize_api_results(results: &[SauceNaoResult]) -> Result<SearchResultRecord> {
    results
        .first()
        .map(SearchResultRecord::from_api_result)
        .ok_or(SearchError::NoResults)
}

impl SearchResultRecord {
    pub fn from_api_result(result: &SauceNaoResult) -> Self {
        let data = &result.data;
        let source = non_empty(data.source.as_deref());

        let title = first_present([
            data.title.as_deref(),
            data.eng_name.as_deref(),
            data.jp_name.as_deref(),
            data.material.as_deref(),
        ])
        .or_else(|| source.clone().filter(|s| !looks_like_url(s)));

        let author = first_present([
            data.member_name.as_deref(),
            data.author_name.as_deref(),
        ])
        .or_else(|| data.creator.as_ref().and_then(value_text))
        .or_else(|| non_empty(data.artist.as_deref()));

        let author_url = non_empty(data.author_url.as_deref()).or_else(|| {
            data.pixiv_id.as_ref()?;
            let member_id = data.member_id.as_ref().and_then(value_text)?;
            Some(format!("{PIXIV_USER_URL}{member_id}"))
        });

        Self {
            title,
            similarity: result.header.similarity.as_ref().and_then(similarity_text),
            url: data.ext_urls.iter().find_map(|u| non_empty(Some(u.as_str()))),
            author,
            author_url,
            index_name: non_empty(result.header.index_name.as_deref()),
            source,
        }
    }

    pub fn title(&self) -> &str {
        display(&self.title)
    }

    /// Similarity with a trailing `%`, or the sentinel.
    pub fn similarity(&self) -> String {
        match non_empty(self.similarity.as_deref()) {
            Some(s) => format!("{s}%"),
            None => NO_RESULT.into(),
        }
    }

    pub fn url(&self) -> &str {
        display(&self.url)
    }

    pub fn author(&self) -> &str {
        display(&self.author)
    }

    pub fn author_url(&self) -> &str {
        display(&self.author_url)
    }

    pub fn index_name(&self) -> &str {
        display(&self.index_name)
    }

    pub fn source(&self) -> &str {
        display(&self.source)
    }
}

fn display(field: &Option<String>) -> &str {
    match field.as_deref() {
        Some(s) if !s.trim().is_empty() => s,
        _ => NO_RESULT,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_present<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    candidates.into_iter().find_map(non_empty)
}

fn looks_like_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Text of a string, number, or the first usable entry of an array.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(Some(s.as_str())),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(value_text),
        _ => None,
    }
}

/// `"87.50"` → `87.5`, `90` → `90.0`. Unparseable text is kept as sent.
fn similarity_text(value: &Value) -> Option<String> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.fract() == 0.0 => Some(format!("{n:.1}")),
        Some(n) => Some(n.to_string()),
        None => value_text(value),
    }
}
