//! Match summary scraped from the SauceNAO search page.
//!
//! The page has no stable schema. The first result block is read as a title
//! region followed by content columns of `<strong>Label:</strong> value`
//! pairs, and each label's value is found by walking its following siblings
//! (see [`label_value`]).

use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{Result, SearchError};

/// Reply when the page has no result block.
pub const NO_MATCH_INFO: &str = "未找到匹配的图片信息。";

const RESULT_BLOCK: &str = "div.result";
const RESULT_CONTENT: &str = "td.resulttablecontent";
const SIMILARITY: &str = "div.resultsimilarityinfo";
const TITLE: &str = "div.resulttitle";
const COLUMN: &str = "div.resultcontentcolumn";
const BOLD: &str = "strong, b";
const LINK: &str = "a";

/// Page label → display label. Labels not listed pass through unchanged.
const LABELS: &[(&str, &str)] = &[
    ("Source", "来源"),
    ("Material", "原作"),
    ("Characters", "角色"),
    ("Author", "作者"),
    ("Member", "画师"),
    ("Creator", "作者"),
];

/// Value found after a bolded label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelValue {
    pub value: Option<String>,
    pub link: Option<String>,
}

/// Extract the best match from a search page as newline-joined
/// `label：value` lines.
pub fn extract_summary(body: &str) -> Result<String> {
    let doc = Html::parse_document(body);
    let block_sel = selector(RESULT_BLOCK)?;
    let content_sel = selector(RESULT_CONTENT)?;

    let block = doc
        .select(&block_sel)
        .find(|b| b.select(&content_sel).next().is_some())
        .ok_or(SearchError::NoResultBlock)?;

    let mut lines = Vec::new();

    if let Some(similarity) = block.select(&selector(SIMILARITY)?).next() {
        let text = element_text(similarity);
        if !text.is_empty() {
            lines.push(format!("相似度：{text}"));
        }
    }

    let bold_sel = selector(BOLD)?;
    let link_sel = selector(LINK)?;

    if let Some(title) = block.select(&selector(TITLE)?).next() {
        lines.extend(title_line(title, &bold_sel));
    }

    for column in block.select(&selector(COLUMN)?) {
        column_lines(column, &bold_sel, &link_sel, &mut lines);
    }

    if lines.is_empty() {
        return Err(SearchError::NoResultBlock);
    }
    Ok(lines.join("\n"))
}

fn title_line(region: ElementRef<'_>, bold_sel: &Selector) -> Option<String> {
    match region.select(bold_sel).next() {
        Some(bold) => {
            let text = element_text(bold);
            if let Some(label) = text.strip_suffix(':') {
                match label_value(bold).value {
                    Some(value) => Some(format!("{}：{value}", translate_label(label.trim()))),
                    None => region_title(region),
                }
            } else if text.is_empty() {
                region_title(region)
            } else {
                Some(format!("标题：{text}"))
            }
        },
        None => region_title(region),
    }
}

fn region_title(region: ElementRef<'_>) -> Option<String> {
    let text = element_text(region);
    (!text.is_empty()).then(|| format!("标题：{text}"))
}

fn column_lines(
    column: ElementRef<'_>,
    bold_sel: &Selector,
    link_sel: &Selector,
    lines: &mut Vec<String>,
) {
    let labels: Vec<_> = column.select(bold_sel).collect();

    if labels.is_empty() {
        let text = element_text(column);
        if !text.is_empty() {
            lines.push(text);
        }
        let links: Vec<_> = column.select(link_sel).collect();
        if let [only] = links.as_slice()
            && let Some(href) = only.value().attr("href")
        {
            lines.push(format!("链接：{href}"));
        }
        return;
    }

    for bold in labels {
        let raw = element_text(bold);
        let label = translate_label(raw.trim_end_matches(':').trim());
        let LabelValue { value, link } = label_value(bold);
        if let Some(value) = value {
            lines.push(format!("{label}：{value}"));
        }
        if let Some(link) = link {
            lines.push(format!("链接：{link}"));
        }
    }
}

/// Display label for a page label.
pub fn translate_label(label: &str) -> &str {
    LABELS
        .iter()
        .find(|(from, _)| *from == label)
        .map_or(label, |(_, to)| *to)
}

/// Walk the siblings after `label` up to the next bolded label.
///
/// `<br>` is skipped. The first hyperlink gives both value (its text) and
/// link (its `href`); otherwise the first non-empty text gives the value. An
/// element wrapping a hyperlink counts as that hyperlink.
pub fn label_value(label: ElementRef<'_>) -> LabelValue {
    for sibling in label.next_siblings() {
        match sibling.value() {
            Node::Text(text) => {
                let text = collapse(text);
                if !text.is_empty() {
                    return LabelValue {
                        value: Some(text),
                        link: None,
                    };
                }
            },
            Node::Element(el) => match el.name() {
                "strong" | "b" => break,
                "br" => {},
                _ => {
                    let Some(element) = ElementRef::wrap(sibling) else {
                        continue;
                    };
                    if let Some(found) = link_value(element) {
                        return found;
                    }
                    let text = element_text(element);
                    if !text.is_empty() {
                        return LabelValue {
                            value: Some(text),
                            link: None,
                        };
                    }
                },
            },
            _ => {},
        }
    }
    LabelValue::default()
}

fn link_value(element: ElementRef<'_>) -> Option<LabelValue> {
    let anchor = if element.value().name() == "a" {
        element
    } else {
        element
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "a")?
    };
    let text = element_text(anchor);
    Some(LabelValue {
        value: (!text.is_empty()).then_some(text),
        link: anchor.value().attr("href").map(str::to_string),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse(&element.text().collect::<String>())
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SearchError::parse(format!("invalid selector {css}: {e:?}")))
}
