//! Sanitizer for page-builder HTML fragments.
//!
//! Tags and attributes are filtered against static allow-lists by `ammonia`;
//! inline `style` declarations and URL attributes additionally pass through a
//! deny-list of dangerous value patterns.

use ammonia::Builder;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "article", "b", "blockquote", "br", "caption", "code", "div", "em", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "i", "img", "li",
    "mark", "ol", "p", "pre", "section", "small", "span", "strong", "sub", "sup", "table", "tbody",
    "td", "tfoot", "th", "thead", "tr", "u", "ul",
];

const GENERIC_ATTRIBUTES: &[&str] = &["class", "dir", "id", "lang", "role", "style", "title"];

const URL_SCHEMES: &[&str] = &["http", "https", "mailto", "tel", "data"];

const DENIED_PROPERTIES: &[&str] = &["behavior", "-moz-binding"];

static DANGEROUS_VALUES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)javascript\s*:",
        r"(?i)vbscript\s*:",
        r"(?i)expression\s*\(",
        r"(?i)-moz-binding",
        r"(?i)behavior\s*:",
        r"(?i)@import",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

static DATA_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)data\s*:\s*([^;,)'"\s]*)"#).expect("valid data uri pattern"));

static CSS_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid css comment pattern"));

static PROPERTY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[a-z][a-z0-9-]*$").expect("valid property pattern"));

pub struct HtmlSanitizer {
    builder: Builder<'static>,
}

impl HtmlSanitizer {
    pub fn new() -> Self {
        let tag_attributes: HashMap<&'static str, HashSet<&'static str>> = [
            ("a", vec!["href", "name", "target"]),
            ("img", vec!["src", "alt", "width", "height", "loading"]),
            ("td", vec!["colspan", "rowspan"]),
            ("th", vec!["colspan", "rowspan", "scope"]),
            ("ol", vec!["start"]),
        ]
        .into_iter()
        .map(|(tag, attributes)| (tag, attributes.into_iter().collect()))
        .collect();

        let mut builder = Builder::default();
        builder
            .tags(ALLOWED_TAGS.iter().copied().collect())
            .generic_attributes(GENERIC_ATTRIBUTES.iter().copied().collect())
            .generic_attribute_prefixes(["aria-"].into_iter().collect())
            .tag_attributes(tag_attributes)
            .url_schemes(URL_SCHEMES.iter().copied().collect())
            .strip_comments(true)
            .attribute_filter(filter_attribute);

        Self { builder }
    }

    pub fn clean(&self, html: &str) -> String {
        self.builder.clean(html).to_string()
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

fn filter_attribute<'u>(element: &str, attribute: &str, value: &'u str) -> Option<Cow<'u, str>> {
    match attribute {
        "style" => {
            let cleaned = sanitize_style(value);
            if cleaned.is_empty() {
                None
            } else {
                Some(Cow::Owned(cleaned))
            }
        }
        "href" | "src" => {
            if is_allowed_url(element, attribute, value) {
                Some(Cow::Borrowed(value))
            } else {
                tracing::debug!("Dropping {}.{} value {:?}", element, attribute, value);
                None
            }
        }
        _ => Some(Cow::Borrowed(value)),
    }
}

fn is_allowed_url(element: &str, attribute: &str, value: &str) -> bool {
    if is_dangerous_value(value) {
        return false;
    }
    let trimmed = value.trim_start().to_ascii_lowercase();
    if trimmed.starts_with("data:") {
        // data: 只允許出現在 img src 且必須是圖片
        return element == "img" && attribute == "src" && trimmed.starts_with("data:image/");
    }
    true
}

fn is_dangerous_value(value: &str) -> bool {
    if DANGEROUS_VALUES.iter().any(|re| re.is_match(value)) {
        return true;
    }
    DATA_URI.captures_iter(value).any(|caps| {
        let mime = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        !mime.to_ascii_lowercase().starts_with("image/")
    })
}

/// Keep only the declarations of an inline style whose property name is
/// well-formed and whose value matches none of the dangerous patterns.
pub fn sanitize_style(style: &str) -> String {
    let without_comments = CSS_COMMENT.replace_all(style, "");
    let normalized = without_comments.replace('\\', "");

    split_declarations(&normalized)
        .into_iter()
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim();

            if value.is_empty() || !PROPERTY_NAME.is_match(&property) {
                return None;
            }
            if DENIED_PROPERTIES.contains(&property.as_str()) || is_dangerous_value(value) {
                tracing::debug!("Dropping style declaration {}: {}", property, value);
                return None;
            }
            Some(format!("{}: {}", property, value))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Split on `;` outside of parentheses and quotes, so `url(data:image/png;base64,...)`
/// stays one declaration.
fn split_declarations(style: &str) -> Vec<&str> {
    let mut declarations = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (index, ch) in style.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                declarations.push(&style[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    declarations.push(&style[start..]);
    declarations
}
