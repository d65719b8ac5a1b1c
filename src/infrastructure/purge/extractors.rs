use crate::core::interfaces::UsageExtractor;
use crate::core::models::UsedTokens;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node};

/// Markup extractor: every tag, id, class, attribute name and attribute value.
pub struct HtmlExtractor;

impl UsageExtractor for HtmlExtractor {
    fn name(&self) -> &str {
        "html"
    }

    fn extract(&self, content: &str) -> UsedTokens {
        let document = Html::parse_document(content);
        let mut used = UsedTokens::new();

        for node in document.tree.values() {
            let Node::Element(element) = node else {
                continue;
            };

            used.tags.insert(element.name().to_ascii_lowercase());

            if let Some(id) = element.id() {
                used.ids.insert(id.to_string());
            }

            used.classes.extend(element.classes().map(str::to_string));

            for (name, value) in element.attrs() {
                used.attr_names.insert(name.to_string());
                used.attr_values.insert(value.to_string());
                used.attr_values
                    .extend(value.split_whitespace().map(str::to_string));
            }
        }

        used
    }
}

/// `classList.add('x')`, `classList.toggle('x', ...)` and friends.
///
/// The quote must follow the parenthesis directly and the capture runs to the
/// last single quote on the line, so the whole literal is one token. Classes
/// built dynamically, passed in double quotes or after whitespace are
/// invisible here and belong in the safelist.
static CLASS_LIST_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"classList.\w+.\('(.*)'").expect("classList pattern compiles"));

pub struct ClassListExtractor;

impl UsageExtractor for ClassListExtractor {
    fn name(&self) -> &str {
        "classList"
    }

    fn extract(&self, content: &str) -> UsedTokens {
        UsedTokens::with_classes(
            CLASS_LIST_CALL
                .captures_iter(content)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
        )
    }
}

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9_-]+").expect("word pattern compiles"));

/// Catch-all for file kinds without a dedicated extractor.
pub struct DefaultExtractor;

impl UsageExtractor for DefaultExtractor {
    fn name(&self) -> &str {
        "default"
    }

    fn extract(&self, content: &str) -> UsedTokens {
        UsedTokens {
            undetermined: WORD
                .find_iter(content)
                .map(|m| m.as_str().to_string())
                .collect(),
            ..UsedTokens::default()
        }
    }
}
