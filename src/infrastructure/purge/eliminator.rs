use crate::core::config::PurgeConfig;
use crate::core::models::UsedTokens;
use lightningcss::printer::PrinterOptions;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::selector::Selector;
use lightningcss::traits::ToCss;
use once_cell::sync::Lazy;
use regex::Regex;

/// Stands in for an escaped colon (`.md\:flex`) while pseudo-classes are stripped.
const ESCAPED_COLON: char = '\u{E000}';

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[\s*([\w-]+)\s*(?:([~|^$*]?)=\s*(?:"([^"]*)"|'([^']*)'|([^\]\s]+)))?[^\]]*\]"#)
        .expect("attribute pattern compiles")
});
static PSEUDO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"::?[\w-]+(?:\([^()]*\))?").expect("pseudo pattern compiles"));
static CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.((?:[\w\x{E000}-]|\\.)+)").expect("class pattern compiles")
});
static ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"#((?:[\w\x{E000}-]|\\.)+)").expect("id pattern compiles")
});

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z][\w-]*").expect("tag pattern compiles"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeToken {
    pub name: String,
    /// Only set for exact (`=`) and word (`~=`) matches.
    pub value: Option<String>,
}

/// The simple selectors a complex selector depends on. Pseudo-classes and
/// pseudo-elements (including everything inside `:not(...)`) are ignored.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SelectorTokens {
    pub classes: Vec<String>,
    pub ids: Vec<String>,
    pub tags: Vec<String>,
    pub attributes: Vec<AttributeToken>,
}

impl SelectorTokens {
    pub fn parse(selector: &str) -> Self {
        let mut tokens = SelectorTokens::default();

        for caps in ATTRIBUTE.captures_iter(selector) {
            let name = caps[1].to_string();
            let exact = matches!(caps.get(2).map(|m| m.as_str()), Some("") | Some("~"));
            let value = caps
                .get(3)
                .or_else(|| caps.get(4))
                .or_else(|| caps.get(5))
                .map(|m| m.as_str().to_string())
                .filter(|_| exact);
            tokens.attributes.push(AttributeToken { name, value });
        }
        let rest = ATTRIBUTE
            .replace_all(selector, " ")
            .replace("\\:", &ESCAPED_COLON.to_string());
        let rest = PSEUDO.replace_all(&rest, " ");

        tokens.classes = CLASS
            .captures_iter(&rest)
            .map(|caps| unescape(&caps[1]))
            .collect();
        let rest = CLASS.replace_all(&rest, " ");

        tokens.ids = ID.captures_iter(&rest).map(|caps| unescape(&caps[1])).collect();
        let rest = ID.replace_all(&rest, " ");

        tokens.tags = TAG
            .find_iter(&rest)
            .map(|m| m.as_str().to_ascii_lowercase())
            .collect();

        tokens
    }

    pub fn satisfied_by(&self, used: &UsedTokens) -> bool {
        self.classes.iter().all(|c| used.has_class(c))
            && self.ids.iter().all(|id| used.has_id(id))
            && self.tags.iter().all(|t| used.has_tag(t))
            && self
                .attributes
                .iter()
                .all(|a| used.has_attribute(&a.name, a.value.as_deref()))
    }
}

fn unescape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else if c == ESCAPED_COLON {
            out.push(':');
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EliminationCounts {
    pub kept: usize,
    pub removed: usize,
}

/// Removes style rules whose selectors nothing in the content uses.
///
/// A selector survives if it matches a safelist pattern or every simple
/// selector it names was seen in the content. Style rules left without
/// selectors are dropped, as are conditional groups left without rules.
/// Other at-rules pass through untouched.
pub struct RuleEliminator<'a> {
    used: &'a UsedTokens,
    purge: &'a PurgeConfig,
}

impl<'a> RuleEliminator<'a> {
    pub fn new(used: &'a UsedTokens, purge: &'a PurgeConfig) -> Self {
        Self { used, purge }
    }

    pub fn eliminate(&self, rules: &mut CssRuleList<'_>) -> EliminationCounts {
        let mut counts = EliminationCounts::default();
        self.purge_rules(rules, &mut counts);
        counts
    }

    fn purge_rules(&self, rules: &mut CssRuleList<'_>, counts: &mut EliminationCounts) {
        rules.0.retain_mut(|rule| match rule {
            CssRule::Style(style) => {
                let before = style.selectors.0.len();
                style.selectors.0.retain(|selector| self.keep_selector(selector));
                let after = style.selectors.0.len();

                counts.kept += after;
                counts.removed += before - after;

                if after > 0 && !style.rules.0.is_empty() {
                    self.purge_rules(&mut style.rules, counts);
                }
                after > 0
            }
            CssRule::Media(media) => self.purge_block(&mut media.rules, counts),
            CssRule::Supports(supports) => self.purge_block(&mut supports.rules, counts),
            CssRule::Container(container) => self.purge_block(&mut container.rules, counts),
            CssRule::LayerBlock(layer) => self.purge_block(&mut layer.rules, counts),
            CssRule::Scope(scope) => self.purge_block(&mut scope.rules, counts),
            CssRule::StartingStyle(starting) => self.purge_block(&mut starting.rules, counts),
            CssRule::MozDocument(document) => self.purge_block(&mut document.rules, counts),
            _ => true,
        });
    }

    /// Purges a conditional or grouping block. Empty blocks are dropped.
    fn purge_block(&self, rules: &mut CssRuleList<'_>, counts: &mut EliminationCounts) -> bool {
        self.purge_rules(rules, counts);
        !rules.0.is_empty()
    }

    fn keep_selector(&self, selector: &Selector<'_>) -> bool {
        let Ok(text) = selector.to_css_string(PrinterOptions::default()) else {
            return true;
        };

        self.keep_selector_text(&text)
    }

    pub fn keep_selector_text(&self, selector: &str) -> bool {
        self.purge.is_safelisted(selector) || SelectorTokens::parse(selector).satisfied_by(self.used)
    }
}
