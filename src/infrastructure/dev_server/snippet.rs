use crate::core::config::SnippetRule;
use std::borrow::Cow;

/// Insert the snippet right before the first match. The matched tag itself is untouched.
pub fn inject_snippet<'a>(html: &'a str, rule: &SnippetRule) -> Cow<'a, str> {
    match rule.pattern.find(html) {
        Some(m) => {
            let mut out = String::with_capacity(html.len() + rule.snippet.len());
            out.push_str(&html[..m.start()]);
            out.push_str(&rule.snippet);
            out.push_str(&html[m.start()..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(html),
    }
}
