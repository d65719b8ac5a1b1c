use crate::utils::Logger;
use serde::Serialize;
use std::collections::BTreeMap;

/// Rewrites bare module specifiers before resolution.
///
/// An alias matches either the whole specifier (`react`) or a specifier that
/// continues with a `/` (`react/hooks`), in which case the remainder is kept.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ModuleAliasResolver {
    aliases: BTreeMap<String, String>,
}

impl ModuleAliasResolver {
    pub fn new<I, K, V>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let aliases: BTreeMap<String, String> = aliases
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        for (alias, target) in &aliases {
            Logger::debug(&format!("🔗 alias {} → {}", alias, target));
        }

        Self { aliases }
    }

    /// The replacement specifier, or `None` when no alias applies.
    pub fn resolve(&self, specifier: &str) -> Option<String> {
        if let Some(target) = self.aliases.get(specifier) {
            return Some(target.clone());
        }

        self.aliases.iter().find_map(|(alias, target)| {
            specifier
                .strip_prefix(alias.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .map(|rest| format!("{}/{}", target, rest))
        })
    }

    /// Apply the alias if any, otherwise return the specifier unchanged.
    pub fn rewrite<'a>(&self, specifier: &'a str) -> std::borrow::Cow<'a, str> {
        match self.resolve(specifier) {
            Some(target) => std::borrow::Cow::Owned(target),
            None => std::borrow::Cow::Borrowed(specifier),
        }
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
