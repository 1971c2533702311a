//! # Placeholder Substitution
//!
//! Placeholder parsing happens elsewhere; the updater receives, for every
//! line of every variant, the tokens that were found in it. Substitution
//! walks that list in order and swaps each raw token for its value.
//!
//! Tokens without a value are left verbatim. That is not an error: the
//! next refresh may well have a value for them.
//!
//! ```text
//! "Hi {name}, {name}!"  +  [{name}, {name}]  +  {name: "Ada"}
//!        │
//!        ▼
//! "Hi Ada, Ada!"
//! ```

use std::collections::HashMap;

/// Placeholder name to value.
pub type PlaceholderMap = HashMap<String, String>;

/// A token found in a line by the external matcher.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MatchedPlaceholder {
    /// Exact text as it appears in the line, e.g. `{online}`.
    pub raw: String,
    /// Lookup key, e.g. `online`.
    pub name: String,
}

impl MatchedPlaceholder {
    /// Creates a match from its raw text and key.
    pub fn new(raw: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            name: name.into(),
        }
    }

    /// Creates a match in the common `{name}` form.
    pub fn braced(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            raw: format!("{{{name}}}"),
            name,
        }
    }
}

/// Matches for each line of one variant.
pub type LineMatches = Vec<Vec<MatchedPlaceholder>>;

/// Matches for each variant of a hologram.
pub type TranslationMatches = Vec<LineMatches>;

/// Something that can produce a value for a placeholder name.
pub trait PlaceholderValues {
    /// Returns the value for `name`, if known.
    fn lookup(&self, name: &str) -> Option<&str>;
}

impl PlaceholderValues for PlaceholderMap {
    #[inline]
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl<T: PlaceholderValues + ?Sized> PlaceholderValues for &T {
    #[inline]
    fn lookup(&self, name: &str) -> Option<&str> {
        (**self).lookup(name)
    }
}

/// Two lookups merged; `primary` wins when both know a name.
///
/// Used to combine the global map with a player's own map without building
/// a merged copy per player.
#[derive(Clone, Copy, Debug)]
pub struct Layered<'a, P: ?Sized, F: ?Sized> {
    /// Consulted first.
    pub primary: &'a P,
    /// Consulted when `primary` has no value.
    pub fallback: &'a F,
}

impl<'a, P: ?Sized, F: ?Sized> Layered<'a, P, F> {
    /// Layers `primary` over `fallback`.
    #[must_use]
    pub const fn new(primary: &'a P, fallback: &'a F) -> Self {
        Self { primary, fallback }
    }
}

impl<P, F> PlaceholderValues for Layered<'_, P, F>
where
    P: PlaceholderValues + ?Sized,
    F: PlaceholderValues + ?Sized,
{
    fn lookup(&self, name: &str) -> Option<&str> {
        self.primary
            .lookup(name)
            .or_else(|| self.fallback.lookup(name))
    }
}

/// Resolves a single line.
#[must_use]
pub fn resolve_line<V>(line: &str, matches: &[MatchedPlaceholder], values: &V) -> String
where
    V: PlaceholderValues + ?Sized,
{
    let mut resolved = line.to_owned();
    for token in matches {
        if let Some(value) = values.lookup(&token.name) {
            if resolved.contains(&token.raw) {
                resolved = resolved.replace(&token.raw, value);
            }
        }
    }
    resolved
}

/// Resolves every line of one variant.
///
/// Lines without a match entry are copied as they are.
#[must_use]
pub fn resolve_lines<V>(lines: &[String], matches: &[Vec<MatchedPlaceholder>], values: &V) -> Vec<String>
where
    V: PlaceholderValues + ?Sized,
{
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| match matches.get(i) {
            Some(tokens) if !tokens.is_empty() => resolve_line(line, tokens, values),
            _ => line.clone(),
        })
        .collect()
}

/// Resolves every variant of a hologram.
#[must_use]
pub fn resolve_translations<V>(
    translations: &[Vec<String>],
    matches: &[LineMatches],
    values: &V,
) -> Vec<Vec<String>>
where
    V: PlaceholderValues + ?Sized,
{
    translations
        .iter()
        .enumerate()
        .map(|(i, lines)| match matches.get(i) {
            Some(line_matches) => resolve_lines(lines, line_matches, values),
            None => lines.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> PlaceholderMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_unresolved_token_is_left_verbatim() {
        let resolved = resolve_line("Hi {x}", &[MatchedPlaceholder::braced("x")], &PlaceholderMap::new());
        assert_eq!(resolved, "Hi {x}");
    }

    #[test]
    fn test_repeated_tokens_resolve_consistently() {
        let tokens = vec![MatchedPlaceholder::braced("name"), MatchedPlaceholder::braced("name")];
        let values = map(&[("name", "Ada")]);

        assert_eq!(resolve_line("Hi {name}, {name}!", &tokens, &values), "Hi Ada, Ada!");
    }

    #[test]
    fn test_mixed_resolved_and_unresolved() {
        let tokens = vec![MatchedPlaceholder::braced("online"), MatchedPlaceholder::braced("max")];
        let values = map(&[("online", "12")]);

        assert_eq!(resolve_line("{online}/{max}", &tokens, &values), "12/{max}");
    }

    #[test]
    fn test_layered_prefers_primary() {
        let global = map(&[("server", "Lobby"), ("motd", "hello")]);
        let player = map(&[("server", "ignored"), ("name", "Ada")]);
        let layered = Layered::new(&global, &player);

        assert_eq!(layered.lookup("server"), Some("Lobby"));
        assert_eq!(layered.lookup("name"), Some("Ada"));
        assert_eq!(layered.lookup("missing"), None);
    }

    #[test]
    fn test_missing_matches_copy_lines() {
        let translations = vec![
            vec!["{a}".to_owned(), "{a}".to_owned()],
            vec!["{a}".to_owned()],
        ];
        // Only the first line of the first variant has matches.
        let matches = vec![vec![vec![MatchedPlaceholder::braced("a")]]];
        let values = map(&[("a", "1")]);

        let resolved = resolve_translations(&translations, &matches, &values);

        assert_eq!(resolved, vec![vec!["1".to_owned(), "{a}".to_owned()], vec!["{a}".to_owned()]]);
    }
}
