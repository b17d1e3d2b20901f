//! Message level modifiers.
//!
//! A modifier is a named rule that adjusts the level of every message whose
//! origin and tags match its criteria. All matching adjustments are summed,
//! so the order in which rules are evaluated never affects the result.

use crate::error::DiagnosticsError;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Case-insensitive wildcard pattern supporting `*` and `?`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WildcardPattern {
    source: String,
    regex: Regex,
}

impl WildcardPattern {
    /// Compile a wildcard pattern.
    pub fn new(pattern: &str) -> Result<Self, DiagnosticsError> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
            }
        }
        expr.push('$');

        let regex = RegexBuilder::new(&expr)
            .case_insensitive(true)
            .build()
            .map_err(|e| DiagnosticsError::invalid_pattern(pattern, e.to_string()))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Check whether the input matches the whole pattern.
    pub fn matches(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }

    /// Get the original pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for WildcardPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl TryFrom<String> for WildcardPattern {
    type Error = DiagnosticsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<WildcardPattern> for String {
    fn from(pattern: WildcardPattern) -> Self {
        pattern.source
    }
}

impl std::fmt::Display for WildcardPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// A named level adjustment with matching criteria.
///
/// Unset criteria always match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelModifier {
    /// Unique rule name.
    pub name: String,

    /// Adjustment added to the level of matching messages.
    pub modifier: i64,

    /// Function name must match this pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_function_name: Option<WildcardPattern>,

    /// Function name must not match this pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_function_name: Option<WildcardPattern>,

    /// Module name must match this pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_module_name: Option<WildcardPattern>,

    /// Module name must not match this pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_module_name: Option<WildcardPattern>,

    /// At least one of these tags must be present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_tags: Vec<String>,

    /// None of these tags may be present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_tags: Vec<String>,
}

impl LevelModifier {
    /// Create a modifier that applies to every message.
    pub fn new(name: impl Into<String>, modifier: i64) -> Self {
        Self {
            name: name.into(),
            modifier,
            include_function_name: None,
            exclude_function_name: None,
            include_module_name: None,
            exclude_module_name: None,
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
        }
    }

    /// Restrict to functions matching the pattern.
    pub fn include_function(mut self, pattern: &str) -> Result<Self, DiagnosticsError> {
        self.include_function_name = non_empty_pattern(pattern)?;
        Ok(self)
    }

    /// Skip functions matching the pattern.
    pub fn exclude_function(mut self, pattern: &str) -> Result<Self, DiagnosticsError> {
        self.exclude_function_name = non_empty_pattern(pattern)?;
        Ok(self)
    }

    /// Restrict to modules matching the pattern.
    pub fn include_module(mut self, pattern: &str) -> Result<Self, DiagnosticsError> {
        self.include_module_name = non_empty_pattern(pattern)?;
        Ok(self)
    }

    /// Skip modules matching the pattern.
    pub fn exclude_module(mut self, pattern: &str) -> Result<Self, DiagnosticsError> {
        self.exclude_module_name = non_empty_pattern(pattern)?;
        Ok(self)
    }

    /// Restrict to messages carrying at least one of the tags.
    pub fn include_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.include_tags = normalize_tags(tags);
        self
    }

    /// Skip messages carrying any of the tags.
    pub fn exclude_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclude_tags = normalize_tags(tags);
        self
    }

    /// Check whether this rule applies to a message.
    pub fn applies_to(&self, function_name: &str, module_name: &str, tags: &[String]) -> bool {
        if let Some(pattern) = &self.include_function_name {
            if !pattern.matches(function_name) {
                return false;
            }
        }
        if let Some(pattern) = &self.exclude_function_name {
            if pattern.matches(function_name) {
                return false;
            }
        }
        if let Some(pattern) = &self.include_module_name {
            if !pattern.matches(module_name) {
                return false;
            }
        }
        if let Some(pattern) = &self.exclude_module_name {
            if pattern.matches(module_name) {
                return false;
            }
        }
        if !self.include_tags.is_empty() && !self.include_tags.iter().any(|t| has_tag(tags, t)) {
            return false;
        }
        if self.exclude_tags.iter().any(|t| has_tag(tags, t)) {
            return false;
        }
        true
    }
}

/// Keyed collection of level modifiers.
///
/// Names are case-insensitive; registering an existing name replaces the rule.
#[derive(Debug, Clone, Default)]
pub struct ModifierSet {
    rules: HashMap<String, LevelModifier>,
}

impl ModifierSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a modifier, returning the rule it replaced.
    pub fn insert(&mut self, rule: LevelModifier) -> Option<LevelModifier> {
        self.rules.insert(rule.name.to_lowercase(), rule)
    }

    /// Remove a modifier by name.
    pub fn remove(&mut self, name: &str) -> Option<LevelModifier> {
        self.rules.remove(&name.to_lowercase())
    }

    /// Remove every modifier.
    pub fn clear(&mut self) {
        self.rules.clear();
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules sorted by name, for stable listings.
    pub fn sorted(&self) -> Vec<&LevelModifier> {
        let mut rules: Vec<&LevelModifier> = self.rules.values().collect();
        rules.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        rules
    }

    /// Rules that apply to a message.
    pub fn matching<'a>(
        &'a self,
        function_name: &'a str,
        module_name: &'a str,
        tags: &'a [String],
    ) -> impl Iterator<Item = &'a LevelModifier> + 'a {
        self.rules
            .values()
            .filter(move |rule| rule.applies_to(function_name, module_name, tags))
    }
}

impl FromIterator<LevelModifier> for ModifierSet {
    fn from_iter<T: IntoIterator<Item = LevelModifier>>(iter: T) -> Self {
        let mut set = Self::new();
        for rule in iter {
            set.insert(rule);
        }
        set
    }
}

/// Lower-case and de-duplicate tags, dropping blanks.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}

/// Case-insensitive tag membership, using the same folding as [`normalize_tags`].
pub(crate) fn has_tag(tags: &[String], wanted: &str) -> bool {
    let wanted = wanted.trim().to_lowercase();
    tags.iter().any(|t| t.trim().to_lowercase() == wanted)
}

fn non_empty_pattern(pattern: &str) -> Result<Option<WildcardPattern>, DiagnosticsError> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    WildcardPattern::new(trimmed).map(Some)
}
