//! Message level resolution.
//!
//! The effective level of a message is its nominal level, plus a term for how
//! deeply nested the emitting command is, plus every matching modifier. The
//! sum is clamped into the valid level range once, after all terms are added.
//!
//! Resolution reads an immutable [`LevelSettings`] snapshot. The
//! [`SettingsStore`] hands out snapshots by cloning an `Arc`, and writers
//! replace the snapshot, so a resolution in progress never sees a half-applied
//! change.

use crate::constants::{DEFAULT_NESTING_DECREMENT, DEPTH_OFFSET, GUARDED_CALL_DEPTH};
use crate::error::DiagnosticsError;
use crate::level::MessageLevel;
use crate::modifier::{normalize_tags, LevelModifier, ModifierSet};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Configuration consulted by every resolution.
#[derive(Debug, Clone)]
pub struct LevelSettings {
    /// Level added per nesting step; values `<= 0` disable the depth term.
    pub nesting_decrement: i64,

    /// Active modifier rules.
    pub modifiers: ModifierSet,
}

impl Default for LevelSettings {
    fn default() -> Self {
        Self {
            nesting_decrement: DEFAULT_NESTING_DECREMENT,
            modifiers: ModifierSet::new(),
        }
    }
}

impl LevelSettings {
    /// Create settings with a decrement and no modifiers.
    pub fn with_decrement(nesting_decrement: i64) -> Self {
        Self {
            nesting_decrement,
            ..Self::default()
        }
    }

    /// Resolve a message level against these settings.
    pub fn resolve(&self, request: &LevelRequest<'_>) -> Result<MessageLevel, DiagnosticsError> {
        self.explain(request).map(|resolution| resolution.level)
    }

    /// Resolve a message level and report how each term contributed.
    pub fn explain(&self, request: &LevelRequest<'_>) -> Result<LevelResolution, DiagnosticsError> {
        request.validate()?;

        let tags = normalize_tags(request.tags.unwrap_or(&[]));
        let mut number = i128::from(request.original_level.ordinal());

        let mut effective_depth = None;
        let mut depth_term = 0i128;
        if self.nesting_decrement > 0 {
            let mut depth = i128::from(request.depth) - i128::from(DEPTH_OFFSET);
            if request.from_guarded_call {
                depth -= i128::from(GUARDED_CALL_DEPTH);
            }
            depth_term = depth * i128::from(self.nesting_decrement);
            effective_depth = Some(depth);
            number += depth_term;
        }

        let mut applied = Vec::new();
        let mut modifier_total = 0i128;
        for rule in self
            .modifiers
            .matching(request.function_name, request.module_name, &tags)
        {
            modifier_total += i128::from(rule.modifier);
            applied.push(rule.name.clone());
        }
        applied.sort();
        number += modifier_total;

        let level = MessageLevel::clamped(clamp_to_i64(number));

        Ok(LevelResolution {
            original_level: request.original_level,
            level,
            raw: number,
            effective_depth,
            depth_term,
            modifier_total,
            applied_modifiers: applied,
        })
    }
}

/// Inputs describing one message event.
#[derive(Debug, Clone, Copy)]
pub struct LevelRequest<'a> {
    /// Nominal level chosen at the call site.
    pub original_level: MessageLevel,

    /// The message passed through an error-guarding layer.
    pub from_guarded_call: bool,

    /// Message tags, if any.
    pub tags: Option<&'a [String]>,

    /// Emitting function.
    pub function_name: &'a str,

    /// Emitting module.
    pub module_name: &'a str,

    /// Current nesting depth of the emitting execution context.
    pub depth: i64,
}

impl<'a> LevelRequest<'a> {
    /// Create a request at depth 0 with no tags.
    pub fn new(original_level: MessageLevel, function_name: &'a str, module_name: &'a str) -> Self {
        Self {
            original_level,
            from_guarded_call: false,
            tags: None,
            function_name,
            module_name,
            depth: 0,
        }
    }

    /// Set the tags.
    pub fn tags(mut self, tags: &'a [String]) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Set the nesting depth.
    pub fn depth(mut self, depth: i64) -> Self {
        self.depth = depth;
        self
    }

    /// Mark the message as routed through an error-guarding layer.
    pub fn guarded(mut self, from_guarded_call: bool) -> Self {
        self.from_guarded_call = from_guarded_call;
        self
    }

    fn validate(&self) -> Result<(), DiagnosticsError> {
        if self.function_name.trim().is_empty() {
            return Err(DiagnosticsError::validation(
                "function_name",
                "must not be empty",
            ));
        }
        if self.module_name.trim().is_empty() {
            return Err(DiagnosticsError::validation(
                "module_name",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Breakdown of a resolved level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelResolution {
    pub original_level: MessageLevel,
    pub level: MessageLevel,
    /// Unclamped sum of all terms.
    pub raw: i128,
    /// Depth used for the decrement term, when it was applied.
    pub effective_depth: Option<i128>,
    pub depth_term: i128,
    pub modifier_total: i128,
    /// Names of the matching modifiers, sorted.
    pub applied_modifiers: Vec<String>,
}

/// Resolve a message level against a settings snapshot.
pub fn resolve_level(
    settings: &LevelSettings,
    request: &LevelRequest<'_>,
) -> Result<MessageLevel, DiagnosticsError> {
    settings.resolve(request)
}

fn clamp_to_i64(value: i128) -> i64 {
    value.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Shared, copy-on-read holder of the active [`LevelSettings`].
#[derive(Debug, Default)]
pub struct SettingsStore {
    current: RwLock<Arc<LevelSettings>>,
}

impl SettingsStore {
    /// Create a store with initial settings.
    pub fn new(settings: LevelSettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    /// Get the current snapshot.
    pub fn snapshot(&self) -> Arc<LevelSettings> {
        Arc::clone(&self.current.read())
    }

    /// Current nesting decrement.
    pub fn nesting_decrement(&self) -> i64 {
        self.current.read().nesting_decrement
    }

    /// Set the nesting decrement, returning the previous value.
    pub fn set_nesting_decrement(&self, value: i64) -> i64 {
        let previous = self.update(|settings| {
            std::mem::replace(&mut settings.nesting_decrement, value)
        });
        debug!("Nesting decrement changed: {} -> {}", previous, value);
        previous
    }

    /// Register a modifier, returning the rule it replaced.
    pub fn register_modifier(&self, rule: LevelModifier) -> Option<LevelModifier> {
        let name = rule.name.clone();
        let replaced = self.update(|settings| settings.modifiers.insert(rule));
        debug!(
            "Level modifier '{}' {}",
            name,
            if replaced.is_some() { "replaced" } else { "registered" }
        );
        replaced
    }

    /// Remove a modifier by name.
    pub fn remove_modifier(&self, name: &str) -> Result<LevelModifier, DiagnosticsError> {
        self.update(|settings| settings.modifiers.remove(name))
            .ok_or_else(|| DiagnosticsError::modifier_not_found(name))
    }

    /// Remove every modifier, returning how many were removed.
    pub fn clear_modifiers(&self) -> usize {
        self.update(|settings| {
            let count = settings.modifiers.len();
            settings.modifiers.clear();
            count
        })
    }

    fn update<T>(&self, f: impl FnOnce(&mut LevelSettings) -> T) -> T {
        let mut guard = self.current.write();
        f(Arc::make_mut(&mut guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FUNCTION: &str = "Copy-DbaAgentProxy";
    const MODULE: &str = "dbatools";

    fn request(level: MessageLevel) -> LevelRequest<'static> {
        LevelRequest::new(level, FUNCTION, MODULE)
    }

    #[test]
    fn test_identity_without_settings() {
        let settings = LevelSettings::default();
        for level in MessageLevel::ALL {
            assert_eq!(settings.resolve(&request(level).depth(5)).unwrap(), level);
        }
    }

    #[test]
    fn test_modifiers_sum() {
        let mut settings = LevelSettings::default();
        settings.modifiers.insert(LevelModifier::new("down", -2));
        settings.modifiers.insert(LevelModifier::new("up", 1));

        let resolution = settings.explain(&request(MessageLevel::Verbose)).unwrap();
        assert_eq!(resolution.raw, 4);
        assert_eq!(resolution.level, MessageLevel::VeryVerbose);
        assert_eq!(resolution.applied_modifiers, vec!["down", "up"]);
    }

    #[test]
    fn test_decrement_clamps_high() {
        let settings = LevelSettings::with_decrement(2);
        let resolution = settings
            .explain(&request(MessageLevel::InternalComment).depth(3))
            .unwrap();
        assert_eq!(resolution.raw, 15);
        assert_eq!(resolution.level, MessageLevel::InternalComment);
    }

    #[test]
    fn test_modifier_clamps_low() {
        let mut settings = LevelSettings::default();
        settings.modifiers.insert(LevelModifier::new("loud", -5));
        let resolution = settings.explain(&request(MessageLevel::Critical)).unwrap();
        assert_eq!(resolution.raw, -4);
        assert_eq!(resolution.level, MessageLevel::Critical);
    }

    #[test]
    fn test_clamp_applies_after_all_terms() {
        // Depth term alone overshoots, modifiers bring it back into range.
        let mut settings = LevelSettings::with_decrement(3);
        settings.modifiers.insert(LevelModifier::new("back", -10));
        let level = settings
            .resolve(&request(MessageLevel::Significant).depth(4))
            .unwrap();
        // 3 + 12 - 10
        assert_eq!(level, MessageLevel::Verbose);
    }

    #[test]
    fn test_decrement_disabled_when_not_positive() {
        for decrement in [0, -1, -50] {
            let settings = LevelSettings::with_decrement(decrement);
            let resolution = settings
                .explain(&request(MessageLevel::Verbose).depth(10))
                .unwrap();
            assert_eq!(resolution.level, MessageLevel::Verbose);
            assert_eq!(resolution.effective_depth, None);
        }
    }

    #[test]
    fn test_guarded_call_compensation() {
        let settings = LevelSettings::with_decrement(1);
        for depth in 0..6 {
            let direct = settings
                .resolve(&request(MessageLevel::VeryVerbose).depth(depth))
                .unwrap();
            let guarded = settings
                .resolve(&request(MessageLevel::VeryVerbose).depth(depth + 1).guarded(true))
                .unwrap();
            assert_eq!(direct, guarded);
        }
    }

    #[test]
    fn test_negative_depth_from_guard_at_top_level() {
        let settings = LevelSettings::with_decrement(2);
        let resolution = settings
            .explain(&request(MessageLevel::Verbose).guarded(true))
            .unwrap();
        assert_eq!(resolution.effective_depth, Some(-1));
        assert_eq!(resolution.depth_term, -2);
        assert_eq!(resolution.level, MessageLevel::Significant);
    }

    #[test]
    fn test_extreme_values_stay_in_range() {
        let mut settings = LevelSettings::with_decrement(i64::MAX);
        settings.modifiers.insert(LevelModifier::new("max", i64::MAX));
        let level = settings
            .resolve(&request(MessageLevel::Critical).depth(i64::MAX))
            .unwrap();
        assert_eq!(level, MessageLevel::InternalComment);

        let mut settings = LevelSettings::default();
        settings.modifiers.insert(LevelModifier::new("min", i64::MIN));
        let level = settings.resolve(&request(MessageLevel::InternalComment)).unwrap();
        assert_eq!(level, MessageLevel::Critical);
    }

    #[test]
    fn test_tags_absent_or_empty() {
        let mut settings = LevelSettings::default();
        settings
            .modifiers
            .insert(LevelModifier::new("tagged", 2).include_tags(["proxy"]));

        let none = settings.resolve(&request(MessageLevel::Verbose)).unwrap();
        let empty: Vec<String> = Vec::new();
        let empty = settings
            .resolve(&request(MessageLevel::Verbose).tags(&empty))
            .unwrap();
        let tags = vec!["proxy".to_string()];
        let tagged = settings
            .resolve(&request(MessageLevel::Verbose).tags(&tags))
            .unwrap();

        assert_eq!(none, MessageLevel::Verbose);
        assert_eq!(empty, MessageLevel::Verbose);
        assert_eq!(tagged, MessageLevel::System);
    }

    #[test]
    fn test_request_tags_fold_unicode_case() {
        let mut settings = LevelSettings::default();
        settings
            .modifiers
            .insert(LevelModifier::new("fruit", 3).include_tags(["Äpfel"]));

        let tags = vec!["ÄPFEL".to_string()];
        let level = settings
            .resolve(&request(MessageLevel::Important).tags(&tags))
            .unwrap();
        assert_eq!(level, MessageLevel::Verbose);
    }

    #[test]
    fn test_modifier_total_is_exact() {
        let mut settings = LevelSettings::default();
        settings.modifiers.insert(LevelModifier::new("a", i64::MAX));
        settings.modifiers.insert(LevelModifier::new("b", i64::MAX));
        settings.modifiers.insert(LevelModifier::new("c", i64::MIN));

        let resolution = settings.explain(&request(MessageLevel::Critical)).unwrap();
        assert_eq!(resolution.modifier_total, i128::from(i64::MAX) - 1);
        assert_eq!(resolution.level, MessageLevel::InternalComment);
    }

    #[test]
    fn test_rejects_empty_names() {
        let settings = LevelSettings::default();
        let err = settings
            .resolve(&LevelRequest::new(MessageLevel::Verbose, "", MODULE))
            .unwrap_err();
        assert!(matches!(
            err,
            DiagnosticsError::Validation {
                field: "function_name",
                ..
            }
        ));

        let err = settings
            .resolve(&LevelRequest::new(MessageLevel::Verbose, FUNCTION, "  "))
            .unwrap_err();
        assert!(matches!(
            err,
            DiagnosticsError::Validation {
                field: "module_name",
                ..
            }
        ));
    }

    #[test]
    fn test_store_snapshots_are_isolated() {
        let store = SettingsStore::default();
        let before = store.snapshot();

        assert_eq!(store.set_nesting_decrement(2), 0);
        assert!(store.register_modifier(LevelModifier::new("a", 1)).is_none());

        assert_eq!(before.nesting_decrement, 0);
        assert!(before.modifiers.is_empty());

        let after = store.snapshot();
        assert_eq!(after.nesting_decrement, 2);
        assert_eq!(after.modifiers.len(), 1);
    }

    #[test]
    fn test_store_remove_and_clear() {
        let store = SettingsStore::default();
        store.register_modifier(LevelModifier::new("a", 1));
        store.register_modifier(LevelModifier::new("b", 1));

        assert_eq!(store.remove_modifier("A").unwrap().name, "a");
        assert!(matches!(
            store.remove_modifier("a"),
            Err(DiagnosticsError::ModifierNotFound(_))
        ));
        assert_eq!(store.clear_modifiers(), 1);
        assert!(store.snapshot().modifiers.is_empty());
    }
}
