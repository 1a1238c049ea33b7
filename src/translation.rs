//! Translation bundle and effective-locale resolution (§7: "Every error
//! message is resolved through the translation bundle with the caller's
//! effective locale"). Supplements spec.md's distillation: grounded on
//! `original_source/app/config.py`'s nested category→key→locale bundle
//! loaded once at startup, bounded in size.

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use crate::errors::CoreError;

/// `original_source/app/config.py`'s `VALIDATION_RANGES["MAX_TRANSLATION_FILE_SIZE"]`.
pub const MIN_TRANSLATION_FILE_BYTES: u64 = 1024;
pub const MAX_TRANSLATION_FILE_BYTES: u64 = 50 * 1024 * 1024;

pub const DEFAULT_LOCALE: &str = "en-US";

/// key → locale → string. A flat `category.key` naming convention (e.g.
/// `"errors.not_found"`) keeps the structure two levels deep rather than
/// three, since the core only ever resolves one string at a time.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    entries: HashMap<String, HashMap<String, String>>,
}

impl Bundle {
    pub fn from_json(raw: &serde_json::Value) -> Result<Self, CoreError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| CoreError::Validation("translation bundle root is not a JSON object".to_string()))?;
        let mut entries = HashMap::with_capacity(obj.len());
        for (key, locales) in obj {
            let locales_obj = locales
                .as_object()
                .ok_or_else(|| CoreError::Validation(format!("translation key {key} is not a locale map")))?;
            let mut per_locale = HashMap::with_capacity(locales_obj.len());
            for (locale, value) in locales_obj {
                let Some(s) = value.as_str() else {
                    return Err(CoreError::Validation(format!("translation {key}.{locale} is not a string")));
                };
                per_locale.insert(locale.clone(), s.to_string());
            }
            entries.insert(key.clone(), per_locale);
        }
        Ok(Self { entries })
    }

    /// Loads a JSON bundle once at startup, rejecting files outside the
    /// configured size bound before parsing (§6: "translation_file: path
    /// to a JSON bundle; loaded once at start; size-bounded").
    pub async fn load(path: &Path, max_bytes: u64) -> Result<Self, CoreError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| CoreError::FatalConfig(format!("cannot stat translation file {}: {e}", path.display())))?;
        if metadata.len() > max_bytes {
            return Err(CoreError::FatalConfig(format!(
                "translation file {} is {} bytes, exceeding the {max_bytes}-byte bound",
                path.display(),
                metadata.len()
            )));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| CoreError::FatalConfig(format!("cannot read translation file {}: {e}", path.display())))?;
        let raw: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::FatalConfig(format!("translation file {} is not valid JSON: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    /// Resolves `key` for `locale`, falling back through
    /// member → user → guild → `en-US` (§7 "Effective locale"). A missing
    /// key at every candidate locale logs and returns an empty string per
    /// spec rather than a fallback constant, which callers may still
    /// choose to supply themselves.
    pub fn resolve(&self, key: &str, candidates: &[Option<&str>]) -> String {
        let Some(per_locale) = self.entries.get(key) else {
            warn!(key, "translation key missing from bundle");
            return String::new();
        };
        for candidate in candidates.iter().flatten() {
            if let Some(value) = per_locale.get(*candidate) {
                return value.clone();
            }
        }
        if let Some(value) = per_locale.get(DEFAULT_LOCALE) {
            return value.clone();
        }
        warn!(key, "no locale in the fallback chain resolved a translation");
        String::new()
    }
}

/// Builds the candidate chain of §7: member preference, user preference,
/// guild language, in that priority order; `en-US` is applied inside
/// `Bundle::resolve` as the final fallback.
pub fn locale_chain<'a>(
    member_preference: Option<&'a str>,
    user_preference: Option<&'a str>,
    guild_language: Option<&'a str>,
) -> [Option<&'a str>; 3] {
    [member_preference, user_preference, guild_language]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle() -> Bundle {
        Bundle::from_json(&json!({
            "errors.not_found": {
                "en-US": "Not found",
                "fr-FR": "Introuvable",
            }
        }))
        .unwrap()
    }

    #[test]
    fn resolves_via_guild_language_when_member_and_user_are_absent() {
        let bundle = bundle();
        let chain = locale_chain(None, None, Some("fr-FR"));
        assert_eq!(bundle.resolve("errors.not_found", &chain), "Introuvable");
    }

    #[test]
    fn member_preference_wins_over_guild_language() {
        let bundle = bundle();
        let chain = locale_chain(Some("en-US"), None, Some("fr-FR"));
        assert_eq!(bundle.resolve("errors.not_found", &chain), "Not found");
    }

    #[test]
    fn falls_back_to_default_locale_when_nothing_in_chain_matches() {
        let bundle = bundle();
        let chain = locale_chain(Some("de-DE"), None, None);
        assert_eq!(bundle.resolve("errors.not_found", &chain), "Not found");
    }

    #[test]
    fn missing_key_returns_empty_string() {
        let bundle = bundle();
        let chain = locale_chain(None, None, None);
        assert_eq!(bundle.resolve("errors.unknown_key", &chain), "");
    }
}
