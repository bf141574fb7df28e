//! Translation loader and i18n management
//!
//! Translations are JSON files named `<lang>.json` with nested objects;
//! keys are addressed with dots (`wallet.balance`) and values may contain
//! `{param}` placeholders.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use serde_json::{Value, Map};
use tokio::fs;
use tracing::{info, warn, error, debug};
use crate::utils::errors::{ShopError, Result};
use crate::config::I18nConfig;

/// Main internationalization manager
#[derive(Debug, Clone)]
pub struct I18n {
    /// Loaded translations by language code
    translations: HashMap<String, Map<String, Value>>,
    default_language: String,
    supported_languages: Vec<String>,
    translations_dir: PathBuf,
}

/// Translation parameters for message formatting
pub type TranslationParams = HashMap<String, String>;

/// Build translation parameters from name/value pairs
pub fn params<const N: usize>(pairs: [(&str, String); N]) -> TranslationParams {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

impl I18n {
    /// Create a new I18n instance
    pub fn new(config: &I18nConfig) -> Self {
        Self {
            translations: HashMap::new(),
            default_language: config.default_language.clone(),
            supported_languages: config.supported_languages.clone(),
            translations_dir: PathBuf::from(&config.translations_dir),
        }
    }

    /// Load all translation files from the translations directory
    pub async fn load_translations(&mut self) -> Result<()> {
        let translations_dir = self.translations_dir.clone();

        if !translations_dir.exists() {
            return Err(ShopError::Config(format!(
                "Translations directory not found: {}",
                translations_dir.display()
            )));
        }

        let supported_languages = self.supported_languages.clone();
        for lang_code in &supported_languages {
            let file_path = translations_dir.join(format!("{}.json", lang_code));

            if file_path.exists() {
                match self.load_language_file(&file_path, lang_code).await {
                    Ok(count) => info!(language = %lang_code, keys = count, "Loaded translations"),
                    Err(e) => {
                        error!("Failed to load translations for {}: {}", lang_code, e);
                        if lang_code == &self.default_language {
                            return Err(ShopError::Config(
                                format!("Failed to load default language translations: {}", e)
                            ));
                        }
                    }
                }
            } else {
                warn!("Translation file not found: {}", file_path.display());
                if lang_code == &self.default_language {
                    return Err(ShopError::Config(
                        format!("Default language translation file not found: {}", file_path.display())
                    ));
                }
            }
        }

        Ok(())
    }

    /// Load a single language file, returning the number of keys
    async fn load_language_file(&mut self, file_path: &Path, lang_code: &str) -> Result<usize> {
        let content = fs::read_to_string(file_path).await?;
        self.load_language_str(lang_code, &content)
    }

    /// Register translations for a language from a JSON document
    pub fn load_language_str(&mut self, lang_code: &str, content: &str) -> Result<usize> {
        match serde_json::from_str(content)? {
            Value::Object(map) => {
                let count = count_keys(&map);
                debug!("Loaded {} translation keys for {}", count, lang_code);
                self.translations.insert(lang_code.to_string(), map);
                Ok(count)
            }
            _ => Err(ShopError::Config(
                format!("Invalid translation file format for {}", lang_code)
            )),
        }
    }

    /// Get a translated message
    pub fn t(&self, key: &str, lang: &str, params: Option<&TranslationParams>) -> String {
        let effective_lang = self.get_effective_language(lang);

        let value = self
            .get_translation_value(key, effective_lang)
            .or_else(|| self.get_translation_value(key, &self.default_language));

        match value {
            Some(translation) => {
                let text = extract_text_from_value(translation);
                format_message(&text, params)
            }
            None => {
                warn!("Translation key '{}' not found", key);
                key.to_string()
            }
        }
    }

    /// Get a translated message with pluralization support
    pub fn tp(&self, key: &str, lang: &str, count: i64, params: Option<&TranslationParams>) -> String {
        let effective_lang = self.get_effective_language(lang);
        let plural_key = format!("{}.{}", key, plural_form(count, effective_lang));

        let mut final_params = params.cloned().unwrap_or_default();
        final_params.insert("count".to_string(), count.to_string());

        self.t(&plural_key, effective_lang, Some(&final_params))
    }

    /// Check if a language is supported
    pub fn is_language_supported(&self, lang: &str) -> bool {
        self.supported_languages.iter().any(|l| l == lang)
    }

    /// Get the effective language (fallback to default if not supported)
    fn get_effective_language<'a>(&'a self, lang: &'a str) -> &'a str {
        if self.is_language_supported(lang) && self.translations.contains_key(lang) {
            lang
        } else {
            &self.default_language
        }
    }

    /// Get translation value from nested JSON structure
    fn get_translation_value(&self, key: &str, lang: &str) -> Option<&Value> {
        let translations = self.translations.get(lang)?;

        let mut parts = key.split('.');
        let mut current = translations.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }

        Some(current)
    }

    /// Get supported languages
    pub fn supported_languages(&self) -> &[String] {
        &self.supported_languages
    }

    /// Get default language
    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Detect user language from Telegram language code
    pub fn detect_user_language(&self, telegram_lang: Option<&str>) -> String {
        if let Some(lang) = telegram_lang {
            // "en-US" -> "en"
            let lang_code = lang.split('-').next().unwrap_or(lang);

            if self.is_language_supported(lang_code) {
                return lang_code.to_string();
            }
        }

        self.default_language.clone()
    }

    /// Dotted keys present in the default language but missing from `lang`
    pub fn missing_keys(&self, lang: &str) -> Vec<String> {
        let (Some(default), Some(other)) = (
            self.translations.get(&self.default_language),
            self.translations.get(lang),
        ) else {
            return Vec::new();
        };

        let mut expected = Vec::new();
        flatten_keys(default, "", &mut expected);
        let mut present = Vec::new();
        flatten_keys(other, "", &mut present);

        expected.retain(|key| !present.contains(key));
        expected
    }
}

/// Extract text from JSON value (handle both strings and plural objects)
fn extract_text_from_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(obj) => {
            if let Some(other) = obj.get("other") {
                extract_text_from_value(other)
            } else if let Some((_, first_value)) = obj.iter().next() {
                extract_text_from_value(first_value)
            } else {
                String::new()
            }
        }
        _ => value.to_string(),
    }
}

/// Format message with parameters
fn format_message(template: &str, params: Option<&TranslationParams>) -> String {
    match params {
        Some(params) => params.iter().fold(template.to_string(), |text, (key, value)| {
            text.replace(&format!("{{{}}}", key), value)
        }),
        None => template.to_string(),
    }
}

/// Persian nouns after a number stay singular, so only English has two forms
fn plural_form(count: i64, lang: &str) -> &'static str {
    match lang {
        "en" if count == 1 => "one",
        "en" => "other",
        _ => "other",
    }
}

fn count_keys(obj: &Map<String, Value>) -> usize {
    obj.values()
        .map(|value| match value {
            Value::Object(nested) => count_keys(nested),
            _ => 1,
        })
        .sum()
}

fn flatten_keys(obj: &Map<String, Value>, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in obj {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(nested) => flatten_keys(nested, &full, out),
            _ => out.push(full),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i18n() -> I18n {
        let config = I18nConfig {
            default_language: "fa".to_string(),
            supported_languages: vec!["fa".to_string(), "en".to_string()],
            translations_dir: "translations".to_string(),
        };
        let mut i18n = I18n::new(&config);
        i18n.load_language_str(
            "fa",
            r#"{"wallet": {"balance": "موجودی: {amount}", "topup": "شارژ"}, "items": {"other": "{count} مورد"}}"#,
        )
        .unwrap();
        i18n.load_language_str(
            "en",
            r#"{"wallet": {"balance": "Balance: {amount}"}, "items": {"one": "{count} item", "other": "{count} items"}}"#,
        )
        .unwrap();
        i18n
    }

    #[test]
    fn test_nested_lookup_and_params() {
        let i18n = i18n();
        let p = params([("amount", "1,000".to_string())]);
        assert_eq!(i18n.t("wallet.balance", "en", Some(&p)), "Balance: 1,000");
        assert_eq!(i18n.t("wallet.balance", "fa", Some(&p)), "موجودی: 1,000");
    }

    #[test]
    fn test_fallbacks() {
        let i18n = i18n();
        // missing in en, present in fa
        assert_eq!(i18n.t("wallet.topup", "en", None), "شارژ");
        // unsupported language
        assert_eq!(i18n.t("wallet.topup", "de", None), "شارژ");
        // missing everywhere
        assert_eq!(i18n.t("nope.key", "en", None), "nope.key");
    }

    #[test]
    fn test_plurals() {
        let i18n = i18n();
        assert_eq!(i18n.tp("items", "en", 1, None), "1 item");
        assert_eq!(i18n.tp("items", "en", 3, None), "3 items");
        assert_eq!(i18n.tp("items", "fa", 1, None), "1 مورد");
    }

    #[test]
    fn test_language_detection() {
        let i18n = i18n();
        assert_eq!(i18n.detect_user_language(Some("en-US")), "en");
        assert_eq!(i18n.detect_user_language(Some("ru")), "fa");
        assert_eq!(i18n.detect_user_language(None), "fa");
    }

    #[test]
    fn test_missing_keys() {
        let i18n = i18n();
        assert_eq!(i18n.missing_keys("en"), vec!["wallet.topup".to_string()]);
        assert!(i18n.missing_keys("fa").is_empty());
    }

    #[test]
    fn test_rejects_non_object() {
        let mut i18n = i18n();
        assert!(i18n.load_language_str("en", "[1, 2]").is_err());
    }

    #[test]
    fn test_missing_directory_fails() {
        let mut i18n = I18n::new(&I18nConfig {
            default_language: "fa".to_string(),
            supported_languages: vec!["fa".to_string()],
            translations_dir: "/nonexistent/translations".to_string(),
        });
        let result = tokio_test::block_on(i18n.load_translations());
        assert!(matches!(result, Err(ShopError::Config(_))));
    }
}
