//! Consistency of the shipped translation files

use std::collections::BTreeSet;

use regex::Regex;
use serde_json::{Map, Value};

use hiddyshop::config::settings::I18nConfig;
use hiddyshop::i18n::{params, I18n};

const LANGUAGES: [&str; 2] = ["fa", "en"];

fn translations_dir() -> String {
    format!("{}/translations", env!("CARGO_MANIFEST_DIR"))
}

async fn load(default_language: &str) -> I18n {
    let mut i18n = I18n::new(&I18nConfig {
        default_language: default_language.to_string(),
        supported_languages: LANGUAGES.iter().map(|l| l.to_string()).collect(),
        translations_dir: translations_dir(),
    });
    i18n.load_translations().await.expect("translations load");
    i18n
}

fn read_flat(lang: &str) -> Vec<(String, String)> {
    let path = format!("{}/{}.json", translations_dir(), lang);
    let content = std::fs::read_to_string(&path).expect("translation file");
    let value: Value = serde_json::from_str(&content).expect("valid json");
    let mut out = Vec::new();
    if let Value::Object(map) = value {
        flatten(&map, "", &mut out);
    }
    out
}

fn flatten(map: &Map<String, Value>, prefix: &str, out: &mut Vec<(String, String)>) {
    for (key, value) in map {
        let full = if prefix.is_empty() { key.clone() } else { format!("{}.{}", prefix, key) };
        match value {
            Value::Object(nested) => flatten(nested, &full, out),
            Value::String(text) => out.push((full, text.clone())),
            other => out.push((full, other.to_string())),
        }
    }
}

fn placeholders(text: &str) -> BTreeSet<String> {
    let re = Regex::new(r"\{([a-z_]+)\}").unwrap();
    re.captures_iter(text).map(|c| c[1].to_string()).collect()
}

#[tokio::test]
async fn test_languages_have_the_same_keys() {
    let persian_default = load("fa").await;
    assert_eq!(persian_default.missing_keys("en"), Vec::<String>::new());

    let english_default = load("en").await;
    assert_eq!(english_default.missing_keys("fa"), Vec::<String>::new());
}

#[test]
fn test_placeholders_match_across_languages() {
    let english: Vec<_> = read_flat("en");
    let persian: std::collections::HashMap<_, _> = read_flat("fa").into_iter().collect();

    for (key, text) in &english {
        let Some(other) = persian.get(key) else { continue };
        assert_eq!(
            placeholders(text),
            placeholders(other),
            "placeholders differ for {}",
            key
        );
    }
}

#[test]
fn test_html_tags_are_balanced() {
    let tag = Regex::new(r"<(/?)(b|i|code|pre|u|s)>").unwrap();

    for lang in LANGUAGES {
        for (key, text) in read_flat(lang) {
            let mut open: Vec<String> = Vec::new();
            for cap in tag.captures_iter(&text) {
                let name = cap[2].to_string();
                if cap[1].is_empty() {
                    open.push(name);
                } else {
                    assert_eq!(open.pop().as_deref(), Some(name.as_str()), "{}:{} closes <{}> out of order", lang, key, name);
                }
            }
            assert!(open.is_empty(), "{}:{} leaves tags open: {:?}", lang, key, open);
        }
    }
}

#[tokio::test]
async fn test_rendering_fills_parameters() {
    let i18n = load("fa").await;

    let text = i18n.t(
        "payment.topup_approved",
        "en",
        Some(&params([("amount", "1,000 تومان".to_string()), ("payment_id", "7".to_string())])),
    );
    assert!(text.contains("1,000 تومان"));
    assert!(text.contains("#7"));
    assert!(!text.contains('{'));

    // unknown languages fall back to the default
    let fallback = i18n.t("menu.wallet", "de", None);
    assert_eq!(fallback, i18n.t("menu.wallet", "fa", None));
}
