//! Deterministic key derivation for (brand, model, trim) names.
//!
//! The token-key produced here is the natural identity of a configuration
//! within its brand: two configurations of one brand with equal keys are the
//! same vehicle.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::normalize::comparison_form;

/// Joins sorted tokens into a token-key.
pub const TOKEN_SEPARATOR: &str = "|";

/// Words that only mean "trim"/"configuration" and carry no identity.
const STOP_WORDS: &[&str] = &["комплектация", "trim"];

/// Spelling and transliteration variants mapped to one canonical token.
fn alias(token: &str) -> &str {
    match token {
        "hibrid" | "гибрид" | "hybrid" => "hybrid",
        "dmi" => "dmi",
        "avtomat" | "автомат" | "automatic" | "at" => "automatic",
        "mehanika" | "механика" | "manual" | "mt" => "manual",
        "престиж" | "prestige" => "prestige",
        "комфорт" | "comfort" => "comfort",
        "флагман" | "flagship" => "flagship",
        other => other,
    }
}

/// Derived keys of one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigTokens {
    pub brand_key: String,
    pub model_tokens: Vec<String>,
    pub tokens: Vec<String>,
    pub token_key: String,
}

/// Partition key for a brand: case, whitespace and diacritic insensitive.
///
/// Only `a-z`, `0-9` and `а-я` survive, so "Mercedes-Benz",
/// "MERCEDES BENZ" and "Mercedes Benz" share one key.
pub fn brand_key(brand: &str) -> String {
    let folded = comparison_form(brand);
    let mut key = String::with_capacity(folded.len());

    for ch in folded.chars() {
        if let Some(base) = fold_latin_diacritic(ch) {
            key.push_str(base);
        } else if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ('а'..='я').contains(&ch) {
            key.push(ch);
        }
    }

    key
}

/// Sorted, de-duplicated, alias-substituted tokens of a model name.
pub fn model_tokens(model: &str) -> Vec<String> {
    let folded = comparison_form(model);
    let set: BTreeSet<String> = folded
        .split(|c: char| !is_word_char(c))
        .filter(|p| !p.is_empty())
        .map(|p| alias(p).to_string())
        .collect();
    set.into_iter().collect()
}

/// Full key set for a configuration.
///
/// Trim text keeps periods so engine sizes like `2.0` stay one token. Model
/// tokens are merged in so similarity is judged over the whole
/// configuration, never the trim text alone.
pub fn tokenize(brand: &str, model: &str, trim: &str) -> ConfigTokens {
    let brand_key = brand_key(brand);
    let model_tokens = model_tokens(model);

    let folded = comparison_form(trim);
    let mut set: BTreeSet<String> = model_tokens.iter().cloned().collect();
    for part in folded.split(|c: char| !(is_word_char(c) || c == '.')) {
        if part.is_empty() || part.chars().all(|c| c == '.') {
            continue;
        }
        if STOP_WORDS.contains(&part) {
            continue;
        }
        set.insert(alias(part).to_string());
    }

    let tokens: Vec<String> = set.into_iter().collect();
    let token_key = tokens.join(TOKEN_SEPARATOR);

    ConfigTokens {
        brand_key,
        model_tokens,
        tokens,
        token_key,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphabetic() || c.is_numeric()
}

/// Base letters for lower-case Latin letters with diacritics.
fn fold_latin_diacritic(c: char) -> Option<&'static str> {
    let base = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'ĥ' | 'ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'ĵ' => "j",
        'ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'œ' => "oe",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' => "s",
        'ß' => "ss",
        'ţ' | 'ť' | 'ŧ' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brand_key_folds_case_space_punctuation() {
        assert_eq!(brand_key("Mercedes-Benz"), "mercedesbenz");
        assert_eq!(brand_key("  MERCEDES   BENZ "), "mercedesbenz");
        assert_eq!(brand_key("Лада"), "лада");
        assert_eq!(brand_key("Ёмкость"), "емкость");
        assert_eq!(brand_key("Škoda"), "skoda");
        assert_eq!(brand_key("Citroën"), "citroen");
        assert_eq!(brand_key("BMW 3"), "bmw3");
    }

    #[test]
    fn model_tokens_sorted_and_deduped() {
        assert_eq!(model_tokens("Land Cruiser Prado"), vec!["cruiser", "land", "prado"]);
        assert_eq!(model_tokens("X5 x5"), vec!["x5"]);
        assert_eq!(model_tokens("Song Plus DM-i"), vec!["dm", "i", "plus", "song"]);
        assert_eq!(model_tokens("Camry Гибрид"), vec!["camry", "hybrid"]);
        assert!(model_tokens(" -- ").is_empty());
    }

    #[test]
    fn tokenize_merges_model_and_trim() {
        let t = tokenize("Toyota", "Camry", "Comfort");
        assert_eq!(t.brand_key, "toyota");
        assert_eq!(t.model_tokens, vec!["camry"]);
        assert_eq!(t.tokens, vec!["camry", "comfort"]);
        assert_eq!(t.token_key, "camry|comfort");
    }

    #[test]
    fn tokenize_keeps_engine_size() {
        let t = tokenize("Kia", "Rio", "2.0 AT Prestige");
        assert_eq!(t.tokens, vec!["2.0", "automatic", "prestige", "rio"]);
    }

    #[test]
    fn tokenize_drops_stop_words_and_dot_runs() {
        let t = tokenize("Kia", "Rio", "Комплектация ... Комфорт");
        assert_eq!(t.tokens, vec!["comfort", "rio"]);
        let t = tokenize("Kia", "Rio", "Trim: Comfort");
        assert_eq!(t.token_key, "comfort|rio");
    }

    #[test]
    fn aliases_unify_languages() {
        let a = tokenize("BYD", "Song", "гибрид механика");
        let b = tokenize("BYD", "Song", "Hybrid MT");
        let c = tokenize("BYD", "Song", "hibrid mehanika");
        assert_eq!(a.token_key, b.token_key);
        assert_eq!(b.token_key, c.token_key);
        assert_eq!(a.token_key, "hybrid|manual|song");
    }

    #[test]
    fn order_insensitive() {
        let a = tokenize("Toyota", "Camry", "Comfort Hybrid 2.5");
        let b = tokenize("toyota", "camry", "2.5 hybrid   comfort");
        assert_eq!(a, b);
    }

    #[test]
    fn trim_repeating_model_name_collapses() {
        let a = tokenize("Toyota", "Camry", "Camry Comfort");
        assert_eq!(a.token_key, "camry|comfort");
    }

    #[test]
    fn empty_trim_yields_model_tokens() {
        let t = tokenize("Toyota", "Camry", "");
        assert_eq!(t.tokens, vec!["camry"]);
        assert_eq!(t.token_key, "camry");
    }
}
