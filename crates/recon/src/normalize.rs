//! Free-text canonicalization for display names.
//!
//! Everything here is pure and infallible. An empty return value means the
//! input carried no usable name; callers drop such records.

/// Trim and collapse every whitespace run to a single space.
pub fn normalize_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`normalize_spaces`] followed by title case.
///
/// A letter is upper-cased when it starts the string or follows a
/// non-letter; every other letter is lower-cased. Digits and punctuation
/// pass through, so `"comfort (hybrid) 2.0at"` becomes
/// `"Comfort (Hybrid) 2.0At"`.
pub fn normalize_title(s: &str) -> String {
    let spaced = normalize_spaces(s);
    let mut out = String::with_capacity(spaced.len());
    let mut prev_is_letter = false;

    for ch in spaced.chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }

    out
}

/// Fold `ё` into `е` (both cases). Vendors use the two interchangeably.
pub fn fold_yo(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'ё' => 'е',
            'Ё' => 'Е',
            other => other,
        })
        .collect()
}

/// Lower-case and `ё`-fold, the comparison form used by the tokenizer.
pub fn comparison_form(s: &str) -> String {
    fold_yo(&s.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_collapse_and_trim() {
        assert_eq!(normalize_spaces("  Camry \t  XV70 \n"), "Camry XV70");
        assert_eq!(normalize_spaces(""), "");
        assert_eq!(normalize_spaces(" \u{a0} "), "");
    }

    #[test]
    fn title_case_latin_and_cyrillic() {
        assert_eq!(normalize_title("toyota"), "Toyota");
        assert_eq!(normalize_title(" Camry "), "Camry");
        assert_eq!(normalize_title("comfort "), "Comfort");
        assert_eq!(normalize_title("LAND   CRUISER prado"), "Land Cruiser Prado");
        assert_eq!(normalize_title("лада ВЕСТА"), "Лада Веста");
        assert_eq!(normalize_title("comfort (hybrid)"), "Comfort (Hybrid)");
        assert_eq!(normalize_title("mercedes-benz"), "Mercedes-Benz");
    }

    #[test]
    fn title_case_after_digits() {
        assert_eq!(normalize_title("2.0at"), "2.0At");
        assert_eq!(normalize_title("x5"), "X5");
    }

    #[test]
    fn yo_fold() {
        assert_eq!(fold_yo("Ёлка зелёная"), "Елка зеленая");
        assert_eq!(comparison_form("ЗЕЛЁНЫЙ"), "зеленый");
    }

    #[test]
    fn blank_is_empty() {
        assert!(normalize_title("   ").is_empty());
    }
}
