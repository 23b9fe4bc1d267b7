//! Entity identifier canonicalization
//!
//! Turns a human-readable entity label into a stable ASCII identifier:
//! `"重力坝"` becomes `"ZhongLiBa"`. The identifier depends on the label
//! alone, so it can be computed before any stage of the pipeline runs.

use pinyin::ToPinyin;

/// Punctuation removed before transliteration (middle dots and hyphens)
const STRIPPED_PUNCTUATION: &[char] = &['·', '•', '・', '‧', '-', '‐', '‑', '–', '—'];

/// Canonicalize a label into a camel-case pinyin identifier.
///
/// Every Han character becomes one pinyin token and every ASCII letter or
/// digit is a token of its own; other characters are dropped. The first
/// letter of each token is upper-cased and the tokens are joined without
/// separators, so `"GIS系统"` becomes `"GISXiTong"` and `"flood control"`
/// becomes `"FLOODCONTROL"`.
///
/// Returns an empty string when the label yields no tokens. Distinct labels
/// may map to the same identifier.
pub fn canonicalize(label: &str) -> String {
    let mut id = String::with_capacity(label.len() * 3);

    for token in tokenize(label) {
        let mut chars = token.chars();
        if let Some(first) = chars.next() {
            id.push(first.to_ascii_uppercase());
            id.extend(chars);
        }
    }

    id.retain(|c| c.is_ascii_alphanumeric());
    id
}

fn tokenize(label: &str) -> Vec<String> {
    label
        .chars()
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .filter_map(|ch| {
            if ch.is_ascii_alphanumeric() {
                Some(ch.to_string())
            } else {
                ch.to_pinyin().map(|pinyin| pinyin.plain().to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_han_label() {
        assert_eq!(canonicalize("重力坝"), "ZhongLiBa");
        assert_eq!(canonicalize("大渡河"), "DaDuHe");
    }

    #[test]
    fn test_punctuation_is_stripped() {
        assert_eq!(canonicalize("大渡河·重力坝"), canonicalize("大渡河重力坝"));
        assert_eq!(canonicalize("重力-坝"), "ZhongLiBa");
    }

    #[test]
    fn test_ascii_characters_are_single_tokens() {
        assert_eq!(canonicalize("GIS系统"), "GISXiTong");
        assert_eq!(canonicalize("pH值"), "PHZhi");
        assert_eq!(canonicalize("flood control"), "FLOODCONTROL");
        assert_eq!(canonicalize("iPhone"), "IPHONE");
        assert_eq!(canonicalize("3D打印"), "3DDaYin");
    }

    #[test]
    fn test_empty_token_sequence() {
        assert_eq!(canonicalize(""), "");
        assert_eq!(canonicalize("·-·"), "");
        assert_eq!(canonicalize("（）！"), "");
    }

    proptest! {
        #[test]
        fn prop_deterministic(label in "\\PC{1,24}") {
            prop_assert_eq!(canonicalize(&label), canonicalize(&label));
        }

        #[test]
        fn prop_ascii_alphanumeric_only(label in "[\\u4e00-\\u9fa5a-zA-Z0-9·\\- ]{1,16}") {
            let id = canonicalize(&label);
            prop_assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
            prop_assert!(!id.contains('·'));
            prop_assert!(!id.contains('-'));
        }
    }
}
