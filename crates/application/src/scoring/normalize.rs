//! Text normalization shared by the matching strategies.

use chatbench_domain::NormalizeMode;
use unicode_normalization::UnicodeNormalization;

/// Punctuation removed by loose normalization, after NFKC has folded
/// full-width forms onto their ASCII counterparts.
const LOOSE_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '、', '。', '！', '？', '；', '：', '「', '」', '『', '』', '（',
    '）', '(', ')', '[', ']', '【', '】', '{', '}', '<', '>', '＜', '＞', '"', '\'', '`',
];

/// NFKC, full case fold, trim.
pub fn normalize_basic(text: &str) -> String {
    let composed: String = text.nfkc().collect();
    caseless::default_case_fold_str(&composed).trim().to_string()
}

/// [`normalize_basic`] with whitespace and punctuation removed.
pub fn normalize_loose(text: &str) -> String {
    normalize_basic(text)
        .chars()
        .filter(|c| !c.is_whitespace() && !LOOSE_PUNCTUATION.contains(c))
        .collect()
}

/// Applies `mode`.
pub fn normalize(text: &str, mode: NormalizeMode) -> String {
    match mode {
        NormalizeMode::Basic => normalize_basic(text),
        NormalizeMode::Loose => normalize_loose(text),
    }
}
