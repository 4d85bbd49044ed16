//! Text normalization shared by every comparison path.
//!
//! Case-fold, turn punctuation into spaces, collapse whitespace, then map
//! each token through a small synonym table so trivially different trade
//! wording (`knitted`/`knit`, `t-shirts`/`tshirt`) compares equal.

const SYNONYMS: &[(&str, &str)] = &[
    ("knitted", "knit"),
    ("knitting", "knit"),
    ("tshirts", "tshirt"),
    ("tees", "tshirt"),
    ("shirts", "shirt"),
    ("trousers", "trouser"),
    ("pants", "trouser"),
    ("garments", "garment"),
    ("apparels", "apparel"),
    ("mens", "men"),
    ("womens", "women"),
    ("ladies", "women"),
    ("pieces", "pcs"),
    ("piece", "pcs"),
    ("pc", "pcs"),
    ("and", "&"),
    ("ltd", "limited"),
    ("co", "company"),
    ("corp", "corporation"),
    ("inc", "incorporated"),
];

/// Map a single lowercase token through the synonym table.
pub fn canonical_token(token: &str) -> &str {
    SYNONYMS
        .iter()
        .find(|(from, _)| *from == token)
        .map_or(token, |(_, to)| *to)
}

/// Normalize free text for comparison.
pub fn normalize_text(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    // Apostrophes and hyphens join words ("men's" -> "mens", "t-shirt" -> "tshirt").
    let joined: String = lowered
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}' | '-'))
        .map(|c| {
            if c.is_alphanumeric() || c == '&' || c == '%' {
                c
            } else {
                ' '
            }
        })
        .collect();
    joined
        .split_whitespace()
        .map(canonical_token)
        .collect::<Vec<_>>()
        .join(" ")
}
