//! # Goods-Line Heuristic
//!
//! Goods descriptions on credits and invoices are usually itemized:
//!
//! ```text
//! 1) 500 PCS Cotton Shirts HS CODE: 610910
//! 2) 200 PCS Denim Trousers HS CODE: 620342
//! ```
//!
//! Each side is split into item lines; from each line the HS code and the
//! quantity with its unit are extracted and the remaining words normalized
//! into an item name. When the item-name sets, the quantity sets and the HS
//! code sets all agree, the descriptions are declared an exact match and
//! fuzzy scoring is skipped.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::normalize::normalize_text;

struct Patterns {
    numbering: Regex,
    inline_numbering: Regex,
    hs_code: Regex,
    quantity: Regex,
}

const QUANTITY: &str = r"(?i)\b(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*(pcs|pieces?|pc|units?|sets?|dozens?|doz|pairs?|prs|cartons?|ctns?|boxes|box|kgs?|kilograms?|mts?|tons?|tonnes?|lbs?|yards?|yds?|meters?|metres?|mtrs?)\b";

fn patterns() -> Option<&'static Patterns> {
    static CELL: OnceLock<Option<Patterns>> = OnceLock::new();
    CELL.get_or_init(|| {
        Some(Patterns {
            numbering: Regex::new(r"^\s*(?:\(?\d{1,3}\)|\d{1,3}[.:]\s|[-*\u{2022}])\s*").ok()?,
            inline_numbering: Regex::new(r"\s+\(?\d{1,3}\)\s+").ok()?,
            hs_code: Regex::new(
                r"(?i)\bh\.?\s?s\.?\s*(?:code|no\.?|number)?\s*[:#]?\s*(\d{4}(?:\.?\d{2}){0,3})\b",
            )
            .ok()?,
            quantity: Regex::new(QUANTITY).ok()?,
        })
    })
    .as_ref()
}

fn canonical_unit(raw: &str) -> &'static str {
    match raw.to_ascii_lowercase().as_str() {
        "pcs" | "piece" | "pieces" | "pc" => "pcs",
        "unit" | "units" => "units",
        "set" | "sets" => "sets",
        "dozen" | "dozens" | "doz" => "dozen",
        "pair" | "pairs" | "prs" => "pairs",
        "carton" | "cartons" | "ctn" | "ctns" => "cartons",
        "box" | "boxes" => "boxes",
        "kg" | "kgs" | "kilogram" | "kilograms" => "kg",
        "mt" | "mts" | "ton" | "tons" | "tonne" | "tonnes" => "mt",
        "lb" | "lbs" => "lb",
        "yard" | "yards" | "yd" | "yds" => "yd",
        _ => "m",
    }
}

/// What the heuristic extracts from one goods description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoodsSignature {
    pub items: BTreeSet<String>,
    pub quantities: BTreeSet<(Decimal, &'static str)>,
    pub hs_codes: BTreeSet<String>,
}

impl GoodsSignature {
    /// Extract the signature of a goods description.
    pub fn extract(text: &str) -> Self {
        let mut sig = Self::default();
        let Some(p) = patterns() else {
            return sig;
        };
        let split = p.inline_numbering.replace_all(text, "\n$0");
        for raw_line in split.split(['\n', ';']) {
            let line = p.numbering.replace(raw_line, "");
            if line.trim().is_empty() {
                continue;
            }

            let mut rest = line.to_string();
            if let Some(caps) = p.hs_code.captures(&line) {
                if let (Some(all), Some(code)) = (caps.get(0), caps.get(1)) {
                    sig.hs_codes.insert(code.as_str().replace('.', ""));
                    rest = rest.replacen(all.as_str(), " ", 1);
                }
            }

            let snapshot = rest.clone();
            if let Some(caps) = p.quantity.captures(&snapshot) {
                if let (Some(all), Some(qty), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2)) {
                    if let Ok(q) = Decimal::from_str(&qty.as_str().replace(',', "")) {
                        sig.quantities.insert((q.normalize(), canonical_unit(unit.as_str())));
                    }
                    rest = rest.replacen(all.as_str(), " ", 1);
                }
            }

            let name = normalize_text(&rest);
            if !name.is_empty() {
                sig.items.insert(name);
            }
        }
        sig
    }

    /// Whether there is anything beyond item names to corroborate a match.
    pub fn has_markers(&self) -> bool {
        !self.quantities.is_empty() || !self.hs_codes.is_empty()
    }
}

/// Whether a comparison context is about goods descriptions.
pub fn is_goods_context(context: &str) -> bool {
    let c = context.to_ascii_lowercase();
    c.contains("goods") || c.contains("merchandise") || c.contains("description_of_goods")
}

/// Forced-match test: true only when both descriptions itemize to the same
/// names, quantities and HS codes, and at least one side carries a
/// quantity or HS code.
pub fn goods_lines_match(left: &str, right: &str) -> bool {
    let l = GoodsSignature::extract(left);
    let r = GoodsSignature::extract(right);
    !l.items.is_empty() && (l.has_markers() || r.has_markers()) && l == r
}
