//! # Cross-Document Checks
//!
//! A fixed set of consistency checks across the credit and the documents
//! presented under it. They are not corpus driven; each check decides for
//! itself whether it applies (both compared values present, or the credit
//! actually asks for the document) and, when it applies, emits one
//! [`Discrepancy`] in the [`CROSS_DOC_DOMAIN`] whether it passed or not.
//!
//! | Code | Compares | Severity |
//! |---|---|---|
//! | `CROSSDOC-GOODS-1` | credit vs invoice goods description | critical (major when the mismatch is minor) |
//! | `CROSSDOC-AMOUNT-1` | invoice amount vs credit amount plus tolerance | critical |
//! | `CROSSDOC-INSURANCE-1` | credit insurance requirement vs certificate presence | critical |
//! | `CROSSDOC-BL-SHIPPER-1` | B/L shipper vs credit applicant | major |
//! | `CROSSDOC-BL-CONSIGNEE-1` | B/L consignee vs credit beneficiary | major |

use rust_decimal::Decimal;
use serde_json::Value;

use tfcheck_core::{
    Discrepancy, DocumentContext, DocumentLabels, DocumentType, Severity, CROSS_DOC_DOMAIN,
};
use tfcheck_semantic::{ComparisonRequest, Materiality, SemanticComparator};

pub const GOODS_RULE: &str = "CROSSDOC-GOODS-1";
pub const AMOUNT_RULE: &str = "CROSSDOC-AMOUNT-1";
pub const INSURANCE_RULE: &str = "CROSSDOC-INSURANCE-1";
pub const SHIPPER_RULE: &str = "CROSSDOC-BL-SHIPPER-1";
pub const CONSIGNEE_RULE: &str = "CROSSDOC-BL-CONSIGNEE-1";

const LC_GOODS_PATHS: &[&str] = &[
    "letter_of_credit.goods_description",
    "letter_of_credit.description_of_goods",
    "letter_of_credit.goods",
];
const INVOICE_GOODS_PATHS: &[&str] = &[
    "commercial_invoice.goods_description",
    "commercial_invoice.description_of_goods",
    "commercial_invoice.goods",
    "commercial_invoice.description",
];
const LC_AMOUNT_PATHS: &[&str] = &["letter_of_credit.amount", "letter_of_credit.credit_amount"];
const INVOICE_AMOUNT_PATHS: &[&str] = &[
    "commercial_invoice.total_amount",
    "commercial_invoice.amount",
    "commercial_invoice.total",
];
const TOLERANCE_PATHS: &[&str] = &[
    "letter_of_credit.tolerance",
    "letter_of_credit.amount_tolerance",
    "letter_of_credit.percentage_credit_amount_tolerance",
];
const LC_CURRENCY_PATHS: &[&str] = &["letter_of_credit.currency", "letter_of_credit.amount.currency"];
const INVOICE_CURRENCY_PATHS: &[&str] = &[
    "commercial_invoice.currency",
    "commercial_invoice.total_amount.currency",
    "commercial_invoice.amount.currency",
];
const INSURANCE_MENTION_PATHS: &[&str] = &[
    "letter_of_credit.documents_required",
    "letter_of_credit.additional_conditions",
];

/// Tolerance applied when the credit says "about" or "approximately"
/// without a figure (UCP 600 article 30(a)).
const APPROXIMATE_TOLERANCE_PCT: u32 = 10;

/// Runs the cross-document checks for one context.
#[derive(Debug)]
pub struct CrossDocChecker<'a> {
    comparator: &'a SemanticComparator,
}

impl<'a> CrossDocChecker<'a> {
    pub fn new(comparator: &'a SemanticComparator) -> Self {
        Self { comparator }
    }

    /// Run every check. Results are in the order of the table above.
    pub async fn run(&self, ctx: &DocumentContext) -> Vec<Discrepancy> {
        let labels = DocumentLabels::from_context(ctx);
        let mut out = Vec::new();
        out.extend(self.goods(ctx, &labels).await);
        out.extend(amount(ctx, &labels));
        out.extend(insurance(ctx, &labels));
        out.extend(
            self.party(
                ctx,
                &labels,
                PartyCheck {
                    rule: SHIPPER_RULE,
                    title: "B/L shipper does not match credit applicant",
                    bl_field: "shipper",
                    lc_field: "applicant",
                },
            )
            .await,
        );
        out.extend(
            self.party(
                ctx,
                &labels,
                PartyCheck {
                    rule: CONSIGNEE_RULE,
                    title: "B/L consignee does not match credit beneficiary",
                    bl_field: "consignee",
                    lc_field: "beneficiary",
                },
            )
            .await,
        );
        let failing = out.iter().filter(|d| d.is_failing()).count();
        tracing::debug!(checks = out.len(), failing, "cross-document checks complete");
        out
    }

    async fn goods(&self, ctx: &DocumentContext, labels: &DocumentLabels) -> Option<Discrepancy> {
        let credit = first_text(ctx, LC_GOODS_PATHS)?;
        let invoice = first_text(ctx, INVOICE_GOODS_PATHS)?;
        let docs = [lc(), invoice_type()];
        let request = ComparisonRequest::new(credit.clone(), invoice.clone(), "goods_description")
            .with_documents(doc_labels(&docs));
        let result = self.comparator.compare(&request).await;

        let severity = match result.materiality {
            Materiality::Minor => Severity::Major,
            _ => Severity::Critical,
        };
        let message = if result.is_match {
            "Invoice goods description corresponds with the credit".to_string()
        } else {
            format!(
                "Invoice goods description does not correspond with the credit (confidence {:.2})",
                result.confidence
            )
        };
        let mut d = Discrepancy::new(
            GOODS_RULE,
            "Goods description mismatch between credit and invoice",
            CROSS_DOC_DOMAIN,
        )
        .with_outcome(
            result.is_match,
            severity,
            non_empty_or(result.expected, credit),
            non_empty_or(result.found, invoice),
        )
        .with_message(message)
        .with_documents(labels, &docs);
        if !d.passed {
            d.suggested_fix = result.suggested_fix;
        }
        Some(d)
    }

    async fn party(
        &self,
        ctx: &DocumentContext,
        labels: &DocumentLabels,
        check: PartyCheck,
    ) -> Option<Discrepancy> {
        let on_bl = party_name(ctx, &format!("bill_of_lading.{}", check.bl_field))?;
        let on_lc = party_name(ctx, &format!("letter_of_credit.{}", check.lc_field))?;
        let docs = [bl(), lc()];
        let request = ComparisonRequest::new(on_lc.clone(), on_bl.clone(), "party_name")
            .with_documents(doc_labels(&docs));
        let result = self.comparator.compare(&request).await;

        let message = if result.is_match {
            format!("B/L {} matches the credit {}", check.bl_field, check.lc_field)
        } else {
            format!(
                "B/L {} \"{on_bl}\" does not match the credit {} \"{on_lc}\"",
                check.bl_field, check.lc_field
            )
        };
        let mut d = Discrepancy::new(check.rule, check.title, CROSS_DOC_DOMAIN)
            .with_outcome(result.is_match, Severity::Major, on_lc, on_bl)
            .with_message(message)
            .with_documents(labels, &docs);
        if !d.passed {
            d.suggested_fix = result.suggested_fix;
        }
        Some(d)
    }
}

struct PartyCheck {
    rule: &'static str,
    title: &'static str,
    bl_field: &'static str,
    lc_field: &'static str,
}

fn amount(ctx: &DocumentContext, labels: &DocumentLabels) -> Option<Discrepancy> {
    let credit = first_decimal(ctx, LC_AMOUNT_PATHS)?;
    let invoiced = first_decimal(ctx, INVOICE_AMOUNT_PATHS)?;
    let tolerance = TOLERANCE_PATHS
        .iter()
        .find_map(|p| ctx.resolve(p).and_then(parse_tolerance))
        .unwrap_or(Decimal::ZERO);
    let currency = currency(ctx).unwrap_or_default();
    let Some(bound) = tolerance_bound(credit, tolerance) else {
        tracing::warn!(
            credit = %credit,
            tolerance = %tolerance,
            "credit amount with tolerance is not representable; amount check fails closed"
        );
        return Some(unrepresentable_bound(credit, tolerance, invoiced, &currency, labels));
    };
    let passed = invoiced <= bound;

    let message = if passed {
        "Invoice amount is within the credit amount".to_string()
    } else {
        format!(
            "Invoice amount exceeds the credit amount of {} plus {}% tolerance",
            money(credit, &currency),
            tolerance.normalize()
        )
    };
    let mut d = Discrepancy::new(AMOUNT_RULE, "Invoice amount exceeds credit amount", CROSS_DOC_DOMAIN)
        .with_outcome(
            passed,
            Severity::Critical,
            format!("<= {}", money(bound, &currency)),
            money(invoiced, &currency),
        )
        .with_message(message)
        .with_documents(labels, &[invoice_type(), lc()]);
    if !passed {
        d.suggested_fix = Some(format!(
            "Reduce the invoice to at most {} or obtain an amendment increasing the credit",
            money(bound, &currency)
        ));
    }
    Some(d)
}

/// `credit * (1 + tolerance / 100)`, or `None` on overflow.
fn tolerance_bound(credit: Decimal, tolerance: Decimal) -> Option<Decimal> {
    tolerance
        .checked_div(Decimal::ONE_HUNDRED)
        .and_then(|t| Decimal::ONE.checked_add(t))
        .and_then(|factor| credit.checked_mul(factor))
}

fn unrepresentable_bound(
    credit: Decimal,
    tolerance: Decimal,
    invoiced: Decimal,
    currency: &str,
    labels: &DocumentLabels,
) -> Discrepancy {
    let limit = format!("{} plus {}%", money(credit, currency), tolerance.normalize());
    let mut d = Discrepancy::new(AMOUNT_RULE, "Invoice amount exceeds credit amount", CROSS_DOC_DOMAIN)
        .with_outcome(false, Severity::Critical, format!("<= {limit}"), money(invoiced, currency))
        .with_message(format!(
            "Credit amount limit of {limit} cannot be computed; the invoice amount could not be verified"
        ))
        .with_documents(labels, &[invoice_type(), lc()]);
    d.suggested_fix = Some("Check the credit amount and tolerance extracted from the credit".to_string());
    d
}

fn insurance(ctx: &DocumentContext, labels: &DocumentLabels) -> Option<Discrepancy> {
    let mentioned = INSURANCE_MENTION_PATHS.iter().any(|p| {
        ctx.resolve_text(p)
            .is_some_and(|t| t.to_lowercase().contains("insurance"))
    });
    let flagged = ctx.resolve("letter_of_credit.insurance_required").is_some_and(truthy);
    if !(mentioned || flagged) {
        return None;
    }
    let certificate = DocumentType::new(DocumentType::INSURANCE_CERTIFICATE);
    let present = ctx.is_present(&certificate);
    let mut d = Discrepancy::new(
        INSURANCE_RULE,
        "Insurance document required by the credit is missing",
        CROSS_DOC_DOMAIN,
    )
    .with_outcome(
        present,
        Severity::Critical,
        format!("{} present", certificate.default_label()),
        if present { "present" } else { "missing" },
    )
    .with_message(if present {
        "Insurance certificate presented as required by the credit"
    } else {
        "The credit calls for an insurance document but none was presented"
    })
    .with_documents(labels, &[lc(), certificate]);
    if !present {
        d.suggested_fix =
            Some("Present an insurance policy or certificate covering the shipment".to_string());
    }
    Some(d)
}

fn lc() -> DocumentType {
    DocumentType::new(DocumentType::LETTER_OF_CREDIT)
}

fn invoice_type() -> DocumentType {
    DocumentType::new(DocumentType::COMMERCIAL_INVOICE)
}

fn bl() -> DocumentType {
    DocumentType::new(DocumentType::BILL_OF_LADING)
}

fn doc_labels(types: &[DocumentType]) -> Vec<String> {
    types.iter().map(DocumentType::default_label).collect()
}

fn non_empty_or(value: String, fallback: String) -> String {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn first_text(ctx: &DocumentContext, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|p| ctx.resolve_text(p))
}

fn first_decimal(ctx: &DocumentContext, paths: &[&str]) -> Option<Decimal> {
    paths.iter().find_map(|p| ctx.resolve_decimal(p))
}

/// Party names are compared on their first line; the rest is address.
fn party_name(ctx: &DocumentContext, base: &str) -> Option<String> {
    let text = ctx
        .resolve_text(&format!("{base}.name"))
        .or_else(|| ctx.resolve_text(base))?;
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

fn currency(ctx: &DocumentContext) -> Option<String> {
    LC_CURRENCY_PATHS
        .iter()
        .chain(INVOICE_CURRENCY_PATHS)
        .find_map(|p| ctx.resolve_text(p))
        .map(|c| c.to_uppercase())
        .or_else(|| {
            LC_AMOUNT_PATHS
                .iter()
                .chain(INVOICE_AMOUNT_PATHS)
                .find_map(|p| ctx.resolve_text(p).and_then(|t| currency_in_text(&t)))
        })
}

fn currency_in_text(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .find(|w| w.len() == 3 && w.chars().all(|c| c.is_ascii_uppercase()))
        .map(str::to_string)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "y" | "required"),
        _ => false,
    }
}

/// Percentage tolerance from a credit field.
///
/// Accepts numbers and the written forms `"5"`, `"5%"`, `"+/-5%"` and the
/// MT700 field 39A form `"05/05"` (plus/minus; the plus side is used).
/// "about" and "approximately" without a figure mean 10%.
pub fn parse_tolerance(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
        Value::String(s) => {
            let lower = s.to_lowercase();
            if let Some(d) = leading_number(&lower) {
                return Some(d);
            }
            if lower.contains("about") || lower.contains("approximately") {
                return Some(Decimal::from(APPROXIMATE_TOLERANCE_PCT));
            }
            if !lower.trim().is_empty() {
                tracing::debug!(tolerance = %s, "credit tolerance has no usable figure; treated as none");
            }
            None
        }
        Value::Object(map) => map.get("plus").or_else(|| map.get("value")).and_then(parse_tolerance),
        _ => None,
    }
}

/// First number in `text`: a digit run with at most one fractional part.
/// A trailing dot or a second dot ends the number.
fn leading_number(text: &str) -> Option<Decimal> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let int_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let mut end = int_end;
    if let Some(frac) = rest[int_end..].strip_prefix('.') {
        let frac_len = frac
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(frac.len());
        if frac_len > 0 {
            end = int_end + 1 + frac_len;
        }
    }
    rest[..end].parse::<Decimal>().ok()
}

/// `106000` + `USD` → `"106,000.00 USD"`.
pub fn money(amount: Decimal, currency: &str) -> String {
    let fixed = format!("{:.2}", amount.round_dp(2));
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac) = unsigned.split_once('.').unwrap_or((unsigned, "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let number = format!("{sign}{grouped}.{frac}");
    if currency.is_empty() {
        number
    } else {
        format!("{number} {currency}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tfcheck_core::SystemClock;

    fn comparator() -> SemanticComparator {
        SemanticComparator::lexical(Arc::new(SystemClock))
    }

    async fn run(ctx: &DocumentContext) -> Vec<Discrepancy> {
        let cmp = comparator();
        CrossDocChecker::new(&cmp).run(ctx).await
    }

    fn find<'a>(out: &'a [Discrepancy], rule: &str) -> Option<&'a Discrepancy> {
        out.iter().find(|d| d.rule == rule)
    }

    #[test]
    fn tolerance_forms() {
        let d = |v: Value| parse_tolerance(&v);
        assert_eq!(d(json!(5)), Some(Decimal::from(5)));
        assert_eq!(d(json!("5%")), Some(Decimal::from(5)));
        assert_eq!(d(json!("+/-5%")), Some(Decimal::from(5)));
        assert_eq!(d(json!("05/05")), Some(Decimal::from(5)));
        assert_eq!(d(json!("about")), Some(Decimal::from(10)));
        assert_eq!(d(json!({"plus": 3, "minus": 3})), Some(Decimal::from(3)));
        assert_eq!(d(json!("none")), None);
        assert_eq!(d(json!("5.")), Some(Decimal::from(5)));
        assert_eq!(d(json!("5.0.1")), Some(Decimal::new(50, 1)));
        assert_eq!(d(json!("7.5% more or less")), Some(Decimal::new(75, 1)));
        assert_eq!(d(json!("about 5.")), Some(Decimal::from(5)));
        assert_eq!(d(json!("")), None);
    }

    #[test]
    fn money_formatting() {
        assert_eq!(money(Decimal::from(106_000), "USD"), "106,000.00 USD");
        assert_eq!(money(Decimal::new(1_234_567, 1), "EUR"), "123,456.70 EUR");
        assert_eq!(money(Decimal::from(999), ""), "999.00");
        assert_eq!(money(Decimal::from(-1500), "USD"), "-1,500.00 USD");
    }

    #[tokio::test]
    async fn amount_over_tolerance_fails() {
        let ctx = DocumentContext::new()
            .with_fields(
                "lc",
                json!({"amount": "100,000", "currency": "USD", "tolerance": "5%"}),
            )
            .with_fields("invoice", json!({"total_amount": "106,000"}));
        let out = run(&ctx).await;
        let d = find(&out, AMOUNT_RULE).unwrap();
        assert!(!d.passed);
        assert_eq!(d.severity, Severity::Critical);
        assert_eq!(d.actual, "106,000.00 USD");
        assert_eq!(d.expected, "<= 105,000.00 USD");
        assert_eq!(d.ruleset_domain, CROSS_DOC_DOMAIN);
        assert!(d.is_issue_card());
        assert_eq!(
            d.document_names,
            vec!["Commercial Invoice", "Letter of Credit"]
        );
    }

    #[tokio::test]
    async fn amount_bound_overflow_fails_closed() {
        let ctx = DocumentContext::new()
            .with_fields(
                "lc",
                json!({"amount": "70000000000000000000000000000", "currency": "USD", "tolerance": "50%"}),
            )
            .with_fields("invoice", json!({"total_amount": "1"}));
        let out = run(&ctx).await;
        let d = find(&out, AMOUNT_RULE).unwrap();
        assert!(!d.passed);
        assert_eq!(d.severity, Severity::Critical);
        assert_eq!(d.actual, "1.00 USD");
        assert!(d.expected.ends_with("USD plus 50%"), "{}", d.expected);
        assert!(d.suggested_fix.is_some());
    }

    #[test]
    fn tolerance_bound_is_checked() {
        assert_eq!(
            tolerance_bound(Decimal::from(100_000), Decimal::from(5)),
            Some(Decimal::from(105_000))
        );
        assert_eq!(tolerance_bound(Decimal::MAX, Decimal::from(1)), None);
    }

    #[tokio::test]
    async fn amount_within_tolerance_passes_with_currency_from_text() {
        let ctx = DocumentContext::new()
            .with_fields("lc", json!({"amount": "EUR 50,000.00", "tolerance": "05/05"}))
            .with_fields("invoice", json!({"amount": 52500}));
        let out = run(&ctx).await;
        let d = find(&out, AMOUNT_RULE).unwrap();
        assert!(d.passed);
        assert_eq!(d.expected, "<= 52,500.00 EUR");
    }

    #[tokio::test]
    async fn goods_heuristic_match_passes() {
        let ctx = DocumentContext::new()
            .with_fields(
                "lc",
                json!({"goods_description": "1) 500 PCS Cotton Shirts HS CODE: 610910"}),
            )
            .with_fields(
                "invoice",
                json!({"description": "500 pcs cotton shirts, HS Code 610910"}),
            );
        let out = run(&ctx).await;
        let d = find(&out, GOODS_RULE).unwrap();
        assert!(d.passed, "{d:?}");
    }

    #[tokio::test]
    async fn insurance_required_but_missing() {
        let ctx = DocumentContext::new().with_fields(
            "lc",
            json!({"documents_required": ["Commercial invoice in 3 copies", "Insurance certificate for 110% CIF value"]}),
        );
        let out = run(&ctx).await;
        let d = find(&out, INSURANCE_RULE).unwrap();
        assert!(!d.passed);
        assert_eq!(d.actual, "missing");
        assert_eq!(d.document_names, vec!["Letter of Credit", "Insurance Certificate"]);

        let presented = ctx.with_document("d-ins", "ins.pdf", "insurance");
        let out = run(&presented).await;
        assert!(find(&out, INSURANCE_RULE).unwrap().passed);
    }

    #[tokio::test]
    async fn party_checks_compare_first_line_names() {
        let ctx = DocumentContext::new()
            .with_fields(
                "lc",
                json!({
                    "applicant": {"name": "Acme Imports Ltd\n12 Harbour Road"},
                    "beneficiary": "Dhaka Knitwear Co"
                }),
            )
            .with_fields(
                "bl",
                json!({"shipper": "ACME IMPORTS LIMITED", "consignee": {"name": "Totally Different Traders"}}),
            )
            .with_document("d-bl", "bl_scan.pdf", "bl");
        let out = run(&ctx).await;
        let shipper = find(&out, SHIPPER_RULE).unwrap();
        assert!(shipper.passed, "{shipper:?}");
        let consignee = find(&out, CONSIGNEE_RULE).unwrap();
        assert!(!consignee.passed);
        assert_eq!(consignee.severity, Severity::Major);
        assert_eq!(consignee.document_names, vec!["bl_scan.pdf", "Letter of Credit"]);
    }

    #[tokio::test]
    async fn inapplicable_checks_emit_nothing() {
        let ctx = DocumentContext::new().with_fields("lc", json!({"amount": "100"}));
        assert!(run(&ctx).await.is_empty());
    }
}
