//! Issue-card / reference split for presentation.
//!
//! Only failing discrepancies are partitioned. Membership depends on
//! [`Discrepancy::is_issue_card`] alone, never on content.

use serde::Serialize;
use tfcheck_core::Discrepancy;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssuePartition {
    /// Shown to the user as cards.
    pub issue_cards: Vec<Discrepancy>,
    /// Technical references listed below the cards.
    pub references: Vec<Discrepancy>,
}

/// Split the failing discrepancies, keeping input order within each side.
pub fn partition_issues(discrepancies: &[Discrepancy]) -> IssuePartition {
    let (issue_cards, references) = discrepancies
        .iter()
        .filter(|d| d.is_failing())
        .cloned()
        .partition(Discrepancy::is_issue_card);
    IssuePartition {
        issue_cards,
        references,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfcheck_core::{Severity, CROSS_DOC_DOMAIN};

    fn failing(rule: &str, domain: &str) -> Discrepancy {
        Discrepancy::new(rule, rule, domain).with_outcome(false, Severity::Major, "x", "y")
    }

    #[test]
    fn splits_by_flag_and_domain_and_drops_passes() {
        let mut flagged = failing("R-2", "icc.ucp600");
        flagged.display_card = true;
        let list = vec![
            failing("R-1", "icc.ucp600"),
            flagged,
            failing("CROSSDOC-AMOUNT-1", CROSS_DOC_DOMAIN),
            Discrepancy::new("R-3", "passed", CROSS_DOC_DOMAIN),
        ];
        let p = partition_issues(&list);
        let cards: Vec<_> = p.issue_cards.iter().map(|d| d.rule.as_str()).collect();
        let refs: Vec<_> = p.references.iter().map(|d| d.rule.as_str()).collect();
        assert_eq!(cards, vec!["R-2", "CROSSDOC-AMOUNT-1"]);
        assert_eq!(refs, vec!["R-1"]);
    }
}
