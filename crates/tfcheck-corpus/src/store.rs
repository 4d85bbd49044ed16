//! # Corpus Store
//!
//! In-memory holder of ruleset headers and the rule records bound to them,
//! with the lifecycle operations: create, ingest, activate, deprecate,
//! delete, compile.
//!
//! Ingestion validates each rule independently and reports every rejected
//! rule with all of its errors. Activation is gated on the integrity
//! checker: a ruleset with any error-level defect stays where it is.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tfcheck_core::RulesetId;

use crate::error::{CorpusError, CorpusResult};
use crate::integrity::IntegrityChecker;
use crate::rule::{Rule, RuleRecord, RuleRejection};
use crate::ruleset::{CompiledRuleset, NewRuleset, RulesetRecord, RulesetStatus};

/// Outcome of [`CorpusStore::ingest_rules`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub ruleset_id: RulesetId,
    pub accepted: usize,
    pub rejected: Vec<RuleRejection>,
}

impl IngestReport {
    /// Whether every submitted rule was accepted.
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Rulesets and their rules.
#[derive(Debug, Clone, Default)]
pub struct CorpusStore {
    rulesets: Vec<RulesetRecord>,
    rules: Vec<RuleRecord>,
}

impl CorpusStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All ruleset headers, in creation order.
    pub fn rulesets(&self) -> &[RulesetRecord] {
        &self.rulesets
    }

    /// All rule records, bound or not, in insertion order.
    pub fn rules(&self) -> &[RuleRecord] {
        &self.rules
    }

    /// Look up a ruleset header.
    pub fn ruleset(&self, id: RulesetId) -> Option<&RulesetRecord> {
        self.rulesets.iter().find(|r| r.id == id)
    }

    /// Rules bound to a ruleset, in ingestion order.
    pub fn rules_of(&self, id: RulesetId) -> impl Iterator<Item = &RuleRecord> + '_ {
        self.rules.iter().filter(move |r| r.ruleset_id == Some(id))
    }

    /// Number of rules actually bound to a ruleset.
    pub fn bound_rule_count(&self, id: RulesetId) -> usize {
        self.rules_of(id).count()
    }

    /// Create a draft ruleset.
    ///
    /// # Errors
    ///
    /// [`CorpusError::InvalidRuleset`] for blank header fields and
    /// [`CorpusError::DuplicateVersion`] if the version triple already exists.
    pub fn create_ruleset(&mut self, new: NewRuleset) -> CorpusResult<RulesetId> {
        new.validate()?;
        if let Some(existing) = self.rulesets.iter().find(|r| {
            r.domain == new.domain
                && r.rulebook_version == new.rulebook_version
                && r.ruleset_version == new.ruleset_version
        }) {
            return Err(CorpusError::DuplicateVersion {
                domain: new.domain,
                rulebook_version: new.rulebook_version,
                ruleset_version: new.ruleset_version,
                existing: existing.id,
            });
        }
        let record = RulesetRecord {
            id: RulesetId::new(),
            domain: new.domain,
            jurisdiction: new.jurisdiction,
            rulebook_version: new.rulebook_version,
            ruleset_version: new.ruleset_version,
            status: RulesetStatus::Draft,
            rule_count: 0,
            created_at: Utc::now(),
            notes: new.notes,
        };
        let id = record.id;
        tracing::info!(ruleset = %id, label = %record.label(), "ruleset created");
        self.rulesets.push(record);
        Ok(id)
    }

    /// Insert a ruleset header as-is, bypassing creation checks. Used when
    /// loading a snapshot of an existing corpus for auditing.
    pub fn insert_ruleset_record(&mut self, record: RulesetRecord) {
        self.rulesets.push(record);
    }

    /// Insert rule records as-is, without validation or count maintenance.
    /// Used when loading a snapshot of an existing corpus for auditing.
    pub fn import_records(&mut self, records: impl IntoIterator<Item = RuleRecord>) {
        self.rules.extend(records);
    }

    /// Validate and bind a batch of rule objects to a ruleset.
    ///
    /// Each object is checked on its own. Accepted rules inherit the
    /// ruleset's domain and jurisdiction when they carry none. A `rule_id`
    /// already bound to the ruleset, or repeated within the batch, is
    /// rejected. `rule_count` is refreshed afterwards.
    ///
    /// # Errors
    ///
    /// Only [`CorpusError::UnknownRuleset`]; bad rules go into the report.
    pub fn ingest_rules(&mut self, id: RulesetId, items: Vec<Value>) -> CorpusResult<IngestReport> {
        let ruleset = self
            .ruleset(id)
            .cloned()
            .ok_or(CorpusError::UnknownRuleset(id))?;
        let mut seen: BTreeSet<String> = self
            .rules_of(id)
            .filter_map(|r| r.rule_id().map(str::to_string))
            .collect();

        let mut report = IngestReport {
            ruleset_id: id,
            accepted: 0,
            rejected: Vec::new(),
        };

        for (index, item) in items.into_iter().enumerate() {
            let raw_id = item
                .get("rule_id")
                .and_then(Value::as_str)
                .map(str::to_string);
            let mut record: RuleRecord = match serde_json::from_value(item) {
                Ok(r) => r,
                Err(e) => {
                    report.rejected.push(RuleRejection {
                        index,
                        rule_id: raw_id,
                        errors: vec![format!("malformed rule object: {e}")],
                    });
                    continue;
                }
            };

            let mut errors = match Rule::from_record(&record, &ruleset) {
                Ok(_) => Vec::new(),
                Err(errors) => errors,
            };
            if let Some(rule_id) = record.rule_id() {
                if seen.contains(rule_id) {
                    errors.push(format!("duplicate rule_id {rule_id} in ruleset"));
                }
            }
            if !errors.is_empty() {
                tracing::debug!(ruleset = %id, index, errors = ?errors, "rule rejected");
                report.rejected.push(RuleRejection {
                    index,
                    rule_id: record.rule_id().map(str::to_string),
                    errors,
                });
                continue;
            }

            if let Some(rule_id) = record.rule_id() {
                seen.insert(rule_id.to_string());
            }
            record.ruleset_id = Some(id);
            if record.domain.as_deref().map_or(true, |d| d.trim().is_empty()) {
                record.domain = Some(ruleset.domain.clone());
            }
            if record
                .jurisdiction
                .as_deref()
                .map_or(true, |j| j.trim().is_empty())
            {
                record.jurisdiction = Some(ruleset.jurisdiction.clone());
            }
            self.rules.push(record);
            report.accepted += 1;
        }

        self.refresh_rule_count(id);
        tracing::info!(
            ruleset = %id,
            accepted = report.accepted,
            rejected = report.rejected.len(),
            "rules ingested"
        );
        Ok(report)
    }

    /// Promote a ruleset to active.
    ///
    /// Runs the integrity checker against the ruleset as if it were active.
    /// On success, any other active ruleset for the same
    /// `(domain, rulebook_version)` is deprecated; their ids are returned.
    ///
    /// # Errors
    ///
    /// [`CorpusError::ActivationBlocked`] listing every error-level defect.
    pub fn activate_ruleset(&mut self, id: RulesetId) -> CorpusResult<Vec<RulesetId>> {
        let target = self
            .ruleset(id)
            .cloned()
            .ok_or(CorpusError::UnknownRuleset(id))?;

        let report = IntegrityChecker::new().check_activation(self, id);
        if !report.is_clean() {
            let defects: Vec<String> = report.errors().map(ToString::to_string).collect();
            tracing::warn!(ruleset = %id, defects = defects.len(), "activation blocked");
            return Err(CorpusError::ActivationBlocked {
                ruleset: id,
                defects,
            });
        }

        let mut demoted = Vec::new();
        for other in self.rulesets.iter_mut() {
            if other.id != id
                && other.status == RulesetStatus::Active
                && other.shares_active_slot(&target)
            {
                other.status = RulesetStatus::Deprecated;
                demoted.push(other.id);
            }
        }
        self.set_status(id, RulesetStatus::Active)?;
        tracing::info!(ruleset = %id, label = %target.label(), demoted = ?demoted, "ruleset activated");
        Ok(demoted)
    }

    /// Mark a ruleset deprecated.
    pub fn deprecate_ruleset(&mut self, id: RulesetId) -> CorpusResult<()> {
        self.set_status(id, RulesetStatus::Deprecated)?;
        tracing::info!(ruleset = %id, "ruleset deprecated");
        Ok(())
    }

    /// Delete a ruleset and every rule bound to it. Returns the number of
    /// rules removed.
    pub fn delete_ruleset(&mut self, id: RulesetId) -> CorpusResult<usize> {
        let pos = self
            .rulesets
            .iter()
            .position(|r| r.id == id)
            .ok_or(CorpusError::UnknownRuleset(id))?;
        self.rulesets.remove(pos);
        let before = self.rules.len();
        self.rules.retain(|r| r.ruleset_id != Some(id));
        let removed = before - self.rules.len();
        tracing::info!(ruleset = %id, removed, "ruleset deleted");
        Ok(removed)
    }

    /// Compile one ruleset's records into typed rules.
    ///
    /// # Errors
    ///
    /// [`CorpusError::Compile`] with a rejection per record that does not
    /// satisfy the rule schema.
    pub fn compile(&self, id: RulesetId) -> CorpusResult<CompiledRuleset> {
        let ruleset = self.ruleset(id).ok_or(CorpusError::UnknownRuleset(id))?;
        let mut rules = Vec::new();
        let mut rejections = Vec::new();
        for (index, record) in self.rules_of(id).enumerate() {
            match Rule::from_record(record, ruleset) {
                Ok(rule) => rules.push(rule),
                Err(errors) => rejections.push(RuleRejection {
                    index,
                    rule_id: record.rule_id().map(str::to_string),
                    errors,
                }),
            }
        }
        if !rejections.is_empty() {
            return Err(CorpusError::Compile {
                ruleset: id,
                rejections,
            });
        }
        Ok(CompiledRuleset {
            id,
            domain: ruleset.domain.clone(),
            jurisdiction: ruleset.jurisdiction.clone(),
            rulebook_version: ruleset.rulebook_version.clone(),
            ruleset_version: ruleset.ruleset_version.clone(),
            rules,
        })
    }

    /// Active rulesets in evaluation order.
    ///
    /// With a domain filter, rulesets follow the filter's order; otherwise
    /// they are sorted by domain. Within a domain, by rulebook version then
    /// creation order.
    pub fn active_rulesets(&self, domains: &[String]) -> Vec<&RulesetRecord> {
        let mut active: Vec<(usize, &RulesetRecord)> = self
            .rulesets
            .iter()
            .filter(|r| r.status == RulesetStatus::Active)
            .filter_map(|r| {
                if domains.is_empty() {
                    Some((0, r))
                } else {
                    domains.iter().position(|d| d == &r.domain).map(|p| (p, r))
                }
            })
            .collect();
        // Stable sort keeps creation order as the final tiebreak.
        active.sort_by(|(pa, a), (pb, b)| {
            pa.cmp(pb)
                .then_with(|| a.domain.cmp(&b.domain))
                .then_with(|| a.rulebook_version.cmp(&b.rulebook_version))
        });
        active.into_iter().map(|(_, r)| r).collect()
    }

    /// Compile every active ruleset, in [`active_rulesets`](Self::active_rulesets) order.
    pub fn compile_active(&self, domains: &[String]) -> CorpusResult<Vec<CompiledRuleset>> {
        self.active_rulesets(domains)
            .into_iter()
            .map(|r| self.compile(r.id))
            .collect()
    }

    fn set_status(&mut self, id: RulesetId, status: RulesetStatus) -> CorpusResult<()> {
        let record = self
            .rulesets
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(CorpusError::UnknownRuleset(id))?;
        record.status = status;
        Ok(())
    }

    fn refresh_rule_count(&mut self, id: RulesetId) {
        let count = self.bound_rule_count(id);
        if let Some(record) = self.rulesets.iter_mut().find(|r| r.id == id) {
            record.rule_count = count;
        }
    }
}
