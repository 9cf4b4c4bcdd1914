//! Relation classification
//!
//! Decides whether a text span describes a prerequisite, corequisite, or
//! antirequisite relation, extracts the referenced course codes, and emits
//! edges grouped into logic clauses. Classification precedence is
//! ANTIREQ > COREQ > PREREQ: a span consumed as an exclusion or
//! corequisite is never reprocessed as a prerequisite.

use itertools::Itertools;
use regex::Regex;
use tracing::{debug, instrument};

use crate::code::{find_codes, CanonProfile};
use crate::domain::{Edge, GroupLogic, RelationKind};
use crate::hash::clause_hash;

/// Declared hint label accompanying a relation span in a source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelationHint {
    Prereq,
    Coreq,
    Exclusion,
    #[default]
    Unlabeled,
}

impl RelationHint {
    /// Map a source record's free-form kind label onto a hint.
    pub fn from_label(label: &str) -> Self {
        let l = label.to_lowercase();
        if l.contains("exclusion") || l.contains("antireq") {
            RelationHint::Exclusion
        } else if l.contains("coreq") {
            RelationHint::Coreq
        } else if l.contains("prereq") {
            RelationHint::Prereq
        } else {
            RelationHint::Unlabeled
        }
    }
}

pub struct RelationClassifier {
    profile: CanonProfile,
    any_anchor: Regex,
    stop_phrase: Regex,
    one_of: Regex,
    min_grade: Regex,
}

impl Default for RelationClassifier {
    fn default() -> Self {
        Self::new(CanonProfile::Compact)
    }
}

impl RelationClassifier {
    pub fn new(profile: CanonProfile) -> Self {
        Self {
            profile,
            any_anchor: Regex::new(r"(?i)must have completed at least 1 of the following:")
                .unwrap(),
            stop_phrase: Regex::new(
                r"(?i)must have completed|complete all of the following|enrolled in|students must be|not completed|no credit",
            )
            .unwrap(),
            one_of: Regex::new(r"(?i)^one\s+of\s+").unwrap(),
            min_grade: Regex::new(
                r"(?is)(?:minimum|at least)\s*(\d{2})\s*%.*?(?:each|all)?\s*(?:of the following|in)",
            )
            .unwrap(),
        }
    }

    /// Classify one relation span and emit its edges.
    ///
    /// `owner` is the canonical id of the course the span belongs to;
    /// it is excluded from the extracted codes so a course never depends
    /// on itself. A span yielding no codes after self-exclusion produces
    /// no edges.
    #[instrument(level = "debug", skip(self, span))]
    pub fn classify_span(&self, owner: &str, hint: RelationHint, span: &str) -> Vec<Edge> {
        if span.trim().is_empty() {
            return Vec::new();
        }
        let text_lower = span.to_lowercase();

        // --- ANTIREQ ---
        if hint == RelationHint::Exclusion
            || text_lower.contains("not completed")
            || text_lower.contains("no credit")
        {
            return self.group_edges(
                owner,
                span,
                RelationKind::Antireq,
                GroupLogic::Any,
                "antireq",
                None,
                None,
            );
        }

        // --- COREQ ---
        if hint == RelationHint::Coreq
            || (text_lower.contains("concurrently enrolled") && !text_lower.contains("not completed"))
        {
            return self.group_edges(
                owner,
                span,
                RelationKind::Coreq,
                GroupLogic::Any,
                "coreq",
                Some(true),
                None,
            );
        }

        // --- PREREQ ---
        let mut edges = self.any_clause_edges(owner, span);
        edges.extend(self.min_grade_edges(owner, span));

        // No anchor phrasing matched: fall back to free-text prerequisite
        // parsing over semicolon-separated clauses.
        if edges.is_empty() {
            edges = self.parse_prereq_text(owner, span);
        }

        edges
    }

    /// Isolate "must have completed at least 1 of the following:" clauses.
    ///
    /// Each clause runs from the anchor to the next stop-phrase (or end of
    /// string) and yields one ANY group in the caller.
    pub fn split_any_clauses(&self, text: &str) -> Vec<String> {
        let mut clauses = Vec::new();
        let parts: Vec<&str> = self.any_anchor.split(text).collect();
        for part in parts.iter().skip(1) {
            let clause = match self.stop_phrase.find(part) {
                Some(m) => &part[..m.start()],
                None => part,
            };
            if !clause.trim().is_empty() {
                clauses.push(clause.trim().to_string());
            }
        }
        clauses
    }

    /// Emit one PREREQ ANY group per isolated
    /// "must have completed at least 1 of the following:" clause.
    pub fn any_clause_edges(&self, owner: &str, text: &str) -> Vec<Edge> {
        self.split_any_clauses(text)
            .iter()
            .flat_map(|clause| {
                self.group_edges(
                    owner,
                    clause,
                    RelationKind::Prereq,
                    GroupLogic::Any,
                    "pr_any",
                    None,
                    None,
                )
            })
            .collect()
    }

    /// Extract "minimum/at least NN% ... of the following" grade clauses.
    ///
    /// Emits one ALL group carrying the grade threshold; members must be
    /// completed beforehand, so `concurrent_ok` is false.
    pub fn min_grade_edges(&self, owner: &str, text: &str) -> Vec<Edge> {
        let Some(caps) = self.min_grade.captures(text) else {
            return Vec::new();
        };
        let grade: u32 = match caps[1].parse() {
            Ok(g) => g,
            Err(_) => return Vec::new(),
        };
        self.group_edges(
            owner,
            text,
            RelationKind::Prereq,
            GroupLogic::All,
            "pr_all",
            Some(false),
            Some(grade),
        )
    }

    /// Free-text prerequisite parsing over semicolon-separated clauses.
    ///
    /// "One of A, B" and "A or B" clauses become ANY groups; anything else
    /// becomes an ALL group (every code in the clause required). A clause
    /// that names the owning course itself is skipped whole, not trimmed
    /// down to its other codes.
    #[instrument(level = "debug", skip(self, text))]
    pub fn parse_prereq_text(&self, owner: &str, text: &str) -> Vec<Edge> {
        let mut edges = Vec::new();
        for clause in text.split(';') {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }
            if find_codes(clause, self.profile).iter().any(|c| c == owner) {
                debug!("prereq clause naming the owning course skipped");
                continue;
            }
            let clause_lower = clause.to_lowercase();
            let (tag, logic) = if self.one_of.is_match(clause) || clause_lower.contains(" or ") {
                ("pr_any", GroupLogic::Any)
            } else {
                ("pr_all", GroupLogic::All)
            };
            edges.extend(self.group_edges(
                owner,
                clause,
                RelationKind::Prereq,
                logic,
                tag,
                None,
                None,
            ));
        }
        edges
    }

    /// Build one logic group of edges from a clause.
    ///
    /// The group id is `{owner}_{tag}_{hash}` where the hash is a stable
    /// content hash of the clause text, so identical input reproduces
    /// identical group ids across runs and processes.
    #[allow(clippy::too_many_arguments)]
    fn group_edges(
        &self,
        owner: &str,
        clause: &str,
        kind: RelationKind,
        logic: GroupLogic,
        tag: &str,
        concurrent_ok: Option<bool>,
        min_grade: Option<u32>,
    ) -> Vec<Edge> {
        let codes: Vec<String> = find_codes(clause, self.profile)
            .into_iter()
            .filter(|c| c != owner)
            .unique()
            .collect();
        if codes.is_empty() {
            debug!("clause yielded no codes after self-exclusion, dropped");
            return Vec::new();
        }
        let group_id = format!("{}_{}_{}", owner, tag, clause_hash(clause));
        codes
            .into_iter()
            .map(|code| Edge {
                from_id: code,
                to_id: owner.to_string(),
                kind,
                group_id: group_id.clone(),
                logic,
                k: None,
                concurrent_ok,
                min_grade,
                source_span: Some(clause.trim().to_string()),
            })
            .collect()
    }
}
