//! Enrollment-constraint extraction
//!
//! Detects program/standing/faculty/consent eligibility clauses in
//! enrollment-restriction payloads. These payloads frequently embed
//! course-based prerequisite clauses as well, so the relation classifier's
//! ANY-clause splitter and grade extractor run over the same strings: a
//! single value may legitimately produce both a constraint and edges.

use regex::Regex;
use tracing::instrument;

use crate::domain::{Constraint, ConstraintKind, Edge};
use crate::relations::RelationClassifier;

pub struct ConstraintExtractor {
    program_keywords: Regex,
    standing: Regex,
    faculty: Regex,
    consent: Regex,
}

impl Default for ConstraintExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintExtractor {
    pub fn new() -> Self {
        Self {
            program_keywords: Regex::new(
                r"(?i)\bH-Software Engineering|Honours|Computer Science|Data Science|BBA & BCS",
            )
            .unwrap(),
            standing: Regex::new(r"(?i)(?:level\s*)?\b([1-4][AB])\b").unwrap(),
            faculty: Regex::new(r"(?i)Faculty of \w+").unwrap(),
            consent: Regex::new(r"(?i)consent of (?:the )?(?:instructor|department)").unwrap(),
        }
    }

    /// Extract constraints and embedded prerequisite edges from one
    /// enrollment-restriction value string.
    #[instrument(level = "debug", skip(self, classifier, value))]
    pub fn extract(
        &self,
        target: &str,
        value: &str,
        classifier: &RelationClassifier,
    ) -> (Vec<Constraint>, Vec<Edge>) {
        let mut constraints = Vec::new();

        if let Some(m) = self.program_keywords.find(value) {
            constraints.push(Constraint {
                target: target.to_string(),
                kind: ConstraintKind::Program,
                expr: m.as_str().to_string(),
            });
        }

        if let Some(caps) = self.standing.captures(value) {
            constraints.push(Constraint {
                target: target.to_string(),
                kind: ConstraintKind::Standing,
                expr: caps[0].trim().to_string(),
            });
        }

        if let Some(m) = self.faculty.find(value) {
            constraints.push(Constraint {
                target: target.to_string(),
                kind: ConstraintKind::Faculty,
                expr: m.as_str().to_string(),
            });
        }

        if let Some(m) = self.consent.find(value) {
            constraints.push(Constraint {
                target: target.to_string(),
                kind: ConstraintKind::Consent,
                expr: m.as_str().to_string(),
            });
        }

        // Course-based clauses hiding inside constraint payloads produce
        // PREREQ edges, not constraints.
        let mut edges = classifier.any_clause_edges(target, value);
        edges.extend(classifier.min_grade_edges(target, value));

        (constraints, edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GroupLogic;

    fn fixtures() -> (ConstraintExtractor, RelationClassifier) {
        (ConstraintExtractor::new(), RelationClassifier::default())
    }

    #[test]
    fn test_program_constraint() {
        let (ex, cl) = fixtures();
        let (constraints, edges) =
            ex.extract("CS246", "Enrolled in H-Software Engineering", &cl);
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].kind, ConstraintKind::Program);
        assert!(edges.is_empty());
    }

    #[test]
    fn test_standing_constraint() {
        let (ex, cl) = fixtures();
        let (constraints, _) = ex.extract("SE390", "Students must be level 3A or above", &cl);
        assert!(constraints
            .iter()
            .any(|c| c.kind == ConstraintKind::Standing && c.expr.contains("3A")));
    }

    #[test]
    fn test_consent_constraint() {
        let (ex, cl) = fixtures();
        let (constraints, _) = ex.extract("CS499", "Consent of the instructor required", &cl);
        assert!(constraints.iter().any(|c| c.kind == ConstraintKind::Consent));
    }

    #[test]
    fn test_embedded_prereq_clause_yields_edges_and_constraint() {
        let (ex, cl) = fixtures();
        let value = "Enrolled in Honours Computer Science. \
                     Must have completed at least 1 of the following: CS240, CS240E";
        let (constraints, edges) = ex.extract("CS341", value, &cl);
        assert!(constraints.iter().any(|c| c.kind == ConstraintKind::Program));
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.logic == GroupLogic::Any));
        assert_eq!(edges[0].group_id, edges[1].group_id);
    }

    #[test]
    fn test_plain_text_yields_nothing() {
        let (ex, cl) = fixtures();
        let (constraints, edges) = ex.extract("CS135", "Open to all students", &cl);
        assert!(constraints.is_empty());
        assert!(edges.is_empty());
    }
}
