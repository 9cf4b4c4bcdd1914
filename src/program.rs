//! Course-set and requirement-tree construction
//!
//! Turns a program record's term-by-term requirements and named course
//! lists into content-addressed [`CourseSet`]s and a hierarchical
//! [`RequirementNode`] tree with deterministic `id_hint` assignment.

use itertools::Itertools;
use tracing::{instrument, warn};

use crate::code::{canonicalize, CanonProfile};
use crate::domain::{CourseSet, CourseSetMode, RequirementNode, RequirementType};
use crate::hash::stable_id_hint;
use crate::record::{CourseEntry, ProgramRecord};

/// Explicit academic-term ordering. Never sort term labels lexically;
/// this table is the single source of order.
const TERM_ORDER: [&str; 8] = ["1A", "1B", "2A", "2B", "3A", "3B", "4A", "4B"];

fn term_rank(term: &str) -> usize {
    TERM_ORDER
        .iter()
        .position(|t| t.eq_ignore_ascii_case(term))
        .unwrap_or(TERM_ORDER.len())
}

/// Reduce a list title to an identifier-safe slug. Empty result means the
/// title is unusable and the list is dropped.
fn slugify(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Build a content-addressed course set from a title and member codes.
///
/// The hint hashes `(title, sorted codes)`, so member order in the source
/// never changes the identity.
pub fn build_course_set(title: &str, codes: &[String]) -> CourseSet {
    let sorted: Vec<String> = codes.iter().cloned().sorted().dedup().collect();
    let joined = sorted.join(",");
    CourseSet {
        id_hint: stable_id_hint(&[title, &joined]),
        mode: CourseSetMode::Explicit,
        title: Some(title.to_string()),
        courses: sorted,
    }
}

pub struct ProgramBuilder {
    profile: CanonProfile,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new(CanonProfile::Compact)
    }
}

/// Output of one program-record build: the sets plus the top-level
/// requirement nodes referencing them.
#[derive(Debug, Default)]
pub struct ProgramOutput {
    pub course_sets: Vec<CourseSet>,
    pub requirements: Vec<RequirementNode>,
}

impl ProgramBuilder {
    pub fn new(profile: CanonProfile) -> Self {
        Self { profile }
    }

    /// Compile one program record into course sets and requirement trees.
    ///
    /// Terms produce one ALL node per required subset and one ANY node per
    /// select-one subset, gathered under a single ALL root. Named lists
    /// produce one ANY node each (N_OF when the source states a count),
    /// kept as separate top-level requirements.
    #[instrument(level = "debug", skip(self, record))]
    pub fn build(&self, record: &ProgramRecord) -> ProgramOutput {
        let mut out = ProgramOutput::default();

        let mut term_children = Vec::new();
        let terms: Vec<&String> = record
            .required_by_term
            .keys()
            .sorted_by_key(|t| (term_rank(t), t.to_string()))
            .collect();

        for term in terms {
            let entries = &record.required_by_term[term];
            let (select_one, required): (Vec<&CourseEntry>, Vec<&CourseEntry>) =
                entries.iter().partition(|e| e.select_one);

            if let Some((set, node)) = self.term_subset(term, &required, false) {
                out.course_sets.push(set);
                term_children.push(node);
            }
            if let Some((set, node)) = self.term_subset(term, &select_one, true) {
                out.course_sets.push(set);
                term_children.push(node);
            }
        }

        if !term_children.is_empty() {
            let mut root = RequirementNode::new(RequirementType::All);
            root.children = term_children;
            root.explanations
                .push("Complete all required courses by term.".to_string());
            out.requirements.push(root);
        }

        for (list_key, payload) in &record.course_lists {
            let title = payload.list_name.as_deref().unwrap_or(list_key);
            if slugify(title).is_empty() {
                warn!("course list with unusable title dropped: {:?}", title);
                continue;
            }
            let codes = self.entry_codes(&payload.courses);
            if codes.is_empty() {
                continue;
            }
            let set = build_course_set(title, &codes);
            let mut node = match payload.choose {
                Some(n) => {
                    let mut node = RequirementNode::new(RequirementType::NOf);
                    node.n = Some(n);
                    node.explanations
                        .push(format!("Complete {} courses from {}.", n, title));
                    node
                }
                None => {
                    let mut node = RequirementNode::new(RequirementType::Any);
                    node.explanations
                        .push(format!("Complete courses from {}.", title));
                    node
                }
            };
            node.course_set = Some(set.id_hint.clone());
            out.course_sets.push(set);
            out.requirements.push(node);
        }

        assign_id_hints(&mut out.requirements);
        out
    }

    /// Build the (set, node) pair for one term subset, or None when the
    /// subset has no resolvable codes.
    fn term_subset(
        &self,
        term: &str,
        entries: &[&CourseEntry],
        select_one: bool,
    ) -> Option<(CourseSet, RequirementNode)> {
        let codes = self.entry_codes_ref(entries);
        if codes.is_empty() {
            return None;
        }
        let (title, node_type, explanation) = if select_one {
            (
                format!("Choose one {}", term),
                RequirementType::Any,
                format!("Select one course in term {}.", term),
            )
        } else {
            (
                format!("Required {}", term),
                RequirementType::All,
                format!("Required courses in term {}.", term),
            )
        };
        let set = build_course_set(&title, &codes);
        let mut node = RequirementNode::new(node_type);
        node.course_set = Some(set.id_hint.clone());
        node.explanations.push(explanation);
        Some((set, node))
    }

    fn entry_codes(&self, entries: &[CourseEntry]) -> Vec<String> {
        entries
            .iter()
            .filter_map(|e| self.entry_code(e))
            .unique()
            .collect()
    }

    fn entry_codes_ref(&self, entries: &[&CourseEntry]) -> Vec<String> {
        entries
            .iter()
            .filter_map(|e| self.entry_code(e))
            .unique()
            .collect()
    }

    /// Canonicalize an entry's code, falling back to the title when the
    /// code field is missing (scrapes often carry "CS 137 - Programming
    /// Principles" as the title only).
    fn entry_code(&self, entry: &CourseEntry) -> Option<String> {
        entry
            .code
            .as_deref()
            .and_then(|c| canonicalize(c, self.profile))
            .or_else(|| {
                entry
                    .title
                    .as_deref()
                    .and_then(|t| canonicalize(t, self.profile))
            })
    }
}

/// Assign `id_hint`s by preorder traversal.
///
/// The hint hashes the node's path prefix plus its discriminating label
/// (course-set reference if present, else the type tag). Nodes that
/// already carry a hint keep it; children recurse before siblings.
pub fn assign_id_hints(requirements: &mut [RequirementNode]) {
    for (i, node) in requirements.iter_mut().enumerate() {
        assign_node(node, &format!("req{}", i));
    }
}

fn assign_node(node: &mut RequirementNode, prefix: &str) {
    if node.id_hint.is_empty() {
        let label = node
            .course_set
            .clone()
            .unwrap_or_else(|| node.node_type.label().to_string());
        node.id_hint = stable_id_hint(&[prefix, &label]);
    }
    for (i, child) in node.children.iter_mut().enumerate() {
        assign_node(child, &format!("{}:{}", prefix, i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CourseEntry, ListPayload, ProgramRecord};
    use std::collections::BTreeMap;

    fn entry(code: &str) -> CourseEntry {
        CourseEntry {
            code: Some(code.to_string()),
            title: None,
            select_one: false,
        }
    }

    fn program_with_terms(terms: &[(&str, Vec<CourseEntry>)]) -> ProgramRecord {
        ProgramRecord {
            title: Some("Software Engineering".to_string()),
            required_by_term: terms
                .iter()
                .map(|(t, es)| (t.to_string(), es.clone()))
                .collect(),
            course_lists: BTreeMap::new(),
            source_url: None,
        }
    }

    #[test]
    fn test_terms_sorted_by_ordering_table_not_lexically() {
        let record = program_with_terms(&[
            ("2A", vec![entry("CS 241")]),
            ("1B", vec![entry("CS 138")]),
            ("1A", vec![entry("CS 137")]),
        ]);
        let out = ProgramBuilder::default().build(&record);
        let titles: Vec<_> = out
            .course_sets
            .iter()
            .filter_map(|cs| cs.title.clone())
            .collect();
        assert_eq!(titles, vec!["Required 1A", "Required 1B", "Required 2A"]);
    }

    #[test]
    fn test_select_one_entries_split_into_any_node() {
        let mut choose = entry("ECE105");
        choose.select_one = true;
        let mut choose2 = entry("PHYS115");
        choose2.select_one = true;
        let record = program_with_terms(&[("1A", vec![entry("CS137"), choose, choose2])]);

        let out = ProgramBuilder::default().build(&record);
        assert_eq!(out.course_sets.len(), 2);
        let root = &out.requirements[0];
        assert_eq!(root.node_type, RequirementType::All);
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].node_type, RequirementType::All);
        assert_eq!(root.children[1].node_type, RequirementType::Any);
    }

    #[test]
    fn test_course_set_id_hint_order_independent() {
        let a = build_course_set("Required 1A", &["SE101".into(), "CS137".into()]);
        let b = build_course_set("Required 1A", &["CS137".into(), "SE101".into()]);
        assert_eq!(a.id_hint, b.id_hint);
        assert_eq!(a.courses, b.courses);
    }

    #[test]
    fn test_list_with_choose_count_becomes_n_of() {
        let mut lists = BTreeMap::new();
        lists.insert(
            "te".to_string(),
            ListPayload {
                list_name: Some("Technical Electives".to_string()),
                courses: vec![entry("CS 486"), entry("CS 488")],
                choose: Some(2),
            },
        );
        let record = ProgramRecord {
            course_lists: lists,
            ..Default::default()
        };
        let out = ProgramBuilder::default().build(&record);
        assert_eq!(out.requirements.len(), 1);
        assert_eq!(out.requirements[0].node_type, RequirementType::NOf);
        assert_eq!(out.requirements[0].n, Some(2));
    }

    #[test]
    fn test_list_without_count_defaults_to_any() {
        let mut lists = BTreeMap::new();
        lists.insert(
            "Natural Science List".to_string(),
            ListPayload {
                list_name: None,
                courses: vec![entry("BIOL 110")],
                choose: None,
            },
        );
        let record = ProgramRecord {
            course_lists: lists,
            ..Default::default()
        };
        let out = ProgramBuilder::default().build(&record);
        assert_eq!(out.requirements[0].node_type, RequirementType::Any);
    }

    #[test]
    fn test_empty_term_dropped_silently() {
        let record = program_with_terms(&[("1A", vec![CourseEntry::default()])]);
        let out = ProgramBuilder::default().build(&record);
        assert!(out.course_sets.is_empty());
        assert!(out.requirements.is_empty());
    }

    #[test]
    fn test_unusable_list_title_dropped() {
        let mut lists = BTreeMap::new();
        lists.insert(
            "---".to_string(),
            ListPayload {
                list_name: None,
                courses: vec![entry("CS 135")],
                choose: None,
            },
        );
        let record = ProgramRecord {
            course_lists: lists,
            ..Default::default()
        };
        let out = ProgramBuilder::default().build(&record);
        assert!(out.course_sets.is_empty());
    }

    #[test]
    fn test_id_hints_deterministic_across_builds() {
        let record = program_with_terms(&[("1A", vec![entry("CS137"), entry("SE101")])]);
        let builder = ProgramBuilder::default();
        let a = builder.build(&record);
        let b = builder.build(&record);
        assert_eq!(a.requirements[0].id_hint, b.requirements[0].id_hint);
        assert_eq!(
            a.requirements[0].children[0].id_hint,
            b.requirements[0].children[0].id_hint
        );
        assert!(!a.requirements[0].id_hint.is_empty());
    }
}
