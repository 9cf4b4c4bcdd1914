//! Multi-source merge/dedup engine
//!
//! Combines per-record partial outputs into one canonical graph. Records
//! may describe the same course or list from different sources with
//! differing completeness or minor contradictions; conflicts resolve by a
//! fixed policy, never by arrival order. Partials carry the ordinal of
//! the record they came from and are folded in ordinal order, so the
//! merged result is a pure function of the input sequence no matter how
//! workers interleave.

use itertools::Itertools;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::code::{canonicalize, subject_and_level, CanonProfile};
use crate::domain::{
    Constraint, CourseSet, Edge, Envelope, Graph, Node, RelationKind, RequirementNode,
};

/// One record's compiled output, tagged with its position in the input.
#[derive(Debug, Clone)]
pub struct PartialGraph {
    pub ordinal: usize,
    pub envelope: Envelope,
}

/// Generic "obscure"/uninformative credit default; a more specific
/// conflicting value wins over it.
const GENERIC_CREDITS: f64 = 0.5;

#[derive(Debug, Default)]
struct Accumulator {
    nodes: BTreeMap<String, Node>,
    edges: BTreeMap<(String, String, RelationKind, String), Edge>,
    constraints: Vec<Constraint>,
    course_sets: BTreeMap<String, CourseSet>,
    requirements: Vec<RequirementNode>,
    requirement_index: BTreeMap<String, usize>,
    notes: Vec<String>,
}

/// Merge all partial graphs into the final canonical graph.
///
/// Folding is commutative over worker interleaving because partials are
/// sorted by ordinal first; within the fold every policy is
/// deterministic (first-in-input-order wins where the spec says "first").
#[instrument(level = "info", skip(partials))]
pub fn merge_partials(mut partials: Vec<PartialGraph>) -> Graph {
    partials.sort_by_key(|p| p.ordinal);

    let mut acc = Accumulator::default();
    for partial in partials {
        fold_envelope(&mut acc, partial.envelope);
    }
    finalize(acc)
}

fn fold_envelope(acc: &mut Accumulator, envelope: Envelope) {
    for node in envelope.courses {
        fold_node(acc, node);
    }
    for edge in envelope.edges {
        fold_edge(acc, edge);
    }
    for constraint in envelope.constraints {
        if !acc.constraints.contains(&constraint) {
            acc.constraints.push(constraint);
        }
    }
    for mut set in envelope.course_sets {
        // Members join on the same canonical key as nodes and edge
        // endpoints; pass-through envelopes may carry spaced spellings.
        set.courses = set
            .courses
            .iter()
            .map(|c| merge_key(c))
            .filter(|c| !c.is_empty())
            .sorted()
            .dedup()
            .collect();
        // First writer wins; later duplicates discarded without error.
        acc.course_sets.entry(set.id_hint.clone()).or_insert(set);
    }
    for requirement in envelope.requirements {
        fold_requirement(acc, requirement);
    }
    acc.notes.extend(envelope.notes);
}

/// Canonical merge key for a node or edge endpoint. Pass-through
/// envelopes may carry spaced codes ("CS 137"); the merge stage joins on
/// the compact form so both spellings land on one node.
fn merge_key(id: &str) -> String {
    canonicalize(id, CanonProfile::Compact).unwrap_or_else(|| id.trim().to_string())
}

fn fold_node(acc: &mut Accumulator, mut node: Node) {
    node.id = merge_key(&node.id);
    if node.id.is_empty() {
        debug!("node with empty id dropped");
        return;
    }
    // Derive subject/level from the code when the source left them out.
    if node.subject.is_none() || node.level.is_none() {
        let (subject, level) = subject_and_level(&node.id);
        if node.subject.is_none() && !subject.is_empty() {
            node.subject = Some(subject);
        }
        if node.level.is_none() && level > 0 {
            node.level = Some(level);
        }
    }

    match acc.nodes.remove(&node.id) {
        None => {
            acc.nodes.insert(node.id.clone(), node);
        }
        Some(existing) => {
            let merged = merge_node(existing, node, &mut acc.notes);
            acc.nodes.insert(merged.id.clone(), merged);
        }
    }
}

/// Field-wise conflict resolution for two descriptions of one course.
fn merge_node(mut current: Node, incoming: Node, notes: &mut Vec<String>) -> Node {
    fn keep_first(current: &mut Option<String>, incoming: Option<String>) {
        if current.as_deref().map_or(true, |s| s.is_empty()) {
            if let Some(v) = incoming.filter(|s| !s.is_empty()) {
                *current = Some(v);
            }
        }
    }
    keep_first(&mut current.title, incoming.title);
    keep_first(&mut current.description, incoming.description);
    keep_first(&mut current.subject, incoming.subject);
    keep_first(&mut current.source_url, incoming.source_url);
    if current.level.is_none() {
        current.level = incoming.level;
    }

    current.credits = match (current.credits, incoming.credits) {
        (None, c) | (c, None) => c,
        (Some(cur), Some(new)) if cur == new => Some(cur),
        // Zero is overridden by any non-zero value.
        (Some(cur), Some(new)) if cur == 0.0 && new > 0.0 => Some(new),
        (Some(cur), Some(new)) if new == 0.0 => Some(cur),
        // Between conflicting non-zero values, the one that is not the
        // generic 0.5 default is the more specific signal.
        (Some(cur), Some(new)) if cur == GENERIC_CREDITS && new != GENERIC_CREDITS => {
            notes.push(format!(
                "{}: credits {} discarded in favour of {}",
                current.id, cur, new
            ));
            Some(new)
        }
        (Some(cur), Some(new)) => {
            notes.push(format!(
                "{}: conflicting credits {} kept, {} discarded",
                current.id, cur, new
            ));
            Some(cur)
        }
    };
    current
}

fn fold_edge(acc: &mut Accumulator, mut edge: Edge) {
    edge.from_id = merge_key(&edge.from_id);
    edge.to_id = merge_key(&edge.to_id);
    if edge.from_id.is_empty() || edge.to_id.is_empty() || edge.from_id == edge.to_id {
        debug!("degenerate edge dropped: {:?} -> {:?}", edge.from_id, edge.to_id);
        return;
    }
    // Exact duplicates across sources are expected and harmless;
    // collapsing them keeps the output byte-stable.
    acc.edges.entry(edge.dedup_key()).or_insert(edge);
}

fn fold_requirement(acc: &mut Accumulator, requirement: RequirementNode) {
    let key = requirement.id_hint.clone();
    if key.is_empty() {
        acc.requirements.push(requirement);
        return;
    }
    match acc.requirement_index.get(&key) {
        Some(&idx) => merge_requirement(&mut acc.requirements[idx], requirement),
        None => {
            acc.requirement_index
                .insert(key, acc.requirements.len());
            acc.requirements.push(requirement);
        }
    }
}

/// Recursive dedup of requirement trees: the first writer's fields win,
/// children are merged by id rather than overwritten wholesale.
fn merge_requirement(existing: &mut RequirementNode, incoming: RequirementNode) {
    for child in incoming.children {
        let merged_into = existing
            .children
            .iter()
            .position(|c| !child.id_hint.is_empty() && c.id_hint == child.id_hint);
        match merged_into {
            Some(idx) => merge_requirement(&mut existing.children[idx], child),
            None => existing.children.push(child),
        }
    }
    for explanation in incoming.explanations {
        if !existing.explanations.contains(&explanation) {
            existing.explanations.push(explanation);
        }
    }
}

/// Post-merge invariant enforcement: stub materialization, the seminar
/// credit rule, and stable output ordering.
fn finalize(mut acc: Accumulator) -> Graph {
    // Every edge endpoint must resolve to a node; a reference to a course
    // outside the compiled record set becomes a stub, never an error.
    let endpoint_ids: Vec<String> = acc
        .edges
        .values()
        .flat_map(|e| [e.from_id.clone(), e.to_id.clone()])
        .unique()
        .collect();
    for id in endpoint_ids {
        acc.nodes.entry(id.clone()).or_insert_with(|| Node::stub(id));
    }

    // Seminars are zero-credit by definition in this catalog, regardless
    // of any credit value a source reported. Applied after all folding so
    // the rule holds independent of merge order.
    for node in acc.nodes.values_mut() {
        let is_seminar = node
            .title
            .as_deref()
            .map(|t| t.to_lowercase().contains("seminar"))
            .unwrap_or(false);
        if is_seminar {
            node.credits = Some(0.0);
        }
    }

    let mut constraints = acc.constraints;
    constraints.sort_by(|a, b| {
        (&a.target, &a.kind, &a.expr).cmp(&(&b.target, &b.kind, &b.expr))
    });

    Graph {
        nodes: acc.nodes.into_values().collect(),
        edges: acc.edges.into_values().collect(),
        constraints,
        course_sets: acc.course_sets.into_values().collect(),
        requirements: acc.requirements,
        notes: acc.notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GroupLogic, RelationKind};

    fn course(id: &str, title: Option<&str>, credits: Option<f64>) -> Node {
        Node {
            title: title.map(String::from),
            credits,
            ..Node::stub(id)
        }
    }

    fn partial(ordinal: usize, envelope: Envelope) -> PartialGraph {
        PartialGraph { ordinal, envelope }
    }

    fn edge(from: &str, to: &str) -> Edge {
        Edge {
            from_id: from.to_string(),
            to_id: to.to_string(),
            kind: RelationKind::Prereq,
            group_id: format!("{}_pr_all_deadbeef", to),
            logic: GroupLogic::All,
            k: None,
            concurrent_ok: None,
            min_grade: None,
            source_span: None,
        }
    }

    #[test]
    fn test_first_nonempty_title_wins() {
        let a = Envelope {
            courses: vec![course("CS137", None, None)],
            ..Default::default()
        };
        let b = Envelope {
            courses: vec![course("CS137", Some("Programming Principles"), None)],
            ..Default::default()
        };
        let c = Envelope {
            courses: vec![course("CS137", Some("Some Other Title"), None)],
            ..Default::default()
        };
        let graph = merge_partials(vec![partial(0, a), partial(1, b), partial(2, c)]);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].title.as_deref(), Some("Programming Principles"));
    }

    #[test]
    fn test_specific_credits_beat_generic_half() {
        let a = Envelope {
            courses: vec![course("ECE192", Some("Engineering Economics"), Some(0.5))],
            ..Default::default()
        };
        let b = Envelope {
            courses: vec![course("ECE192", None, Some(0.25))],
            ..Default::default()
        };
        let graph = merge_partials(vec![partial(0, a), partial(1, b)]);
        assert_eq!(graph.nodes[0].credits, Some(0.25));
    }

    #[test]
    fn test_nonzero_credits_override_zero() {
        let a = Envelope {
            courses: vec![course("CS240", None, Some(0.0))],
            ..Default::default()
        };
        let b = Envelope {
            courses: vec![course("CS240", None, Some(0.5))],
            ..Default::default()
        };
        let graph = merge_partials(vec![partial(0, a), partial(1, b)]);
        assert_eq!(graph.nodes[0].credits, Some(0.5));
    }

    #[test]
    fn test_seminar_forced_to_zero_credits() {
        let env = Envelope {
            courses: vec![course("SE101", Some("Introduction to Methods of Software Engineering (Seminar)"), Some(0.5))],
            ..Default::default()
        };
        let graph = merge_partials(vec![partial(0, env)]);
        assert_eq!(graph.nodes[0].credits, Some(0.0));
    }

    #[test]
    fn test_stub_created_for_dangling_endpoint() {
        let env = Envelope {
            courses: vec![course("CS241", Some("Foundations"), None)],
            edges: vec![edge("CS251", "CS241")],
            ..Default::default()
        };
        let graph = merge_partials(vec![partial(0, env)]);
        let stub = graph.nodes.iter().find(|n| n.id == "CS251").unwrap();
        assert!(stub.title.is_none());
        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn test_self_loop_dropped() {
        let env = Envelope {
            edges: vec![edge("CS241", "CS241")],
            ..Default::default()
        };
        let graph = merge_partials(vec![partial(0, env)]);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_spaced_and_compact_codes_merge_to_one_node() {
        let a = Envelope {
            courses: vec![course("CS 137", Some("Programming Principles"), None)],
            ..Default::default()
        };
        let b = Envelope {
            courses: vec![course("CS137", None, Some(0.5))],
            ..Default::default()
        };
        let graph = merge_partials(vec![partial(0, a), partial(1, b)]);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].id, "CS137");
        assert_eq!(graph.nodes[0].credits, Some(0.5));
    }

    #[test]
    fn test_course_set_members_join_on_compact_form() {
        // A pass-through envelope carries spaced spellings; the merged
        // set's members land on the same canonical key as the node.
        let env = Envelope {
            courses: vec![course("CS 137", Some("Programming Principles"), None)],
            course_sets: vec![CourseSet {
                id_hint: "abc123def0".to_string(),
                mode: Default::default(),
                title: Some("Required 1A".to_string()),
                courses: vec!["CS 137".to_string(), "SE 101".to_string(), "SE101".to_string()],
            }],
            ..Default::default()
        };
        let graph = merge_partials(vec![partial(0, env)]);
        assert_eq!(graph.nodes[0].id, "CS137");
        assert_eq!(graph.course_sets[0].courses, vec!["CS137", "SE101"]);
    }

    #[test]
    fn test_exact_duplicate_edges_collapsed() {
        let env = || Envelope {
            edges: vec![edge("CS240", "CS341")],
            ..Default::default()
        };
        let graph = merge_partials(vec![partial(0, env()), partial(1, env())]);
        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn test_course_set_first_writer_wins() {
        let set = |title: &str| CourseSet {
            id_hint: "abc123def0".to_string(),
            mode: Default::default(),
            title: Some(title.to_string()),
            courses: vec!["CS137".to_string()],
        };
        let a = Envelope {
            course_sets: vec![set("Required 1A")],
            ..Default::default()
        };
        let b = Envelope {
            course_sets: vec![set("Required 1A (dup)")],
            ..Default::default()
        };
        let graph = merge_partials(vec![partial(0, a), partial(1, b)]);
        assert_eq!(graph.course_sets.len(), 1);
        assert_eq!(graph.course_sets[0].title.as_deref(), Some("Required 1A"));
    }

    #[test]
    fn test_requirement_children_merged_recursively() {
        let child = |hint: &str| {
            let mut n = RequirementNode::new(crate::domain::RequirementType::All);
            n.id_hint = hint.to_string();
            n
        };
        let mut root_a = child("root");
        root_a.children = vec![child("c1")];
        let mut root_b = child("root");
        root_b.children = vec![child("c1"), child("c2")];

        let a = Envelope {
            requirements: vec![root_a],
            ..Default::default()
        };
        let b = Envelope {
            requirements: vec![root_b],
            ..Default::default()
        };
        let graph = merge_partials(vec![partial(0, a), partial(1, b)]);
        assert_eq!(graph.requirements.len(), 1);
        assert_eq!(graph.requirements[0].children.len(), 2);
    }

    #[test]
    fn test_merge_independent_of_partial_arrival_order() {
        let a = Envelope {
            courses: vec![course("ECE192", Some("Engineering Economics"), Some(0.5))],
            ..Default::default()
        };
        let b = Envelope {
            courses: vec![course("ECE192", None, Some(0.25))],
            ..Default::default()
        };
        let forward = merge_partials(vec![partial(0, a.clone()), partial(1, b.clone())]);
        let reversed = merge_partials(vec![partial(1, b), partial(0, a)]);
        assert_eq!(forward, reversed);
    }
}
