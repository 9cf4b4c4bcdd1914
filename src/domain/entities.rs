//! Domain entities: the canonical catalog graph

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A course node in the compiled graph.
///
/// `id` is the canonical compact course code (e.g. "CS246") and is never
/// empty for a materialized node. A node referenced by an edge but never
/// defined in the input becomes a stub with only `id` populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Canonical compact course code. Accepts "code" on input for
    /// envelopes produced by older normalizers.
    #[serde(alias = "code")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl Node {
    /// A node carrying only its id, materialized for dangling references.
    pub fn stub(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            credits: None,
            level: None,
            subject: None,
            description: None,
            source_url: None,
        }
    }
}

/// Directed relation between two courses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    Prereq,
    Coreq,
    Antireq,
}

/// How the members of one logic group combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupLogic {
    /// Every member of the group is independently required.
    All,
    /// At least one member satisfies the clause.
    Any,
}

/// One relation edge, `from_id -> to_id`.
///
/// Edges sharing a `group_id` form one logical clause and always share
/// `kind` and `logic`. `source_span` keeps the verbatim text the edge was
/// parsed from, for provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from_id: String,
    pub to_id: String,
    pub kind: RelationKind,
    pub group_id: String,
    pub logic: GroupLogic,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrent_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_grade: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_span: Option<String>,
}

impl Edge {
    /// Identity key used for exact-duplicate collapse and output ordering.
    pub fn dedup_key(&self) -> (String, String, RelationKind, String) {
        (
            self.from_id.clone(),
            self.to_id.clone(),
            self.kind,
            self.group_id.clone(),
        )
    }
}

/// Category of an enrollment-eligibility restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    Program,
    Standing,
    Faculty,
    Term,
    Consent,
}

/// Enrollment restriction attached to a course or program.
///
/// Not part of the prerequisite graph; consumed independently for
/// eligibility display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub target: String,
    pub kind: ConstraintKind,
    pub expr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseSetMode {
    #[default]
    Explicit,
    Selector,
}

/// A named, deduplicated collection of course codes.
///
/// `id_hint` is content-addressed over `(title, sorted courses)`:
/// re-deriving the set from the same members in any order yields the same
/// hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSet {
    pub id_hint: String,
    #[serde(default)]
    pub mode: CourseSetMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub courses: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequirementType {
    #[serde(rename = "ALL")]
    All,
    #[serde(rename = "ANY")]
    Any,
    #[serde(rename = "N_OF")]
    NOf,
    #[serde(rename = "CREDITS_AT_LEAST")]
    CreditsAtLeast,
    #[serde(rename = "NOT")]
    Not,
}

impl RequirementType {
    pub fn label(&self) -> &'static str {
        match self {
            RequirementType::All => "ALL",
            RequirementType::Any => "ANY",
            RequirementType::NOf => "N_OF",
            RequirementType::CreditsAtLeast => "CREDITS_AT_LEAST",
            RequirementType::Not => "NOT",
        }
    }
}

/// One node of the boolean/counting requirement tree.
///
/// Children are owned by the parent (a tree, never a cycle); `course_set`
/// refers to a [`CourseSet`] by `id_hint` without owning it. `id_hint`
/// assignment is deterministic over the node's preorder path and its
/// discriminating label, so unchanged input recompiles to identical ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementNode {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id_hint: String,
    #[serde(rename = "type")]
    pub node_type: RequirementType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(rename = "minCredits", skip_serializing_if = "Option::is_none")]
    pub min_credits: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RequirementNode>,
    #[serde(rename = "courseSet", skip_serializing_if = "Option::is_none")]
    pub course_set: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub explanations: Vec<String>,
}

impl RequirementNode {
    pub fn new(node_type: RequirementType) -> Self {
        Self {
            id_hint: String::new(),
            node_type,
            n: None,
            min_credits: None,
            children: Vec::new(),
            course_set: None,
            explanations: Vec::new(),
        }
    }
}

/// Provenance of one compiled record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Content hash of the raw scraped blob this envelope was derived from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// The per-record compiled output, also accepted as pass-through input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    pub courses: Vec<Node>,
    pub edges: Vec<Edge>,
    pub constraints: Vec<Constraint>,
    pub course_sets: Vec<CourseSet>,
    pub requirements: Vec<RequirementNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    /// Human-readable compiler notes: fallback parses, discarded conflict
    /// values, unmatched spans.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// The fully merged graph across all records of one compilation run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub constraints: Vec<Constraint>,
    pub course_sets: Vec<CourseSet>,
    pub requirements: Vec<RequirementNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl Graph {
    /// Index nodes by id, for consumers that join on course code.
    pub fn node_index(&self) -> BTreeMap<&str, &Node> {
        self.nodes.iter().map(|n| (n.id.as_str(), n)).collect()
    }
}
