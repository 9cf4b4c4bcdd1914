//! Domain layer: entities of the canonical catalog graph

pub mod entities;

pub use entities::{
    Constraint, ConstraintKind, CourseSet, CourseSetMode, Edge, Envelope, Graph, GroupLogic, Node,
    Provenance, RelationKind, RequirementNode, RequirementType,
};
