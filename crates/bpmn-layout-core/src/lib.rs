//! BPMN Layout Core Types
//!
//! This crate provides the foundational types shared by the BPMN layout
//! engine and its command-line front end:
//!
//! - **Identifiers**: String-interned element identifiers ([`identifier::Id`])
//! - **Geometry**: Points, sizes, bounding boxes and segment predicates ([`geometry`] module)

pub mod geometry;
pub mod identifier;
