//! The BPMN model collaborator.
//!
//! The layout engine never owns the BPMN object model. It reads a snapshot of
//! the element tree through [`DiagramModel::elements`] and writes geometry back
//! through the setter methods once the pipeline has finished.
//!
//! [`Definitions`] is an in-memory implementation backed by a flat element list,
//! used by the command-line tool and by tests.

mod definitions;

pub use definitions::Definitions;

use serde::{Deserialize, Serialize};

use bpmn_layout_core::geometry::{Bounds, Point};

/// Read/write access to a BPMN diagram.
///
/// Implementations must return elements in declaration order; several
/// tie-breaks (first-wins lane ownership, first conditioned branch) depend on it.
pub trait DiagramModel {
    /// Returns a snapshot of every element in declaration order.
    fn elements(&self) -> Vec<ElementRecord>;

    /// Sets the DI bounds of a shape.
    fn set_shape_bounds(&mut self, id: &str, bounds: Bounds);

    /// Sets the DI waypoints of a connection.
    fn set_waypoints(&mut self, id: &str, waypoints: &[Point]);

    /// Sets the bounds of the external label of a shape or connection.
    fn set_label_bounds(&mut self, id: &str, bounds: Bounds);
}

/// One element of the BPMN element tree as seen by the layout engine.
///
/// Shapes, connections and containers share this record; fields that do not
/// apply to an element type stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRecord {
    /// Element id, unique within the definitions.
    pub id: String,

    /// BPMN type name, e.g. `bpmn:UserTask`.
    #[serde(rename = "type")]
    pub element_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Semantic parent: process, subprocess, participant or parent lane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Source element of a connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Target element of a connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Host activity of a boundary event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_to: Option<String>,

    /// Default outgoing flow of a gateway or activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Condition expression of a sequence flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Flow nodes assigned to a lane.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow_node_refs: Vec<String>,

    /// Process referenced by a participant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_ref: Option<String>,

    /// Existing DI shape bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,

    /// Existing DI waypoints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waypoints: Vec<Point>,

    /// Existing DI label bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_bounds: Option<Bounds>,
}

impl ElementRecord {
    /// Creates a shape-like element (flow node, container or artifact).
    pub fn shape(id: &str, element_type: &str, parent: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            element_type: element_type.to_string(),
            parent: parent.map(str::to_string),
            ..Default::default()
        }
    }

    /// Creates a connection between two elements.
    pub fn connection(id: &str, element_type: &str, source: &str, target: &str) -> Self {
        Self {
            id: id.to_string(),
            element_type: element_type.to_string(),
            source: Some(source.to_string()),
            target: Some(target.to_string()),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_condition(mut self, condition: &str) -> Self {
        self.condition = Some(condition.to_string());
        self
    }

    pub fn with_default(mut self, flow: &str) -> Self {
        self.default = Some(flow.to_string());
        self
    }

    pub fn with_attached_to(mut self, host: &str) -> Self {
        self.attached_to = Some(host.to_string());
        self
    }

    pub fn with_process_ref(mut self, process: &str) -> Self {
        self.process_ref = Some(process.to_string());
        self
    }

    pub fn with_flow_node_refs(mut self, refs: &[&str]) -> Self {
        self.flow_node_refs = refs.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Returns true for sequence, message and association connections.
    pub fn is_connection(&self) -> bool {
        self.source.is_some() || self.target.is_some()
    }
}
