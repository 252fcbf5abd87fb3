use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use bpmn_layout_core::geometry::{Bounds, Point};

use super::{DiagramModel, ElementRecord};

/// In-memory BPMN definitions: a flat element list in declaration order.
///
/// # Examples
///
/// ```
/// use bpmn_layout::model::{Definitions, DiagramModel, ElementRecord};
///
/// let mut definitions = Definitions::new();
/// definitions.add(ElementRecord::shape("Process_1", "bpmn:Process", None));
/// definitions.add(ElementRecord::shape("Start", "bpmn:StartEvent", Some("Process_1")));
/// assert_eq!(definitions.elements().len(), 2);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definitions {
    elements: Vec<ElementRecord>,

    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Definitions {
    /// Creates empty definitions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses definitions from their JSON representation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut definitions: Definitions = serde_json::from_str(json)?;
        definitions.rebuild_index();
        Ok(definitions)
    }

    /// Serializes the definitions, including any geometry written by a layout run.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Appends an element. A later element with the same id shadows the earlier one
    /// for geometry writes.
    pub fn add(&mut self, element: ElementRecord) -> &mut Self {
        self.index.insert(element.id.clone(), self.elements.len());
        self.elements.push(element);
        self
    }

    /// Returns the element with the given id.
    pub fn get(&self, id: &str) -> Option<&ElementRecord> {
        match self.index.get(id) {
            Some(&idx) => self.elements.get(idx),
            None => self.elements.iter().find(|element| element.id == id),
        }
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .elements
            .iter()
            .enumerate()
            .map(|(idx, element)| (element.id.clone(), idx))
            .collect();
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut ElementRecord> {
        if self.index.len() != self.elements.len() {
            self.rebuild_index();
        }
        let idx = *self.index.get(id)?;
        self.elements.get_mut(idx)
    }
}

impl DiagramModel for Definitions {
    fn elements(&self) -> Vec<ElementRecord> {
        self.elements.clone()
    }

    fn set_shape_bounds(&mut self, id: &str, bounds: Bounds) {
        match self.get_mut(id) {
            Some(element) => element.bounds = Some(bounds),
            None => warn!(id; "Cannot set bounds of unknown element"),
        }
    }

    fn set_waypoints(&mut self, id: &str, waypoints: &[Point]) {
        match self.get_mut(id) {
            Some(element) => element.waypoints = waypoints.to_vec(),
            None => warn!(id; "Cannot set waypoints of unknown element"),
        }
    }

    fn set_label_bounds(&mut self, id: &str, bounds: Bounds) {
        match self.get_mut(id) {
            Some(element) => element.label_bounds = Some(bounds),
            None => warn!(id; "Cannot set label bounds of unknown element"),
        }
    }
}

#[cfg(test)]
mod tests {
    use bpmn_layout_core::geometry::Size;

    use super::*;

    #[test]
    fn test_json_roundtrip_keeps_declaration_order() {
        let json = r#"{
            "elements": [
                {"id": "Process_1", "type": "bpmn:Process"},
                {"id": "Start", "type": "bpmn:StartEvent", "parent": "Process_1"},
                {"id": "Task", "type": "bpmn:Task", "parent": "Process_1",
                 "bounds": {"x": 10, "y": 20, "width": 100, "height": 80}},
                {"id": "Flow", "type": "bpmn:SequenceFlow", "source": "Start", "target": "Task",
                 "condition": "ok"}
            ]
        }"#;

        let definitions = Definitions::from_json(json).expect("valid json");
        let ids: Vec<_> = definitions
            .elements()
            .into_iter()
            .map(|element| element.id)
            .collect();
        assert_eq!(ids, ["Process_1", "Start", "Task", "Flow"]);

        let task = definitions.get("Task").expect("task exists");
        assert_eq!(task.bounds.map(|b| b.width()), Some(100.0));
        assert_eq!(
            definitions.get("Flow").and_then(|f| f.condition.clone()),
            Some("ok".to_string())
        );
    }

    #[test]
    fn test_geometry_writes() {
        let mut definitions = Definitions::new();
        definitions.add(ElementRecord::shape("Task", "bpmn:Task", None));
        definitions.add(ElementRecord::connection(
            "Flow",
            "bpmn:SequenceFlow",
            "Task",
            "Task",
        ));

        let bounds = Bounds::new_from_top_left(Point::new(1.0, 2.0), Size::new(100.0, 80.0));
        definitions.set_shape_bounds("Task", bounds);
        definitions.set_waypoints("Flow", &[Point::new(0.0, 0.0), Point::new(5.0, 0.0)]);
        definitions.set_shape_bounds("Missing", bounds);

        assert_eq!(definitions.get("Task").and_then(|t| t.bounds), Some(bounds));
        assert_eq!(definitions.get("Flow").map(|f| f.waypoints.len()), Some(2));
    }
}
