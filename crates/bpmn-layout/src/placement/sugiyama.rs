use std::any::Any;

use log::debug;
use rust_sugiyama::configure::Config;

use bpmn_layout_core::geometry::Point;

use super::{LayeredSolver, SolvedComponent, SolverInput};
use crate::error::LayoutSolverError;

/// Layered solver backed by the `rust-sugiyama` crate.
///
/// The crate lays out each weakly connected component separately and may panic
/// on inputs it does not support; panics are caught and reported as
/// [`LayoutSolverError::Panicked`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SugiyamaSolver;

impl LayeredSolver for SugiyamaSolver {
    fn name(&self) -> &'static str {
        "rust-sugiyama"
    }

    fn solve(&self, input: &SolverInput) -> Result<Vec<SolvedComponent>, LayoutSolverError> {
        let mut edges: Vec<(u32, u32)> = Vec::with_capacity(input.edges().len());
        for edge in input.edges() {
            // Skip self-loops and parallel edges
            if edge.source != edge.target && !edges.contains(&(edge.source, edge.target)) {
                edges.push((edge.source, edge.target));
            }
        }
        if edges.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            nodes = input.node_count(),
            edges = edges.len();
            "Applying Sugiyama algorithm"
        );

        let layouts = std::panic::catch_unwind(move || {
            let config = Config {
                minimum_length: 1,
                vertex_spacing: 3.0,
                ..Default::default()
            };
            rust_sugiyama::from_edges(&edges, &config)
        });

        match layouts {
            Ok(results) if results.is_empty() => {
                Err(LayoutSolverError::EmptyResult(input.node_count()))
            }
            Ok(results) => Ok(results
                .into_iter()
                .map(|(coords, _, _)| {
                    let positions = coords
                        .into_iter()
                        .filter_map(|(id, (x, y))| {
                            // Convert safely to u32 with bounds checking
                            let Ok(id) = u32::try_from(id) else {
                                debug!(id; "Node id from rust-sugiyama result is out of range");
                                return None;
                            };
                            Some((id, Point::new(x as f32, y as f32)))
                        })
                        .collect();
                    SolvedComponent::new(positions)
                })
                .collect()),
            Err(err) => Err(LayoutSolverError::Panicked(panic_message(err.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown error".to_string()
    }
}
