use bpmn_layout::{
    GraphBuildError, LayoutEngine, LayoutError, LayoutSolverError,
    config::{LayoutConfig, LayoutOptions},
    geometry::{Bounds, Point, Segment, Size},
    model::{Definitions, DiagramModel, ElementRecord},
    placement::{LayeredSolver, LongestPathSolver, SolvedComponent, SolverInput},
};

fn engine() -> LayoutEngine {
    LayoutEngine::with_solver(LayoutConfig::default(), Box::new(LongestPathSolver))
}

fn definitions(elements: Vec<ElementRecord>) -> Definitions {
    let mut definitions = Definitions::new();
    for element in elements {
        definitions.add(element);
    }
    definitions
}

fn flow(id: &str, source: &str, target: &str) -> ElementRecord {
    ElementRecord::connection(id, "bpmn:SequenceFlow", source, target)
}

fn bounds(definitions: &Definitions, id: &str) -> Bounds {
    definitions
        .get(id)
        .and_then(|element| element.bounds)
        .unwrap_or_else(|| panic!("{id} has bounds"))
}

fn waypoints(definitions: &Definitions, id: &str) -> Vec<Point> {
    definitions
        .get(id)
        .map(|element| element.waypoints.clone())
        .unwrap_or_default()
}

fn gateway_scenario() -> Definitions {
    definitions(vec![
        ElementRecord::shape("Start", "bpmn:StartEvent", None),
        ElementRecord::shape("Gateway", "bpmn:ExclusiveGateway", None)
            .with_name("Valid?")
            .with_default("ToB"),
        ElementRecord::shape("TaskA", "bpmn:Task", None).with_name("Process order"),
        ElementRecord::shape("TaskB", "bpmn:Task", None).with_name("Reject order"),
        ElementRecord::shape("Merge", "bpmn:ExclusiveGateway", None),
        ElementRecord::shape("End", "bpmn:EndEvent", None),
        flow("F1", "Start", "Gateway"),
        flow("ToA", "Gateway", "TaskA").with_condition("${valid}"),
        flow("ToB", "Gateway", "TaskB"),
        flow("F2", "TaskA", "Merge"),
        flow("F3", "TaskB", "Merge"),
        flow("F4", "Merge", "End"),
    ])
}

#[test]
fn test_exclusive_gateway_keeps_conditioned_branch_on_main_row() {
    let mut model = gateway_scenario();

    let result = engine()
        .layout(&mut model, &LayoutOptions::default())
        .expect("layout succeeds");

    let main_row = bounds(&model, "Start").center().y();
    for id in ["Gateway", "TaskA", "Merge", "End"] {
        assert!(
            (bounds(&model, id).center().y() - main_row).abs() <= 5.0,
            "{id} left the main row"
        );
    }
    assert!(bounds(&model, "TaskB").center().y() > main_row + 5.0);
    assert_eq!(waypoints(&model, "ToA").len(), 2);
    assert!(waypoints(&model, "ToB").len() >= 3);
    assert_eq!(result.element_count(), 12);
    assert_eq!(result.pool_expansion_applied(), None);
    assert!(model.get("Gateway").and_then(|element| element.label_bounds).is_some());
}

#[test]
fn test_linear_chain_shares_one_row() {
    let mut model = definitions(vec![
        ElementRecord::shape("Start", "bpmn:StartEvent", None),
        ElementRecord::shape("Receive", "bpmn:ReceiveTask", None),
        ElementRecord::shape("Check", "bpmn:UserTask", None),
        ElementRecord::shape("Ship", "bpmn:ServiceTask", None),
        ElementRecord::shape("End", "bpmn:EndEvent", None),
        flow("F1", "Start", "Receive"),
        flow("F2", "Receive", "Check"),
        flow("F3", "Check", "Ship"),
        flow("F4", "Ship", "End"),
    ]);

    engine()
        .layout(&mut model, &LayoutOptions::default())
        .expect("layout succeeds");

    let chain = ["Start", "Receive", "Check", "Ship", "End"];
    let row = bounds(&model, "Start").center().y();
    for pair in chain.windows(2) {
        let (left, right) = (bounds(&model, pair[0]), bounds(&model, pair[1]));
        assert!((right.center().y() - row).abs() <= 5.0);
        assert!(right.center().x() > left.center().x());
    }
    for id in ["F1", "F2", "F3", "F4"] {
        assert_eq!(waypoints(&model, id).len(), 2, "{id} is not straight");
    }
}

#[test]
fn test_associations_have_two_waypoints() {
    let mut model = definitions(vec![
        ElementRecord::shape("Start", "bpmn:StartEvent", None),
        ElementRecord::shape("Task", "bpmn:Task", None),
        ElementRecord::shape("Note", "bpmn:TextAnnotation", None).with_name("Check twice"),
        ElementRecord::shape("Doc", "bpmn:DataObjectReference", None).with_name("Invoice"),
        flow("F1", "Start", "Task"),
        ElementRecord::connection("A1", "bpmn:Association", "Task", "Note"),
        ElementRecord::connection("A2", "bpmn:DataOutputAssociation", "Task", "Doc"),
    ]);

    engine()
        .layout(&mut model, &LayoutOptions::default())
        .expect("layout succeeds");

    assert_eq!(waypoints(&model, "A1").len(), 2);
    assert_eq!(waypoints(&model, "A2").len(), 2);
    assert!(!bounds(&model, "Note").intersects(bounds(&model, "Task")));
}

fn lane_scenario() -> Definitions {
    let lane = |id: &str, height: f32| {
        ElementRecord::shape(id, "bpmn:Lane", Some("Pool")).with_bounds(Bounds::new_from_top_left(
            Point::default(),
            Size::new(570.0, height),
        ))
    };
    let mut elements = vec![
        ElementRecord::shape("Pool", "bpmn:Participant", None).with_process_ref("Process"),
        ElementRecord::shape("Process", "bpmn:Process", None),
        lane("Lane1", 100.0).with_flow_node_refs(&["T1", "T2", "T3", "T4", "T5"]),
        lane("Lane2", 120.0).with_flow_node_refs(&["Other"]),
    ];
    for id in ["T1", "T2", "T3", "T4", "T5", "Other"] {
        elements.push(ElementRecord::shape(id, "bpmn:Task", Some("Process")));
    }
    elements.extend([
        flow("F1", "T1", "T2"),
        flow("F2", "T2", "T3"),
        flow("F3", "T3", "T4"),
        flow("F4", "T4", "T5"),
        flow("F5", "T5", "Other"),
    ]);
    definitions(elements)
}

#[test]
fn test_undersized_lane_reports_expansion_need() {
    let mut model = lane_scenario();

    let result = engine()
        .layout(&mut model, &LayoutOptions::default())
        .expect("layout succeeds");

    let need = result
        .expansion_needs()
        .iter()
        .find(|need| need.lane() == "Lane1")
        .expect("Lane1 needs expansion");
    assert!((need.min_height() - 480.0).abs() < 0.5);
    assert!(need.min_height() > 100.0);
    assert_eq!(result.pool_expansion_applied(), Some(true));
}

#[test]
fn test_containers_enclose_their_children() {
    let mut model = lane_scenario();

    engine()
        .layout(&mut model, &LayoutOptions::default())
        .expect("layout succeeds");

    let pool = bounds(&model, "Pool");
    let lane1 = bounds(&model, "Lane1");
    let lane2 = bounds(&model, "Lane2");
    assert!(pool.contains_bounds(lane1, 1.0));
    assert!(pool.contains_bounds(lane2, 1.0));
    for id in ["T1", "T2", "T3", "T4", "T5"] {
        assert!(lane1.contains_bounds(bounds(&model, id), 1.0), "{id} outside Lane1");
    }
    assert!(lane2.contains_bounds(bounds(&model, "Other"), 1.0));
}

#[test]
fn test_disabled_pool_expansion_is_reported() {
    let mut model = lane_scenario();

    let result = engine()
        .layout(&mut model, &LayoutOptions::default().with_pool_expansion(false))
        .expect("layout succeeds");

    assert_eq!(result.pool_expansion_applied(), Some(false));
    assert!((bounds(&model, "Lane1").height() - 100.0).abs() < 0.5);
}

#[test]
fn test_exception_chains_stay_below_their_hosts() {
    let mut model = definitions(vec![
        ElementRecord::shape("Start", "bpmn:StartEvent", None),
        ElementRecord::shape("A", "bpmn:Task", None),
        ElementRecord::shape("B", "bpmn:Task", None),
        ElementRecord::shape("End", "bpmn:EndEvent", None),
        ElementRecord::shape("ErrA", "bpmn:BoundaryEvent", None).with_attached_to("A"),
        ElementRecord::shape("ErrB", "bpmn:BoundaryEvent", None).with_attached_to("B"),
        ElementRecord::shape("FixA", "bpmn:Task", None),
        ElementRecord::shape("FailA", "bpmn:EndEvent", None),
        ElementRecord::shape("FixB", "bpmn:Task", None),
        ElementRecord::shape("FailB", "bpmn:EndEvent", None),
        flow("F1", "Start", "A"),
        flow("F2", "A", "B"),
        flow("F3", "B", "End"),
        flow("E1", "ErrA", "FixA"),
        flow("E2", "FixA", "FailA"),
        flow("E3", "ErrB", "FixB"),
        flow("E4", "FixB", "FailB"),
    ]);

    engine()
        .layout(&mut model, &LayoutOptions::default())
        .expect("layout succeeds");

    let host_a = bounds(&model, "A");
    let host_b = bounds(&model, "B");
    let chain_a = bounds(&model, "FixA").merge(&bounds(&model, "FailA"));
    let chain_b = bounds(&model, "FixB").merge(&bounds(&model, "FailB"));
    assert!(chain_a.min_y() > host_a.max_y());
    assert!(chain_b.min_y() > host_b.max_y());
    assert!(chain_a.center().x() < host_b.min_x());
    assert!((bounds(&model, "FixA").center().x() - host_a.center().x()).abs() < 1.0);

    let start = waypoints(&model, "E1")[0];
    let event = bounds(&model, "ErrA");
    assert!((start.y() - event.max_y()).abs() < 0.5);
}

#[test]
fn test_long_exception_chain_keeps_out_of_neighbouring_column() {
    let mut model = definitions(vec![
        ElementRecord::shape("Start", "bpmn:StartEvent", None),
        ElementRecord::shape("A", "bpmn:Task", None),
        ElementRecord::shape("B", "bpmn:Task", None),
        ElementRecord::shape("End", "bpmn:EndEvent", None),
        ElementRecord::shape("ErrA", "bpmn:BoundaryEvent", None).with_attached_to("A"),
        ElementRecord::shape("ErrB", "bpmn:BoundaryEvent", None).with_attached_to("B"),
        ElementRecord::shape("FixA", "bpmn:Task", None),
        ElementRecord::shape("NotifyA", "bpmn:Task", None),
        ElementRecord::shape("FailA", "bpmn:EndEvent", None),
        ElementRecord::shape("FixB", "bpmn:Task", None),
        ElementRecord::shape("FailB", "bpmn:EndEvent", None),
        flow("F1", "Start", "A"),
        flow("F2", "A", "B"),
        flow("F3", "B", "End"),
        flow("E1", "ErrA", "FixA"),
        flow("E2", "FixA", "NotifyA"),
        flow("E3", "NotifyA", "FailA"),
        flow("E4", "ErrB", "FixB"),
        flow("E5", "FixB", "FailB"),
    ]);

    engine()
        .layout(&mut model, &LayoutOptions::default())
        .expect("layout succeeds");

    let host_a = bounds(&model, "A");
    let host_b = bounds(&model, "B");
    for id in ["FixA", "NotifyA", "FailA"] {
        let member = bounds(&model, id);
        assert!(member.min_y() > host_a.max_y(), "{id} is not below A");
        assert!(!member.overlaps_horizontally(host_b), "{id} sits in B's column");
    }
    for id in ["FixB", "FailB"] {
        assert!(!bounds(&model, id).overlaps_horizontally(host_a), "{id} sits in A's column");
    }

    let elements = model.elements();
    let shapes: Vec<_> = elements
        .iter()
        .filter(|element| !element.is_connection())
        .map(|element| (element.id.clone(), bounds(&model, &element.id)))
        .collect();
    for connection in elements.iter().filter(|element| element.is_connection()) {
        let ends: Vec<&str> = [&connection.source, &connection.target]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect();
        let hosts: Vec<String> = ends
            .iter()
            .filter_map(|end| model.get(end).and_then(|element| element.attached_to.clone()))
            .collect();
        let points = waypoints(&model, &connection.id);
        for pair in points.windows(2) {
            let segment = Segment::new(pair[0], pair[1]);
            for (id, shape) in &shapes {
                if ends.contains(&id.as_str()) || hosts.contains(id) {
                    continue;
                }
                assert!(
                    !shape.intersects_segment(segment),
                    "{} crosses {id}",
                    connection.id
                );
            }
        }
    }
}

#[test]
fn test_second_run_does_not_add_crossings() {
    let mut model = gateway_scenario();
    let engine = engine();

    let first = engine
        .layout(&mut model, &LayoutOptions::default())
        .expect("first layout succeeds");
    let second = engine
        .layout(&mut model, &LayoutOptions::default())
        .expect("second layout succeeds");

    assert!(second.crossing_flows() <= first.crossing_flows());
}

#[test]
fn test_dangling_edge_aborts_without_writing() {
    let mut model = definitions(vec![
        ElementRecord::shape("Start", "bpmn:StartEvent", None),
        flow("F1", "Start", "Ghost"),
    ]);

    let err = engine()
        .layout(&mut model, &LayoutOptions::default())
        .expect_err("dangling reference is fatal");

    assert!(matches!(
        err,
        LayoutError::GraphBuild(GraphBuildError::DanglingReference { .. })
    ));
    assert!(model.get("Start").and_then(|element| element.bounds).is_none());
}

struct FailingSolver;

impl LayeredSolver for FailingSolver {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn solve(&self, _input: &SolverInput) -> Result<Vec<SolvedComponent>, LayoutSolverError> {
        Err(LayoutSolverError::Panicked("index out of bounds".to_string()))
    }
}

#[test]
fn test_solver_failure_leaves_model_untouched() {
    let mut model = gateway_scenario();
    let engine = LayoutEngine::with_solver(LayoutConfig::default(), Box::new(FailingSolver));

    let err = engine
        .layout(&mut model, &LayoutOptions::default())
        .expect_err("solver failure is fatal");

    assert!(matches!(err, LayoutError::Solver(LayoutSolverError::Panicked(_))));
    assert!(model.get("TaskA").and_then(|element| element.bounds).is_none());
    assert!(waypoints(&model, "ToA").is_empty());
}

#[test]
fn test_sugiyama_solver_lays_out_linear_chain() {
    let mut model = definitions(vec![
        ElementRecord::shape("Start", "bpmn:StartEvent", None),
        ElementRecord::shape("Task", "bpmn:Task", None),
        ElementRecord::shape("End", "bpmn:EndEvent", None),
        flow("F1", "Start", "Task"),
        flow("F2", "Task", "End"),
    ]);

    let result = LayoutEngine::default()
        .layout(&mut model, &LayoutOptions::default())
        .expect("layout succeeds");

    let (start, task, end) = (
        bounds(&model, "Start"),
        bounds(&model, "Task"),
        bounds(&model, "End"),
    );
    assert!(start.center().x() < task.center().x());
    assert!(task.center().x() < end.center().x());
    assert!((start.center().y() - end.center().y()).abs() <= 5.0);
    assert_eq!(result.crossing_flows(), 0);
}
