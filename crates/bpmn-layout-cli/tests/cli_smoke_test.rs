use std::{fs, path::PathBuf};

use tempfile::tempdir;

use bpmn_layout::{
    LayoutError,
    model::{Definitions, DiagramModel},
};
use bpmn_layout_cli::{Args, CliError};

/// Collects all .json files from a directory
fn collect_json_files(dir: PathBuf) -> Vec<PathBuf> {
    let mut files = if let Ok(entries) = fs::read_dir(&dir) {
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json")
            })
            .collect()
    } else {
        Vec::new()
    };

    files.sort();
    files
}

fn args_for(input: &PathBuf, dir: &std::path::Path) -> Args {
    let output = dir.join(format!(
        "{}.json",
        input.file_stem().unwrap().to_string_lossy()
    ));
    Args::new(
        input.to_string_lossy().to_string(),
        output.to_string_lossy().to_string(),
    )
}

#[test]
fn smoke_test_valid_demos() {
    let temp_dir = tempdir().expect("Failed to create temp directory");

    let demos = collect_json_files(PathBuf::from("demos"));
    assert!(!demos.is_empty(), "No demos found in demos/");

    let mut failed = Vec::new();
    for demo in &demos {
        let args = args_for(demo, temp_dir.path());
        match bpmn_layout_cli::run(&args) {
            Ok(_) => {
                let written = fs::read_to_string(&args.output).expect("output written");
                let definitions = Definitions::from_json(&written).expect("output is valid JSON");
                let missing: Vec<_> = definitions
                    .elements()
                    .into_iter()
                    .filter(|element| element.is_connection() && element.waypoints.len() < 2)
                    .map(|element| element.id)
                    .collect();
                if !missing.is_empty() {
                    failed.push((demo.clone(), format!("unrouted flows {missing:?}")));
                }
            }
            Err(err) => failed.push((demo.clone(), err.to_string())),
        }
    }

    if !failed.is_empty() {
        eprintln!("\nDemos that failed:");
        for (path, err) in &failed {
            eprintln!("  - {}: {}", path.display(), err);
        }
        panic!("{} demo(s) failed unexpectedly", failed.len());
    }
}

#[test]
fn smoke_test_error_demos() {
    let temp_dir = tempdir().expect("Failed to create temp directory");

    let demos = collect_json_files(PathBuf::from("demos/errors"));
    assert!(!demos.is_empty(), "No error demos found in demos/errors/");

    for demo in &demos {
        let args = args_for(demo, temp_dir.path());
        let err = bpmn_layout_cli::run(&args).expect_err("error demo must fail");
        assert!(
            matches!(err, CliError::Layout(LayoutError::GraphBuild(_))),
            "{}: unexpected error {err}",
            demo.display()
        );
        assert!(
            !PathBuf::from(&args.output).exists(),
            "{}: output written despite failure",
            demo.display()
        );
    }
}

#[test]
fn smoke_test_report_and_flags() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let demo = PathBuf::from("demos/collaboration.json");
    let mut args = args_for(&demo, temp_dir.path());
    let report = temp_dir.path().join("report.json");
    args.report = Some(report.to_string_lossy().to_string());
    args.pool_expansion = Some(false);
    args.grid_snap = Some(10.0);

    let result = bpmn_layout_cli::run(&args).expect("layout succeeds");

    assert_eq!(result.pool_expansion_applied(), Some(false));
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).expect("report written"))
            .expect("report is JSON");
    assert_eq!(json["poolExpansionApplied"], false);
    assert!(json["steps"].as_array().is_some_and(|steps| !steps.is_empty()));
}
