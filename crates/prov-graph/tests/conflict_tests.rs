use pretty_assertions::assert_eq;
use prov_graph::{
    ConflictKind, DependencyGraph, GraphIssue, Resolution, StepDirection, compute_resolution_path,
    detect_version_conflicts, plan_installation, resolve_conflict,
};
use prov_test_utils::{catalog_of, component, constraint, version};

#[test]
fn test_disjoint_ranges_surface_both_constraints() {
    let catalog = catalog_of(vec![
        component("x", "2.0"),
        component("a", "1.0").with_dependency("x", constraint(">=2.0,<3.0")),
        component("b", "1.0").with_dependency("x", constraint(">=1.0,<2.0")),
    ]);
    let err = plan_installation(&["a", "b"], &catalog).unwrap_err();
    let conflicts = err.unresolvable_conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(
        conflicts[0].suggestion,
        Resolution::Unresolvable {
            first: ">=2.0,<3.0".to_string(),
            second: ">=1.0,<2.0".to_string(),
        }
    );
    assert!(matches!(err.issues[0], GraphIssue::UnresolvableConflict(_)));
}

#[test]
fn test_overlapping_lower_bounds_suggest_2_0() {
    let catalog = catalog_of(vec![
        component("x", "1.0"),
        component("a", "1.0").with_dependency("x", constraint(">=2.0")),
        component("b", "1.0").with_dependency("x", constraint(">=1.8")),
    ]);
    let graph = DependencyGraph::expand(&["a", "b"], &catalog);
    let conflicts = detect_version_conflicts(&graph);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::UnsatisfiedBySelection);
    assert_eq!(
        resolve_conflict(&conflicts[0], &catalog),
        Resolution::Pin {
            component: "x".to_string(),
            version: version("2.0"),
        }
    );

    // A pin suggestion is a warning, not a planning failure.
    let plan = plan_installation(&["a", "b"], &catalog).unwrap();
    assert_eq!(plan.ids(), ["x", "a", "b"]);
    assert_eq!(plan.warnings.len(), 1);
}

#[test]
fn test_resolution_path_prefers_upgrade() {
    let catalog = catalog_of(vec![
        component("x", "2.0").with_available_versions([
            version("1.0"),
            version("1.9"),
            version("2.1"),
            version("2.2"),
        ]),
        component("a", "1.0").with_dependency("x", constraint("!=2.0")),
    ]);
    let graph = DependencyGraph::expand(&["a"], &catalog);
    let conflicts = detect_version_conflicts(&graph);
    let path = compute_resolution_path(&graph, &conflicts[0]).unwrap();
    assert_eq!(path.len(), 1);
    assert_eq!(path[0].to, version("2.1"));
    assert_eq!(path[0].direction, StepDirection::Upgrade);
}

#[test]
fn test_resolution_path_crosses_major_lines() {
    let catalog = catalog_of(vec![
        component("x", "1.0").with_available_versions([version("1.1"), version("1.2"), version("2.0"), version("3.0")]),
        component("a", "1.0").with_dependency("x", constraint(">=3.0")),
    ]);
    let graph = DependencyGraph::expand(&["a"], &catalog);
    let conflicts = detect_version_conflicts(&graph);
    let path = compute_resolution_path(&graph, &conflicts[0]).unwrap();
    let targets: Vec<_> = path.iter().map(|s| s.to.to_string()).collect();
    assert_eq!(targets, ["2.0.0", "3.0.0"]);
}

#[test]
fn test_resolution_path_none_without_candidate() {
    let catalog = catalog_of(vec![
        component("x", "1.0").with_available_versions([version("1.1")]),
        component("a", "1.0").with_dependency("x", constraint(">=2.0")),
    ]);
    let graph = DependencyGraph::expand(&["a"], &catalog);
    let conflicts = detect_version_conflicts(&graph);
    assert!(compute_resolution_path(&graph, &conflicts[0]).is_none());
}

#[test]
fn test_cycle_names_every_member() {
    let catalog = catalog_of(vec![
        component("a", "1.0").with_dependency("b", constraint("*")),
        component("b", "1.0").with_dependency("c", constraint("*")),
        component("c", "1.0").with_dependency("a", constraint("*")),
    ]);
    let err = plan_installation(&["a"], &catalog).unwrap_err();
    let mut members = err.cycles()[0].to_vec();
    members.sort();
    assert_eq!(members, ["a", "b", "c"]);
    assert!(err.partial_plan().is_empty());
}
