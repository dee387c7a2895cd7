use proptest::prelude::*;
use prov_catalog::Component;
use prov_graph::{DependencyGraph, plan_installation, topological_order};
use prov_test_utils::{catalog_of, component, constraint};

/// Components `c0..cN` where each may only depend on lower-numbered ones.
fn acyclic_components(max: usize) -> impl Strategy<Value = Vec<Component>> {
    (1..max).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n).prop_map(move |matrix| {
            (0..n)
                .map(|i| {
                    let mut c = component(&format!("c{i}"), "1.0");
                    for (j, &linked) in matrix[i].iter().enumerate().take(i) {
                        if linked {
                            c = c.with_dependency(format!("c{j}"), constraint("*"));
                        }
                    }
                    c
                })
                .rev()
                .collect()
        })
    })
}

proptest! {
    #[test]
    fn test_dependencies_precede_dependents(components in acyclic_components(12)) {
        let ids: Vec<String> = components.iter().map(|c| c.id.clone()).collect();
        let catalog = catalog_of(components);
        let graph = DependencyGraph::expand(&ids, &catalog);
        let order = topological_order(&graph).unwrap();

        prop_assert_eq!(order.len(), graph.node_count());
        let position = |id: &str| order.iter().position(|o| o == id).unwrap();
        for edge in graph.edges() {
            prop_assert!(position(&edge.dependency) < position(&edge.dependent));
        }
    }

    #[test]
    fn test_each_component_planned_once(components in acyclic_components(10)) {
        let ids: Vec<String> = components.iter().map(|c| c.id.clone()).collect();
        let catalog = catalog_of(components);
        let plan = plan_installation(&ids, &catalog).unwrap();

        let mut planned = plan.ids();
        planned.sort();
        planned.dedup();
        prop_assert_eq!(planned.len(), ids.len());
    }

    #[test]
    fn test_planning_is_byte_identical(components in acyclic_components(10)) {
        let ids: Vec<String> = components.iter().map(|c| c.id.clone()).collect();
        let catalog = catalog_of(components);
        let first = serde_json::to_string(&plan_installation(&ids, &catalog).unwrap()).unwrap();
        let second = serde_json::to_string(&plan_installation(&ids, &catalog).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }
}
