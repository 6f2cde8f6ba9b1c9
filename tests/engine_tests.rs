//! Integration tests for the knowledge graph service.
//!
//! Exercise the public API end to end: store mutations, analytics over stored
//! graphs, layout write-back, export/import, events and lifecycle gating.

use knowledge_graph::events::{CallbackEmitter, GraphEvent, GraphEventKind};
use knowledge_graph::graph::algorithms::{calculate_stats, find_clusters};
use knowledge_graph::graph::serializer::{export_graph, import_graph};
use knowledge_graph::graph::{
    ClusterAlgorithm, ExportFormat, ExportOptions, GraphFilter, GraphUpdate,
    LayoutConfig, LayoutType, LinkType, NewLink, NewNode, NodeType,
};
use knowledge_graph::{Config, GraphError, GraphService};
use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// Helpers
// ============================================================================

fn service() -> GraphService {
    GraphService::started(Config::default()).expect("service should start")
}

/// Graph {A, B, C} with links A–B and B–C. Returns (graph id, [A, B, C] ids).
fn abc(svc: &mut GraphService) -> (String, [String; 3]) {
    let gid = svc.create_graph(Some("abc")).unwrap().id;
    let a = svc.add_node(&gid, NewNode::new("A", NodeType::Note)).unwrap().id;
    let b = svc.add_node(&gid, NewNode::new("B", NodeType::Note)).unwrap().id;
    let c = svc.add_node(&gid, NewNode::new("C", NodeType::Note)).unwrap().id;
    svc.add_link(&gid, NewLink::new(&a, &b, LinkType::Reference))
        .unwrap();
    svc.add_link(&gid, NewLink::new(&b, &c, LinkType::Reference))
        .unwrap();
    (gid, [a, b, c])
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_abc_path_and_stats() {
    let mut svc = service();
    let (gid, [a, b, c]) = abc(&mut svc);

    let path = svc.find_shortest_path(&gid, &a, &c).unwrap().unwrap();
    assert_eq!(path.node_ids(), vec![a.as_str(), b.as_str(), c.as_str()]);
    assert_eq!(path.length, 2);
    assert!((path.weight - 2.0).abs() < f64::EPSILON);

    let stats = svc.calculate_stats(&gid).unwrap();
    assert_eq!(stats.node_count, 3);
    assert_eq!(stats.link_count, 2);
    assert!((stats.avg_connections - 1.33).abs() < 0.01);
    assert_eq!(stats.max_connections, 2);
    assert_eq!(stats.components, 1);
}

#[test]
fn test_self_path_and_unreachable() {
    let mut svc = service();
    let (gid, [a, _, _]) = abc(&mut svc);
    let lonely = svc
        .add_node(&gid, NewNode::new("lonely", NodeType::Folder))
        .unwrap()
        .id;

    let path = svc.find_shortest_path(&gid, &a, &a).unwrap().unwrap();
    assert_eq!(path.nodes.len(), 1);
    assert_eq!(path.length, 0);
    assert!((path.weight - 0.0).abs() < f64::EPSILON);

    // Unreachable and unknown endpoints are not errors
    assert!(svc.find_shortest_path(&gid, &a, &lonely).unwrap().is_none());
    assert!(svc.find_shortest_path(&gid, &a, "nope").unwrap().is_none());
    // A missing graph is
    assert!(matches!(
        svc.find_shortest_path("missing", &a, &a),
        Err(GraphError::GraphNotFound(_))
    ));
}

#[test]
fn test_delete_node_cascades() {
    let mut svc = service();
    let (gid, [a, b, c]) = abc(&mut svc);
    svc.link_to_note(&gid, &b, "note-1").unwrap();

    assert!(svc.delete_node(&gid, &b).unwrap());
    let graph = svc.get_graph(&gid).unwrap().unwrap();
    assert!(graph.data.links.iter().all(|l| l.source != b && l.target != b));
    assert!(graph.data.links.is_empty());
    assert_eq!(graph.data.nodes.len(), 2);
    assert!(svc.linked_notes(&gid, &b).is_err());

    let stats = svc.calculate_stats(&gid).unwrap();
    assert_eq!(stats.components, 2);
    assert!(svc.find_shortest_path(&gid, &a, &c).unwrap().is_none());
}

#[test]
fn test_avg_connections_identity_holds() {
    let mut svc = service();
    let gid = svc.create_graph(None).unwrap().id;
    let ids: Vec<String> = (0..8)
        .map(|i| {
            svc.add_node(&gid, NewNode::new(format!("n{}", i), NodeType::Note))
                .unwrap()
                .id
        })
        .collect();
    for (s, t) in [(0, 1), (1, 2), (2, 3), (0, 3), (4, 5), (6, 7), (5, 6)] {
        svc.add_link(&gid, NewLink::new(&ids[s], &ids[t], LinkType::Similarity))
            .unwrap();
    }

    let stats = svc.calculate_stats(&gid).unwrap();
    assert!(
        (stats.avg_connections * stats.node_count as f64 - 2.0 * stats.link_count as f64).abs()
            < 1e-9
    );
    assert_eq!(stats.components, 2);
    assert_eq!(stats.clusters, 2);
}

#[test]
fn test_connectivity_clusters_partition_exactly() {
    let mut svc = service();
    let (gid, _) = abc(&mut svc);
    for title in ["x", "y"] {
        svc.add_node(&gid, NewNode::new(title, NodeType::Tag)).unwrap();
    }

    let graph = svc.get_graph(&gid).unwrap().unwrap();
    let clusters = svc
        .find_clusters(&gid, ClusterAlgorithm::Connectivity)
        .unwrap();
    let members: Vec<&str> = clusters
        .iter()
        .flat_map(|c| c.nodes.iter().map(String::as_str))
        .collect();
    let unique: HashSet<&str> = members.iter().copied().collect();
    let all: HashSet<&str> = graph.data.nodes.iter().map(|n| n.id.as_str()).collect();

    assert_eq!(members.len(), graph.data.nodes.len());
    assert_eq!(unique, all);
    assert_eq!(clusters.len(), 3);
}

#[test]
fn test_unknown_cluster_algorithm_is_invalid_input() {
    let err = "louvain".parse::<ClusterAlgorithm>().unwrap_err();
    assert!(err.is_invalid_input());
}

#[test]
fn test_filter_notes_drops_tag_links() {
    let mut svc = service();
    let gid = svc.create_graph(None).unwrap().id;
    let n1 = svc.add_node(&gid, NewNode::new("n1", NodeType::Note)).unwrap().id;
    let n2 = svc.add_node(&gid, NewNode::new("n2", NodeType::Note)).unwrap().id;
    let t = svc.add_node(&gid, NewNode::new("t", NodeType::Tag)).unwrap().id;
    svc.add_link(&gid, NewLink::new(&t, &n1, LinkType::Tag)).unwrap();
    svc.add_link(&gid, NewLink::new(&t, &n2, LinkType::Tag)).unwrap();

    let filtered = svc
        .filter_graph(&gid, &GraphFilter::new().with_node_types(vec![NodeType::Note]))
        .unwrap();
    let ids: HashSet<&str> = filtered.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, HashSet::from([n1.as_str(), n2.as_str()]));
    assert!(filtered.links.is_empty());
}

#[test]
fn test_search_over_stored_graph() {
    let mut svc = service();
    let gid = svc.create_graph(None).unwrap().id;
    let rust = svc
        .add_node(
            &gid,
            NewNode::new("Ownership", NodeType::Note).with_tags(["Rust"]),
        )
        .unwrap()
        .id;
    let other = svc
        .add_node(&gid, NewNode::new("Gardening", NodeType::Note))
        .unwrap()
        .id;
    svc.add_link(&gid, NewLink::new(&rust, &other, LinkType::Custom))
        .unwrap();

    let result = svc.search_nodes(&gid, "rust").unwrap();
    assert_eq!(result.total_results, 1);
    assert_eq!(result.nodes[0].id, rust);
    assert_eq!(result.links.len(), 1);
    assert_eq!(svc.search_nodes(&gid, "  ").unwrap().total_results, 0);
}

#[test]
fn test_json_export_import_roundtrip() {
    let mut svc = service();
    let (gid, _) = abc(&mut svc);
    let original = svc.get_graph(&gid).unwrap().unwrap().data;

    let json = svc
        .export_graph(&original, &ExportOptions::new(ExportFormat::Json))
        .unwrap();
    let restored = import_graph(&json).unwrap();

    let ids = |d: &knowledge_graph::graph::GraphData| -> (HashSet<String>, HashSet<String>) {
        (
            d.nodes.iter().map(|n| n.id.clone()).collect(),
            d.links.iter().map(|l| l.id.clone()).collect(),
        )
    };
    assert_eq!(ids(&restored), ids(&original));
    assert_eq!(restored, original);

    let copy = svc.import_graph(Some("copy"), &json).unwrap();
    assert_ne!(copy.id, gid);
    assert_eq!(copy.data, original);
}

#[test]
fn test_png_export_fails() {
    let mut svc = service();
    let (gid, _) = abc(&mut svc);
    let data = svc.get_graph(&gid).unwrap().unwrap().data;

    let err = svc
        .export_graph(&data, &ExportOptions::new(ExportFormat::Png))
        .unwrap_err();
    assert!(matches!(err, GraphError::UnsupportedFormat(_)));
    assert!("bmp".parse::<ExportFormat>().is_err());
}

#[test]
fn test_csv_and_dot_exports() {
    let mut svc = service();
    let (gid, _) = abc(&mut svc);
    let data = svc.get_graph(&gid).unwrap().unwrap().data;

    let csv = export_graph(&data, &ExportOptions::new(ExportFormat::Csv)).unwrap();
    assert!(csv.starts_with("# Nodes\n"));
    assert!(csv.contains("\n\n# Links\n"));
    assert_eq!(csv.lines().count(), 2 + 3 + 1 + 2 + 2);

    let dot = export_graph(&data, &ExportOptions::new(ExportFormat::Dot)).unwrap();
    assert_eq!(dot.matches(" -> ").count(), 2);
}

#[test]
fn test_import_from_notes_is_not_stored() {
    let svc = service();
    let data = svc.import_from_notes(&["a", "b", "c", "d"]).unwrap();
    assert_eq!(data.nodes.len(), 4);
    assert_eq!(data.links.len(), 3);
    assert!(data.nodes.iter().all(|n| n.tags == vec!["imported"]));
    assert!(svc.list_graphs().unwrap().is_empty());

    let stats = calculate_stats(&data);
    assert_eq!(stats.components, 1);
}

#[test]
fn test_layout_every_type_positions_all_nodes() {
    let mut svc = service();
    let (gid, _) = abc(&mut svc);
    let data = svc.get_graph(&gid).unwrap().unwrap().data;

    for layout_type in ["force", "circular", "grid", "hierarchical", "RADIAL"] {
        let config = LayoutConfig::new(layout_type.parse::<LayoutType>().unwrap());
        let out = svc.calculate_layout(&data, &config).unwrap();
        assert_eq!(out.nodes.len(), 3);
        assert!(out.nodes.iter().all(|n| n.has_position()), "{}", layout_type);
    }
    assert!("spiral".parse::<LayoutType>().is_err());
}

#[test]
fn test_layout_failure_returns_input() {
    let mut svc = service();
    let (gid, _) = abc(&mut svc);
    let data = svc.get_graph(&gid).unwrap().unwrap().data;

    let mut config = LayoutConfig::default();
    config.velocity_decay = 2.0;
    let out = svc.calculate_layout(&data, &config).unwrap();
    assert_eq!(out, data);
}

#[test]
fn test_layout_graph_persists_positions() {
    let mut svc = service();
    let (gid, _) = abc(&mut svc);
    let positioned = svc.layout_graph(&gid, &LayoutConfig::default()).unwrap();

    let stored = svc.get_graph(&gid).unwrap().unwrap().data;
    for node in &stored.nodes {
        let laid_out = positioned.node(&node.id).unwrap();
        assert_eq!((node.x, node.y), (laid_out.x, laid_out.y));
    }
}

#[test]
fn test_layout_graph_fallback_writes_nothing() {
    let mut svc = service();
    let (gid, _) = abc(&mut svc);
    let before = svc.get_graph(&gid).unwrap().unwrap();
    let mut rx = svc.subscribe();

    let mut config = LayoutConfig::default();
    config.velocity_decay = 2.0;
    let out = svc.layout_graph(&gid, &config).unwrap();

    assert_eq!(out, before.data);
    assert_eq!(svc.get_graph(&gid).unwrap().unwrap(), before);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_layout_graph_checks_state_before_graph() {
    let mut svc = service();
    svc.deactivate().unwrap();
    let err = svc
        .layout_graph("missing", &LayoutConfig::default())
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidState(_)));
}

// ============================================================================
// Events and lifecycle
// ============================================================================

#[test]
fn test_event_payloads_reflect_committed_state() {
    let mut svc = service();
    let (gid, [a, b, c]) = abc(&mut svc);
    let mut rx = svc.subscribe();

    svc.update_graph(
        &gid,
        GraphUpdate {
            name: Some("renamed".into()),
            ..Default::default()
        },
    )
    .unwrap();
    svc.delete_node(&gid, &b).unwrap();

    let updated = rx.try_recv().unwrap();
    assert_eq!(updated.kind, GraphEventKind::GraphUpdated);
    assert_eq!(updated.payload["name"], "renamed");
    assert_eq!(updated.payload["data"]["nodes"].as_array().unwrap().len(), 3);

    // Both links touched B; the event lists them and the store no longer has them
    let deleted = rx.try_recv().unwrap();
    assert_eq!(deleted.kind, GraphEventKind::NodeDeleted);
    let removed: HashSet<String> = deleted.payload["removedLinks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(removed.len(), 2);

    let data = svc.get_graph(&gid).unwrap().unwrap().data;
    assert!(data.links.is_empty());
    assert_eq!(
        data.nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>(),
        vec![a, c]
    );
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_panicking_listener_keeps_mutation() {
    let mut svc = service().with_emitter(Arc::new(CallbackEmitter::new(|_e: GraphEvent| {
        panic!("listener failure")
    })));
    let mut rx = svc.subscribe();

    let gid = svc.create_graph(None).unwrap().id;
    let node = svc
        .add_node(&gid, NewNode::new("kept", NodeType::Note))
        .unwrap();

    let graph = svc.get_graph(&gid).unwrap().unwrap();
    assert!(graph.data.contains_node(&node.id));
    // The bus still received both events
    assert_eq!(rx.try_recv().unwrap().kind, GraphEventKind::GraphCreated);
    assert_eq!(rx.try_recv().unwrap().kind, GraphEventKind::NodeAdded);
}

#[test]
fn test_idempotent_entity_links_emit_once() {
    let mut svc = service();
    let (gid, [a, _, _]) = abc(&mut svc);
    let mut rx = svc.subscribe();

    assert!(svc.link_to_task(&gid, &a, "task-7").unwrap());
    assert!(!svc.link_to_task(&gid, &a, "task-7").unwrap());
    assert!(!svc.unlink_from_note(&gid, &a, "never-linked").unwrap());
    assert_eq!(svc.linked_tasks(&gid, &a).unwrap(), vec!["task-7"]);

    let event = rx.try_recv().unwrap();
    assert_eq!(event.kind, GraphEventKind::NodeLinkedTask);
    assert_eq!(event.related.unwrap().entity_id, "task-7");
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_service_requires_active_state() {
    let mut svc = GraphService::new(Config::default());
    assert!(matches!(
        svc.create_graph(None),
        Err(GraphError::InvalidState(_))
    ));
    assert!(svc.activate().is_err());

    svc.initialize().unwrap();
    svc.activate().unwrap();
    let gid = svc.create_graph(None).unwrap().id;

    svc.deactivate().unwrap();
    assert!(svc.add_node(&gid, NewNode::new("n", NodeType::Note)).is_err());
    assert!(svc.import_from_notes(&["x"]).is_err());
}

#[test]
fn test_mutations_on_missing_entities() {
    let mut svc = service();
    let (gid, [a, _, _]) = abc(&mut svc);

    assert!(svc
        .add_link(&gid, NewLink::new(&a, "ghost", LinkType::Reference))
        .unwrap_err()
        .is_invalid_input());
    assert!(svc
        .update_node(&gid, "ghost", Default::default())
        .unwrap_err()
        .is_not_found());
    assert!(svc
        .update_link(&gid, "ghost", Default::default())
        .unwrap_err()
        .is_not_found());
    assert!(!svc.delete_link(&gid, "ghost").unwrap());
    assert!(!svc.delete_graph("ghost").unwrap());
    assert!(svc
        .add_node("ghost", NewNode::new("n", NodeType::Note))
        .unwrap_err()
        .is_not_found());
}

#[test]
fn test_tag_and_type_clusters_on_snapshot() {
    let mut svc = service();
    let gid = svc.create_graph(None).unwrap().id;
    for (title, tags) in [("a", vec!["x"]), ("b", vec!["x", "y"]), ("c", vec!["y"]), ("d", vec![])] {
        svc.add_node(&gid, NewNode::new(title, NodeType::Note).with_tags(tags))
            .unwrap();
    }
    svc.add_node(&gid, NewNode::new("folder", NodeType::Folder))
        .unwrap();

    let data = svc.get_graph(&gid).unwrap().unwrap().data;
    let by_tags = find_clusters(&data, ClusterAlgorithm::Tags);
    assert_eq!(by_tags.len(), 3);
    assert_eq!(by_tags[0].nodes.len(), 3);

    let by_type = svc.find_clusters(&gid, ClusterAlgorithm::Type).unwrap();
    let labels: Vec<&str> = by_type.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["note", "folder"]);
}
