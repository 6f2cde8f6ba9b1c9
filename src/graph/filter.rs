//! Filter & search over graph snapshots.
//!
//! [`filter_graph`] narrows a snapshot by a [`GraphFilter`] predicate set;
//! [`search_nodes`] runs a case-insensitive free-text query.

use std::collections::HashSet;

use super::models::{GraphData, GraphFilter, GraphNode, SearchResult};

/// Case-insensitive substring match over title, content and tags.
/// `needle` must already be lowercase.
fn matches_text(node: &GraphNode, needle: &str) -> bool {
    node.title.to_lowercase().contains(needle)
        || node
            .content
            .as_deref()
            .is_some_and(|c| c.to_lowercase().contains(needle))
        || node.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

/// Keep the nodes matching every specified predicate, and the links whose
/// endpoints both survive (and whose type matches, if link types are given).
///
/// Connection bounds use degrees in the *original* snapshot.
pub fn filter_graph(data: &GraphData, filter: &GraphFilter) -> GraphData {
    let degrees = data.degrees();
    let needle = filter
        .search_query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);

    let nodes: Vec<GraphNode> = data
        .nodes
        .iter()
        .filter(|node| {
            if !filter.node_types.is_empty() && !filter.node_types.contains(&node.node_type) {
                return false;
            }
            if !filter.tags.is_empty() && !node.tags.iter().any(|t| filter.tags.contains(t)) {
                return false;
            }
            if let Some(range) = &filter.date_range {
                if !range.contains(&node.created_at) {
                    return false;
                }
            }
            let degree = degrees.get(node.id.as_str()).copied().unwrap_or(0);
            if filter.min_connections.is_some_and(|min| degree < min) {
                return false;
            }
            if filter.max_connections.is_some_and(|max| degree > max) {
                return false;
            }
            if let Some(needle) = &needle {
                if !matches_text(node, needle) {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect();

    let kept: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let links = data
        .links
        .iter()
        .filter(|l| kept.contains(l.source.as_str()) && kept.contains(l.target.as_str()))
        .filter(|l| filter.link_types.is_empty() || filter.link_types.contains(&l.link_type))
        .cloned()
        .collect();

    GraphData { nodes, links }
}

/// Free-text search. Returns matching nodes plus every link touching at
/// least one of them; a blank query matches nothing.
pub fn search_nodes(data: &GraphData, query: &str) -> SearchResult {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return SearchResult::default();
    }

    let nodes: Vec<GraphNode> = data
        .nodes
        .iter()
        .filter(|n| matches_text(n, &needle))
        .cloned()
        .collect();
    let matched: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let links = data
        .links
        .iter()
        .filter(|l| matched.contains(l.source.as_str()) || matched.contains(l.target.as_str()))
        .cloned()
        .collect();

    SearchResult {
        total_results: nodes.len(),
        nodes,
        links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::models::{DateRange, LinkType, NodeType};
    use crate::test_helpers::{link, make_abc_graph, make_star_graph, node, node_with_tags};
    use chrono::{Duration, Utc};

    /// Two notes and a tag linked to both
    fn notes_and_tag() -> GraphData {
        GraphData::new(
            vec![
                node("n1", NodeType::Note),
                node("n2", NodeType::Note),
                node("t", NodeType::Tag),
            ],
            vec![link("l1", "t", "n1"), link("l2", "t", "n2")],
        )
    }

    #[test]
    fn test_filter_by_node_type_drops_orphaned_links() {
        let filter = GraphFilter::new().with_node_types(vec![NodeType::Note]);
        let out = filter_graph(&notes_and_tag(), &filter);
        let ids: Vec<&str> = out.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n1", "n2"]);
        assert!(out.links.is_empty());
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let data = make_abc_graph();
        assert_eq!(filter_graph(&data, &GraphFilter::default()), data);
    }

    #[test]
    fn test_filter_by_tags_intersection() {
        let data = GraphData::new(
            vec![
                node_with_tags("a", &["rust", "cli"]),
                node_with_tags("b", &["python"]),
                node("c", NodeType::Note),
            ],
            vec![],
        );
        let out = filter_graph(
            &data,
            &GraphFilter::new().with_tags(vec!["cli".into(), "go".into()]),
        );
        assert_eq!(out.nodes.len(), 1);
        assert_eq!(out.nodes[0].id, "a");
    }

    #[test]
    fn test_filter_by_link_type() {
        let mut data = make_abc_graph();
        data.links[1].link_type = LinkType::Similarity;
        let out = filter_graph(
            &data,
            &GraphFilter::new().with_link_types(vec![LinkType::Similarity]),
        );
        assert_eq!(out.nodes.len(), 3);
        assert_eq!(out.links.len(), 1);
        assert_eq!(out.links[0].id, "bc");
    }

    #[test]
    fn test_filter_connections_use_original_degrees() {
        let data = make_star_graph(3);
        // Only the hub has more than one connection
        let out = filter_graph(&data, &GraphFilter::new().with_connections(Some(2), None));
        assert_eq!(out.nodes.len(), 1);
        assert_eq!(out.nodes[0].id, "center");

        let out = filter_graph(&data, &GraphFilter::new().with_connections(None, Some(1)));
        assert_eq!(out.nodes.len(), 3);
        assert!(out.links.is_empty());
    }

    #[test]
    fn test_filter_date_range() {
        let data = make_abc_graph();
        let future = DateRange {
            start: Some(Utc::now() + Duration::days(1)),
            end: None,
        };
        assert!(filter_graph(&data, &GraphFilter::new().with_date_range(future))
            .nodes
            .is_empty());

        let past = DateRange {
            start: Some(Utc::now() - Duration::days(1)),
            end: Some(Utc::now() + Duration::days(1)),
        };
        assert_eq!(
            filter_graph(&data, &GraphFilter::new().with_date_range(past))
                .nodes
                .len(),
            3
        );
    }

    #[test]
    fn test_filter_query_combines_with_type() {
        let mut data = notes_and_tag();
        data.nodes[0].title = "Rust ownership".into();
        data.nodes[2].title = "rust".into();
        let filter = GraphFilter::new()
            .with_query("RUST")
            .with_node_types(vec![NodeType::Note]);
        let out = filter_graph(&data, &filter);
        assert_eq!(out.nodes.len(), 1);
        assert_eq!(out.nodes[0].id, "n1");
    }

    #[test]
    fn test_search_matches_title_content_and_tags() {
        let mut data = GraphData::new(
            vec![
                node("a", NodeType::Note),
                node_with_tags("b", &["Databases"]),
                node("c", NodeType::Note),
                node("d", NodeType::Note),
            ],
            vec![link("ab", "a", "b"), link("cd", "c", "d")],
        );
        data.nodes[0].title = "Intro to databases".into();
        data.nodes[2].content = Some("Notes on DATABASE indexing".into());

        let result = search_nodes(&data, "  database ");
        let ids: Vec<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(result.total_results, 3);
        // Links touching any match are included
        assert_eq!(result.links.len(), 2);
    }

    #[test]
    fn test_search_blank_query_is_empty() {
        let data = make_abc_graph();
        assert_eq!(search_nodes(&data, ""), SearchResult::default());
        assert_eq!(search_nodes(&data, "   \t"), SearchResult::default());
    }
}
