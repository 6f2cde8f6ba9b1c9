//! Serializer: snapshot export/import and bulk import from notes.
//!
//! ## Formats
//!
//! - `json`: structural serialization of [`GraphData`], readable back with
//!   [`import_graph`]
//! - `csv`: a `# Nodes` table and a `# Links` table separated by a blank
//!   line; every value is double-quoted and tags are joined with `;`
//! - `dot`: Graphviz text
//! - `png`, `svg`: recognized but not rendered by the engine

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::models::{GraphData, GraphLink, GraphNode, LinkType, NewLink, NewNode, NodeType};
use crate::error::{GraphError, Result};

/// Tag attached to every node created by [`import_from_notes`].
pub const IMPORTED_TAG: &str = "imported";

const CSV_NODE_HEADER: &str = "id,title,type,content,tags,createdAt,updatedAt";
const CSV_LINK_HEADER: &str = "id,source,target,type,weight,label";

/// Export format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    Dot,
    Png,
    Svg,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
            Self::Dot => write!(f, "dot"),
            Self::Png => write!(f, "png"),
            Self::Svg => write!(f, "svg"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = GraphError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "dot" => Ok(Self::Dot),
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            _ => Err(GraphError::InvalidInput(format!(
                "Unknown export format: {}",
                s
            ))),
        }
    }
}

/// Export options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Indent JSON output
    pub pretty: bool,
    /// Keep `x`/`y` in JSON and DOT output
    pub include_positions: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Json,
            pretty: true,
            include_positions: true,
        }
    }
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }
}

// ============================================================================
// Export
// ============================================================================

/// Serialize a snapshot. `png` and `svg` fail with `UnsupportedFormat`.
pub fn export_graph(data: &GraphData, options: &ExportOptions) -> Result<String> {
    let output = match options.format {
        ExportFormat::Json => to_json(data, options)?,
        ExportFormat::Csv => to_csv(data)?,
        ExportFormat::Dot => to_dot(data, options.include_positions),
        ExportFormat::Png | ExportFormat::Svg => {
            return Err(GraphError::UnsupportedFormat(options.format.to_string()))
        }
    };
    debug!(
        format = %options.format,
        nodes = data.nodes.len(),
        bytes = output.len(),
        "Graph exported"
    );
    Ok(output)
}

fn to_json(data: &GraphData, options: &ExportOptions) -> Result<String> {
    let stripped;
    let data = if options.include_positions {
        data
    } else {
        let mut copy = data.clone();
        for node in copy.nodes.iter_mut() {
            node.x = None;
            node.y = None;
        }
        stripped = copy;
        &stripped
    };
    let json = if options.pretty {
        serde_json::to_string_pretty(data)?
    } else {
        serde_json::to_string(data)?
    };
    Ok(json)
}

fn csv_node_record(node: &GraphNode) -> [String; 7] {
    [
        node.id.clone(),
        node.title.clone(),
        node.node_type.to_string(),
        node.content.clone().unwrap_or_default(),
        node.tags.join(";"),
        node.created_at.to_rfc3339(),
        node.updated_at.to_rfc3339(),
    ]
}

fn csv_link_record(link: &GraphLink) -> [String; 6] {
    [
        link.id.clone(),
        link.source.clone(),
        link.target.clone(),
        link.link_type.to_string(),
        link.weight.map(|w| w.to_string()).unwrap_or_default(),
        link.label.clone().unwrap_or_default(),
    ]
}

/// Write one `# <title>` section: marker, unquoted header, then every record
/// fully quoted.
fn write_csv_section<R, I>(out: &mut String, title: &str, header: &str, records: I) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    out.push_str("# ");
    out.push_str(title);
    out.push('\n');
    out.push_str(header);
    out.push('\n');

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for record in records {
        writer.write_record(record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| GraphError::Csv(e.into_error().into()))?;
    let rows = String::from_utf8(bytes).map_err(|e| GraphError::InvalidInput(e.to_string()))?;
    out.push_str(&rows);
    Ok(())
}

fn to_csv(data: &GraphData) -> Result<String> {
    let mut out = String::new();
    write_csv_section(
        &mut out,
        "Nodes",
        CSV_NODE_HEADER,
        data.nodes.iter().map(csv_node_record),
    )?;
    out.push('\n');
    write_csv_section(
        &mut out,
        "Links",
        CSV_LINK_HEADER,
        data.links.iter().map(csv_link_record),
    )?;
    Ok(out)
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn to_dot(data: &GraphData, include_positions: bool) -> String {
    let mut dot = String::from("digraph knowledge_graph {\n");
    dot.push_str("    node [shape=box, style=\"filled,rounded\"];\n\n");

    for node in &data.nodes {
        let shape = match node.node_type {
            NodeType::Note => "box",
            NodeType::Tag => "ellipse",
            NodeType::Folder => "folder",
            NodeType::Link => "note",
        };
        let mut attrs = format!(
            "label=\"{}\", shape={}",
            escape_dot(&node.title),
            shape
        );
        if let Some(color) = &node.color {
            attrs.push_str(&format!(", fillcolor=\"{}\"", escape_dot(color)));
        }
        if include_positions {
            if let (Some(x), Some(y)) = (node.x, node.y) {
                attrs.push_str(&format!(", pos=\"{},{}!\"", x, y));
            }
        }
        dot.push_str(&format!("    \"{}\" [{}];\n", escape_dot(&node.id), attrs));
    }

    dot.push('\n');

    for link in &data.links {
        let style = match link.link_type {
            LinkType::Reference => "solid",
            LinkType::Tag => "dashed",
            LinkType::Folder => "bold",
            LinkType::Similarity => "dotted",
            LinkType::Custom => "solid",
        };
        let label = link
            .label
            .clone()
            .unwrap_or_else(|| link.link_type.to_string());
        dot.push_str(&format!(
            "    \"{}\" -> \"{}\" [label=\"{}\", style={}, penwidth={}];\n",
            escape_dot(&link.source),
            escape_dot(&link.target),
            escape_dot(&label),
            style,
            link.cost().clamp(0.5, 3.0)
        ));
    }

    dot.push_str("}\n");
    dot
}

// ============================================================================
// Import
// ============================================================================

/// Parse a JSON export back into a snapshot, checking referential integrity.
pub fn import_graph(json: &str) -> Result<GraphData> {
    let data: GraphData = serde_json::from_str(json)?;
    data.validate()?;
    Ok(data)
}

/// Build a snapshot from external note ids.
///
/// One `note` node per distinct id (the note id becomes the node id, with
/// placeholder title and content and the `imported` tag), chained by
/// `reference` links in input order. Repeated ids are skipped. The result is
/// not stored.
pub fn import_from_notes<S: AsRef<str>>(note_ids: &[S]) -> GraphData {
    let ids: Vec<&str> = note_ids.iter().map(|id| id.as_ref()).collect();
    let mut seen = HashSet::new();
    let nodes: Vec<GraphNode> = ids
        .into_iter()
        .filter(|id| seen.insert(*id))
        .map(|id| {
            GraphNode::from_new(
                id,
                NewNode::new(format!("Note {}", id), NodeType::Note)
                    .with_content(format!("Content for note {}", id))
                    .with_tags([IMPORTED_TAG]),
            )
        })
        .collect();

    let links = nodes
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            GraphLink::from_new(
                format!("link-{}", i),
                NewLink::new(&pair[0].id, &pair[1].id, LinkType::Reference).with_weight(1.0),
            )
        })
        .collect();

    debug!(notes = nodes.len(), "Imported notes into graph data");
    GraphData { nodes, links }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{link, make_abc_graph, node, node_at, node_with_tags};

    #[test]
    fn test_format_parse() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("xml".parse::<ExportFormat>().unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_png_and_svg_unsupported() {
        let data = make_abc_graph();
        for format in [ExportFormat::Png, ExportFormat::Svg] {
            let err = export_graph(&data, &ExportOptions::new(format)).unwrap_err();
            assert!(matches!(err, GraphError::UnsupportedFormat(_)));
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let mut data = make_abc_graph();
        data.nodes[0].x = Some(12.5);
        data.links[0].weight = Some(0.5);
        let json = export_graph(&data, &ExportOptions::default()).unwrap();
        let back = import_graph(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_json_without_positions() {
        let data = GraphData::new(vec![node_at("a", 1.0, 2.0)], vec![]);
        let options = ExportOptions {
            format: ExportFormat::Json,
            pretty: false,
            include_positions: false,
        };
        let json = export_graph(&data, &options).unwrap();
        assert!(!json.contains("\"x\""));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_import_rejects_dangling_links() {
        let data = GraphData::new(vec![node("a", NodeType::Note)], vec![link("l", "a", "b")]);
        let json = serde_json::to_string(&data).unwrap();
        assert!(import_graph(&json).unwrap_err().is_invalid_input());
        assert!(matches!(
            import_graph("{not json"),
            Err(GraphError::Serialization(_))
        ));
    }

    #[test]
    fn test_csv_layout() {
        let mut data = GraphData::new(
            vec![
                node_with_tags("a", &["x", "y"]),
                node("b", NodeType::Tag),
            ],
            vec![link("ab", "a", "b")],
        );
        data.nodes[0].title = "Say \"hi\"".into();
        data.links[0].weight = Some(2.0);

        let csv = export_graph(&data, &ExportOptions::new(ExportFormat::Csv)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "# Nodes");
        assert_eq!(lines[1], CSV_NODE_HEADER);
        assert!(lines[2].starts_with("\"a\",\"Say \"\"hi\"\"\",\"note\",\"\",\"x;y\","));
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "# Links");
        assert_eq!(lines[6], CSV_LINK_HEADER);
        assert_eq!(lines[7], "\"ab\",\"a\",\"b\",\"reference\",\"2\",\"\"");
    }

    #[test]
    fn test_csv_fields_with_separators_read_back() {
        let mut data = GraphData::new(vec![node("a", NodeType::Note)], vec![]);
        data.nodes[0].title = "one, two".into();
        data.nodes[0].content = Some("line1\nline2".into());

        let text = export_graph(&data, &ExportOptions::new(ExportFormat::Csv)).unwrap();
        let nodes_table = text
            .split("\n\n# Links")
            .next()
            .unwrap()
            .trim_start_matches("# Nodes\n");
        let mut reader = csv::Reader::from_reader(nodes_table.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "a");
        assert_eq!(&row[1], "one, two");
        assert_eq!(&row[3], "line1\nline2");
        assert!(text.ends_with("# Links\nid,source,target,type,weight,label\n"));
    }

    #[test]
    fn test_dot_output() {
        let mut data = make_abc_graph();
        data.nodes[0].x = Some(1.0);
        data.nodes[0].y = Some(2.0);
        let dot = export_graph(&data, &ExportOptions::new(ExportFormat::Dot)).unwrap();
        assert!(dot.starts_with("digraph knowledge_graph {"));
        assert!(dot.contains("\"A\" -> \"B\""));
        assert!(dot.contains("pos=\"1,2!\""));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_import_from_notes_chain() {
        let data = import_from_notes(&["n1", "n2", "n3"]);
        assert_eq!(data.nodes.len(), 3);
        assert_eq!(data.links.len(), 2);
        assert_eq!(data.nodes[0].id, "n1");
        assert_eq!(data.nodes[0].title, "Note n1");
        assert_eq!(data.nodes[0].content.as_deref(), Some("Content for note n1"));
        assert_eq!(data.nodes[0].tags, vec![IMPORTED_TAG]);
        assert_eq!(data.links[0].id, "link-0");
        assert_eq!((data.links[1].source.as_str(), data.links[1].target.as_str()), ("n2", "n3"));
        assert_eq!(data.links[0].link_type, LinkType::Reference);
        assert!(data.validate().is_ok());
    }

    #[test]
    fn test_import_from_notes_edge_cases() {
        let empty: [&str; 0] = [];
        assert!(import_from_notes(&empty).is_empty());

        let single = import_from_notes(&["only"]);
        assert_eq!(single.nodes.len(), 1);
        assert!(single.links.is_empty());

        let repeated = import_from_notes(&["a", "b", "a"]);
        assert_eq!(repeated.nodes.len(), 2);
        assert_eq!(repeated.links.len(), 1);
    }
}
