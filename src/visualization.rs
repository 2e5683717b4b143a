//! Visualization module for Netviz
//!
//! This module holds the Cytoscape element model returned by the query service, the
//! styling pass that rescales pre-computed metrics onto visual attributes, and the
//! document/HTML output that hands the result to Cytoscape.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::color::GradientColorScaler;
use crate::scaling::LinearScaler;
use crate::ui::format_status;
use crate::Result;

/// Cytoscape release loaded by generated pages
const CYTOSCAPE_CDN: &str = "https://unpkg.com/cytoscape@3.28.1/dist/cytoscape.min.js";

/// A single node or edge as exchanged with Cytoscape.
///
/// Only `data` is interpreted. Every other key (`position`, `group`, `classes`, ...)
/// is carried through unmodified.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Named attributes of the element, e.g. `id`, `name`, `out_degree`, `weight`
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Any other top-level fields of the element
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Element {
    /// Creates an element from a `data` object; non-object values yield empty data
    pub fn from_data(data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            data,
            extra: Map::new(),
        }
    }

    /// Reads a numeric attribute given as a JSON number or a numeric string
    pub fn number(&self, key: &str) -> Option<f64> {
        let value = match self.data.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.data.insert(key.to_string(), value.into());
    }
}

/// Node and edge lists in Cytoscape's grouped element format
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Elements {
    #[serde(default)]
    pub nodes: Vec<Element>,
    #[serde(default)]
    pub edges: Vec<Element>,
}

impl Elements {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Pagerank used for nodes the service did not rank
const PAGERANK_FALLBACK: f64 = 0.001;

/// Node metric that drives node size
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SizeSource {
    /// `sqrt(out_degree)`, missing counts as 0
    #[default]
    OutDegree,
    /// `pagerank`, missing or zero counts as 0.001
    Pagerank,
}

impl SizeSource {
    fn metric(self, node: &Element) -> f64 {
        match self {
            SizeSource::OutDegree => node
                .number("out_degree")
                .map(f64::sqrt)
                .filter(|v| v.is_finite())
                .unwrap_or(0.0),
            SizeSource::Pagerank => node
                .number("pagerank")
                .filter(|p| *p != 0.0)
                .unwrap_or(PAGERANK_FALLBACK),
        }
    }
}

/// Display ranges used by [`apply_style`]
#[derive(Clone, Debug, PartialEq)]
pub struct StyleConfig {
    /// Node diameter range, fed by [`size_source`](Self::size_source)
    pub node_size: (f64, f64),
    /// Metric mapped onto `node_size`
    pub size_source: SizeSource,
    /// Gradient endpoints for node color, fed by `distance`
    pub node_colors: (String, String),
    /// Edge width range, fed by `weight`
    pub edge_width: (f64, f64),
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            node_size: (10.0, 35.0),
            size_source: SizeSource::OutDegree,
            node_colors: ("rgb(255, 0, 0)".to_string(), "rgb(0, 0, 255)".to_string()),
            edge_width: (1.0, 6.0),
        }
    }
}

/// Writes `size` and `color` onto every node and `weight` onto every edge.
///
/// Missing or unusable metrics fall back to the defaults the service implies: out-degree
/// and distance count as 0, a missing or zero pagerank counts as 0.001, and an edge
/// weight that is missing or zero counts as 1. An empty node or edge list is left alone.
pub fn apply_style(elements: &mut Elements, style: &StyleConfig) -> Result<()> {
    if elements.nodes.is_empty() {
        log::debug!("no nodes to style");
    } else {
        let metrics: Vec<f64> = elements
            .nodes
            .iter()
            .map(|n| style.size_source.metric(n))
            .collect();
        let sizes =
            LinearScaler::new(style.node_size.0, style.node_size.1).fit_transform(&metrics)?;

        let distances: Vec<f64> = elements
            .nodes
            .iter()
            .map(|n| n.number("distance").unwrap_or(0.0))
            .collect();
        let colors = GradientColorScaler::new(&style.node_colors.0, &style.node_colors.1)
            .fit_transform(&distances)?;

        for ((node, size), color) in elements.nodes.iter_mut().zip(sizes).zip(colors) {
            node.set("size", size);
            node.set("color", color);
        }
    }

    if elements.edges.is_empty() {
        log::debug!("no edges to style");
    } else {
        let weights: Vec<f64> = elements
            .edges
            .iter()
            .map(|e| e.number("weight").filter(|w| *w != 0.0).unwrap_or(1.0))
            .collect();
        let widths =
            LinearScaler::new(style.edge_width.0, style.edge_width.1).fit_transform(&weights)?;

        for (edge, width) in elements.edges.iter_mut().zip(widths) {
            edge.set("weight", width);
        }
    }

    log::debug!(
        "styled {} nodes and {} edges",
        elements.nodes.len(),
        elements.edges.len()
    );
    Ok(())
}

/// Escapes text so a GraphML or signature payload displays literally inside HTML
pub fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Force-directed `cose` layout used for every rendered network
pub fn cose_layout() -> Value {
    json!({
        "name": "cose",
        "idealEdgeLength": 100,
        "nodeOverlap": 20,
        "refresh": 20,
        "fit": true,
        "padding": 30,
        "randomize": false,
        "componentSpacing": 100,
        "nodeRepulsion": 400000,
        "edgeElasticity": 100,
        "nestingFactor": 5,
        "gravity": 80,
        "numIter": 1000,
        "initialTemp": 200,
        "coolingFactor": 0.95,
        "minTemp": 1.0
    })
}

/// How node positions are chosen when the network is drawn
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Layout {
    /// Force-directed [`cose_layout`]
    #[default]
    Cose,
    /// Fixed positions from each node's `x`/`y` data, multiplied by `scale`
    Preset { scale: f64 },
}

impl Layout {
    /// Multiplier applied to `x`/`y` when no other scale is given
    pub const DEFAULT_PRESET_SCALE: f64 = 400.0;

    pub fn to_value(&self) -> Value {
        match self {
            Layout::Cose => cose_layout(),
            Layout::Preset { .. } => json!({ "name": "preset" }),
        }
    }
}

/// Style sheet reading the attributes written by [`apply_style`]
pub fn network_style() -> Value {
    json!([
        {
            "selector": "node",
            "style": {
                "shape": "ellipse",
                "height": "16px",
                "width": "16px",
                "text-valign": "center",
                "text-halign": "right",
                "background-color": "#555",
                "content": "data(name)",
                "text-margin-x": 4
            }
        },
        {
            "selector": "node[size]",
            "style": { "height": "data(size)", "width": "data(size)" }
        },
        {
            "selector": "node[color]",
            "style": { "background-color": "data(color)" }
        },
        {
            "selector": "node[distance < 1]",
            "style": { "border-width": 2, "border-color": "black" }
        },
        {
            "selector": "edge",
            "style": {
                "width": "data(weight)",
                "line-color": "#999",
                "curve-style": "bezier",
                "content": "data(label)",
                "target-arrow-shape": "triangle",
                "color": "#555",
                "font-size": "11",
                "text-valign": "top",
                "text-halign": "center",
                "edge-text-rotation": "autorotate",
                "text-background-opacity": 1,
                "text-background-color": "#FFF",
                "text-background-shape": "roundrectangle"
            }
        },
        {
            "selector": "edge[!label]",
            "style": { "content": "-" }
        }
    ])
}

/// Everything Cytoscape needs to draw a network: elements, layout and style
#[derive(Clone, Debug, Serialize)]
pub struct CytoscapeDocument {
    pub elements: Elements,
    pub layout: Value,
    pub style: Value,
    /// Graph-level metrics reported by the service, shown as a status line
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metrics: Map<String, Value>,
}

impl CytoscapeDocument {
    pub fn new(elements: Elements, metrics: Map<String, Value>) -> Self {
        Self {
            elements,
            layout: cose_layout(),
            style: network_style(),
            metrics,
        }
    }

    /// Switches to `layout`. A preset layout also writes `position` onto every node
    /// that carries numeric `x` and `y` data; other nodes keep what they had.
    pub fn with_layout(mut self, layout: &Layout) -> Self {
        self.layout = layout.to_value();

        if let Layout::Preset { scale } = *layout {
            let mut placed = 0;
            for node in &mut self.elements.nodes {
                if let (Some(x), Some(y)) = (node.number("x"), node.number("y")) {
                    node.extra
                        .insert("position".to_string(), json!({ "x": x * scale, "y": y * scale }));
                    placed += 1;
                }
            }
            log::debug!(
                "preset layout placed {} of {} nodes",
                placed,
                self.elements.nodes.len()
            );
        }
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Generate a standalone HTML page that renders the network with Cytoscape
    pub fn to_html(&self, title: &str) -> Result<String> {
        // `</` inside the inline script would end it early.
        let config = serde_json::to_string(&json!({
            "elements": self.elements,
            "layout": self.layout,
            "style": self.style,
        }))?
        .replace("</", "<\\/");

        let mut html = String::from("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("  <meta charset=\"utf-8\">\n");
        html.push_str(&format!("  <title>{}</title>\n", escape_markup(title)));
        html.push_str(&format!("  <script src=\"{}\"></script>\n", CYTOSCAPE_CDN));
        html.push_str("  <style>\n");
        html.push_str("    body { margin: 0; font-family: sans-serif; }\n");
        html.push_str("    #info { padding: 4px 8px; font-size: 12px; color: #555; }\n");
        html.push_str(
            "    #network { position: absolute; top: 28px; bottom: 0; left: 0; right: 0; }\n",
        );
        html.push_str("  </style>\n</head>\n<body>\n");
        html.push_str(&format!(
            "  <div id=\"info\">{}</div>\n",
            escape_markup(&format_status(&self.metrics))
        ));
        html.push_str("  <div id=\"network\"></div>\n");
        html.push_str("  <script>\n");
        html.push_str(&format!("    var config = {};\n", config));
        html.push_str("    config.container = document.getElementById('network');\n");
        html.push_str("    var cy = cytoscape(config);\n");
        html.push_str("  </script>\n</body>\n</html>\n");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(data: Value) -> Element {
        Element::from_data(data)
    }

    fn create_ego_network() -> Elements {
        Elements {
            nodes: vec![
                node(json!({"id": "p660", "name": "Ego", "out_degree": 4, "distance": 0})),
                node(json!({"id": "p1", "name": "Parent", "out_degree": 1, "distance": 1})),
                node(json!({"id": "p2", "name": "Child", "out_degree": 0, "distance": 1})),
            ],
            edges: vec![
                node(json!({"source": "p660", "target": "p1", "label": "child of"})),
                node(json!({"source": "p2", "target": "p660", "label": "child of"})),
            ],
        }
    }

    fn sizes(elements: &Elements) -> Vec<f64> {
        elements
            .nodes
            .iter()
            .map(|n| n.number("size").unwrap())
            .collect()
    }

    #[test]
    fn test_apply_style_defaults() {
        let mut elements = create_ego_network();
        apply_style(&mut elements, &StyleConfig::default()).unwrap();

        // sqrt(out_degree) = [2, 1, 0]
        assert_eq!(sizes(&elements), vec![35.0, 22.5, 10.0]);

        let colors: Vec<&str> = elements
            .nodes
            .iter()
            .map(|n| n.data["color"].as_str().unwrap())
            .collect();
        assert_eq!(colors, vec!["rgb(255, 0, 0)", "rgb(0, 0, 255)", "rgb(0, 0, 255)"]);

        // No weights given: every edge counts as 1, a degenerate batch.
        for edge in &elements.edges {
            assert_eq!(edge.number("weight"), Some(1.0));
        }
    }

    #[test]
    fn test_node_sizes_from_degrees() {
        let mut elements = Elements {
            nodes: vec![
                node(json!({"out_degree": 0})),
                node(json!({"out_degree": 1})),
                node(json!({"out_degree": 16})),
            ],
            edges: vec![],
        };
        apply_style(&mut elements, &StyleConfig::default()).unwrap();

        assert_eq!(sizes(&elements), vec![10.0, 16.25, 35.0]);
    }

    #[test]
    fn test_node_sizes_from_pagerank() {
        let mut elements = Elements {
            nodes: vec![
                node(json!({"pagerank": 0.201, "out_degree": 0})),
                node(json!({"pagerank": "0.101", "out_degree": 9})),
                node(json!({"pagerank": 0})),
                node(json!({"id": "unranked"})),
            ],
            edges: vec![],
        };
        let style = StyleConfig {
            size_source: SizeSource::Pagerank,
            ..StyleConfig::default()
        };
        apply_style(&mut elements, &style).unwrap();

        let expected = [35.0, 22.5, 10.0, 10.0];
        for (actual, expected) in sizes(&elements).iter().zip(expected) {
            assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
        }
    }

    #[test]
    fn test_edge_weights_rescaled() {
        let mut elements = Elements {
            nodes: vec![],
            edges: vec![
                node(json!({"weight": 1})),
                node(json!({"weight": "3"})),
                node(json!({"weight": 0})),
                node(json!({"weight": 11})),
            ],
        };
        apply_style(&mut elements, &StyleConfig::default()).unwrap();

        let widths: Vec<f64> = elements
            .edges
            .iter()
            .map(|e| e.number("weight").unwrap())
            .collect();
        assert_eq!(widths, vec![1.0, 2.0, 1.0, 6.0]);
    }

    #[test]
    fn test_missing_metrics_use_fallbacks() {
        let mut elements = Elements {
            nodes: vec![node(json!({"id": "a"})), node(json!({"id": "b", "out_degree": "n/a"}))],
            edges: vec![],
        };
        apply_style(&mut elements, &StyleConfig::default()).unwrap();

        for n in &elements.nodes {
            assert_eq!(n.number("size"), Some(10.0));
            assert_eq!(n.data["color"], json!("rgb(255, 0, 0)"));
        }
    }

    #[test]
    fn test_empty_elements_are_left_alone() {
        let mut elements = Elements::default();
        apply_style(&mut elements, &StyleConfig::default()).unwrap();
        assert!(elements.is_empty());
    }

    #[test]
    fn test_custom_style_ranges() {
        let style = StyleConfig {
            node_size: (5.0, 5.0),
            size_source: SizeSource::OutDegree,
            node_colors: ("rgb(0,0,0)".to_string(), "rgb(100,100,100)".to_string()),
            edge_width: (2.0, 4.0),
        };
        let mut elements = create_ego_network();
        elements.edges[1].set("weight", 3);
        apply_style(&mut elements, &style).unwrap();

        assert_eq!(elements.nodes[1].number("size"), Some(5.0));
        assert_eq!(elements.nodes[1].data["color"], json!("rgb(100,100,100)"));
        assert_eq!(elements.edges[0].number("weight"), Some(2.0));
        assert_eq!(elements.edges[1].number("weight"), Some(4.0));
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let raw = json!({
            "nodes": [{"data": {"id": "a"}, "position": {"x": 1, "y": 2}, "group": "nodes"}],
            "edges": []
        });
        let mut elements: Elements = serde_json::from_value(raw).unwrap();
        apply_style(&mut elements, &StyleConfig::default()).unwrap();

        let back = serde_json::to_value(&elements).unwrap();
        assert_eq!(back["nodes"][0]["position"], json!({"x": 1, "y": 2}));
        assert_eq!(back["nodes"][0]["group"], json!("nodes"));
        assert_eq!(back["nodes"][0]["data"]["id"], json!("a"));
        assert_eq!(back["nodes"][0]["data"]["size"], json!(10.0));
    }

    #[test]
    fn test_escape_markup() {
        assert_eq!(escape_markup("<graphml>"), "&lt;graphml&gt;");
        assert_eq!(escape_markup("a & b"), "a &amp; b");
        assert_eq!(escape_markup("&lt;"), "&amp;lt;");
    }

    #[test]
    fn test_document_json() {
        let mut metrics = Map::new();
        metrics.insert("nodes".to_string(), json!(3));
        let doc = CytoscapeDocument::new(create_ego_network(), metrics);

        let value: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(value["layout"]["name"], json!("cose"));
        assert_eq!(value["elements"]["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(value["metrics"]["nodes"], json!(3));
        assert!(value["style"]
            .as_array()
            .unwrap()
            .iter()
            .any(|s| s["style"]["width"] == json!("data(weight)")));
    }

    #[test]
    fn test_preset_layout_positions_nodes() {
        let mut elements = create_ego_network();
        elements.nodes[0].set("x", 0.5);
        elements.nodes[0].set("y", -0.25);
        elements.nodes[1].set("x", "1");
        elements.nodes[1].set("y", 0);
        elements.nodes[2].extra.insert("position".to_string(), json!({"x": 7, "y": 8}));

        let doc = CytoscapeDocument::new(elements, Map::new())
            .with_layout(&Layout::Preset { scale: Layout::DEFAULT_PRESET_SCALE });
        let value: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();

        assert_eq!(value["layout"], json!({"name": "preset"}));
        let nodes = &value["elements"]["nodes"];
        assert_eq!(nodes[0]["position"], json!({"x": 200.0, "y": -100.0}));
        assert_eq!(nodes[1]["position"], json!({"x": 400.0, "y": 0.0}));
        assert_eq!(nodes[2]["position"], json!({"x": 7, "y": 8}));
    }

    #[test]
    fn test_cose_layout_leaves_positions_alone() {
        let mut elements = create_ego_network();
        elements.nodes[0].set("x", 0.5);
        elements.nodes[0].set("y", 0.5);

        let doc = CytoscapeDocument::new(elements, Map::new()).with_layout(&Layout::Cose);
        assert_eq!(doc.layout["name"], json!("cose"));
        assert!(doc.elements.nodes[0].extra.get("position").is_none());
    }

    #[test]
    fn test_style_labels() {
        let style = network_style();
        let rules = style.as_array().unwrap();

        let node_rule = rules.iter().find(|r| r["selector"] == json!("node")).unwrap();
        assert_eq!(node_rule["style"]["content"], json!("data(name)"));
        assert_eq!(node_rule["style"]["text-margin-x"], json!(4));

        let unlabeled = rules
            .iter()
            .find(|r| r["selector"] == json!("edge[!label]"))
            .unwrap();
        assert_eq!(unlabeled["style"]["content"], json!("-"));
    }

    #[test]
    fn test_document_without_metrics_omits_field() {
        let doc = CytoscapeDocument::new(Elements::default(), Map::new());
        let value: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert!(value.get("metrics").is_none());
    }

    #[test]
    fn test_html_page() {
        let mut elements = create_ego_network();
        elements.nodes[0].set("name", "</script><b>");
        let mut metrics = Map::new();
        metrics.insert("status".to_string(), json!("ok"));
        let doc = CytoscapeDocument::new(elements, metrics);

        let html = doc.to_html("Family <network>").unwrap();
        assert!(html.contains("<title>Family &lt;network&gt;</title>"));
        assert!(html.contains(CYTOSCAPE_CDN));
        assert!(html.contains("<div id=\"info\">status: ok</div>"));
        assert!(html.contains("<\\/script><b>"));
        assert_eq!(html.matches("</script>").count(), 2);
    }
}
