use std::fmt::Write;

use super::flow::FlowGraph;
use super::node::NodeKind;

impl FlowGraph {
    /// Render the flow as a PlantUML state diagram.
    ///
    /// One state per node (display name, id, kind stereotype) and one
    /// transition per connection, labelled with the guard name when the
    /// connection is conditional.
    pub fn to_plantuml(&self) -> String {
        let mut uml = String::new();
        uml.push_str("@startuml\n");
        let _ = writeln!(uml, "!theme {}", self.options.theme);
        let _ = writeln!(uml, "title {}", self.name());
        uml.push('\n');

        for node in &self.nodes {
            let _ = writeln!(
                uml,
                "state \"{}\" as {} {}",
                escape(node.name()),
                node.id(),
                node.kind().stereotype()
            );
        }

        uml.push('\n');

        for conn in &self.connections {
            let _ = write!(uml, "{} --> {}", conn.from(), conn.to());
            if let Some(label) = conn.label() {
                let _ = write!(uml, " : {}", label);
            }
            uml.push('\n');
        }

        uml.push_str("\n@enduml");
        uml
    }

    /// Render the flow as a Graphviz DOT digraph.
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        let _ = writeln!(dot, "digraph \"{}\" {{", escape(self.name()));

        for node in &self.nodes {
            let _ = writeln!(
                dot,
                "    \"{}\" [label=\"{}\", shape={}];",
                escape(node.id()),
                escape(node.name()),
                dot_shape(node.kind())
            );
        }

        for conn in &self.connections {
            match conn.label() {
                Some(label) => {
                    let _ = writeln!(
                        dot,
                        "    \"{}\" -> \"{}\" [label=\"{}\"];",
                        escape(conn.from()),
                        escape(conn.to()),
                        escape(label)
                    );
                }
                None => {
                    let _ = writeln!(
                        dot,
                        "    \"{}\" -> \"{}\";",
                        escape(conn.from()),
                        escape(conn.to())
                    );
                }
            }
        }

        dot.push_str("}\n");
        dot
    }
}

fn dot_shape(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Command => "box",
        NodeKind::Query => "ellipse",
        NodeKind::Condition => "diamond",
        NodeKind::Generic => "component",
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::FlowOptions;

    fn two_node_flow() -> FlowGraph {
        let mut flow = FlowGraph::standalone("order", "Order Flow");
        flow.add_generic("create", "Create order", |_| Ok(json!(1)))
            .unwrap()
            .add_condition("check", "Stock available", |_| true)
            .unwrap()
            .connect("create", "check")
            .unwrap();
        flow
    }

    #[test]
    fn test_plantuml_two_nodes_one_edge() {
        let uml = two_node_flow().to_plantuml();
        assert!(uml.starts_with("@startuml\n!theme plain\ntitle Order Flow\n"));
        assert!(uml.contains("state \"Create order\" as create <<generic>>"));
        assert!(uml.contains("state \"Stock available\" as check <<choice>>"));
        assert_eq!(uml.matches("-->").count(), 1);
        assert!(uml.contains("create --> check\n"));
        assert!(uml.ends_with("@enduml"));
    }

    #[test]
    fn test_plantuml_labels_guarded_edges() {
        let mut flow = two_node_flow();
        flow.add_generic("ship", "Ship", |_| Ok(json!(true)))
            .unwrap()
            .add_generic("backorder", "Backorder", |_| Ok(json!(true)))
            .unwrap()
            .connect_when_true("check", "ship")
            .unwrap()
            .connect_when_false("check", "backorder")
            .unwrap();

        let uml = flow.to_plantuml();
        assert!(uml.contains("check --> ship : true\n"));
        assert!(uml.contains("check --> backorder : false\n"));
    }

    #[test]
    fn test_plantuml_empty_flow_is_framing_only() {
        let flow = FlowGraph::standalone("empty", "Empty");
        assert_eq!(
            flow.to_plantuml(),
            "@startuml\n!theme plain\ntitle Empty\n\n\n\n@enduml"
        );
    }

    #[test]
    fn test_plantuml_theme_from_options() {
        let flow = FlowGraph::standalone("f", "F").with_options(FlowOptions {
            theme: "sketchy".into(),
            ..Default::default()
        });
        assert!(flow.to_plantuml().contains("!theme sketchy\n"));
    }

    #[test]
    fn test_dot_contains_nodes_and_edges() {
        let dot = two_node_flow().to_dot();
        assert!(dot.starts_with("digraph \"Order Flow\" {\n"));
        assert!(dot.contains("\"create\" [label=\"Create order\", shape=component];"));
        assert!(dot.contains("\"check\" [label=\"Stock available\", shape=diamond];"));
        assert!(dot.contains("\"create\" -> \"check\";"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_export_escapes_quotes() {
        let mut flow = FlowGraph::standalone("f", "F");
        flow.add_generic("a", "Say \"hi\"", |_| Ok(json!(null))).unwrap();
        assert!(flow.to_plantuml().contains("state \"Say \\\"hi\\\"\" as a"));
    }
}
