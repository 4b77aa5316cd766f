//! Textual graph export for external rendering tools.
//!
//! Both formats are derived read-only from a [`GraphDefinition`]. Nodes are
//! listed alphabetically, edges in declaration order, so output is stable
//! across runs. Fork-to-branch dispatch is drawn dashed; conditional edges
//! carry their label, or `?` when unlabeled.

use crate::graph::GraphDefinition;
use crate::node::NodeKind;
use std::collections::{HashMap, HashSet};

impl GraphDefinition {
    /// Render as a Mermaid `flowchart TD`.
    pub fn to_mermaid(&self) -> String {
        let mut lines = vec!["flowchart TD".to_string()];
        let ids = self.mermaid_ids();

        for name in self.node_names() {
            let text = mermaid_text(name);
            let shape = match self.nodes[name].kind {
                NodeKind::Fork { .. } | NodeKind::Join { .. } => format!("{{{{{}}}}}", text),
                NodeKind::Action(_) if name == self.entry_node => format!("([{}])", text),
                NodeKind::Action(_) => format!("[{}]", text),
            };
            lines.push(format!("    {}{}", ids[name], shape));
        }

        for name in self.node_names() {
            if let NodeKind::Fork { branches } = &self.nodes[name].kind {
                for branch in branches {
                    lines.push(format!("    {} -.-> {}", ids[name], ids[branch.as_str()]));
                }
            }
        }

        for edge in &self.edges {
            let from = &ids[edge.from.as_str()];
            let to = &ids[edge.to.as_str()];
            match (&edge.label, edge.is_conditional()) {
                (Some(label), _) => {
                    lines.push(format!("    {} -->|{}| {}", from, mermaid_text(label), to))
                }
                (None, true) => lines.push(format!("    {} -->|?| {}", from, to)),
                (None, false) => lines.push(format!("    {} --> {}", from, to)),
            }
        }

        lines.join("\n")
    }

    /// Render as a Graphviz `digraph`.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("digraph \"{}\" {{\n", escape(&self.name)));
        out.push_str("    rankdir=TB;\n");

        for name in self.node_names() {
            let node = &self.nodes[name];
            let shape = match node.kind {
                NodeKind::Fork { .. } | NodeKind::Join { .. } => "diamond",
                NodeKind::Action(_) if name == self.entry_node => "doublecircle",
                NodeKind::Action(_) => "box",
            };
            let tooltip = if node.description.is_empty() {
                String::new()
            } else {
                format!(", tooltip=\"{}\"", escape(&node.description))
            };
            out.push_str(&format!(
                "    \"{}\" [shape={}{}];\n",
                escape(name),
                shape,
                tooltip
            ));
        }

        for name in self.node_names() {
            if let NodeKind::Fork { branches } = &self.nodes[name].kind {
                for branch in branches {
                    out.push_str(&format!(
                        "    \"{}\" -> \"{}\" [style=dashed];\n",
                        escape(name),
                        escape(branch)
                    ));
                }
            }
        }

        for edge in &self.edges {
            let label = match (&edge.label, edge.is_conditional()) {
                (Some(label), _) => format!(" [label=\"{}\"]", escape(label)),
                (None, true) => " [label=\"?\"]".to_string(),
                (None, false) => String::new(),
            };
            out.push_str(&format!(
                "    \"{}\" -> \"{}\"{};\n",
                escape(&edge.from),
                escape(&edge.to),
                label
            ));
        }

        out.push_str("}\n");
        out
    }
}

impl GraphDefinition {
    /// One Mermaid id per node. Punctuation becomes `_`; names that collide
    /// after that get a numeric suffix, assigned in alphabetical order.
    fn mermaid_ids(&self) -> HashMap<&str, String> {
        let mut taken = HashSet::new();
        let mut ids = HashMap::with_capacity(self.nodes.len());
        for name in self.node_names() {
            let base = mermaid_id(name);
            let mut id = base.clone();
            let mut n = 2;
            while !taken.insert(id.clone()) {
                id = format!("{}_{}", base, n);
                n += 1;
            }
            ids.insert(name, id);
        }
        ids
    }
}

/// Mermaid ids cannot contain most punctuation, and `end` is a keyword.
fn mermaid_id(name: &str) -> String {
    let id: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if id.is_empty() || id.eq_ignore_ascii_case("end") {
        format!("{}_", id)
    } else {
        id
    }
}

/// Entity-encode characters that end a Mermaid label early.
fn mermaid_text(text: &str) -> String {
    text.replace('"', "#quot;").replace('|', "#124;")
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
