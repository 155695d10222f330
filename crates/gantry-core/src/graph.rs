//! Table nesting graph and ancestry-ordered traversal

use crate::error::{CoreError, CoreResult};
use crate::schema::Schema;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

/// A directed graph of table nesting (edges point from parent to child)
#[derive(Debug)]
pub struct TableGraph {
    /// The underlying graph
    graph: DiGraph<String, ()>,

    /// Map from table name to node index
    node_map: HashMap<String, NodeIndex>,
}

impl TableGraph {
    /// Build the nesting graph for a schema and validate it
    pub fn build(schema: &Schema) -> CoreResult<Self> {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for name in schema.table_names() {
            let idx = graph.add_node(name.to_string());
            node_map.insert(name.to_string(), idx);
        }

        for table in schema.tables() {
            if let Some(parent) = &table.parent {
                let Some(&parent_idx) = node_map.get(parent.as_str()) else {
                    return Err(CoreError::UnknownParent {
                        table: table.name.clone(),
                        parent: parent.clone(),
                    });
                };
                let child_idx = node_map[table.name.as_str()];
                graph.add_edge(parent_idx, child_idx, ());
            }
        }

        let built = Self { graph, node_map };
        built.validate()?;
        Ok(built)
    }

    /// Validate the nesting graph has no cycles
    pub fn validate(&self) -> CoreResult<()> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => {
                let cycle_str = self.find_cycle_path(cycle.node_id());
                Err(CoreError::CircularNesting { cycle: cycle_str })
            }
        }
    }

    /// Find a cycle path starting from a node for error reporting
    fn find_cycle_path(&self, start: NodeIndex) -> String {
        let mut path: Vec<String> = vec![self.graph[start].clone()];
        let mut current = start;
        let mut visited = HashSet::new();
        visited.insert(current);

        while let Some(edge) = self.graph.edges(current).next() {
            let target = edge.target();
            path.push(self.graph[target].clone());

            if target == start || visited.contains(&target) {
                break;
            }

            visited.insert(target);
            current = target;
        }

        path.join(" -> ")
    }

    /// Check if a table exists in the graph
    pub fn contains(&self, table: &str) -> bool {
        self.node_map.contains_key(table)
    }

    /// Walk parent edges up to the root table of `table`
    pub fn root_of(&self, table: &str) -> CoreResult<&str> {
        let Some(&idx) = self.node_map.get(table) else {
            return Err(CoreError::TableNotFound {
                name: table.to_string(),
            });
        };

        let mut current = idx;
        loop {
            let mut parents = self
                .graph
                .edges_directed(current, petgraph::Direction::Incoming);
            match parents.next() {
                Some(edge) => current = edge.source(),
                None => return Ok(self.graph[current].as_str()),
            }
        }
    }

    /// Names of all root tables (tables without a parent), in name order
    pub fn roots(&self) -> Vec<&str> {
        let mut roots: Vec<&str> = self
            .graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .edges_directed(idx, petgraph::Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|idx| self.graph[idx].as_str())
            .collect();
        roots.sort_unstable();
        roots
    }

    /// Table names of the chain rooted at `root`: the root first, then
    /// descendants in pre-order, children visited in name order so callers
    /// always see parents before their nested tables.
    pub fn nested_tables(&self, root: &str) -> CoreResult<Vec<String>> {
        let Some(&start) = self.node_map.get(root) else {
            return Err(CoreError::TableNotFound {
                name: root.to_string(),
            });
        };

        let mut result = Vec::new();
        self.collect_nested(start, &mut result);
        Ok(result)
    }

    fn collect_nested(&self, idx: NodeIndex, result: &mut Vec<String>) {
        result.push(self.graph[idx].clone());

        let mut children: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, petgraph::Direction::Outgoing)
            .map(|e| e.target())
            .collect();
        children.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));

        for child in children {
            self.collect_nested(child, result);
        }
    }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
