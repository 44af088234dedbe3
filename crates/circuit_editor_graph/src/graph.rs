// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and connections.
//!
//! This is plain storage plus the rules that never depend on gestures or
//! history: id allocation, connection validation, cascade deletes and the
//! derived per-port display state.

use crate::connection::{Connection, ConnectionError, ConnectionId};
use crate::node::{Node, NodeId};
use crate::port::{Port, PortDirection, PortRef};
use crate::types;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// A chip graph. Node iteration order is paint order, back to front.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Connections between nodes
    connections: IndexMap<ConnectionId, Connection>,
    /// Next automatic node number
    next_node_id: u64,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the id for a new node.
    ///
    /// An explicit id is honored and pushes the counter past it; otherwise the
    /// counter value is used.
    pub fn allocate_node_id(&mut self, explicit: Option<NodeId>) -> NodeId {
        let id = explicit.unwrap_or(NodeId(self.next_node_id));
        self.next_node_id = self.next_node_id.max(id.0 + 1);
        id
    }

    /// Reseed the counter from the largest id present
    pub fn reseed_node_ids(&mut self) {
        self.next_node_id = self.nodes.keys().map(|id| id.0 + 1).max().unwrap_or(0);
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.next_node_id = self.next_node_id.max(id.0 + 1);
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and its connections
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<(Node, Vec<Connection>)> {
        let node = self.nodes.shift_remove(&node_id)?;
        let removed = self.remove_connections_where(|c| c.involves_node(node_id));
        Some((node, removed))
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.connections.clear();
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Whether a node exists
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// All nodes, back to front
    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = &Node> {
        self.nodes.values()
    }

    /// All nodes, mutable
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Move a node to the end of the paint order
    pub fn bring_to_front(&mut self, node_id: NodeId) {
        if let Some(index) = self.nodes.get_index_of(&node_id) {
            let last = self.nodes.len() - 1;
            self.nodes.move_index(index, last);
        }
    }

    /// Selected node ids in storage order
    pub fn selected_ids(&self) -> Vec<NodeId> {
        self.nodes.values().filter(|n| n.selected).map(|n| n.id).collect()
    }

    /// Resolve a port reference
    pub fn port(&self, port: PortRef) -> Option<&Port> {
        self.nodes.get(&port.node)?.port(port.port)
    }

    fn lookup(&self, port: PortRef) -> Result<&Port, ConnectionError> {
        let node = self
            .nodes
            .get(&port.node)
            .ok_or(ConnectionError::NodeNotFound(port.node))?;
        node.port(port.port)
            .ok_or(ConnectionError::PortNotFound(port.node, port.port))
    }

    /// Check whether `a` and `b` may be wired together.
    ///
    /// The ends may be given in either order; on success they come back
    /// normalized as `(output, input)`.
    pub fn check_connection(&self, a: PortRef, b: PortRef) -> Result<(PortRef, PortRef), ConnectionError> {
        let pa = self.lookup(a)?;
        let pb = self.lookup(b)?;

        if a == b {
            return Err(ConnectionError::SelfConnection);
        }

        let (from, to, from_port, to_port) = if !pa.is_output() && pb.is_output() {
            (b, a, pb, pa)
        } else {
            (a, b, pa, pb)
        };

        if from_port.direction != PortDirection::Output || to_port.direction != PortDirection::Input {
            return Err(ConnectionError::DirectionMismatch);
        }
        if from_port.is_exec() != to_port.is_exec() {
            return Err(ConnectionError::ExecMismatch);
        }
        if !types::compatible(from_port.resolved.allowed.as_ref(), to_port.resolved.allowed.as_ref()) {
            return Err(ConnectionError::IncompatibleTypes);
        }
        if self.find_connection(from, to).is_some() {
            return Err(ConnectionError::Duplicate);
        }

        Ok((from, to))
    }

    /// Insert a connection without checks. Callers validate first.
    pub fn insert_connection(&mut self, connection: Connection) -> ConnectionId {
        let id = connection.id;
        self.connections.insert(id, connection);
        id
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        self.connections.shift_remove(&connection_id)
    }

    /// Remove every connection matching `pred`, returning the removed ones
    pub fn remove_connections_where(&mut self, mut pred: impl FnMut(&Connection) -> bool) -> Vec<Connection> {
        let mut removed = Vec::new();
        self.connections.retain(|_, c| {
            if pred(c) {
                removed.push(c.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Existing connection between an output and an input
    pub fn find_connection(&self, from: PortRef, to: PortRef) -> Option<&Connection> {
        self.connections.values().find(|c| c.from == from && c.to == to)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Connections touching a port on either end
    pub fn connections_for_port(&self, port: PortRef) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_port(port))
    }

    /// Whether any connection touches a port
    pub fn is_port_connected(&self, port: PortRef) -> bool {
        self.connections_for_port(port).next().is_some()
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connections with both ends inside `nodes`
    pub fn internal_connections<'a>(&'a self, nodes: &'a HashSet<NodeId>) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .values()
            .filter(move |c| nodes.contains(&c.from.node) && nodes.contains(&c.to.node))
    }

    /// Recompute connected flags and adaptive color overrides from scratch
    pub fn port_bindings(&self) -> PortBindings {
        let mut bindings = PortBindings::default();
        let mut wires: HashMap<PortRef, Vec<PortRef>> = HashMap::new();
        for c in self.connections.values() {
            wires.entry(c.from).or_default().push(c.to);
            wires.entry(c.to).or_default().push(c.from);
        }

        for (port_ref, others) in &wires {
            bindings.connected.insert(*port_ref);
            let [other] = others.as_slice() else {
                continue;
            };
            let (Some(port), Some(peer)) = (self.port(*port_ref), self.port(*other)) else {
                continue;
            };
            if !port.is_adaptive() || peer.is_adaptive() {
                continue;
            }
            if let Some(color) = peer.base_color {
                bindings.colors.insert(*port_ref, color);
            }
        }
        bindings
    }
}

/// Derived display state of ports
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortBindings {
    /// Ports with at least one connection
    pub connected: HashSet<PortRef>,
    /// Adaptive ports showing the color of their single concrete peer
    pub colors: HashMap<PortRef, [u8; 3]>,
}

impl PortBindings {
    /// Effective color of a port
    pub fn color_of(&self, port_ref: PortRef, port: &Port) -> Option<[u8; 3]> {
        self.colors.get(&port_ref).copied().or(port.base_color)
    }

    /// Whether a port has a connection
    pub fn is_connected(&self, port_ref: PortRef) -> bool {
        self.connected.contains(&port_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::{BlockRenderer, ChipDescriptor, ChipRenderer, ChipSection};
    use crate::port::PortId;
    use crate::types::TypePalette;

    fn add(graph: &mut Graph, section: ChipSection) -> NodeId {
        let descriptor = ChipDescriptor::new("chip").with_section(section);
        let rendered = BlockRenderer::default().render(&descriptor).unwrap();
        let id = graph.allocate_node_id(None);
        graph.add_node(Node::from_rendered(id, descriptor, rendered, &TypePalette::default()))
    }

    fn port(node: NodeId, index: u32) -> PortRef {
        PortRef::new(node, PortId(index))
    }

    #[test]
    fn test_id_allocation() {
        let mut graph = Graph::new();
        assert_eq!(graph.allocate_node_id(None), NodeId(0));
        assert_eq!(graph.allocate_node_id(Some(NodeId(9))), NodeId(9));
        assert_eq!(graph.allocate_node_id(None), NodeId(10));
    }

    #[test]
    fn test_check_normalizes_direction() {
        let mut graph = Graph::new();
        let a = add(&mut graph, ChipSection::new().output("Out", "float"));
        let b = add(&mut graph, ChipSection::new().input("In", "float"));
        let (from, to) = graph.check_connection(port(b, 0), port(a, 0)).unwrap();
        assert_eq!((from, to), (port(a, 0), port(b, 0)));
    }

    #[test]
    fn test_check_rejections() {
        let mut graph = Graph::new();
        let a = add(&mut graph, ChipSection::new().input("Run", "exec").output("Out", "float").output("Next", "exec"));
        let b = add(&mut graph, ChipSection::new().input("In", "int").output("Out", "float"));

        assert_eq!(graph.check_connection(port(a, 1), port(a, 1)), Err(ConnectionError::SelfConnection));
        assert_eq!(graph.check_connection(port(a, 1), port(b, 1)), Err(ConnectionError::DirectionMismatch));
        assert_eq!(graph.check_connection(port(a, 2), port(b, 0)), Err(ConnectionError::ExecMismatch));
        assert_eq!(graph.check_connection(port(a, 1), port(b, 0)), Err(ConnectionError::IncompatibleTypes));
        assert_eq!(graph.check_connection(port(a, 7), port(b, 0)), Err(ConnectionError::PortNotFound(a, PortId(7))));
        assert_eq!(
            graph.check_connection(port(NodeId(40), 0), port(b, 0)),
            Err(ConnectionError::NodeNotFound(NodeId(40)))
        );
    }

    #[test]
    fn test_same_node_different_ports_allowed() {
        let mut graph = Graph::new();
        let a = add(&mut graph, ChipSection::new().input("In", "float").output("Out", "float"));
        assert!(graph.check_connection(port(a, 1), port(a, 0)).is_ok());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut graph = Graph::new();
        let a = add(&mut graph, ChipSection::new().output("Out", "float"));
        let b = add(&mut graph, ChipSection::new().input("In", "float"));
        graph.insert_connection(Connection::new(port(a, 0), port(b, 0)));
        assert_eq!(graph.check_connection(port(a, 0), port(b, 0)), Err(ConnectionError::Duplicate));
    }

    #[test]
    fn test_remove_node_cascades() {
        let mut graph = Graph::new();
        let a = add(&mut graph, ChipSection::new().output("Out", "float"));
        let b = add(&mut graph, ChipSection::new().input("In", "float"));
        let c = add(&mut graph, ChipSection::new().input("In", "float"));
        graph.insert_connection(Connection::new(port(a, 0), port(b, 0)));
        graph.insert_connection(Connection::new(port(a, 0), port(c, 0)));

        let (_, removed) = graph.remove_node(b).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(graph.connection_count(), 1);
        assert!(graph.remove_node(b).is_none());
    }

    #[test]
    fn test_bring_to_front() {
        let mut graph = Graph::new();
        let a = add(&mut graph, ChipSection::new());
        let b = add(&mut graph, ChipSection::new());
        graph.bring_to_front(a);
        let order: Vec<_> = graph.node_ids().collect();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn test_adaptive_binding() {
        let mut graph = Graph::new();
        let text = add(&mut graph, ChipSection::new().output("Text", "string").output("Other", "string"));
        let sink = add(&mut graph, ChipSection::new().input("Value", "any"));
        let sink_port = port(sink, 0);

        graph.insert_connection(Connection::new(port(text, 0), sink_port));
        let bindings = graph.port_bindings();
        let string_color = graph.port(port(text, 0)).unwrap().base_color;
        assert_eq!(bindings.color_of(sink_port, graph.port(sink_port).unwrap()), string_color);
        assert!(bindings.is_connected(port(text, 0)));
        assert!(!bindings.is_connected(port(text, 1)));

        // Two wires on the adaptive port revert it.
        graph.insert_connection(Connection::new(port(text, 1), sink_port));
        assert!(graph.port_bindings().colors.is_empty());
    }
}
