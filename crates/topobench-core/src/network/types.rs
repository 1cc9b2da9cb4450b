use crate::units::{Mbps, Microsecs};

identifier!(NodeId, usize);

/// The role a switch plays in a layered topology. Flat topologies (hypercube,
/// Jellyfish) use a single undifferentiated layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Layer {
    Core,
    Agg,
    Edge,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NodeKind {
    /// A measurement endpoint. `edge` is the switch the host hangs off of,
    /// when the builder knows it.
    Host { edge: Option<NodeId> },
    Switch { layer: Layer },
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Emulator-facing name, e.g. `h3` or the layer-prefixed `2001`.
    pub name: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn new_host(id: NodeId, name: impl Into<String>, edge: Option<NodeId>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: NodeKind::Host { edge },
        }
    }

    pub fn new_switch(id: NodeId, name: impl Into<String>, layer: Layer) -> Self {
        Self {
            id,
            name: name.into(),
            kind: NodeKind::Switch { layer },
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self.kind, NodeKind::Host { .. })
    }

    pub fn is_switch(&self) -> bool {
        matches!(self.kind, NodeKind::Switch { .. })
    }
}

/// An undirected link. The bandwidth cap and propagation delay are both
/// optional; the emulator leaves unset attributes unshaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Link {
    pub a: NodeId,
    pub b: NodeId,
    pub bandwidth: Option<Mbps>,
    pub delay: Option<Microsecs>,
}

impl Link {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        Self {
            a,
            b,
            bandwidth: None,
            delay: None,
        }
    }

    pub fn with_bandwidth(mut self, bandwidth: Mbps) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    pub fn with_delay(mut self, delay: Microsecs) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn connects(&self, x: NodeId, y: NodeId) -> bool {
        self.a == x && self.b == y || self.a == y && self.b == x
    }
}
