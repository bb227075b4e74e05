//! Binary space partition over axis-aligned half-planes.
//!
//! Used by sources whose files have arbitrary footprints, where a
//! point cannot be mapped to a file with row/column arithmetic. Each
//! zone is the intersection of a list of half-planes. Zones inserted
//! later take precedence where they overlap earlier ones.

use geogrid::{GeoRect, C};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Longitude.
    X,
    /// Latitude.
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterOrEqual,
    Less,
}

/// A half-plane `axis <cmp> threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub axis: Axis,
    pub cmp: Comparison,
    pub threshold: C,
}

impl Edge {
    pub fn ge(axis: Axis, threshold: C) -> Self {
        Self {
            axis,
            cmp: Comparison::GreaterOrEqual,
            threshold,
        }
    }

    pub fn lt(axis: Axis, threshold: C) -> Self {
        Self {
            axis,
            cmp: Comparison::Less,
            threshold,
        }
    }

    /// True if (`x`, `y`) lies in this half-plane.
    pub fn test(&self, x: C, y: C) -> bool {
        let value = match self.axis {
            Axis::X => x,
            Axis::Y => y,
        };
        match self.cmp {
            Comparison::GreaterOrEqual => value >= self.threshold,
            Comparison::Less => value < self.threshold,
        }
    }

    /// True if every point of `self` also lies in `other`.
    fn implies(&self, other: &Self) -> bool {
        self.axis == other.axis
            && self.cmp == other.cmp
            && match self.cmp {
                Comparison::GreaterOrEqual => other.threshold <= self.threshold,
                Comparison::Less => other.threshold >= self.threshold,
            }
    }

    /// The complementary half-plane.
    fn complement(&self) -> Self {
        Self {
            axis: self.axis,
            cmp: match self.cmp {
                Comparison::GreaterOrEqual => Comparison::Less,
                Comparison::Less => Comparison::GreaterOrEqual,
            },
            threshold: self.threshold,
        }
    }
}

#[derive(Debug, Default)]
struct Branch {
    /// Zone used when there is no finer subdivision.
    default: Option<usize>,
    child: Option<Box<Node>>,
}

#[derive(Debug)]
struct Node {
    edge: Edge,
    /// Points satisfying `edge`.
    inside: Branch,
    outside: Branch,
}

#[derive(Debug, Default)]
pub struct SpatialPartitionTree {
    root: Branch,
}

impl SpatialPartitionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the zone bounded by `edges`, overriding any earlier zone
    /// where they overlap.
    pub fn insert_zone(&mut self, edges: &[Edge], zone: usize) {
        if [Axis::X, Axis::Y].into_iter().any(|axis| {
            let (lo, hi) = range(edges, axis);
            lo >= hi
        }) {
            return;
        }
        insert_branch(&mut self.root, edges, zone);
    }

    /// Inserts the footprint of `rect`. A rectangle spanning the
    /// antimeridian is inserted as its east and west halves.
    pub fn insert_rect(&mut self, rect: &GeoRect, zone: usize) {
        let mut lat_edges = Vec::with_capacity(4);
        if rect.sw_lat() > -90.0 {
            lat_edges.push(Edge::ge(Axis::Y, rect.sw_lat()));
        }
        if rect.ne_lat() < 90.0 {
            lat_edges.push(Edge::lt(Axis::Y, rect.ne_lat()));
        }
        let lon_spans: &[(C, C)] = if rect.spans_dateline() {
            &[(rect.sw_lon(), 180.0), (-180.0, rect.ne_lon())]
        } else {
            &[(rect.sw_lon(), rect.ne_lon())]
        };
        for &(west, east) in lon_spans {
            let mut edges = lat_edges.clone();
            if west > -180.0 {
                edges.push(Edge::ge(Axis::X, west));
            }
            if east < 180.0 {
                edges.push(Edge::lt(Axis::X, east));
            }
            self.insert_zone(&edges, zone);
        }
    }

    /// Returns the zone covering (`x`, `y`), if any.
    pub fn lookup(&self, x: C, y: C) -> Option<usize> {
        let mut branch = &self.root;
        while let Some(node) = &branch.child {
            branch = if node.edge.test(x, y) {
                &node.inside
            } else {
                &node.outside
            };
        }
        branch.default
    }

    /// Longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        fn depth(branch: &Branch) -> usize {
            branch
                .child
                .as_ref()
                .map_or(0, |node| 1 + depth(&node.inside).max(depth(&node.outside)))
        }
        depth(&self.root)
    }
}

fn insert_branch(branch: &mut Branch, edges: &[Edge], zone: usize) {
    let Some((&edge, rest)) = edges.split_first() else {
        // The zone covers this whole region.
        branch.default = Some(zone);
        branch.child = None;
        return;
    };
    match &mut branch.child {
        Some(node) => insert_node(node, edges, zone),
        None => branch.child = Some(Box::new(chain(edge, rest, zone, branch.default))),
    }
}

/// Builds a fresh path of nodes, one per edge, ending in `zone`.
/// Everything off the path keeps `outer`.
fn chain(edge: Edge, rest: &[Edge], zone: usize, outer: Option<usize>) -> Node {
    let mut inside = Branch {
        default: outer,
        child: None,
    };
    insert_branch(&mut inside, rest, zone);
    Node {
        edge,
        inside,
        outside: Branch {
            default: outer,
            child: None,
        },
    }
}

fn insert_node(node: &mut Node, edges: &[Edge], zone: usize) {
    let split = node.edge;
    let (lo, hi) = range(edges, split.axis);
    let (overlaps_inside, overlaps_outside) = match split.cmp {
        Comparison::GreaterOrEqual => (hi > split.threshold, lo < split.threshold),
        Comparison::Less => (lo < split.threshold, hi > split.threshold),
    };
    if overlaps_inside {
        insert_branch(&mut node.inside, &cull(edges, &split), zone);
    }
    if overlaps_outside {
        insert_branch(&mut node.outside, &cull(edges, &split.complement()), zone);
    }
}

/// Drops the edges already enforced by `region`.
fn cull(edges: &[Edge], region: &Edge) -> Vec<Edge> {
    edges
        .iter()
        .filter(|edge| !region.implies(edge))
        .copied()
        .collect()
}

/// Returns the zone's `[lo, hi)` extent along `axis`.
fn range(edges: &[Edge], axis: Axis) -> (C, C) {
    edges
        .iter()
        .filter(|edge| edge.axis == axis)
        .fold((C::NEG_INFINITY, C::INFINITY), |(lo, hi), edge| match edge.cmp {
            Comparison::GreaterOrEqual => (lo.max(edge.threshold), hi),
            Comparison::Less => (lo, hi.min(edge.threshold)),
        })
}
