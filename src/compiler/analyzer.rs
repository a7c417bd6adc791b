// This module implements the liveness analysis that drives slot allocation in the code
// generator. A Computation is a single straight-line block whose nodes are already in
// definition order, so no block ordering is needed: the analyzer first marks the nodes that are
// reachable from the outputs (everything else is dead and never lowered), then walks the nodes
// once and records, per live node, the position of its definition, the position of its last use
// and its reference count (definition included). Output nodes are pinned: their value must
// survive until the end of the program, so their slot is never recycled.

use crate::program::{Computation, NodeId};

/// Liveness information for a single node.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LivenessInfo {
    /// Position of the defining node.
    pub first: usize,
    /// Position of the last node reading the value.
    pub last: usize,
    /// Number of uses including the definition.
    pub ref_count: u32,
    /// Whether the value is a program output and must stay allocated.
    pub pinned: bool,
}

/// Computes reachability and last-use positions for a computation.
#[derive(Debug, Default)]
pub struct Analyzer {
    live: Vec<bool>,
    liveness: Vec<LivenessInfo>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(&mut self, computation: &Computation) {
        let count = computation.nodes().len();
        self.live.clear();
        self.live.resize(count, false);
        self.liveness.clear();
        self.liveness.resize(count, LivenessInfo::default());

        // -------- reachability from the outputs ---------
        let mut stack: Vec<NodeId> = computation.outputs().to_vec();
        while let Some(id) = stack.pop() {
            if self.live[id] {
                continue;
            }
            self.live[id] = true;
            stack.extend_from_slice(computation.node(id).operands());
        }

        // -------- definition and last use ---------
        for (pos, node) in computation.nodes().iter().enumerate() {
            if !self.live[pos] {
                continue;
            }
            self.record(pos, pos);
            for &operand in node.operands() {
                self.record(operand, pos);
            }
        }

        for &output in computation.outputs() {
            self.liveness[output].pinned = true;
        }
    }

    fn record(&mut self, id: NodeId, pos: usize) {
        let info = &mut self.liveness[id];
        info.ref_count += 1;
        if info.ref_count == 1 {
            info.first = pos;
            info.last = pos;
        } else if pos > info.last {
            info.last = pos;
        }
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.live.get(id).copied().unwrap_or(false)
    }

    pub fn liveness(&self, id: NodeId) -> Option<&LivenessInfo> {
        if self.is_live(id) {
            self.liveness.get(id)
        } else {
            None
        }
    }

    /// Whether the value of `id` is dead after the node at `pos` ran.
    pub fn dies_at(&self, id: NodeId, pos: usize) -> bool {
        self.liveness(id).is_some_and(|info| !info.pinned && info.last == pos)
    }

    pub fn live_count(&self) -> usize {
        self.live.iter().filter(|&&l| l).count()
    }

    pub fn dead_count(&self) -> usize {
        self.live.len() - self.live_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Literal, PrimitiveType, Shape};
    use crate::program::{BinaryOp, ComputationBuilder, UnaryOp};

    #[test]
    fn test_liveness_and_dead_nodes() {
        let mut b = ComputationBuilder::new("f");
        let x = b.parameter(0, Shape::scalar(PrimitiveType::S32)).unwrap();
        let c = b.constant(Literal::scalar(3i32));
        let unused = b.unary(UnaryOp::Negate, c).unwrap();
        let sum = b.binary(BinaryOp::Add, x, c).unwrap();
        let prod = b.binary(BinaryOp::Multiply, sum, c).unwrap();
        let computation = b.build(vec![prod]).unwrap();

        let mut analyzer = Analyzer::new();
        analyzer.analyze(&computation);

        assert!(!analyzer.is_live(unused));
        assert_eq!(analyzer.dead_count(), 1);
        assert_eq!(analyzer.live_count(), 4);

        let info = analyzer.liveness(c).unwrap();
        assert_eq!((info.first, info.last, info.ref_count), (c, prod, 3));
        assert!(analyzer.dies_at(sum, prod));
        assert!(!analyzer.dies_at(prod, prod));
        assert!(analyzer.liveness(prod).unwrap().pinned);
    }
}
