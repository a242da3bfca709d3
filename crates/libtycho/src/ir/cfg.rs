//! Control-flow graph over linear IR.
//!
//! Blocks start at labels and after any control transfer; edges follow
//! fall-through and jump targets. The graph feeds liveness analysis and the
//! DOT text an external visualizer renders.

use indexmap::IndexMap;

use super::Instr;

/// One basic block: a half-open instruction range plus its edges.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub start: usize,
    pub end: usize,
    pub successors: Vec<usize>,
    pub predecessors: Vec<usize>,
}

/// The control-flow graph of one function body.
#[derive(Debug, Clone, Default)]
pub struct CfgGraph {
    pub blocks: Vec<Block>,
}

impl CfgGraph {
    /// Builds the graph from a linear instruction list.
    pub fn build(instrs: &[Instr]) -> Self {
        if instrs.is_empty() {
            return Self::default();
        }

        // Leaders: entry, every label, every instruction after a transfer.
        let mut leaders = vec![false; instrs.len()];
        leaders[0] = true;
        for (position, instr) in instrs.iter().enumerate() {
            if instr.is_label() {
                leaders[position] = true;
            }
            if (instr.ends_block() || instr.jump_target().is_some()) && position + 1 < instrs.len() {
                leaders[position + 1] = true;
            }
        }

        let mut blocks = Vec::new();
        let mut label_to_block: IndexMap<String, usize> = IndexMap::new();
        let mut start = 0;
        for position in 1..=instrs.len() {
            if position == instrs.len() || leaders[position] {
                let block_index = blocks.len();
                for instr in &instrs[start..position] {
                    if let Instr::Label { name } = instr {
                        label_to_block.insert(name.clone(), block_index);
                    }
                }
                blocks.push(Block { start, end: position, successors: Vec::new(), predecessors: Vec::new() });
                start = position;
            }
        }

        // Edges.
        let mut edges = Vec::new();
        for (block_index, block) in blocks.iter().enumerate() {
            let mut falls_through = true;
            for instr in &instrs[block.start..block.end] {
                if let Some(target) = instr.jump_target() {
                    if let Some(target_block) = label_to_block.get(target) {
                        edges.push((block_index, *target_block));
                    }
                }
                if instr.ends_block() {
                    falls_through = false;
                }
            }
            if falls_through && block_index + 1 < blocks.len() {
                edges.push((block_index, block_index + 1));
            }
        }

        for (from, to) in edges {
            if !blocks[from].successors.contains(&to) {
                blocks[from].successors.push(to);
            }
            if !blocks[to].predecessors.contains(&from) {
                blocks[to].predecessors.push(from);
            }
        }

        Self { blocks }
    }

    /// DOT text for external rendering.
    pub fn to_dot(&self, name: &str, instrs: &[Instr]) -> String {
        let mut out = String::new();
        out.push_str(&format!("digraph \"{name}\" {{\n"));
        out.push_str("  node [shape=box fontname=\"monospace\"];\n");

        for (index, block) in self.blocks.iter().enumerate() {
            let body = instrs[block.start..block.end]
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\\l");
            out.push_str(&format!("  b{index} [label=\"b{index}:\\l{body}\\l\"];\n"));
        }
        for (index, block) in self.blocks.iter().enumerate() {
            for successor in &block.successors {
                out.push_str(&format!("  b{index} -> b{successor};\n"));
            }
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CmpOp, ConstVal, Instr, IrType, Reg};

    fn diamond() -> Vec<Instr> {
        vec![
            Instr::Label { name: "entry".into() },
            Instr::Const { ty: IrType::U8, dst: Reg(0), value: ConstVal::Int(0) },
            Instr::JumpCmp { ty: IrType::U8, a: Reg(0), b: Reg(0), op: CmpOp::Eq, target: "else".into() },
            Instr::Const { ty: IrType::I32, dst: Reg(1), value: ConstVal::Int(1) },
            Instr::Jump { target: "end".into() },
            Instr::Label { name: "else".into() },
            Instr::Const { ty: IrType::I32, dst: Reg(1), value: ConstVal::Int(2) },
            Instr::Label { name: "end".into() },
            Instr::Ret { ty: IrType::I32, src: Reg(1) },
        ]
    }

    #[test]
    fn diamond_shape_has_four_blocks() {
        let instrs = diamond();
        let graph = CfgGraph::build(&instrs);
        assert_eq!(graph.blocks.len(), 4);

        // entry branches to then-fallthrough and else
        assert_eq!(graph.blocks[0].successors.len(), 2);
        // both arms join at end
        assert!(graph.blocks[1].successors.contains(&3));
        assert!(graph.blocks[2].successors.contains(&3));
        assert_eq!(graph.blocks[3].predecessors.len(), 2);
    }

    #[test]
    fn dot_output_lists_blocks_and_edges() {
        let instrs = diamond();
        let graph = CfgGraph::build(&instrs);
        let dot = graph.to_dot("demo", &instrs);
        assert!(dot.starts_with("digraph \"demo\""));
        assert!(dot.contains("b0 -> "));
        assert!(dot.contains("ret_i32"));
    }
}
