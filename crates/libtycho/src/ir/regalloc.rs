//! Register allocation.
//!
//! Virtual registers are colored onto the physical register file by greedy
//! interference-graph coloring. Registers that do not get a color are spilled
//! to per-function slots; spill code goes through the two reserved scratch
//! registers so a rewritten instruction never needs a third.

use indexmap::{IndexMap, IndexSet};

use super::{cfg::CfgGraph, FunctionIr, Instr, Reg};

/// Physical register file size.
pub const PHYS_REG_COUNT: usize = 16;
/// Registers handed out by the allocator; the top two are spill scratch.
pub const ALLOCATABLE: usize = PHYS_REG_COUNT - 2;
const SCRATCH_A: u32 = (PHYS_REG_COUNT - 2) as u32;
const SCRATCH_B: u32 = (PHYS_REG_COUNT - 1) as u32;

/// Where a virtual register ended up.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RegSlot {
    Phys(u8),
    Spill(usize),
}

/// Allocation result: the assignment and the rewritten instruction stream.
#[derive(Debug, Clone)]
pub struct RegAllocation {
    pub assignment: IndexMap<u32, RegSlot>,
    pub instrs: Vec<Instr>,
    pub spill_slots: usize,
}

/// Per-block liveness sets.
fn liveness(function: &FunctionIr, graph: &CfgGraph) -> Vec<IndexSet<Reg>> {
    let block_count = graph.blocks.len();
    let mut live_in: Vec<IndexSet<Reg>> = vec![IndexSet::new(); block_count];
    let mut live_out: Vec<IndexSet<Reg>> = vec![IndexSet::new(); block_count];

    let mut changed = true;
    while changed {
        changed = false;
        for index in (0..block_count).rev() {
            let block = &graph.blocks[index];

            let mut out = IndexSet::new();
            for successor in &block.successors {
                for reg in &live_in[*successor] {
                    out.insert(*reg);
                }
            }

            let mut live = out.clone();
            for instr in function.instrs[block.start..block.end].iter().rev() {
                if let Some(def) = instr.def() {
                    live.shift_remove(&def);
                }
                let mut uses = Vec::new();
                instr.uses(&mut uses);
                for reg in uses {
                    live.insert(reg);
                }
            }

            if live != live_in[index] {
                live_in[index] = live;
                changed = true;
            }
            if out != live_out[index] {
                live_out[index] = out;
                changed = true;
            }
        }
    }

    live_out
}

/// Builds the interference graph: every definition interferes with whatever
/// is live across it.
fn interference(function: &FunctionIr, graph: &CfgGraph, live_out: &[IndexSet<Reg>]) -> IndexMap<Reg, IndexSet<Reg>> {
    let mut edges: IndexMap<Reg, IndexSet<Reg>> = IndexMap::new();

    let mut touch = |edges: &mut IndexMap<Reg, IndexSet<Reg>>, reg: Reg| {
        edges.entry(reg).or_default();
    };

    for (index, block) in graph.blocks.iter().enumerate() {
        let mut live = live_out[index].clone();
        for instr in function.instrs[block.start..block.end].iter().rev() {
            if let Some(def) = instr.def() {
                touch(&mut edges, def);
                for other in &live {
                    if *other != def {
                        edges.entry(def).or_default().insert(*other);
                        edges.entry(*other).or_default().insert(def);
                    }
                }
                live.shift_remove(&def);
            }
            let mut uses = Vec::new();
            instr.uses(&mut uses);
            for reg in uses {
                touch(&mut edges, reg);
                live.insert(reg);
            }
        }
    }

    edges.sort_keys();
    edges
}

/// Colors the graph and rewrites the instruction stream.
pub fn allocate(function: &FunctionIr) -> RegAllocation {
    let graph = CfgGraph::build(&function.instrs);
    let live_out = liveness(function, &graph);
    let edges = interference(function, &graph, &live_out);

    // Highest degree first; ties resolve by register number so two runs
    // always agree.
    let mut order: Vec<Reg> = edges.keys().copied().collect();
    order.sort_by_key(|reg| (usize::MAX - edges[reg].len(), reg.0));

    let mut assignment: IndexMap<u32, RegSlot> = IndexMap::new();
    let mut spill_slots = 0usize;

    for reg in order {
        let mut taken = [false; ALLOCATABLE];
        for neighbor in &edges[&reg] {
            if let Some(RegSlot::Phys(color)) = assignment.get(&neighbor.0) {
                taken[*color as usize] = true;
            }
        }
        match taken.iter().position(|used| !used) {
            Some(color) => {
                assignment.insert(reg.0, RegSlot::Phys(color as u8));
            }
            None => {
                assignment.insert(reg.0, RegSlot::Spill(spill_slots));
                spill_slots += 1;
            }
        }
    }
    assignment.sort_keys();

    // Rewrite: spilled uses load into scratch before the instruction,
    // spilled definitions store from scratch after it.
    let mut instrs = Vec::with_capacity(function.instrs.len());
    for instr in &function.instrs {
        let mut all_uses = Vec::new();
        instr.uses(&mut all_uses);
        let mut uses: Vec<Reg> = Vec::new();
        for reg in all_uses {
            if !uses.contains(&reg) {
                uses.push(reg);
            }
        }

        let mut scratch_map: IndexMap<u32, u32> = IndexMap::new();
        let mut scratch_cursor = 0;
        for reg in &uses {
            if let Some(RegSlot::Spill(slot)) = assignment.get(&reg.0) {
                let scratch = if scratch_cursor == 0 { SCRATCH_A } else { SCRATCH_B };
                scratch_cursor += 1;
                instrs.push(Instr::SpillLoad { dst: Reg(scratch), slot: *slot });
                scratch_map.insert(reg.0, scratch);
            }
        }

        let def_spill = instr.def().and_then(|def| match assignment.get(&def.0) {
            Some(RegSlot::Spill(slot)) => Some((def, *slot)),
            _ => None,
        });
        if let Some((def, _)) = def_spill {
            scratch_map.entry(def.0).or_insert(SCRATCH_A);
        }

        let mut rewritten = instr.clone();
        rewritten.map_regs(&mut |reg| {
            if let Some(scratch) = scratch_map.get(&reg.0) {
                return Reg(*scratch);
            }
            match assignment.get(&reg.0) {
                Some(RegSlot::Phys(color)) => Reg(u32::from(*color)),
                _ => reg,
            }
        });
        instrs.push(rewritten);

        if let Some((def, slot)) = def_spill {
            let scratch = scratch_map[&def.0];
            instrs.push(Instr::SpillStore { slot, src: Reg(scratch) });
        }
    }

    RegAllocation { assignment, instrs, spill_slots }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinIrOp, ConstVal, IrType, StackLayout};

    fn function(instrs: Vec<Instr>) -> FunctionIr {
        FunctionIr { name: "test".into(), uid: "0".into(), instrs, layout: StackLayout::default() }
    }

    #[test]
    fn straight_line_code_gets_physical_registers() {
        let function = function(vec![
            Instr::Label { name: "0".into() },
            Instr::Const { ty: IrType::I32, dst: Reg(0), value: ConstVal::Int(1) },
            Instr::Const { ty: IrType::I32, dst: Reg(1), value: ConstVal::Int(2) },
            Instr::Binary { ty: IrType::I32, op: BinIrOp::Add, dst: Reg(2), a: Reg(0), b: Reg(1) },
            Instr::Ret { ty: IrType::I32, src: Reg(2) },
        ]);

        let allocation = allocate(&function);
        assert_eq!(allocation.spill_slots, 0);
        for slot in allocation.assignment.values() {
            assert!(matches!(slot, RegSlot::Phys(color) if (*color as usize) < ALLOCATABLE));
        }

        // The operands interfere and must differ.
        let a = allocation.assignment[&0];
        let b = allocation.assignment[&1];
        assert_ne!(a, b);
    }

    #[test]
    fn dead_value_reuses_colors() {
        // r0 dies at the add; r3 may share its color.
        let function = function(vec![
            Instr::Const { ty: IrType::I32, dst: Reg(0), value: ConstVal::Int(1) },
            Instr::Const { ty: IrType::I32, dst: Reg(1), value: ConstVal::Int(2) },
            Instr::Binary { ty: IrType::I32, op: BinIrOp::Add, dst: Reg(2), a: Reg(0), b: Reg(1) },
            Instr::Const { ty: IrType::I32, dst: Reg(3), value: ConstVal::Int(3) },
            Instr::Binary { ty: IrType::I32, op: BinIrOp::Add, dst: Reg(4), a: Reg(2), b: Reg(3) },
            Instr::Ret { ty: IrType::I32, src: Reg(4) },
        ]);

        let allocation = allocate(&function);
        assert_eq!(allocation.spill_slots, 0);
        let used: IndexSet<RegSlot> = allocation.assignment.values().copied().collect();
        assert!(used.len() < 5, "colors were not reused: {used:?}");
    }

    #[test]
    fn oversubscription_spills() {
        // Define more simultaneously-live values than there are registers.
        let mut instrs = Vec::new();
        let count = (ALLOCATABLE + 3) as u32;
        for reg in 0..count {
            instrs.push(Instr::Const { ty: IrType::I64, dst: Reg(reg), value: ConstVal::Int(i64::from(reg)) });
        }
        // Use them all at the end, pairwise, so everything stays live.
        for reg in 0..count - 1 {
            instrs.push(Instr::Binary {
                ty: IrType::I64,
                op: BinIrOp::Add,
                dst: Reg(count + reg),
                a: Reg(reg),
                b: Reg(reg + 1),
            });
        }
        let function = function(instrs);

        let allocation = allocate(&function);
        assert!(allocation.spill_slots > 0);
        assert!(allocation.instrs.iter().any(|instr| matches!(instr, Instr::SpillStore { .. })));
        assert!(allocation.instrs.iter().any(|instr| matches!(instr, Instr::SpillLoad { .. })));
    }

    #[test]
    fn allocation_is_deterministic() {
        let build = || {
            function(vec![
                Instr::Const { ty: IrType::I32, dst: Reg(0), value: ConstVal::Int(1) },
                Instr::Const { ty: IrType::I32, dst: Reg(1), value: ConstVal::Int(2) },
                Instr::Binary { ty: IrType::I32, op: BinIrOp::Add, dst: Reg(2), a: Reg(0), b: Reg(1) },
                Instr::Ret { ty: IrType::I32, src: Reg(2) },
            ])
        };
        let first = allocate(&build());
        let second = allocate(&build());
        assert_eq!(first.assignment, second.assignment);
        assert_eq!(first.instrs, second.instrs);
    }
}
