//! Control-flow lowering: `if`, `while`, `do-while`, `for`, and the
//! short-circuit condition lowerer `gen_condition` (spec §4.5, §9).

use crate::ast::{BinaryOp, Expr, ExprKind, Stmt};
use crate::codegen::state::{CodeGen, LoopContext};
use crate::error::Result;
use crate::ir::{CmpOp, Instr, Value};

impl<'t> CodeGen<'t> {
    pub(crate) fn gen_if(
        &mut self,
        cond: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<()> {
        let yes = self.new_block();
        let no = self.new_block();
        let final_block = self.new_block();

        self.gen_condition(cond, yes, no)?;

        self.set_block(yes);
        self.gen_stmt(then_branch)?;
        if !self.is_terminated() {
            self.emit(Instr::Jump { target: final_block });
        }

        self.set_block(no);
        if let Some(else_branch) = else_branch {
            self.gen_stmt(else_branch)?;
        }
        if !self.is_terminated() {
            self.emit(Instr::Jump { target: final_block });
        }

        self.set_block(final_block);
        Ok(())
    }

    pub(crate) fn gen_while(&mut self, cond: &Expr, body: &Stmt) -> Result<()> {
        let cond_block = self.new_block();
        let body_block = self.new_block();
        let final_block = self.new_block();

        self.emit(Instr::Jump { target: cond_block });

        self.set_block(cond_block);
        self.gen_condition(cond, body_block, final_block)?;

        self.set_block(body_block);
        self.loop_stack.push(LoopContext {
            break_target: final_block,
            continue_target: cond_block,
        });
        self.gen_stmt(body)?;
        self.loop_stack.pop();
        if !self.is_terminated() {
            self.emit(Instr::Jump { target: cond_block });
        }

        self.set_block(final_block);
        Ok(())
    }

    pub(crate) fn gen_do_while(&mut self, body: &Stmt, cond: &Expr) -> Result<()> {
        let body_block = self.new_block();
        let final_block = self.new_block();

        self.emit(Instr::Jump { target: body_block });

        self.set_block(body_block);
        self.loop_stack.push(LoopContext {
            break_target: final_block,
            continue_target: body_block,
        });
        self.gen_stmt(body)?;
        self.loop_stack.pop();
        if !self.is_terminated() {
            self.gen_condition(cond, body_block, final_block)?;
        }

        self.set_block(final_block);
        Ok(())
    }

    pub(crate) fn gen_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        step: Option<&Expr>,
        body: &Stmt,
    ) -> Result<()> {
        if let Some(init) = init {
            self.gen_stmt(init)?;
        }

        let cond_block = self.new_block();
        let body_block = self.new_block();
        let final_block = self.new_block();

        self.emit(Instr::Jump { target: cond_block });

        self.set_block(cond_block);
        match cond {
            Some(cond) => self.gen_condition(cond, body_block, final_block)?,
            None => {
                self.emit(Instr::Jump { target: body_block });
            }
        }

        self.set_block(body_block);
        self.loop_stack.push(LoopContext {
            break_target: final_block,
            continue_target: cond_block,
        });
        self.gen_stmt(body)?;
        if !self.is_terminated() {
            if let Some(step) = step {
                self.gen_expr(step, false)?;
            }
            self.emit(Instr::Jump { target: cond_block });
        }
        self.loop_stack.pop();

        self.set_block(final_block);
        Ok(())
    }

    /// Lowers a condition without ever materializing a boolean value
    /// (spec §9: "lowering them as ordinary binops ... is forbidden").
    pub(crate) fn gen_condition(&mut self, e: &Expr, yes: crate::ir::BlockId, no: crate::ir::BlockId) -> Result<()> {
        match &e.kind {
            ExprKind::Binary { op: BinaryOp::LogOr, lhs, rhs } => {
                let middle = self.new_block();
                self.gen_condition(lhs, yes, middle)?;
                self.set_block(middle);
                self.gen_condition(rhs, yes, no)
            }
            ExprKind::Binary { op: BinaryOp::LogAnd, lhs, rhs } => {
                let middle = self.new_block();
                self.gen_condition(lhs, middle, no)?;
                self.set_block(middle);
                self.gen_condition(rhs, yes, no)
            }
            ExprKind::Binary { op, lhs, rhs } if op.is_relational() => {
                let lv = self.gen_expr(lhs, true)?;
                let rv = self.gen_expr(rhs, true)?;
                let cmp_op = relational_to_cmp(*op);
                let ty = self.ir_type(&lhs.typ);
                let cond = self.emit(Instr::Cmp { op: cmp_op, ty, lhs: lv, rhs: rv });
                self.emit(Instr::CJump {
                    cond: Value::Instr(cond),
                    yes,
                    no,
                });
                Ok(())
            }
            _ => {
                let v = self.gen_expr(e, true)?;
                let ty = self.ir_type(&e.typ);
                let zero = self.emit(Instr::Cmp {
                    op: CmpOp::Eq,
                    ty,
                    lhs: v,
                    rhs: Value::ConstInt(0),
                });
                // Zero means false, so a match on "== 0" jumps to `no`
                // first — the targets are swapped relative to the common
                // case (spec §4.5).
                self.emit(Instr::CJump {
                    cond: Value::Instr(zero),
                    yes: no,
                    no: yes,
                });
                Ok(())
            }
        }
    }
}

fn relational_to_cmp(op: BinaryOp) -> CmpOp {
    match op {
        BinaryOp::Eq => CmpOp::Eq,
        BinaryOp::Ne => CmpOp::Ne,
        BinaryOp::Lt => CmpOp::Lt,
        BinaryOp::Le => CmpOp::Le,
        BinaryOp::Gt => CmpOp::Gt,
        BinaryOp::Ge => CmpOp::Ge,
        _ => unreachable!("caller checked is_relational"),
    }
}

#[cfg(test)]
mod tests {
    use crate::compile_str;
    use crate::config::CompilerConfig;
    use crate::ir::Instr;

    fn only_function(src: &str) -> crate::ir::Procedure {
        let module = compile_str(src, &CompilerConfig::new()).unwrap();
        assert_eq!(module.functions.len(), 1);
        module.functions.into_iter().next().unwrap()
    }

    #[test]
    fn short_circuit_and_never_materializes_a_boolean() {
        let proc = only_function(
            "int f(int x) { if (x > 0 && x < 10) return 1; return 0; }",
        );
        // Two relational `Cmp`s should appear, joined by a `CJump` out of
        // the middle block, and no `Binary` op computing a boolean.
        let mut cmp_count = 0;
        for id in proc.block_ids() {
            for &instr_id in &proc.block(id).instrs {
                match proc.instr(instr_id) {
                    Instr::Cmp { .. } => cmp_count += 1,
                    Instr::Binary { .. } => panic!("&& should not lower through a Binary op"),
                    _ => {}
                }
            }
        }
        assert_eq!(cmp_count, 2);
    }

    #[test]
    fn if_else_leaves_the_join_block_unreachable_and_swept() {
        let proc = only_function(
            "int g(int a, int b) { if (a < b) return a; else return b; }",
        );
        // Every remaining non-empty block must end in exactly one
        // terminator, and the join block the two `return`s skipped past
        // should have been swept to empty by `remove_unreachable_blocks`.
        let mut saw_empty_block = false;
        for id in proc.block_ids() {
            let block = proc.block(id);
            if block.instrs.is_empty() {
                saw_empty_block = true;
                continue;
            }
            let last = proc.instr(*block.instrs.last().unwrap());
            assert!(last.is_terminator(), "block {:?} does not end in a terminator", id);
        }
        assert!(saw_empty_block, "expected the dead join block to have been swept");
    }

    #[test]
    fn while_loop_wires_a_back_edge_to_the_condition_block() {
        let proc = only_function(
            "int sum(int n) { int i = 0; int t = 0; while (i < n) { t = t + i; i = i + 1; } return t; }",
        );
        let jump_targets: Vec<_> = proc
            .block_ids()
            .flat_map(|id| proc.block(id).instrs.clone())
            .filter_map(|instr_id| match proc.instr(instr_id) {
                Instr::Jump { target } => Some(*target),
                _ => None,
            })
            .collect();
        // The loop body must jump back to some block that itself issues
        // a CJump (the condition block) for the loop to terminate.
        let has_back_edge = jump_targets.iter().any(|&target| {
            proc.block(target)
                .instrs
                .last()
                .map(|id| matches!(proc.instr(*id), Instr::CJump { .. }))
                .unwrap_or(false)
        });
        assert!(has_back_edge, "expected a jump back to the condition block");
    }
}
