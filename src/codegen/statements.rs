//! Function lowering and per-statement dispatch (spec §4.5).

use crate::ast::{FunctionDef, Stmt};
use crate::codegen::state::CodeGen;
use crate::error::{CompilerError, Result};
use crate::ir::{Instr, Procedure, Value};

impl<'t> CodeGen<'t> {
    pub(crate) fn gen_function(&mut self, f: &FunctionDef) -> Result<()> {
        let _span = tracing::debug_span!("gen_function", name = %f.name).entered();
        tracing::debug!("entering function body");
        let return_ty = self.ir_type(&f.return_type);
        let params: Vec<(String, crate::ir::IrType)> = f
            .params
            .iter()
            .map(|p| (p.name.clone(), self.ir_type(&p.ty)))
            .collect();

        self.proc = Some(Procedure::new(f.name.clone(), params, return_ty));
        let entry = self.proc.as_ref().unwrap().entry;
        self.set_block(entry);
        self.locals.clear();
        self.push_scope();

        for (index, param) in f.params.iter().enumerate() {
            let pty = self.ir_type(&param.ty);
            let incoming = self.emit(Instr::Param { index, ty: pty });
            let addr = self.emit(Instr::Alloc { ty: pty });
            self.emit(Instr::Store {
                addr: Value::Instr(addr),
                value: Value::Instr(incoming),
            });
            self.declare_local(&param.name, Value::Instr(addr));
        }

        self.gen_stmt(&f.body)?;

        if !self.is_terminated() {
            if return_ty == crate::ir::IrType::Void {
                self.emit(Instr::Return { value: None });
            } else if self.current_block_is_empty() {
                // An empty tail block after a non-void body is tolerated
                // (spec §4.5 step 5, scenario 6): it gets swept as
                // unreachable rather than flagged as a missing return.
                self.emit(Instr::Unreachable);
            } else {
                return Err(CompilerError::semantics(
                    format!("function '{}' does not return a value", f.name),
                    f.loc,
                ));
            }
        }

        self.pop_scope();
        let mut proc = self.proc.take().expect("set above");
        proc.remove_unreachable_blocks();
        tracing::debug!("leaving function body, unreachable blocks swept");
        self.module.functions.push(proc);
        Ok(())
    }

    fn current_block_is_empty(&self) -> bool {
        self.proc
            .as_ref()
            .unwrap()
            .block(self.current_block())
            .instrs
            .is_empty()
    }

    pub(crate) fn gen_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Empty => Ok(()),
            Stmt::Expr(e) => {
                self.gen_expr(e, false)?;
                Ok(())
            }
            Stmt::Decl(locals) => {
                for local in locals {
                    let ty = self.ir_type(&local.ty);
                    let addr = self.emit(Instr::Alloc { ty });
                    if let Some(init) = &local.init {
                        let v = self.gen_expr(init, true)?;
                        self.emit(Instr::Store {
                            addr: Value::Instr(addr),
                            value: v,
                        });
                    }
                    self.declare_local(&local.name, Value::Instr(addr));
                }
                Ok(())
            }
            Stmt::Compound(stmts) => {
                self.push_scope();
                for s in stmts {
                    self.gen_stmt(s)?;
                    if self.is_terminated() {
                        break;
                    }
                }
                self.pop_scope();
                Ok(())
            }
            Stmt::If { cond, then_branch, else_branch } => {
                self.gen_if(cond, then_branch, else_branch.as_deref())
            }
            Stmt::While { cond, body } => self.gen_while(cond, body),
            Stmt::DoWhile { body, cond } => self.gen_do_while(body, cond),
            Stmt::For { init, cond, step, body } => {
                self.gen_for(init.as_deref(), cond.as_ref(), step.as_ref(), body)
            }
            Stmt::Return(value) => {
                match value {
                    Some(e) => {
                        let v = self.gen_expr(e, true)?;
                        self.emit(Instr::Return { value: Some(v) });
                    }
                    None => {
                        self.emit(Instr::Return { value: None });
                    }
                }
                Ok(())
            }
            Stmt::Break => {
                let target = self
                    .loop_stack
                    .last()
                    .map(|l| l.break_target)
                    .ok_or_else(|| CompilerError::semantics("'break' outside a loop", crate::location::SourceLocation::default()))?;
                self.emit(Instr::Jump { target });
                Ok(())
            }
            Stmt::Continue => {
                let target = self
                    .loop_stack
                    .last()
                    .map(|l| l.continue_target)
                    .ok_or_else(|| CompilerError::semantics("'continue' outside a loop", crate::location::SourceLocation::default()))?;
                self.emit(Instr::Jump { target });
                Ok(())
            }
            Stmt::Labeled { stmt, .. } => self.gen_stmt(stmt),
            Stmt::Goto { loc, .. } => Err(CompilerError::unimplemented("'goto' is not lowered", *loc)),
            Stmt::Switch { loc, .. } => Err(CompilerError::unimplemented("'switch' is not lowered", *loc)),
        }
    }

    pub(crate) fn gen_global(&mut self, global: &crate::ast::GlobalVar) -> Result<()> {
        let ty = self.ir_type(&global.ty);
        let init = match &global.init {
            Some(e) => match &e.kind {
                crate::ast::ExprKind::IntLiteral(n) => Some(Value::ConstInt(*n)),
                _ => None,
            },
            None => None,
        };
        let size = self.sizeof(&global.ty);
        self.add_global(crate::ir::GlobalDef {
            name: global.name.clone(),
            ty,
            size,
            init,
        });
        self.declare_global(&global.name, Value::Symbol(global.name.clone()));
        Ok(())
    }
}
