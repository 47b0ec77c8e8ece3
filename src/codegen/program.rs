//! Translation-unit-level entry point: dispatch each external declaration
//! to function or global lowering (spec §4.5).

use crate::ast::{ExternalDecl, TranslationUnit};
use crate::codegen::state::CodeGen;
use crate::error::Result;

impl<'t> CodeGen<'t> {
    pub(crate) fn gen_translation_unit(&mut self, unit: &TranslationUnit) -> Result<()> {
        for decl in &unit.decls {
            match decl {
                ExternalDecl::Function(f) => self.gen_function(f)?,
                ExternalDecl::Global(g) => self.gen_global(g)?,
                // A prototype introduces no code of its own; callers
                // resolve the callee by name at `Instr::Call` lowering
                // time instead of through a stored binding.
                ExternalDecl::FunctionPrototype { .. } => {}
                ExternalDecl::Noop => {}
            }
        }
        Ok(())
    }
}
