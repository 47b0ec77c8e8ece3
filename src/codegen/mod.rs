//! AST → IR lowering (spec §4.5).
//!
//! Split the way the teacher's own code generator is split: shared state
//! and block/value bookkeeping in [`state`], control-flow lowering
//! (`if`/`while`/`do`/`for`/`gen_condition`) in [`control_flow`], statement
//! dispatch and function/global lowering in [`statements`], expression
//! lowering in [`expr`], and the translation-unit-level entry point in
//! [`program`].

mod control_flow;
mod expr;
mod program;
mod state;
mod statements;

pub use state::CodeGen;

use crate::ast::TranslationUnit;
use crate::ctype::TargetInfo;
use crate::error::CompilerError;
use crate::ir::Module;

/// Lower a parsed translation unit into an IR module, using `target` to
/// answer `sizeof` queries (spec §9 Open Question).
pub fn compile(unit: &TranslationUnit, target: &dyn TargetInfo) -> Result<Module, CompilerError> {
    tracing::debug!("generating IR code");
    let mut codegen = CodeGen::new(target);
    codegen.gen_translation_unit(unit)?;
    tracing::debug!("finished code generation");
    Ok(codegen.into_module())
}
