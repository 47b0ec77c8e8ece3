//! Code generator state: the current module/function/block, the
//! declaration-to-IR-location map, and the loop-context stack that
//! `break`/`continue` consult.

use std::collections::HashMap;

use crate::ctype::{CType, IntegerKind, TargetInfo, TypeKind};
use crate::ir::{BlockId, GlobalDef, InstrId, Instr, IrType, Module, Procedure, Value};

/// The blocks a `break`/`continue` inside the current loop body should
/// target (spec §9 Open Question 3: loops are in scope, so their exits
/// are lowered even though `switch`'s `break` is not).
pub(crate) struct LoopContext {
    pub break_target: BlockId,
    pub continue_target: BlockId,
}

pub struct CodeGen<'t> {
    pub(crate) module: Module,
    pub(crate) target: &'t dyn TargetInfo,
    pub(crate) proc: Option<Procedure>,
    pub(crate) current_block: Option<BlockId>,
    /// Name → storage location, one `HashMap` per lexical block, innermost
    /// last. Mirrors the parser's `Scope` but maps straight to IR locations
    /// since `ast::Expr::typ` already carries the resolved C type.
    pub(crate) locals: Vec<HashMap<String, Value>>,
    pub(crate) globals: HashMap<String, Value>,
    pub(crate) loop_stack: Vec<LoopContext>,
}

impl<'t> CodeGen<'t> {
    pub fn new(target: &'t dyn TargetInfo) -> Self {
        CodeGen {
            module: Module::new(),
            target,
            proc: None,
            current_block: None,
            locals: Vec::new(),
            globals: HashMap::new(),
            loop_stack: Vec::new(),
        }
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    pub(crate) fn proc_mut(&mut self) -> &mut Procedure {
        self.proc.as_mut().expect("codegen always runs inside a function")
    }

    pub(crate) fn current_block(&self) -> BlockId {
        self.current_block.expect("current block always set while lowering a function")
    }

    pub(crate) fn set_block(&mut self, block: BlockId) {
        self.current_block = Some(block);
    }

    pub(crate) fn new_block(&mut self) -> BlockId {
        self.proc_mut().new_block()
    }

    pub(crate) fn is_terminated(&self) -> bool {
        let block = self.current_block();
        self.proc.as_ref().unwrap().block(block).is_terminated(self.proc.as_ref().unwrap())
    }

    pub(crate) fn emit(&mut self, instr: Instr) -> InstrId {
        let block = self.current_block();
        self.proc_mut().push_instr(block, instr)
    }

    pub(crate) fn push_scope(&mut self) {
        self.locals.push(HashMap::new());
    }

    pub(crate) fn pop_scope(&mut self) {
        self.locals.pop();
    }

    pub(crate) fn declare_local(&mut self, name: &str, value: Value) {
        self.locals
            .last_mut()
            .expect("a local scope is always open while lowering a function body")
            .insert(name.to_string(), value);
    }

    pub(crate) fn declare_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    /// Resolve an identifier to its storage address, searching local
    /// frames innermost-first, then falling back to globals.
    pub(crate) fn resolve(&self, name: &str) -> Value {
        for frame in self.locals.iter().rev() {
            if let Some(v) = frame.get(name) {
                return v.clone();
            }
        }
        self.globals
            .get(name)
            .cloned()
            .unwrap_or_else(|| Value::Symbol(name.to_string()))
    }

    pub(crate) fn add_global(&mut self, def: GlobalDef) {
        self.module.globals.push(def);
    }

    /// Map a C type onto one of this IR's four scalar kinds (spec §6.1):
    /// `i8` for char-sized integers, `i64` for everything else word-sized,
    /// `f64` for floating types, and `ptr` for anything accessed only by
    /// address in this subset (pointers, arrays, structs, unions). Enum
    /// constants are plain `int`s, so enums map to `i64`.
    pub(crate) fn ir_type(&self, ty: &CType) -> IrType {
        match &ty.resolved().kind {
            TypeKind::Void => IrType::Void,
            TypeKind::Integer(k) => {
                if k.is_char_sized() {
                    IrType::I8
                } else {
                    IrType::I64
                }
            }
            TypeKind::Floating(_) => IrType::F64,
            TypeKind::Enum(_) => IrType::I64,
            TypeKind::Pointer(_)
            | TypeKind::Array { .. }
            | TypeKind::Function { .. }
            | TypeKind::Struct(_)
            | TypeKind::Union(_) => IrType::Ptr,
            TypeKind::TypedefAlias { .. } => unreachable!("resolved() strips aliases"),
        }
    }

    pub(crate) fn sizeof(&self, ty: &CType) -> u64 {
        self.target.size_of(ty)
    }

    pub(crate) fn is_unsigned(&self, ty: &CType) -> bool {
        matches!(
            ty.resolved().kind,
            TypeKind::Integer(
                IntegerKind::UnsignedChar
                    | IntegerKind::UnsignedShort
                    | IntegerKind::UnsignedInt
                    | IntegerKind::UnsignedLong
                    | IntegerKind::UnsignedLongLong
            )
        )
    }
}
