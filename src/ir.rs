//! The intermediate representation this crate's code generator emits
//! (spec §6).
//!
//! Functions own an arena of basic blocks and a separate arena of
//! instructions; both are referenced by integer handle (`BlockId`,
//! `InstrId`) rather than by pointer, so a block can hold a `Jump` to a
//! block defined later, and a `Phi` can name its predecessor blocks,
//! without any cyclic `Rc`/`RefCell` bookkeeping.

use std::fmt;

/// One of the two scalar kinds this IR's word-sized type mapping produces
/// (spec §6.1): one byte for `char`-sized C types, eight bytes for
/// everything else, plus a floating kind and an opaque pointer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrType {
    I8,
    I64,
    F64,
    Ptr,
    Void,
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IrType::I8 => "i8",
            IrType::I64 => "i64",
            IrType::F64 => "f64",
            IrType::Ptr => "ptr",
            IrType::Void => "void",
        };
        f.write_str(s)
    }
}

macro_rules! newtype_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", stringify!($name).chars().next().unwrap().to_ascii_lowercase(), self.0)
            }
        }
    };
}

newtype_id!(BlockId);
newtype_id!(InstrId);
newtype_id!(ValueId);

/// A value an instruction can read: either another instruction's result
/// (identified by its `InstrId`, SSA-style) or a constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Instr(InstrId),
    ConstInt(i64),
    ConstFloat(f64),
    /// Address of a global or local variable / function.
    Symbol(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    And,
    Or,
    Xor,
}

/// One IR instruction. Every instruction lives in the function's
/// `instrs` arena and is referenced by `InstrId`; those with a result
/// (everything but `Jump`/`CJump`/`Store`/terminators without a value)
/// are themselves valid `Value::Instr` operands for later instructions.
#[derive(Debug, Clone)]
pub enum Instr {
    /// The incoming value of parameter `index`, bound once at function
    /// entry (spec §4.5 step 3: "create an IR Parameter").
    Param { index: usize, ty: IrType },
    /// Reserve stack storage for a local of the given type, producing a
    /// pointer.
    Alloc { ty: IrType },
    Load { ty: IrType, addr: Value },
    Store { addr: Value, value: Value },
    Binary { op: ArithOp, ty: IrType, lhs: Value, rhs: Value },
    Cmp { op: CmpOp, ty: IrType, lhs: Value, rhs: Value },
    /// Truncate/extend/reinterpret a value from one `IrType` to another
    /// (spec §4.5: explicit `(T) expr` casts).
    Cast { from: IrType, to: IrType, value: Value },
    /// Address of a struct/union field at a known byte offset.
    FieldAddr { base: Value, offset: u64 },
    /// Address of `base[index]`, scaled by `elem_size`.
    IndexAddr { base: Value, index: Value, elem_size: u64 },
    /// A call whose result is used (spec §4.5: the `ProcedureCall` fix
    /// means a *void* call goes through [`Instr::VoidCall`] instead).
    Call { callee: String, args: Vec<Value>, ty: IrType },
    /// A call whose result is discarded, because the callee returns
    /// `void`. Kept distinct from `Call` because nothing may read its
    /// result (there isn't one) — see DESIGN.md on the void-call bug fix.
    VoidCall { callee: String, args: Vec<Value> },
    Phi { ty: IrType, incoming: Vec<(BlockId, Value)> },
    Jump { target: BlockId },
    CJump { cond: Value, yes: BlockId, no: BlockId },
    Return { value: Option<Value> },
    /// No successor and no return value; only ever reached by dead code,
    /// swept by [`Function::remove_unreachable_blocks`].
    Unreachable,
}

impl Instr {
    /// Whether this instruction produces a value other code may reference.
    pub fn has_result(&self) -> bool {
        matches!(
            self,
            Instr::Param { .. }
                | Instr::Alloc { .. }
                | Instr::Load { .. }
                | Instr::Binary { .. }
                | Instr::Cmp { .. }
                | Instr::Cast { .. }
                | Instr::FieldAddr { .. }
                | Instr::IndexAddr { .. }
                | Instr::Call { .. }
                | Instr::Phi { .. }
        )
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instr::Jump { .. } | Instr::CJump { .. } | Instr::Return { .. } | Instr::Unreachable
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub instrs: Vec<InstrId>,
}

impl BasicBlock {
    pub fn is_terminated(&self, func: &Procedure) -> bool {
        self.instrs
            .last()
            .map(|id| func.instr(*id).is_terminator())
            .unwrap_or(false)
    }
}

/// A function or procedure body: an arena of basic blocks plus the flat
/// instruction arena they index into.
#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: String,
    pub params: Vec<(String, IrType)>,
    pub return_type: IrType,
    blocks: Vec<BasicBlock>,
    instrs: Vec<Instr>,
    pub entry: BlockId,
}

impl Procedure {
    pub fn new(name: impl Into<String>, params: Vec<(String, IrType)>, return_type: IrType) -> Self {
        let mut proc = Procedure {
            name: name.into(),
            params,
            return_type,
            blocks: Vec::new(),
            instrs: Vec::new(),
            entry: BlockId(0),
        };
        proc.entry = proc.new_block();
        proc
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::default());
        id
    }

    pub fn push_instr(&mut self, block: BlockId, instr: Instr) -> InstrId {
        let id = InstrId(self.instrs.len() as u32);
        self.instrs.push(instr);
        self.block_mut(block).instrs.push(id);
        id
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.0 as usize]
    }

    pub fn instr(&self, id: InstrId) -> &Instr {
        &self.instrs[id.0 as usize]
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    /// Blocks with no predecessor other than the entry block itself are
    /// reachable by construction; anything else not reached by a
    /// breadth-first walk from `entry` is dead (spec §6.4's "empty
    /// tail block" and "unreachable else-branch" cases).
    pub fn reachable_blocks(&self) -> std::collections::HashSet<BlockId> {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![self.entry];
        while let Some(b) = stack.pop() {
            if !seen.insert(b) {
                continue;
            }
            if let Some(last) = self.block(b).instrs.last() {
                match self.instr(*last) {
                    Instr::Jump { target } => stack.push(*target),
                    Instr::CJump { yes, no, .. } => {
                        stack.push(*yes);
                        stack.push(*no);
                    }
                    _ => {}
                }
            }
        }
        seen
    }

    /// Drop blocks unreachable from `entry`, keeping the rest in their
    /// original relative order (spec §6.4).
    pub fn remove_unreachable_blocks(&mut self) {
        let reachable = self.reachable_blocks();
        let mut swept = 0usize;
        for id in self.block_ids() {
            if !reachable.contains(&id) {
                self.blocks[id.0 as usize].instrs.clear();
                swept += 1;
            }
        }
        if swept > 0 {
            tracing::trace!(function = %self.name, swept, "swept unreachable blocks");
        }
    }
}

#[derive(Debug, Clone)]
pub struct GlobalDef {
    pub name: String,
    pub ty: IrType,
    /// Byte size of the underlying C type (spec §4.5/§6: `Variable(name,
    /// sizeof(type))`), independent of `ty`'s IR-level width.
    pub size: u64,
    pub init: Option<Value>,
}

/// A whole translation unit's lowered form: every function plus every
/// file-scope global, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub functions: Vec<Procedure>,
    pub globals: Vec<GlobalDef>,
}

impl Module {
    pub fn new() -> Self {
        Module::default()
    }
}

pub mod display {
    //! Textual rendering of a [`super::Module`], used by the `build`/`check`
    //! CLI subcommands and by tests that assert on IR shape.
    use super::*;
    use std::fmt::Write;

    pub fn print_module(module: &Module) -> String {
        let mut out = String::new();
        for global in &module.globals {
            let _ = writeln!(out, "global {} {} : size {}", global.ty, global.name, global.size);
        }
        for func in &module.functions {
            print_procedure(&mut out, func);
        }
        out
    }

    fn print_value(v: &Value) -> String {
        match v {
            Value::Instr(id) => id.to_string(),
            Value::ConstInt(n) => n.to_string(),
            Value::ConstFloat(n) => n.to_string(),
            Value::Symbol(s) => format!("@{}", s),
        }
    }

    fn print_procedure(out: &mut String, proc: &Procedure) {
        let params = proc
            .params
            .iter()
            .map(|(n, t)| format!("{} {}", t, n))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "fn {}({}) -> {} {{", proc.name, params, proc.return_type);
        for id in proc.block_ids() {
            let block = proc.block(id);
            let _ = writeln!(out, "  {}:", id);
            for &instr_id in &block.instrs {
                print_instr(out, instr_id, proc.instr(instr_id));
            }
        }
        let _ = writeln!(out, "}}");
    }

    fn print_instr(out: &mut String, id: InstrId, instr: &Instr) {
        let lhs = if instr.has_result() {
            format!("{} = ", id)
        } else {
            String::new()
        };
        let line = match instr {
            Instr::Param { index, ty } => format!("param {} {}", ty, index),
            Instr::Alloc { ty } => format!("alloc {}", ty),
            Instr::Load { ty, addr } => format!("load {} {}", ty, print_value(addr)),
            Instr::Store { addr, value } => {
                format!("store {} {}", print_value(addr), print_value(value))
            }
            Instr::Binary { op, ty, lhs, rhs } => format!(
                "{:?} {} {} {}",
                op,
                ty,
                print_value(lhs),
                print_value(rhs)
            ),
            Instr::Cmp { op, ty, lhs, rhs } => format!(
                "cmp.{:?} {} {} {}",
                op,
                ty,
                print_value(lhs),
                print_value(rhs)
            ),
            Instr::Cast { from, to, value } => {
                format!("cast {} -> {} {}", from, to, print_value(value))
            }
            Instr::FieldAddr { base, offset } => {
                format!("field_addr {} +{}", print_value(base), offset)
            }
            Instr::IndexAddr { base, index, elem_size } => format!(
                "index_addr {} [{}] * {}",
                print_value(base),
                print_value(index),
                elem_size
            ),
            Instr::Call { callee, args, ty } => format!(
                "call {} {}({})",
                ty,
                callee,
                args.iter().map(print_value).collect::<Vec<_>>().join(", ")
            ),
            Instr::VoidCall { callee, args } => format!(
                "call void {}({})",
                callee,
                args.iter().map(print_value).collect::<Vec<_>>().join(", ")
            ),
            Instr::Phi { ty, incoming } => format!(
                "phi {} {}",
                ty,
                incoming
                    .iter()
                    .map(|(b, v)| format!("[{} -> {}]", b, print_value(v)))
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
            Instr::Jump { target } => format!("jump {}", target),
            Instr::CJump { cond, yes, no } => {
                format!("cjump {} {} {}", print_value(cond), yes, no)
            }
            Instr::Return { value } => match value {
                Some(v) => format!("return {}", print_value(v)),
                None => "return".to_string(),
            },
            Instr::Unreachable => "unreachable".to_string(),
        };
        let _ = writeln!(out, "    {}{}", lhs, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_else_block_is_swept() {
        let mut proc = Procedure::new("f", vec![], IrType::I64);
        let entry = proc.entry;
        let then_block = proc.new_block();
        let else_block = proc.new_block();
        proc.push_instr(
            entry,
            Instr::CJump {
                cond: Value::ConstInt(1),
                yes: then_block,
                no: then_block, // both branches go to `then_block`; else_block is dead
            },
        );
        proc.push_instr(then_block, Instr::Return { value: None });
        proc.push_instr(else_block, Instr::Return { value: None });

        let reachable = proc.reachable_blocks();
        assert!(reachable.contains(&entry));
        assert!(reachable.contains(&then_block));
        assert!(!reachable.contains(&else_block));
    }

    #[test]
    fn display_renders_a_simple_function() {
        let mut proc = Procedure::new("f", vec![("x".to_string(), IrType::I64)], IrType::I64);
        let entry = proc.entry;
        proc.push_instr(
            entry,
            Instr::Return {
                value: Some(Value::ConstInt(0)),
            },
        );
        let mut module = Module::new();
        module.functions.push(proc);
        let text = display::print_module(&module);
        assert!(text.contains("fn f(i64 x) -> i64"));
        assert!(text.contains("return 0"));
    }
}
