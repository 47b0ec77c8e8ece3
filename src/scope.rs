//! Lexical scoping with two independent namespaces (spec §4.2).
//!
//! Ordinary identifiers (variables, functions, typedef names, enum
//! constants) live in one namespace; struct/union/enum tags live in
//! another, so `struct foo { ... }` and a variable named `foo` never
//! collide. Tag lookups return a shared, mutable handle so a forward
//! declaration (`struct foo;`) can be completed in place once its body is
//! parsed, without invalidating any `CType` built from the incomplete tag.

use std::collections::HashMap;
use std::rc::Rc;
use std::cell::RefCell;

use crate::ctype::{AggregateDef, AggregateKind, CType, EnumDef};
use crate::error::CompilerError;
use crate::location::SourceLocation;

/// What an ordinary-namespace name is bound to.
#[derive(Debug, Clone)]
pub enum Binding {
    Variable { ty: CType, is_global: bool },
    Function { ty: CType },
    Typedef { ty: CType },
    EnumConstant { ty: CType },
}

impl Binding {
    pub fn ty(&self) -> &CType {
        match self {
            Binding::Variable { ty, .. } => ty,
            Binding::Function { ty } => ty,
            Binding::Typedef { ty } => ty,
            Binding::EnumConstant { ty } => ty,
        }
    }

    pub fn is_typedef(&self) -> bool {
        matches!(self, Binding::Typedef { .. })
    }
}

#[derive(Debug, Clone)]
enum Tag {
    Struct(Rc<RefCell<AggregateDef>>),
    Union(Rc<RefCell<AggregateDef>>),
    Enum(Rc<RefCell<EnumDef>>),
}

#[derive(Debug, Default)]
struct Frame {
    ordinary: HashMap<String, Binding>,
    tags: HashMap<String, Tag>,
}

/// A stack of nested frames, innermost last. The outermost frame is file
/// scope.
#[derive(Debug)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Scope {
            frames: vec![Frame::default()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop(&mut self) {
        assert!(self.frames.len() > 1, "cannot pop file scope");
        self.frames.pop();
    }

    pub fn is_file_scope(&self) -> bool {
        self.frames.len() == 1
    }

    /// Declare an ordinary-namespace name in the innermost frame. Errors if
    /// the name is already bound *in that same frame* (redeclaration across
    /// frames is shadowing, not an error).
    pub fn declare(
        &mut self,
        name: &str,
        binding: Binding,
        loc: SourceLocation,
    ) -> Result<(), CompilerError> {
        let frame = self.frames.last_mut().expect("file scope always present");
        if frame.ordinary.contains_key(name) {
            return Err(CompilerError::lookup(
                format!("redefinition of '{}'", name),
                loc,
            ));
        }
        frame.ordinary.insert(name.to_string(), binding);
        Ok(())
    }

    /// Look up an ordinary-namespace name, searching from innermost frame
    /// outward.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.ordinary.get(name))
    }

    pub fn lookup_err(&self, name: &str, loc: SourceLocation) -> Result<&Binding, CompilerError> {
        self.lookup(name)
            .ok_or_else(|| CompilerError::lookup(format!("undeclared identifier '{}'", name), loc))
    }

    pub fn is_typedef_name(&self, name: &str) -> bool {
        matches!(self.lookup(name), Some(b) if b.is_typedef())
    }

    /// Find or forward-declare a struct/union tag in the innermost frame
    /// that already has one, else create it in the current frame.
    pub fn declare_or_get_aggregate_tag(
        &mut self,
        kind: AggregateKind,
        name: &str,
        loc: SourceLocation,
    ) -> Result<Rc<RefCell<AggregateDef>>, CompilerError> {
        if let Some(existing) = self.lookup_tag(name) {
            return match (kind, existing) {
                (AggregateKind::Struct, Tag::Struct(def)) => Ok(def),
                (AggregateKind::Union, Tag::Union(def)) => Ok(def),
                _ => Err(CompilerError::type_spec(
                    format!("'{}' defined as wrong kind of tag", name),
                    loc,
                )),
            };
        }
        let def = Rc::new(RefCell::new(AggregateDef {
            tag: Some(name.to_string()),
            fields: Vec::new(),
            complete: false,
        }));
        let tag = match kind {
            AggregateKind::Struct => Tag::Struct(def.clone()),
            AggregateKind::Union => Tag::Union(def.clone()),
        };
        self.frames
            .last_mut()
            .expect("file scope always present")
            .tags
            .insert(name.to_string(), tag);
        Ok(def)
    }

    pub fn declare_or_get_enum_tag(
        &mut self,
        name: &str,
        loc: SourceLocation,
    ) -> Result<Rc<RefCell<EnumDef>>, CompilerError> {
        if let Some(existing) = self.lookup_tag(name) {
            return match existing {
                Tag::Enum(def) => Ok(def),
                _ => Err(CompilerError::type_spec(
                    format!("'{}' defined as wrong kind of tag", name),
                    loc,
                )),
            };
        }
        let def = Rc::new(RefCell::new(EnumDef {
            tag: Some(name.to_string()),
            complete: false,
        }));
        self.frames
            .last_mut()
            .expect("file scope always present")
            .tags
            .insert(name.to_string(), Tag::Enum(def.clone()));
        Ok(def)
    }

    fn lookup_tag(&self, name: &str) -> Option<Tag> {
        self.frames.iter().rev().find_map(|f| f.tags.get(name).cloned())
    }
}

/// RAII guard that pushes a new frame and pops it on drop, so a parser
/// function can open a scope for e.g. a compound statement or function
/// body without a matching explicit `pop` on every return path.
pub struct ScopeGuard<'a> {
    scope: &'a mut Scope,
}

impl<'a> ScopeGuard<'a> {
    pub fn enter(scope: &'a mut Scope) -> Self {
        scope.push();
        ScopeGuard { scope }
    }

    pub fn scope(&mut self) -> &mut Scope {
        self.scope
    }
}

impl<'a> Drop for ScopeGuard<'a> {
    fn drop(&mut self) {
        self.scope.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::default()
    }

    #[test]
    fn redeclaration_in_same_frame_errors() {
        let mut scope = Scope::new();
        scope
            .declare("x", Binding::Variable { ty: CType::int(), is_global: true }, loc())
            .unwrap();
        let err = scope
            .declare("x", Binding::Variable { ty: CType::int(), is_global: true }, loc())
            .unwrap_err();
        assert!(err.message.contains("x"));
    }

    #[test]
    fn shadowing_in_nested_frame_is_allowed() {
        let mut scope = Scope::new();
        scope
            .declare("x", Binding::Variable { ty: CType::int(), is_global: true }, loc())
            .unwrap();
        {
            let mut guard = ScopeGuard::enter(&mut scope);
            guard
                .scope()
                .declare("x", Binding::Variable { ty: CType::int(), is_global: false }, loc())
                .unwrap();
        }
        assert!(scope.lookup("x").is_some());
    }

    #[test]
    fn tag_and_ordinary_namespaces_are_independent() {
        let mut scope = Scope::new();
        scope
            .declare("foo", Binding::Variable { ty: CType::int(), is_global: true }, loc())
            .unwrap();
        let tag = scope.declare_or_get_aggregate_tag(AggregateKind::Struct, "foo", loc());
        assert!(tag.is_ok());
    }

    #[test]
    fn forward_declared_tag_completes_in_place() {
        let mut scope = Scope::new();
        let first = scope
            .declare_or_get_aggregate_tag(AggregateKind::Struct, "foo", loc())
            .unwrap();
        assert!(!first.borrow().complete);
        let second = scope
            .declare_or_get_aggregate_tag(AggregateKind::Struct, "foo", loc())
            .unwrap();
        second.borrow_mut().complete = true;
        assert!(first.borrow().complete);
    }
}
