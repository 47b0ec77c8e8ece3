//! Recursive-descent C parser (spec §4.4).
//!
//! Declarations, declarators, statements and a Pratt-style expression
//! parser, all driven off the same [`TokenStream`] so the typedef hack
//! (see `token.rs`) is applied uniformly. The precedence table below is
//! ported from the reference C front end this crate's collaborators are
//! grounded on.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::ast::*;
use crate::config::CompilerConfig;
use crate::ctype::{
    AggregateKind, ArraySize, CType, Field, IntegerKind, Param as TypeParam, TypeContext, TypeKind,
    TypeSpecifier,
};
use crate::error::{CompilerError, ErrorKind};
use crate::location::SourceLocation;
use crate::scope::{Binding, Scope, ScopeGuard};
use crate::token::{Token, TokenKind, TokenStream, TypedefSet};

type PResult<T> = Result<T, CompilerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Associativity {
    Left,
    Right,
}

/// `(associativity, priority)`, higher priority binds tighter. Ported
/// verbatim from the reference front end's `prio_map`.
fn priority(op: &str) -> Option<(Associativity, u8)> {
    use Associativity::*;
    Some(match op {
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" | ">>=" | "<<=" | "|=" | "&=" | "^=" => (Right, 10),
        "?" => (Left, 17),
        "||" => (Left, 20),
        "&&" => (Left, 30),
        "|" => (Left, 40),
        "^" => (Left, 50),
        "&" => (Left, 60),
        "<" | "<=" | ">" | ">=" | "!=" | "==" => (Left, 70),
        ">>" | "<<" => (Left, 80),
        "+" | "-" => (Left, 90),
        "*" | "/" | "%" => (Left, 100),
        _ => return None,
    })
}

const STORAGE_CLASSES: &[&str] = &["typedef", "static", "extern", "register", "auto"];
const TYPE_QUALIFIERS: &[&str] = &["const", "volatile", "restrict"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    None,
    Typedef,
    Static,
    Extern,
    Register,
    Auto,
}

impl StorageClass {
    fn from_text(text: &str) -> Self {
        match text {
            "typedef" => StorageClass::Typedef,
            "static" => StorageClass::Static,
            "extern" => StorageClass::Extern,
            "register" => StorageClass::Register,
            "auto" => StorageClass::Auto,
            _ => StorageClass::None,
        }
    }
}

/// Declaration specifiers collected before any declarator (spec §4.4).
struct DeclSpec {
    ty: CType,
    storage_class: StorageClass,
}

/// A declarator's effect on the base type, assembled "middle ∥ suffixes ∥
/// reversed prefixes" and applied outer-to-inner (spec §4.4, §9).
enum TypeModifier {
    Pointer(crate::ctype::Qualifiers),
    Array(ArraySize),
    Function(Vec<TypeParam>, bool),
}

pub struct Parser {
    stream: TokenStream,
    typedefs: TypedefSet,
    scope: Scope,
    type_ctx: TypeContext,
    config: CompilerConfig,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, config: CompilerConfig) -> Self {
        let typedefs: TypedefSet = Rc::new(RefCell::new(HashSet::new()));
        Parser {
            stream: TokenStream::new(tokens, typedefs.clone()),
            typedefs,
            scope: Scope::new(),
            type_ctx: TypeContext::new(),
            config,
        }
    }

    // ---- declarations -------------------------------------------------

    pub fn parse_translation_unit(mut self) -> PResult<(TranslationUnit, Scope)> {
        let mut unit = TranslationUnit::default();
        while !self.stream.at_end() {
            for decl in self.parse_external_declaration()? {
                unit.decls.push(decl);
            }
        }
        Ok((unit, self.scope))
    }

    fn parse_external_declaration(&mut self) -> PResult<Vec<ExternalDecl>> {
        let loc = self.current_loc();
        tracing::trace!(value = %self.stream.peek_value(), "parsing a declaration");
        let ds = self.parse_decl_specifiers(true)?;
        if self.stream.try_consume(";") {
            return Ok(vec![ExternalDecl::Noop]);
        }
        self.parse_decl_group_external(ds, loc)
    }

    fn current_loc(&self) -> SourceLocation {
        // The stream does not expose the raw location directly at top
        // level; callers that need precise locations capture it from the
        // token they consume. This is a best-effort fallback.
        SourceLocation::default()
    }

    fn is_decl_start(&self) -> bool {
        match self.stream.peek_kind() {
            TokenKind::TypeIdentifier => true,
            TokenKind::Keyword => {
                let v = self.stream.peek_value();
                STORAGE_CLASSES.contains(&v)
                    || TYPE_QUALIFIERS.contains(&v)
                    || matches!(
                        v,
                        "void" | "char" | "short" | "int" | "long" | "float" | "double" | "signed"
                            | "unsigned" | "struct" | "union" | "enum"
                    )
            }
            _ => false,
        }
    }

    fn parse_decl_specifiers(&mut self, allow_storage_class: bool) -> PResult<DeclSpec> {
        let mut storage_class = StorageClass::None;
        let mut have_storage_class = false;
        let mut qualifiers = crate::ctype::Qualifiers::none();
        let mut type_specs: Vec<TypeSpecifier> = Vec::new();
        let mut explicit_ty: Option<CType> = None;

        loop {
            match self.stream.peek_kind() {
                TokenKind::TypeIdentifier => {
                    if explicit_ty.is_some() || !type_specs.is_empty() {
                        break;
                    }
                    let tok = self.stream.consume();
                    let binding = self.scope.lookup_err(&tok.value, tok.loc)?;
                    explicit_ty = Some(binding.ty().clone());
                }
                TokenKind::Keyword => {
                    let v = self.stream.peek_value().to_string();
                    if v == "enum" {
                        explicit_ty = Some(self.parse_enum()?);
                    } else if v == "struct" || v == "union" {
                        explicit_ty = Some(self.parse_struct_or_union()?);
                    } else if STORAGE_CLASSES.contains(&v.as_str()) {
                        let tok = self.stream.consume();
                        if !allow_storage_class {
                            return Err(CompilerError::type_spec(
                                "storage class not allowed here",
                                tok.loc,
                            ));
                        }
                        if have_storage_class {
                            return Err(CompilerError::type_spec(
                                "multiple storage classes",
                                tok.loc,
                            ));
                        }
                        storage_class = StorageClass::from_text(&v);
                        have_storage_class = true;
                    } else if TYPE_QUALIFIERS.contains(&v.as_str()) {
                        let tok = self.stream.consume();
                        if v == "restrict" && !self.config.std.allows_restrict() {
                            return Err(CompilerError::type_spec(
                                "'restrict' requires c99",
                                tok.loc,
                            ));
                        }
                        let mut q = crate::ctype::Qualifiers::none();
                        match v.as_str() {
                            "const" => q.is_const = true,
                            "volatile" => q.is_volatile = true,
                            "restrict" => q.is_restrict = true,
                            _ => unreachable!(),
                        }
                        qualifiers.add(q, tok.loc)?;
                    } else if v == "inline" {
                        if !self.config.std.allows_inline() {
                            let tok = self.stream.consume();
                            return Err(CompilerError::type_spec(
                                "'inline' requires c99",
                                tok.loc,
                            ));
                        }
                        self.stream.consume();
                    } else if let Some(spec) = basic_type_specifier(&v) {
                        let tok = self.stream.consume();
                        if explicit_ty.is_some() {
                            return Err(CompilerError::type_spec(
                                "type already determined",
                                tok.loc,
                            ));
                        }
                        type_specs.push(spec);
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }

        let loc = SourceLocation::default();
        let mut ty = if let Some(t) = explicit_ty {
            if !type_specs.is_empty() {
                return Err(CompilerError::type_spec("type already defined", loc));
            }
            t
        } else {
            self.type_ctx.resolve(&type_specs, loc)?
        };
        ty.qualifiers.add(qualifiers, loc)?;

        Ok(DeclSpec {
            ty,
            storage_class,
        })
    }

    fn parse_struct_or_union(&mut self) -> PResult<CType> {
        let kw = self.stream.consume();
        let kind = if kw.value == "struct" {
            AggregateKind::Struct
        } else {
            AggregateKind::Union
        };

        let def = if self.stream.peek_kind() == TokenKind::Identifier {
            let tag = self.stream.consume();
            let def = self.scope.declare_or_get_aggregate_tag(kind, &tag.value, tag.loc)?;
            if def.borrow().complete && self.stream.check("{") {
                return Err(CompilerError::type_spec(
                    format!("multiple definitions of '{}'", tag.value),
                    tag.loc,
                ));
            }
            def
        } else if self.stream.check("{") {
            Rc::new(RefCell::new(crate::ctype::AggregateDef::default()))
        } else {
            return Err(CompilerError::syntax(
                "expected tag name or struct declaration",
                kw.loc,
            ));
        };

        if self.stream.try_consume("{") {
            let mut fields = Vec::new();
            while !self.stream.check("}") {
                let ds = self.parse_decl_specifiers(false)?;
                loop {
                    let (modifiers, name) = self.parse_type_modifiers(false)?;
                    let field_ty = apply_type_modifiers(modifiers, ds.ty.clone());
                    let name = name.expect("struct field requires a name");
                    fields.push(Field {
                        name: name.value,
                        ty: field_ty,
                    });
                    if !self.stream.try_consume(",") {
                        break;
                    }
                }
                self.stream.expect(";")?;
            }
            self.stream.expect("}")?;
            def.borrow_mut().fields = fields;
            def.borrow_mut().complete = true;
        }

        Ok(CType::new(match kind {
            AggregateKind::Struct => TypeKind::Struct(def),
            AggregateKind::Union => TypeKind::Union(def),
        }))
    }

    fn parse_enum(&mut self) -> PResult<CType> {
        let kw = self.stream.expect("enum")?;
        let def = if self.stream.peek_kind() == TokenKind::Identifier {
            let tag = self.stream.consume();
            let def = self.scope.declare_or_get_enum_tag(&tag.value, tag.loc)?;
            if def.borrow().complete && self.stream.check("{") {
                return Err(CompilerError::type_spec(
                    format!("multiple definitions of enum '{}'", tag.value),
                    tag.loc,
                ));
            }
            def
        } else if self.stream.check("{") {
            Rc::new(RefCell::new(crate::ctype::EnumDef::default()))
        } else {
            return Err(CompilerError::syntax(
                "expected tag name or enum declaration",
                kw.loc,
            ));
        };

        if self.stream.try_consume("{") {
            if self.stream.try_consume("}") {
                return Err(CompilerError::syntax("empty enum is not allowed", kw.loc));
            }
            let mut previous: Option<Expr> = None;
            loop {
                let name = self.stream.consume_kind(TokenKind::Identifier)?;
                let value = if self.stream.try_consume("=") {
                    Some(self.parse_constant_expression()?)
                } else {
                    None
                };
                let value = value.unwrap_or_else(|| {
                    crate::ctype::implicit_enum_value(previous.clone(), name.loc)
                });
                self.scope.declare(
                    &name.value,
                    Binding::EnumConstant { ty: CType::int() },
                    name.loc,
                )?;
                previous = Some(value);
                if !self.stream.try_consume(",") {
                    break;
                }
                if self.stream.check("}") {
                    break;
                }
            }
            self.stream.expect("}")?;
            def.borrow_mut().complete = true;
        }

        Ok(CType::new(TypeKind::Enum(def)))
    }

    /// Parse the pointer/array/function suffix structure around a
    /// declarator's name (spec §4.4, §9: "go right when you can, go left
    /// when you must").
    fn parse_type_modifiers(&mut self, abstract_ok: bool) -> PResult<(Vec<TypeModifier>, Option<Token>)> {
        let mut prefixes = Vec::new();
        while self.stream.try_consume("*") {
            let mut q = crate::ctype::Qualifiers::none();
            loop {
                let v = self.stream.peek_value().to_string();
                if TYPE_QUALIFIERS.contains(&v.as_str()) {
                    let tok = self.stream.consume();
                    let mut single = crate::ctype::Qualifiers::none();
                    match v.as_str() {
                        "const" => single.is_const = true,
                        "volatile" => single.is_volatile = true,
                        "restrict" => single.is_restrict = true,
                        _ => unreachable!(),
                    }
                    q.add(single, tok.loc)?;
                } else {
                    break;
                }
            }
            prefixes.push(TypeModifier::Pointer(q));
        }

        let mut middle = Vec::new();
        let mut name = None;
        if self.stream.peek_kind() == TokenKind::Identifier {
            name = Some(self.stream.consume());
        } else if self.stream.check("(") {
            self.stream.consume();
            if self.is_decl_start() {
                let args = self.parse_function_declarator()?;
                middle.push(TypeModifier::Function(args.0, args.1));
                self.stream.expect(")")?;
            } else {
                let (sub, sub_name) = self.parse_type_modifiers(abstract_ok)?;
                name = sub_name;
                self.stream.expect(")")?;
                middle.extend(sub);
            }
        } else if !abstract_ok {
            return Err(CompilerError::syntax(
                "expected a declarator name",
                SourceLocation::default(),
            ));
        }

        let mut suffixes = Vec::new();
        loop {
            if self.stream.try_consume("(") {
                let (params, variadic) = self.parse_function_declarator()?;
                self.stream.expect(")")?;
                suffixes.push(TypeModifier::Function(params, variadic));
            } else if self.stream.try_consume("[") {
                let size = if self.stream.check("]") {
                    ArraySize::Unspecified
                } else if self.stream.try_consume("*") {
                    ArraySize::VariableLength
                } else {
                    let expr = self.parse_expression()?;
                    match expr.kind {
                        ExprKind::IntLiteral(n) => ArraySize::Constant(n),
                        _ => ArraySize::VariableLength,
                    }
                };
                self.stream.expect("]")?;
                suffixes.push(TypeModifier::Array(size));
            } else {
                break;
            }
        }

        prefixes.reverse();
        let mut modifiers = middle;
        modifiers.extend(suffixes);
        modifiers.extend(prefixes);
        Ok((modifiers, name))
    }

    fn parse_function_declarator(&mut self) -> PResult<(Vec<TypeParam>, bool)> {
        let mut params = Vec::new();
        let mut variadic = false;
        if !self.stream.check(")") {
            loop {
                if self.stream.try_consume("...") {
                    variadic = true;
                    break;
                }
                let ds = self.parse_decl_specifiers(false)?;
                let (modifiers, name) = self.parse_type_modifiers(true)?;
                let ty = apply_type_modifiers(modifiers, ds.ty);
                params.push(TypeParam {
                    name: name.map(|t| t.value),
                    ty,
                });
                if !self.stream.try_consume(",") {
                    break;
                }
            }
        }
        Ok((params, variadic))
    }

    fn parse_declarator(&mut self, ds: &DeclSpec) -> PResult<(String, CType, SourceLocation)> {
        let (modifiers, name) = self.parse_type_modifiers(false)?;
        let ty = apply_type_modifiers(modifiers, ds.ty.clone());
        let name = name.expect("non-abstract declarator requires a name");
        Ok((name.value, ty, name.loc))
    }

    fn parse_decl_group_external(&mut self, ds: DeclSpec, loc: SourceLocation) -> PResult<Vec<ExternalDecl>> {
        let (name, ty, name_loc) = self.parse_declarator(&ds)?;

        if ds.storage_class == StorageClass::Typedef {
            self.typedefs.borrow_mut().insert(name.clone());
            self.scope
                .declare(&name, Binding::Typedef { ty: ty.clone() }, name_loc)?;
            let mut decls = vec![ExternalDecl::Noop];
            while self.stream.try_consume(",") {
                let (n, t, l) = self.parse_declarator(&ds)?;
                self.typedefs.borrow_mut().insert(n.clone());
                self.scope.declare(&n, Binding::Typedef { ty: t }, l)?;
                decls.push(ExternalDecl::Noop);
            }
            self.stream.expect(";")?;
            return Ok(decls);
        }

        if ty.is_function() && self.stream.check("{") {
            self.scope
                .declare(&name, Binding::Function { ty: ty.clone() }, name_loc)?;
            let (params, return_type, variadic) = ty
                .as_function()
                .map(|(p, r, v)| (p.to_vec(), r.clone(), v))
                .expect("checked is_function above");
            let guard_body = {
                let mut guard = ScopeGuard::enter(&mut self.scope);
                for p in &params {
                    if let Some(pname) = &p.name {
                        guard.scope().declare(
                            pname,
                            Binding::Variable {
                                ty: p.ty.clone(),
                                is_global: false,
                            },
                            name_loc,
                        )?;
                    }
                }
                self.parse_compound_statement_in(guard.scope())?
            };
            return Ok(vec![ExternalDecl::Function(FunctionDef {
                name,
                return_type,
                params: params
                    .into_iter()
                    .map(|p| Param {
                        name: p.name.unwrap_or_default(),
                        ty: p.ty,
                    })
                    .collect(),
                variadic,
                body: guard_body,
                loc,
            })]);
        }

        if ty.is_function() {
            self.scope
                .declare(&name, Binding::Function { ty: ty.clone() }, name_loc)?;
            let mut decls = vec![ExternalDecl::FunctionPrototype {
                name,
                ty,
                loc: name_loc,
            }];
            while self.stream.try_consume(",") {
                let (n, t, l) = self.parse_declarator(&ds)?;
                self.scope.declare(&n, Binding::Function { ty: t.clone() }, l)?;
                decls.push(ExternalDecl::FunctionPrototype { name: n, ty: t, loc: l });
            }
            self.stream.expect(";")?;
            return Ok(decls);
        }

        let init = if self.stream.try_consume("=") {
            Some(self.parse_assignment_expression()?)
        } else {
            None
        };
        self.scope.declare(
            &name,
            Binding::Variable {
                ty: ty.clone(),
                is_global: true,
            },
            name_loc,
        )?;
        let mut decls = vec![ExternalDecl::Global(GlobalVar {
            name,
            ty,
            init,
            loc: name_loc,
        })];
        while self.stream.try_consume(",") {
            let (n, t, l) = self.parse_declarator(&ds)?;
            let init = if self.stream.try_consume("=") {
                Some(self.parse_assignment_expression()?)
            } else {
                None
            };
            self.scope.declare(
                &n,
                Binding::Variable {
                    ty: t.clone(),
                    is_global: true,
                },
                l,
            )?;
            decls.push(ExternalDecl::Global(GlobalVar {
                name: n,
                ty: t,
                init,
                loc: l,
            }));
        }
        self.stream.expect(";")?;
        Ok(decls)
    }

    // ---- statements -----------------------------------------------------

    fn parse_compound_statement_in(&mut self, _scope: &mut Scope) -> PResult<Stmt> {
        // `_scope` is already the innermost frame via the caller's
        // `ScopeGuard`; declarations inside this block go straight into
        // `self.scope`, which is the same frame.
        self.stream.expect("{")?;
        let mut stmts = Vec::new();
        while !self.stream.check("}") {
            stmts.push(self.parse_statement_or_declaration()?);
        }
        self.stream.expect("}")?;
        Ok(Stmt::Compound(stmts))
    }

    /// Parses a `{ ... }` block as its own nested scope. `ScopeGuard`'s
    /// borrow can't be held across the recursive `&mut self` calls the body
    /// needs, so the push/pop is done explicitly instead (the guard is used
    /// where the body doesn't need further declarations feeding back into
    /// it, e.g. function parameter lists).
    fn parse_compound_statement(&mut self) -> PResult<Stmt> {
        self.stream.expect("{")?;
        self.scope.push();
        let mut stmts = Vec::new();
        while !self.stream.check("}") {
            stmts.push(self.parse_statement_or_declaration()?);
        }
        self.scope.pop();
        self.stream.expect("}")?;
        Ok(Stmt::Compound(stmts))
    }

    fn parse_statement_or_declaration(&mut self) -> PResult<Stmt> {
        if self.is_decl_start() {
            let ds = self.parse_decl_specifiers(true)?;
            let mut locals = Vec::new();
            if !self.stream.check(";") {
                loop {
                    let (name, ty, loc) = self.parse_declarator(&ds)?;
                    let init = if self.stream.try_consume("=") {
                        Some(self.parse_assignment_expression()?)
                    } else {
                        None
                    };
                    if ds.storage_class == StorageClass::Typedef {
                        self.typedefs.borrow_mut().insert(name.clone());
                        self.scope.declare(&name, Binding::Typedef { ty: ty.clone() }, loc)?;
                    } else {
                        self.scope.declare(
                            &name,
                            Binding::Variable {
                                ty: ty.clone(),
                                is_global: false,
                            },
                            loc,
                        )?;
                    }
                    locals.push(LocalDecl { name, ty, init, loc });
                    if !self.stream.try_consume(",") {
                        break;
                    }
                }
            }
            self.stream.expect(";")?;
            Ok(Stmt::Decl(locals))
        } else {
            self.parse_statement()
        }
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        if self.stream.check("{") {
            return self.parse_compound_statement();
        }
        if self.stream.check(";") {
            self.stream.consume();
            return Ok(Stmt::Empty);
        }
        if self.stream.peek_kind() == TokenKind::Identifier {
            if let Some((TokenKind::Punctuation, ":")) = self.stream.lookahead(1) {
                let name = self.stream.consume();
                self.stream.consume();
                let stmt = self.parse_statement()?;
                return Ok(Stmt::Labeled {
                    label: name.value,
                    stmt: Box::new(stmt),
                });
            }
        }
        let kw = self.stream.peek_value().to_string();
        match kw.as_str() {
            "if" => self.parse_if_statement(),
            "while" => self.parse_while_statement(),
            "do" => self.parse_do_statement(),
            "for" => self.parse_for_statement(),
            "return" => self.parse_return_statement(),
            "break" => {
                let tok = self.stream.consume();
                self.stream.expect(";")?;
                let _ = tok;
                Ok(Stmt::Break)
            }
            "continue" => {
                let tok = self.stream.consume();
                self.stream.expect(";")?;
                let _ = tok;
                Ok(Stmt::Continue)
            }
            "goto" => {
                let tok = self.stream.consume();
                let label = self.stream.consume_kind(TokenKind::Identifier)?;
                self.stream.expect(";")?;
                Ok(Stmt::Goto {
                    label: label.value,
                    loc: tok.loc,
                })
            }
            "switch" => {
                let tok = self.stream.consume();
                self.stream.expect("(")?;
                let discriminant = self.parse_expression()?;
                self.stream.expect(")")?;
                let body = self.parse_statement()?;
                Ok(Stmt::Switch {
                    discriminant,
                    body: Box::new(body),
                    loc: tok.loc,
                })
            }
            "case" => {
                self.stream.consume();
                self.parse_constant_expression()?;
                self.stream.expect(":")?;
                self.parse_statement()
            }
            "default" => {
                self.stream.consume();
                self.stream.expect(":")?;
                self.parse_statement()
            }
            _ => {
                let expr = self.parse_expression()?;
                self.stream.expect(";")?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_if_statement(&mut self) -> PResult<Stmt> {
        self.stream.expect("if")?;
        self.stream.expect("(")?;
        let cond = self.parse_expression()?;
        self.stream.expect(")")?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.stream.try_consume("else") {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn parse_while_statement(&mut self) -> PResult<Stmt> {
        self.stream.expect("while")?;
        self.stream.expect("(")?;
        let cond = self.parse_expression()?;
        self.stream.expect(")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While { cond, body })
    }

    fn parse_do_statement(&mut self) -> PResult<Stmt> {
        self.stream.expect("do")?;
        let body = Box::new(self.parse_statement()?);
        self.stream.expect("while")?;
        self.stream.expect("(")?;
        let cond = self.parse_expression()?;
        self.stream.expect(")")?;
        self.stream.expect(";")?;
        Ok(Stmt::DoWhile { body, cond })
    }

    fn parse_for_statement(&mut self) -> PResult<Stmt> {
        self.stream.expect("for")?;
        self.stream.expect("(")?;
        let init = if self.stream.check(";") {
            None
        } else if self.is_decl_start() {
            Some(Box::new(self.parse_statement_or_declaration()?))
        } else {
            let e = self.parse_expression()?;
            self.stream.expect(";")?;
            Some(Box::new(Stmt::Expr(e)))
        };
        if init.is_none() {
            self.stream.expect(";")?;
        }
        let cond = if self.stream.check(";") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.stream.expect(";")?;
        let step = if self.stream.check(")") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.stream.expect(")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
        })
    }

    fn parse_return_statement(&mut self) -> PResult<Stmt> {
        self.stream.expect("return")?;
        let value = if self.stream.check(";") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.stream.expect(";")?;
        Ok(Stmt::Return(value))
    }

    // ---- expressions ----------------------------------------------------

    fn parse_constant_expression(&mut self) -> PResult<Expr> {
        self.parse_binop_with_precedence(17)
    }

    fn parse_assignment_expression(&mut self) -> PResult<Expr> {
        self.parse_binop_with_precedence(10)
    }

    fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_binop_with_precedence(0)
    }

    fn parse_binop_with_precedence(&mut self, min_prio: u8) -> PResult<Expr> {
        let mut lhs = self.parse_unary_expression()?;
        loop {
            let op_text = self.stream.peek_value().to_string();
            let Some((_assoc, prio)) = priority(&op_text) else {
                break;
            };
            if prio < min_prio {
                break;
            }
            let op_tok = self.stream.consume();

            if op_text == "?" {
                let middle = self.parse_expression()?;
                self.stream.expect(":")?;
                let rhs = self.parse_binop_with_precedence(prio)?;
                let typ = middle.typ.clone();
                lhs = Expr::new(
                    ExprKind::Ternary {
                        cond: Box::new(lhs),
                        then_expr: Box::new(middle),
                        else_expr: Box::new(rhs),
                    },
                    typ,
                    false,
                    op_tok.loc,
                );
                continue;
            }

            let rhs = self.parse_binop_with_precedence(prio)?;
            lhs = if let Some(assign_op) = op_text.strip_suffix('=').filter(|_| {
                matches!(op_text.as_str(), "=" | "+=" | "-=" | "*=" | "/=" | "%=" | ">>=" | "<<=" | "|=" | "&=" | "^=")
            }) {
                if assign_op.is_empty() {
                    let typ = lhs.typ.clone();
                    Expr::new(
                        ExprKind::Assign {
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        typ,
                        false,
                        op_tok.loc,
                    )
                } else {
                    let op = BinaryOp::from_text(assign_op).expect("compound-assign operator");
                    let typ = lhs.typ.clone();
                    Expr::new(
                        ExprKind::CompoundAssign {
                            op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        typ,
                        false,
                        op_tok.loc,
                    )
                }
            } else {
                let op = BinaryOp::from_text(&op_text)
                    .unwrap_or_else(|| panic!("unhandled operator {}", op_text));
                let typ = lhs.typ.clone();
                Expr::new(
                    ExprKind::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    typ,
                    false,
                    op_tok.loc,
                )
            };
        }
        Ok(lhs)
    }

    fn parse_unary_expression(&mut self) -> PResult<Expr> {
        let v = self.stream.peek_value().to_string();
        let mut expr = match v.as_str() {
            "+" => {
                // Unary plus is a no-op; it contributes no node of its own.
                self.stream.consume();
                self.parse_unary_expression()?
            }
            "!" | "*" | "-" | "~" | "&" | "--" | "++" => {
                let tok = self.stream.consume();
                let op = match v.as_str() {
                    "!" => UnaryOp::Not,
                    "*" => UnaryOp::Deref,
                    "-" => UnaryOp::Neg,
                    "~" => UnaryOp::BitNot,
                    "&" => UnaryOp::AddrOf,
                    "--" => UnaryOp::PreDec,
                    "++" => UnaryOp::PreInc,
                    _ => unreachable!(),
                };
                let operand = self.parse_unary_expression()?;
                let (typ, is_lvalue) = match op {
                    // `*p` names the pointee's storage: its type is what
                    // `p` points to, and it is itself assignable.
                    UnaryOp::Deref => {
                        let pointee = match &operand.typ.resolved().kind {
                            TypeKind::Pointer(inner) => (**inner).clone(),
                            TypeKind::Array { element, .. } => (**element).clone(),
                            _ => operand.typ.clone(),
                        };
                        (pointee, true)
                    }
                    UnaryOp::AddrOf => (CType::pointer_to(operand.typ.clone()), false),
                    UnaryOp::Not => (CType::int(), false),
                    _ => (operand.typ.clone(), false),
                };
                Expr::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    typ,
                    is_lvalue,
                    tok.loc,
                )
            }
            "sizeof" => {
                let tok = self.stream.consume();
                if self.stream.check("(") {
                    self.stream.consume();
                    if self.is_decl_start() {
                        let ds = self.parse_decl_specifiers(false)?;
                        let (modifiers, _) = self.parse_type_modifiers(true)?;
                        let _ty = apply_type_modifiers(modifiers, ds.ty);
                        self.stream.expect(")")?;
                        Expr::new(ExprKind::Sizeof { operand: None }, CType::int(), false, tok.loc)
                    } else {
                        let inner = self.parse_expression()?;
                        self.stream.expect(")")?;
                        Expr::new(
                            ExprKind::Sizeof {
                                operand: Some(Box::new(inner)),
                            },
                            CType::int(),
                            false,
                            tok.loc,
                        )
                    }
                } else {
                    let inner = self.parse_unary_expression()?;
                    Expr::new(
                        ExprKind::Sizeof {
                            operand: Some(Box::new(inner)),
                        },
                        CType::int(),
                        false,
                        tok.loc,
                    )
                }
            }
            _ => self.parse_primary_core()?,
        };

        loop {
            let v = self.stream.peek_value().to_string();
            match v.as_str() {
                "--" => {
                    let tok = self.stream.consume();
                    let typ = expr.typ.clone();
                    expr = Expr::new(
                        ExprKind::Unary {
                            op: UnaryOp::PostDec,
                            operand: Box::new(expr),
                        },
                        typ,
                        false,
                        tok.loc,
                    );
                }
                "++" => {
                    let tok = self.stream.consume();
                    let typ = expr.typ.clone();
                    expr = Expr::new(
                        ExprKind::Unary {
                            op: UnaryOp::PostInc,
                            operand: Box::new(expr),
                        },
                        typ,
                        false,
                        tok.loc,
                    );
                }
                "[" => {
                    let tok = self.stream.consume();
                    let index = self.parse_expression()?;
                    self.stream.expect("]")?;
                    let typ = expr.typ.clone();
                    expr = Expr::new(
                        ExprKind::ArrayIndex {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                        typ,
                        true,
                        tok.loc,
                    );
                }
                "." => {
                    let tok = self.stream.consume();
                    let field = self.stream.consume_kind(TokenKind::Identifier)?;
                    let typ = expr.typ.clone();
                    expr = Expr::new(
                        ExprKind::FieldSelect {
                            base: Box::new(expr),
                            field: field.value,
                            arrow: false,
                        },
                        typ,
                        true,
                        tok.loc,
                    );
                }
                "->" => {
                    let tok = self.stream.consume();
                    let field = self.stream.consume_kind(TokenKind::Identifier)?;
                    let typ = expr.typ.clone();
                    expr = Expr::new(
                        ExprKind::FieldSelect {
                            base: Box::new(expr),
                            field: field.value,
                            arrow: true,
                        },
                        typ,
                        true,
                        tok.loc,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary_core(&mut self) -> PResult<Expr> {
        match self.stream.peek_kind() {
            TokenKind::Identifier => {
                let tok = self.stream.consume();
                if self.stream.check("(") {
                    self.stream.consume();
                    let mut args = Vec::new();
                    while !self.stream.check(")") {
                        args.push(self.parse_assignment_expression()?);
                        if !self.stream.check(")") {
                            self.stream.expect(",")?;
                        }
                    }
                    self.stream.expect(")")?;
                    let ret_ty = self
                        .scope
                        .lookup(&tok.value)
                        .and_then(|b| b.ty().as_function().map(|(_, r, _)| r.clone()))
                        .unwrap_or_else(CType::int);
                    Ok(Expr::new(
                        ExprKind::Call {
                            callee: Box::new(Expr::new(
                                ExprKind::Identifier(tok.value.clone()),
                                CType::int(),
                                false,
                                tok.loc,
                            )),
                            args,
                        },
                        ret_ty,
                        false,
                        tok.loc,
                    ))
                } else {
                    let binding = self.scope.lookup_err(&tok.value, tok.loc)?;
                    Ok(Expr::new(
                        ExprKind::Identifier(tok.value.clone()),
                        binding.ty().clone(),
                        true,
                        tok.loc,
                    ))
                }
            }
            TokenKind::IntegerLiteral => {
                let tok = self.stream.consume();
                let value = parse_int_literal(&tok.value);
                Ok(Expr::literal_int(value, tok.loc))
            }
            TokenKind::CharLiteral => {
                let tok = self.stream.consume();
                let byte = tok.value.bytes().next().unwrap_or(0) as i8;
                Ok(Expr::new(
                    ExprKind::CharLiteral(byte),
                    CType::new(TypeKind::Integer(IntegerKind::PlainChar)),
                    false,
                    tok.loc,
                ))
            }
            TokenKind::StringLiteral => {
                let tok = self.stream.consume();
                Ok(Expr::new(
                    ExprKind::StringLiteral(tok.value.clone()),
                    CType::pointer_to(CType::new(TypeKind::Integer(IntegerKind::PlainChar))),
                    false,
                    tok.loc,
                ))
            }
            TokenKind::TypeIdentifier => Err(CompilerError::syntax(
                "unexpected type name in expression",
                SourceLocation::default(),
            )),
            _ if self.stream.check("(") => {
                let tok = self.stream.consume();
                if self.is_decl_start() {
                    let ds = self.parse_decl_specifiers(false)?;
                    let (modifiers, _) = self.parse_type_modifiers(true)?;
                    let target_ty = apply_type_modifiers(modifiers, ds.ty);
                    self.stream.expect(")")?;
                    let operand = self.parse_unary_expression()?;
                    Ok(Expr::new(
                        ExprKind::Cast {
                            operand: Box::new(operand),
                        },
                        target_ty,
                        false,
                        tok.loc,
                    ))
                } else {
                    let inner = self.parse_expression()?;
                    self.stream.expect(")")?;
                    Ok(inner)
                }
            }
            _ => Err(CompilerError::syntax(
                format!("unexpected token '{}' in expression", self.stream.peek_value()),
                SourceLocation::default(),
            )),
        }
    }
}

fn parse_int_literal(text: &str) -> i64 {
    let trimmed = text.trim_end_matches(|c| matches!(c, 'u' | 'U' | 'l' | 'L'));
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).unwrap_or(0)
    } else if trimmed.len() > 1 && trimmed.starts_with('0') {
        i64::from_str_radix(trimmed, 8).unwrap_or(0)
    } else {
        trimmed.parse().unwrap_or(0)
    }
}

fn basic_type_specifier(text: &str) -> Option<TypeSpecifier> {
    Some(match text {
        "void" => TypeSpecifier::Void,
        "char" => TypeSpecifier::Char,
        "short" => TypeSpecifier::Short,
        "int" => TypeSpecifier::Int,
        "long" => TypeSpecifier::Long,
        "float" => TypeSpecifier::Float,
        "double" => TypeSpecifier::Double,
        "signed" => TypeSpecifier::Signed,
        "unsigned" => TypeSpecifier::Unsigned,
        _ => return None,
    })
}

/// Apply a declarator's modifier list to a base type, outer-to-inner
/// (spec §9).
fn apply_type_modifiers(modifiers: Vec<TypeModifier>, base: CType) -> CType {
    let mut ty = base;
    for modifier in modifiers.into_iter().rev() {
        ty = match modifier {
            TypeModifier::Pointer(q) => CType::pointer_to(ty).with_qualifiers(q),
            TypeModifier::Array(size) => CType::new(TypeKind::Array {
                element: Box::new(ty),
                size,
            }),
            TypeModifier::Function(params, variadic) => CType::new(TypeKind::Function {
                params,
                return_type: Box::new(ty),
                variadic,
            }),
        };
    }
    ty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(src: &str) -> PResult<(TranslationUnit, Scope)> {
        let tokens = tokenize(src, false);
        Parser::new(tokens, CompilerConfig::new()).parse_translation_unit()
    }

    #[test]
    fn parses_simple_function() {
        let (unit, _) = parse("int f(int x){ return x + 1; }").unwrap();
        assert_eq!(unit.decls.len(), 1);
        assert!(matches!(unit.decls[0], ExternalDecl::Function(_)));
    }

    #[test]
    fn typedef_makes_subsequent_identifier_a_type() {
        let (unit, scope) = parse("typedef int foo; foo bar;").unwrap();
        assert!(scope.is_typedef_name("foo"));
        assert_eq!(unit.decls.len(), 2);
        assert!(matches!(unit.decls[1], ExternalDecl::Global(_)));
    }

    #[test]
    fn if_else_parses_both_branches() {
        let (unit, _) = parse("int g(int a, int b){ if (a < b) return a; else return b; }").unwrap();
        let ExternalDecl::Function(f) = &unit.decls[0] else {
            panic!("expected function");
        };
        match &f.body {
            Stmt::Compound(stmts) => assert!(matches!(stmts[0], Stmt::If { .. })),
            _ => panic!("expected compound body"),
        }
    }

    #[test]
    fn pointer_to_function_vs_function_returning_pointer() {
        // `int (*fp)(int);` — pointer to function.
        let (unit, _) = parse("int (*fp)(int);").unwrap();
        assert_eq!(unit.decls.len(), 1);
    }

    #[test]
    fn struct_tag_and_variable_share_name() {
        let (unit, _) = parse("struct foo { int x; }; int foo;").unwrap();
        assert_eq!(unit.decls.len(), 2);
    }

    #[test]
    fn redeclaration_in_same_scope_is_an_error() {
        let err = parse("int x; int x;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Lookup);
    }

    #[test]
    fn invalid_type_specifier_combination_errors() {
        let err = parse("float int x;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeSpec);
    }
}
