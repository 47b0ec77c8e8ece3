//! cfront: a C-to-SSA-IR front end.
//!
//! Turns a single translation unit of C source text into this crate's
//! basic-block IR (see [`ir`]): a reference lexer and typedef-aware token
//! stream feed a recursive-descent [`parser`], which builds a typed
//! [`ast`] under a scoped symbol table ([`scope`], [`ctype`]); [`codegen`]
//! lowers that AST into the SSA-style [`ir::Module`] the crate ships as
//! its end product.
//!
//! # Example
//!
//! ```
//! use cfront::compile_str;
//!
//! let module = compile_str("int add(int a, int b) { return a + b; }", &Default::default())
//!     .unwrap();
//! assert_eq!(module.functions.len(), 1);
//! ```

pub mod ast;
pub mod codegen;
pub mod config;
pub mod ctype;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod location;
pub mod parser;
pub mod scope;
pub mod token;

use std::fs;
use std::path::Path;

pub use config::CompilerConfig;
pub use error::{CompilerError, ErrorKind};
pub use ir::Module;

use ctype::WordTarget;
use parser::Parser;

/// Lex, parse and lower a single translation unit's source text, using
/// [`WordTarget`] to answer `sizeof` queries (spec §9 Open Question).
pub fn compile_str(source: &str, config: &CompilerConfig) -> Result<Module, CompilerError> {
    let tokens = lexer::tokenize(source, config.std.allows_restrict());
    let parser = Parser::new(tokens, config.clone());
    let (unit, _scope) = parser.parse_translation_unit()?;
    codegen::compile(&unit, &WordTarget)
}

/// Read `path`, then [`compile_str`] its contents.
pub fn compile_file(path: &Path, config: &CompilerConfig) -> Result<Module, CompilerError> {
    let source = fs::read_to_string(path).map_err(|e| {
        CompilerError::new(
            ErrorKind::Syntax,
            format!("failed to read '{}': {}", path.display(), e),
            location::SourceLocation::default(),
        )
    })?;
    compile_str(&source, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_trivial_function_to_one_procedure() {
        let module = compile_str("int main(void) { return 0; }", &CompilerConfig::new()).unwrap();
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.functions[0].name, "main");
    }

    #[test]
    fn reports_a_syntax_error_with_location() {
        let err = compile_str("int main( { return 0; }", &CompilerConfig::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }
}
