//! Front end for a small block-structured procedural language: a scanner,
//! a scoped symbol table and a single-pass parser that type-checks as it
//! goes, reporting problems into [`Diagnostics`].

use std::path::Path;

pub mod diagnostics;
pub mod parser;
pub mod scanner;
pub mod symbol;
pub mod symbol_table;

pub use diagnostics::{Diagnostics, FatalError};
pub use parser::{ParseOptions, Parser};
pub use scanner::Scanner;
pub use symbol_table::SymTable;

/// Parses the program stored at `path`.
pub fn parse<P: AsRef<Path>>(
    path: P,
    diagnostics: &mut Diagnostics,
    options: ParseOptions,
) -> Result<SymTable, FatalError> {
    let scanner = Scanner::open(path)?;
    Parser::new(scanner, diagnostics, options).run()
}

/// Parses a program held in memory.
pub fn parse_source(
    source: &str,
    diagnostics: &mut Diagnostics,
    options: ParseOptions,
) -> Result<SymTable, FatalError> {
    Parser::new(Scanner::from_source(source), diagnostics, options).run()
}
