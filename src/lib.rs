/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The type checker walks the AST, building the function table and inferring
/// the structural type of every form. It collects every error it finds.
pub mod type_checker;

pub mod codegen {
    /// The three-address intermediate representation.
    pub mod ir;
    /// Lowers a checked AST into IR, inlining user function calls.
    pub mod lower;
    pub mod vm;
}

/// Glues every stage together.
pub mod pipeline;

pub mod ast;
pub mod token;
pub mod types;

pub mod util {
    pub mod fmt;
    #[cfg(test)]
    pub(crate) mod test_utils;
}
