pub mod ast;
pub mod builder;
pub mod expr;
pub mod program;
pub mod span;
