//! 值对象模块

pub mod identifier;
pub mod symbol;

pub use identifier::{validate_identifier, MAX_IDENTIFIER_LEN};
pub use symbol::{Symbol, SYMBOL_LEN};
