pub mod ast;
pub mod backend;
pub mod builtins;
pub mod compare;
pub mod config;
pub mod diff;
pub mod driver;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod propagate;
pub mod run_state;
pub mod symbols;
pub mod token;
pub mod watch;
