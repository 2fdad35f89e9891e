pub mod builder;
pub mod config;
pub mod element;
pub mod expr;
pub mod inst;
pub mod operand;
pub mod processor;
pub mod register;
pub mod smt;
pub mod state;
pub mod taint;
