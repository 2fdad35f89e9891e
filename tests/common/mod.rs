#![allow(dead_code)]

use fugue_symtaint::operand::{DecodedInst, Operand, ThreadId};
use fugue_symtaint::register::Register;

/// `pop <register>` with the stack slot at `rsp`.
pub fn pop_reg(thread: u32, address: u64, register: Register, rsp: u64) -> DecodedInst {
    DecodedInst::new(ThreadId(thread), address, format!("pop {}", register))
        .with_operands([Operand::register(register, 8), Operand::memory(rsp, 8)])
        .with_length(1)
}

/// `push <register>` with the stack slot below `rsp`.
pub fn push_reg(thread: u32, address: u64, register: Register, rsp: u64) -> DecodedInst {
    DecodedInst::new(ThreadId(thread), address, format!("push {}", register))
        .with_operands([Operand::register(register, 8), Operand::memory(rsp - 8, 8)])
        .with_length(1)
}
