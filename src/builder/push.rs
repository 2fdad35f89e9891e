use super::stack::{self, StackPointer};
use super::{immediate, same_width, Semantics};

use crate::inst::Inst;
use crate::operand::Operand;
use crate::processor::{Error, Transaction};

/// `push`: stores the source into the stack slot below the stack pointer,
/// then reserves the pushed width.
///
/// Operands are `[source, stack slot]`, where the stack slot is the memory
/// operand `[rsp - size]` resolved by the decoder. Immediates narrower than
/// the slot are sign-extended to it.
pub const PUSH: Semantics = Semantics::new("push").reg(reg).mem(mem).imm(imm);

fn reg(tx: &mut Transaction<'_>, operands: &[Operand], inst: &mut Inst) -> Result<(), Error> {
    let src = tx.register_operand(operands, 0)?;
    let dst = tx.memory_operand(operands, 1)?;
    same_width(src.size, dst.size)?;

    let sp = StackPointer::capture(tx);

    let expr = tx.build_symbolic_reg_operand(src.register, src.size)?;
    let mut se = tx.create_mem_se(expr, dst.address)?;
    tx.assignment_spread_taint_reg_mem(&mut se, src.register, dst.address, dst.size);
    inst.add_element(se);

    inst.add_element(stack::reserve(tx, sp, dst.size)?);

    Ok(())
}

fn mem(tx: &mut Transaction<'_>, operands: &[Operand], inst: &mut Inst) -> Result<(), Error> {
    let src = tx.memory_operand(operands, 0)?;
    let dst = tx.memory_operand(operands, 1)?;
    same_width(src.size, dst.size)?;

    let sp = StackPointer::capture(tx);

    let expr = tx.build_symbolic_mem_operand(src.address, src.size)?;
    let mut se = tx.create_mem_se(expr, dst.address)?;
    tx.assignment_spread_taint_mem_mem(&mut se, dst.address, src.address, src.size);
    inst.add_element(se);

    inst.add_element(stack::reserve(tx, sp, dst.size)?);

    Ok(())
}

fn imm(tx: &mut Transaction<'_>, operands: &[Operand], inst: &mut Inst) -> Result<(), Error> {
    let src = tx.immediate_operand(operands, 0)?;
    let dst = tx.memory_operand(operands, 1)?;

    let sp = StackPointer::capture(tx);

    let expr = immediate(tx, src.value, src.size, dst.size)?;
    let se = tx.create_mem_se(expr, dst.address)?;
    inst.add_element(se);

    inst.add_element(stack::reserve(tx, sp, dst.size)?);

    Ok(())
}
