use super::{immediate, same_width, Semantics};

use crate::inst::Inst;
use crate::operand::{Operand, OperandKind, SourceOperand};
use crate::processor::{Error, Transaction};

/// `mov`: copies the source into the destination.
///
/// Operands are `[destination, source]`. Immediates narrower than the
/// destination are sign-extended to it; memory to memory moves do not exist.
pub const MOV: Semantics = Semantics::new("mov").reg(reg).mem(mem);

fn reg(tx: &mut Transaction<'_>, operands: &[Operand], inst: &mut Inst) -> Result<(), Error> {
    let dst = tx.register_operand(operands, 0)?;
    let src = tx.source_operand(operands, 1)?;

    let se = match src {
        SourceOperand::Register(op) => {
            same_width(op.size, dst.size)?;
            let expr = tx.build_symbolic_reg_operand(op.register, op.size)?;
            let mut se = tx.create_reg_se(expr, dst.register)?;
            tx.assignment_spread_taint_reg_reg(&mut se, op.register, dst.register);
            se
        }
        SourceOperand::Memory(op) => {
            same_width(op.size, dst.size)?;
            let expr = tx.build_symbolic_mem_operand(op.address, op.size)?;
            let mut se = tx.create_reg_se(expr, dst.register)?;
            tx.assignment_spread_taint_mem_reg(&mut se, op.address, dst.register, op.size);
            se
        }
        SourceOperand::Immediate(op) => {
            let expr = immediate(tx, op.value, op.size, dst.size)?;
            tx.create_reg_se(expr, dst.register)?
        }
    };

    inst.add_element(se);
    Ok(())
}

fn mem(tx: &mut Transaction<'_>, operands: &[Operand], inst: &mut Inst) -> Result<(), Error> {
    let dst = tx.memory_operand(operands, 0)?;
    let src = tx.source_operand(operands, 1)?;

    let se = match src {
        SourceOperand::Register(op) => {
            same_width(op.size, dst.size)?;
            let expr = tx.build_symbolic_reg_operand(op.register, op.size)?;
            let mut se = tx.create_mem_se(expr, dst.address)?;
            tx.assignment_spread_taint_reg_mem(&mut se, op.register, dst.address, dst.size);
            se
        }
        SourceOperand::Immediate(op) => {
            let expr = immediate(tx, op.value, op.size, dst.size)?;
            tx.create_mem_se(expr, dst.address)?
        }
        SourceOperand::Memory(_) => {
            return Err(Error::OperandKind {
                index: 1,
                expected: OperandKind::Register,
                found: OperandKind::Memory,
            })
        }
    };

    inst.add_element(se);
    Ok(())
}
