use super::{immediate, same_width, Semantics};

use crate::element::SymbolicElement;
use crate::expr::SymExpr;
use crate::inst::Inst;
use crate::operand::{Operand, OperandKind, SourceOperand};
use crate::processor::{Error, Transaction};
use crate::register::Register;
use crate::smt::{bv, bvadd, bvand, bvult, bvxor, equal, extract};

/// `add`: integer addition, updating the arithmetic flags.
///
/// Operands are `[destination, source]`. After the result element, one
/// element per flag is emitted in the order CF, OF, SF, ZF; each flag
/// inherits the taint of the destination.
pub const ADD: Semantics = Semantics::new("add").reg(reg).mem(mem);

#[derive(Clone, Copy)]
enum Written {
    Register(Register),
    Memory(u64, usize),
}

fn reg(tx: &mut Transaction<'_>, operands: &[Operand], inst: &mut Inst) -> Result<(), Error> {
    let dst = tx.register_operand(operands, 0)?;
    let src = tx.source_operand(operands, 1)?;

    let op1 = tx.build_symbolic_reg_operand(dst.register, dst.size)?;
    let op2 = match src {
        SourceOperand::Immediate(op) => immediate(tx, op.value, op.size, dst.size)?,
        _ => {
            same_width(src.size(), dst.size)?;
            tx.build_symbolic_operand(&src)?
        }
    };

    let mut se = tx.create_reg_se(bvadd(op1.clone(), op2.clone()), dst.register)?;
    match src {
        SourceOperand::Register(op) => {
            tx.assignment_spread_taint_reg_reg(&mut se, op.register, dst.register)
        }
        SourceOperand::Memory(op) => {
            tx.assignment_spread_taint_mem_reg(&mut se, op.address, dst.register, op.size)
        }
        SourceOperand::Immediate(_) => (),
    }

    let result = se.reference().extract_low(dst.size as u32 * 8);
    inst.add_element(se);

    flags(tx, inst, op1, op2, result, Written::Register(dst.register))
}

fn mem(tx: &mut Transaction<'_>, operands: &[Operand], inst: &mut Inst) -> Result<(), Error> {
    let dst = tx.memory_operand(operands, 0)?;
    let src = tx.source_operand(operands, 1)?;

    let op1 = tx.build_symbolic_mem_operand(dst.address, dst.size)?;
    let op2 = match src {
        SourceOperand::Register(op) => {
            same_width(op.size, dst.size)?;
            tx.build_symbolic_reg_operand(op.register, op.size)?
        }
        SourceOperand::Immediate(op) => immediate(tx, op.value, op.size, dst.size)?,
        SourceOperand::Memory(_) => {
            return Err(Error::OperandKind {
                index: 1,
                expected: OperandKind::Register,
                found: OperandKind::Memory,
            })
        }
    };

    let mut se = tx.create_mem_se(bvadd(op1.clone(), op2.clone()), dst.address)?;
    if let SourceOperand::Register(op) = src {
        tx.assignment_spread_taint_reg_mem(&mut se, op.register, dst.address, dst.size);
    }

    let result = se.reference();
    inst.add_element(se);

    flags(tx, inst, op1, op2, result, Written::Memory(dst.address, dst.size))
}

fn flags(
    tx: &mut Transaction<'_>,
    inst: &mut Inst,
    op1: SymExpr,
    op2: SymExpr,
    result: SymExpr,
    written: Written,
) -> Result<(), Error> {
    let high = result.bits() - 1;

    let cf = bvult(result.clone(), op1.clone());
    let of = extract(
        high,
        high,
        bvand(bvxor(op1, result.clone()), bvxor(op2, result.clone())),
    );
    let sf = extract(high, high, result.clone());
    let zf = equal(result, bv(0, high + 1));

    for (flag, expr, comment) in [
        (Register::Cf, cf, "Carry flag"),
        (Register::Of, of, "Overflow flag"),
        (Register::Sf, sf, "Sign flag"),
        (Register::Zf, zf, "Zero flag"),
    ] {
        let se = tx.create_reg_se(expr, flag)?.with_comment(comment);
        inst.add_element(spread(tx, se, flag, written));
    }

    Ok(())
}

fn spread(
    tx: &mut Transaction<'_>,
    mut se: SymbolicElement,
    flag: Register,
    written: Written,
) -> SymbolicElement {
    match written {
        Written::Register(register) => tx.assignment_spread_taint_reg_reg(&mut se, register, flag),
        Written::Memory(address, size) => {
            tx.assignment_spread_taint_mem_reg(&mut se, address, flag, size)
        }
    }
    se
}
