use std::fmt;

use fnv::FnvHashMap as HashMap;

use log::debug;

use thiserror::Error;

use crate::expr::SymExpr;
use crate::inst::Inst;
use crate::operand::{DecodedInst, Operand, OperandKind, ThreadId};
use crate::processor::{AnalysisProcessor, Error as ProcessorError, Transaction};

pub mod add;
pub mod control_flow;
pub mod mov;
pub mod nop;
pub mod pop;
pub mod push;

mod stack;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no {shape} form of `{mnemonic}`: {disassembly}")]
    UnsupportedOperandShape {
        mnemonic: String,
        shape: OperandShape,
        disassembly: String,
    },
    #[error("unsupported instruction `{mnemonic}`: {disassembly}")]
    UnsupportedInstruction {
        mnemonic: String,
        disassembly: String,
    },
    #[error("invalid operand in `{disassembly}` at {address:#x} on thread {thread_id}: {source}")]
    InvalidOperand {
        address: u64,
        thread_id: ThreadId,
        disassembly: String,
        #[source]
        source: ProcessorError,
    },
    #[error("`{disassembly}` at {address:#x} lifted before setup: {reason}")]
    SetupNotPerformed {
        address: u64,
        disassembly: String,
        reason: &'static str,
    },
}

impl Error {
    fn setup(inst: &DecodedInst, reason: &'static str) -> Self {
        Error::SetupNotPerformed {
            address: inst.address(),
            disassembly: inst.disassembly().to_owned(),
            reason,
        }
    }

    fn invalid_operand(inst: &DecodedInst, source: ProcessorError) -> Self {
        Error::InvalidOperand {
            address: inst.address(),
            thread_id: inst.thread_id(),
            disassembly: inst.disassembly().to_owned(),
            source,
        }
    }

    /// The disassembly text of the instruction that failed to lift.
    pub fn disassembly(&self) -> &str {
        match self {
            Error::UnsupportedOperandShape { disassembly, .. }
            | Error::UnsupportedInstruction { disassembly, .. }
            | Error::InvalidOperand { disassembly, .. }
            | Error::SetupNotPerformed { disassembly, .. } => disassembly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandShape {
    RegisterDestination,
    MemoryDestination,
    ImmediateOperand,
    NoOperand,
}

impl fmt::Display for OperandShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperandShape::RegisterDestination => "register",
            OperandShape::MemoryDestination => "memory",
            OperandShape::ImmediateOperand => "immediate",
            OperandShape::NoOperand => "no-operand",
        })
    }
}

impl OperandShape {
    /// Classifies an operand list by the kind of its first operand.
    pub fn classify(operands: &[Operand]) -> Self {
        match operands.first().map(Operand::kind) {
            Some(OperandKind::Register) => OperandShape::RegisterDestination,
            Some(OperandKind::Memory) => OperandShape::MemoryDestination,
            Some(OperandKind::Immediate) => OperandShape::ImmediateOperand,
            Some(OperandKind::None) | None => OperandShape::NoOperand,
        }
    }
}

/// Lifts one operand shape of an instruction, appending its elements to the
/// record.
pub type Handler = fn(&mut Transaction<'_>, &[Operand], &mut Inst) -> Result<(), ProcessorError>;

#[derive(Clone, Copy)]
pub struct Semantics {
    mnemonic: &'static str,
    reg: Option<Handler>,
    mem: Option<Handler>,
    imm: Option<Handler>,
    none: Option<Handler>,
}

impl fmt::Debug for Semantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semantics")
            .field("mnemonic", &self.mnemonic)
            .field("reg", &self.reg.is_some())
            .field("mem", &self.mem.is_some())
            .field("imm", &self.imm.is_some())
            .field("none", &self.none.is_some())
            .finish()
    }
}

impl Semantics {
    pub const fn new(mnemonic: &'static str) -> Self {
        Self {
            mnemonic,
            reg: None,
            mem: None,
            imm: None,
            none: None,
        }
    }

    pub const fn reg(mut self, handler: Handler) -> Self {
        self.reg = Some(handler);
        self
    }

    pub const fn mem(mut self, handler: Handler) -> Self {
        self.mem = Some(handler);
        self
    }

    pub const fn imm(mut self, handler: Handler) -> Self {
        self.imm = Some(handler);
        self
    }

    pub const fn none(mut self, handler: Handler) -> Self {
        self.none = Some(handler);
        self
    }

    pub fn mnemonic(&self) -> &'static str {
        self.mnemonic
    }

    pub fn handler(&self, shape: OperandShape) -> Option<Handler> {
        match shape {
            OperandShape::RegisterDestination => self.reg,
            OperandShape::MemoryDestination => self.mem,
            OperandShape::ImmediateOperand => self.imm,
            OperandShape::NoOperand => self.none,
        }
    }

    pub fn supports(&self, shape: OperandShape) -> bool {
        self.handler(shape).is_some()
    }
}

/// Mnemonic-indexed instruction semantics.
///
/// Classifies a decoded instruction by its first operand, runs the matching
/// handler inside a processor transaction and terminates the record with
/// the control-flow element. A shape without a handler is a hard failure:
/// no state changes and no record is produced.
#[derive(Debug, Clone)]
pub struct Lifter {
    semantics: HashMap<&'static str, Semantics>,
}

impl Default for Lifter {
    fn default() -> Self {
        Self::x86_64()
    }
}

impl Lifter {
    pub fn new() -> Self {
        Self {
            semantics: HashMap::default(),
        }
    }

    pub fn x86_64() -> Self {
        let mut lifter = Self::new();
        for semantics in [add::ADD, mov::MOV, nop::NOP, pop::POP, push::PUSH] {
            lifter.register(semantics);
        }
        lifter
    }

    /// Adds `semantics`, returning any semantics it replaces.
    pub fn register(&mut self, semantics: Semantics) -> Option<Semantics> {
        self.semantics.insert(semantics.mnemonic(), semantics)
    }

    pub fn semantics(&self, mnemonic: &str) -> Option<&Semantics> {
        self.semantics.get(mnemonic.to_ascii_lowercase().as_str())
    }

    /// Lifts `inst` against the state held by `ap`.
    ///
    /// On success the processor state reflects every element of the
    /// returned record. On failure the processor state is exactly as it was
    /// before the call.
    pub fn lift(&self, ap: &mut AnalysisProcessor, inst: &DecodedInst) -> Result<Inst, Error> {
        let operands = inst
            .operands()
            .ok_or_else(|| Error::setup(inst, "operands not populated"))?;

        let next_address = inst
            .next_address()
            .ok_or_else(|| Error::setup(inst, "next address not resolved"))?;

        if inst.thread_id() != ap.thread_id() {
            return Err(Error::setup(inst, "processor belongs to another thread"));
        }

        let semantics = self.semantics(inst.mnemonic()).ok_or_else(|| {
            Error::UnsupportedInstruction {
                mnemonic: inst.mnemonic().to_owned(),
                disassembly: inst.disassembly().to_owned(),
            }
        })?;

        let shape = OperandShape::classify(operands);
        let handler = semantics
            .handler(shape)
            .ok_or_else(|| Error::UnsupportedOperandShape {
                mnemonic: semantics.mnemonic().to_owned(),
                shape,
                disassembly: inst.disassembly().to_owned(),
            })?;

        let mut record = Inst::new(ap.thread_id(), inst.address(), inst.disassembly());
        let mut tx = ap.begin();

        handler(&mut tx, operands, &mut record).map_err(|e| Error::invalid_operand(inst, e))?;

        let rip = control_flow::rip(&mut tx, next_address)
            .map_err(|e| Error::invalid_operand(inst, e))?;
        record.add_element(rip);

        tx.commit();

        ap.inc_number_of_expressions(record.number_of_elements());

        debug!(
            "thread {}: lifted {:#x} `{}` ({} shape) into {} elements",
            record.thread_id(),
            record.address(),
            record.disassembly(),
            shape,
            record.number_of_elements(),
        );

        Ok(record)
    }
}

/// Rejects a read and write of different widths.
pub(crate) fn same_width(read: usize, write: usize) -> Result<(), ProcessorError> {
    if read == write {
        Ok(())
    } else {
        Err(ProcessorError::SizeMismatch { read, write })
    }
}

/// An immediate of `imm_size` bytes sign-extended to `size` bytes.
pub(crate) fn immediate(
    tx: &Transaction<'_>,
    value: u64,
    imm_size: usize,
    size: usize,
) -> Result<SymExpr, ProcessorError> {
    if imm_size > size {
        return Err(ProcessorError::SizeMismatch {
            read: imm_size,
            write: size,
        });
    }

    Ok(tx
        .build_symbolic_imm_operand(value, imm_size)?
        .sign_extend(size as u32 * 8))
}
