use std::fmt;

use smallvec::SmallVec;

use crate::register::Register;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(pub u32);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ThreadId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Register,
    Memory,
    Immediate,
    None,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperandKind::Register => "register",
            OperandKind::Memory => "memory",
            OperandKind::Immediate => "immediate",
            OperandKind::None => "none",
        })
    }
}

/// An operand as produced by the decoder.
///
/// `value` is a register identifier, an effective address or an immediate
/// depending on `kind`; `size` is the access width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operand {
    kind: OperandKind,
    value: u64,
    size: usize,
}

impl Operand {
    pub fn new(kind: OperandKind, value: u64, size: usize) -> Self {
        Self { kind, value, size }
    }

    pub fn register(register: Register, size: usize) -> Self {
        Self::new(OperandKind::Register, register.id(), size)
    }

    pub fn memory(address: u64, size: usize) -> Self {
        Self::new(OperandKind::Memory, address, size)
    }

    pub fn immediate(value: u64, size: usize) -> Self {
        Self::new(OperandKind::Immediate, value, size)
    }

    pub fn none() -> Self {
        Self::new(OperandKind::None, 0, 0)
    }

    pub fn kind(&self) -> OperandKind {
        self.kind
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

pub type Operands = SmallVec<[Operand; 4]>;

/// A register operand validated against the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterOperand {
    pub register: Register,
    pub size: usize,
}

/// A memory operand validated against the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryOperand {
    pub address: u64,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImmediateOperand {
    pub value: u64,
    pub size: usize,
}

/// Any operand that can be read as a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOperand {
    Register(RegisterOperand),
    Memory(MemoryOperand),
    Immediate(ImmediateOperand),
}

impl SourceOperand {
    pub fn size(&self) -> usize {
        match self {
            SourceOperand::Register(op) => op.size,
            SourceOperand::Memory(op) => op.size,
            SourceOperand::Immediate(op) => op.size,
        }
    }
}

/// A decoded instruction awaiting lifting.
///
/// Operands and the fall-through address are filled in by the decoder; an
/// instruction lacking either has not been set up and cannot be lifted.
#[derive(Debug, Clone)]
pub struct DecodedInst {
    thread_id: ThreadId,
    address: u64,
    next_address: Option<u64>,
    mnemonic: String,
    disassembly: String,
    operands: Option<Operands>,
}

impl DecodedInst {
    /// Creates an instruction record whose mnemonic is the first token of
    /// `disassembly`.
    pub fn new<S: Into<String>>(thread_id: ThreadId, address: u64, disassembly: S) -> Self {
        let disassembly = disassembly.into();
        let mnemonic = disassembly
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        Self {
            thread_id,
            address,
            next_address: None,
            mnemonic,
            disassembly,
            operands: None,
        }
    }

    pub fn with_mnemonic<S: AsRef<str>>(mut self, mnemonic: S) -> Self {
        self.mnemonic = mnemonic.as_ref().to_ascii_lowercase();
        self
    }

    pub fn with_operands<I: IntoIterator<Item = Operand>>(mut self, operands: I) -> Self {
        self.operands = Some(operands.into_iter().collect());
        self
    }

    pub fn with_next_address(mut self, next_address: u64) -> Self {
        self.next_address = Some(next_address);
        self
    }

    /// Sets the fall-through address from the encoded instruction length.
    pub fn with_length(self, length: usize) -> Self {
        let next = self.address.wrapping_add(length as u64);
        self.with_next_address(next)
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn next_address(&self) -> Option<u64> {
        self.next_address
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn disassembly(&self) -> &str {
        &self.disassembly
    }

    pub fn operands(&self) -> Option<&[Operand]> {
        self.operands.as_deref()
    }
}
