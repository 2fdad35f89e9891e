use std::fmt;

/// x86-64 architectural registers tracked by the processor.
///
/// Sub-registers (`eax`, `ax`, `al`) are not distinct identifiers: operands
/// name the full register and carry their own access size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Register {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rdi,
    Rsi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    Rip,
    Cf,
    Pf,
    Af,
    Zf,
    Sf,
    Df,
    Of,
}

const REGISTERS: [Register; 24] = [
    Register::Rax,
    Register::Rbx,
    Register::Rcx,
    Register::Rdx,
    Register::Rdi,
    Register::Rsi,
    Register::Rbp,
    Register::Rsp,
    Register::R8,
    Register::R9,
    Register::R10,
    Register::R11,
    Register::R12,
    Register::R13,
    Register::R14,
    Register::R15,
    Register::Rip,
    Register::Cf,
    Register::Pf,
    Register::Af,
    Register::Zf,
    Register::Sf,
    Register::Df,
    Register::Of,
];

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Register {
    pub const STACK_POINTER: Register = Register::Rsp;
    pub const PROGRAM_COUNTER: Register = Register::Rip;

    /// Resolves a decoder register identifier.
    pub fn from_id(id: u64) -> Option<Register> {
        usize::try_from(id).ok().and_then(|idx| REGISTERS.get(idx).copied())
    }

    pub fn id(&self) -> u64 {
        *self as u64
    }

    pub fn all() -> impl Iterator<Item = Register> {
        REGISTERS.iter().copied()
    }

    pub fn bits(&self) -> u32 {
        if self.is_flag() {
            1
        } else {
            64
        }
    }

    pub fn bytes(&self) -> usize {
        if self.is_flag() {
            1
        } else {
            8
        }
    }

    pub fn is_flag(&self) -> bool {
        matches!(
            self,
            Register::Cf
                | Register::Pf
                | Register::Af
                | Register::Zf
                | Register::Sf
                | Register::Df
                | Register::Of
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Register::Rax => "rax",
            Register::Rbx => "rbx",
            Register::Rcx => "rcx",
            Register::Rdx => "rdx",
            Register::Rdi => "rdi",
            Register::Rsi => "rsi",
            Register::Rbp => "rbp",
            Register::Rsp => "rsp",
            Register::R8 => "r8",
            Register::R9 => "r9",
            Register::R10 => "r10",
            Register::R11 => "r11",
            Register::R12 => "r12",
            Register::R13 => "r13",
            Register::R14 => "r14",
            Register::R15 => "r15",
            Register::Rip => "rip",
            Register::Cf => "cf",
            Register::Pf => "pf",
            Register::Af => "af",
            Register::Zf => "zf",
            Register::Sf => "sf",
            Register::Df => "df",
            Register::Of => "of",
        }
    }
}
