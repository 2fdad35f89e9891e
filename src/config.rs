/// How reads of memory with no tracked write are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownMemory {
    /// Read as initial-memory variables, one per byte.
    Symbolic,
    /// Fail the lift with an invalid operand.
    Reject,
}

impl Default for UnknownMemory {
    fn default() -> Self {
        UnknownMemory::Symbolic
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Width of the analysed address space; accesses must lie below
    /// `2^address_bits`.
    pub address_bits: u32,
    /// Largest register or memory access, in bytes. Never more than
    /// [`MAX_OPERAND_SIZE`].
    pub max_operand_size: usize,
    pub unknown_memory: UnknownMemory,
}

pub const DEFAULT_ADDRESS_BITS: u32 = 64;
pub const DEFAULT_MAX_OPERAND_SIZE: usize = 8;

/// Widest access expressible as a single bitvector constant.
pub const MAX_OPERAND_SIZE: usize = 8;

impl Default for Config {
    fn default() -> Self {
        Self {
            address_bits: DEFAULT_ADDRESS_BITS,
            max_operand_size: DEFAULT_MAX_OPERAND_SIZE,
            unknown_memory: UnknownMemory::default(),
        }
    }
}

impl Config {
    pub fn with_address_bits(mut self, bits: u32) -> Self {
        self.address_bits = bits.clamp(1, 64);
        self
    }

    pub fn with_max_operand_size(mut self, size: usize) -> Self {
        self.max_operand_size = size.clamp(1, MAX_OPERAND_SIZE);
        self
    }

    /// The effective access limit in bytes.
    pub fn operand_size_limit(&self) -> usize {
        self.max_operand_size.min(MAX_OPERAND_SIZE)
    }

    pub fn with_unknown_memory(mut self, policy: UnknownMemory) -> Self {
        self.unknown_memory = policy;
        self
    }

    /// Checks that `[address, address + size)` lies within the address space.
    pub fn contains(&self, address: u64, size: usize) -> bool {
        let limit = if self.address_bits >= 64 {
            u128::from(u64::MAX) + 1
        } else {
            1u128 << self.address_bits
        };

        u128::from(address) + size as u128 <= limit
    }
}
