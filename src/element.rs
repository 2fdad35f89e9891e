use std::borrow::Cow;
use std::fmt;

use crate::expr::SymExpr;
use crate::register::Register;

/// Session-unique identifier of a symbolic element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref!{}", self.0)
    }
}

impl ElementId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn index(&self) -> u64 {
        self.0
    }
}

/// The location written by a symbolic element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Register { register: Register, bits: u32 },
    Memory { address: u64, size: usize },
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Register { register, .. } => write!(f, "{}", register),
            Destination::Memory { address, size } => write!(f, "[{:#x}]:{}", address, size),
        }
    }
}

impl Destination {
    pub fn register(&self) -> Option<Register> {
        if let Destination::Register { register, .. } = self {
            Some(*register)
        } else {
            None
        }
    }

    pub fn is_control_flow(&self) -> bool {
        self.register() == Some(Register::PROGRAM_COUNTER)
    }

    pub fn is_flag(&self) -> bool {
        self.register().map(|r| r.is_flag()).unwrap_or(false)
    }

    pub fn bits(&self) -> u32 {
        match self {
            Destination::Register { bits, .. } => *bits,
            Destination::Memory { size, .. } => (*size as u32) * 8,
        }
    }
}

/// One write effect of a lifted instruction.
///
/// Elements are created by a processor transaction and may have their taint
/// adjusted only while the lifting code still owns them; once handed to an
/// [`Inst`](crate::inst::Inst) they are read-only.
///
/// ```compile_fail
/// fn retaint(se: &mut fugue_symtaint::element::SymbolicElement) {
///     se.set_taint(true);
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicElement {
    id: ElementId,
    destination: Destination,
    expression: SymExpr,
    tainted: bool,
    comment: Option<Cow<'static, str>>,
}

impl fmt::Display for SymbolicElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.id, self.expression)?;
        if let Some(ref comment) = self.comment {
            write!(f, " ; {}", comment)?;
        }
        Ok(())
    }
}

impl SymbolicElement {
    pub(crate) fn new(
        id: ElementId,
        destination: Destination,
        expression: SymExpr,
        tainted: bool,
    ) -> Self {
        Self {
            id,
            destination,
            expression,
            tainted,
            comment: None,
        }
    }

    pub fn with_comment<C: Into<Cow<'static, str>>>(mut self, comment: C) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub(crate) fn or_taint(&mut self, tainted: bool) {
        self.tainted |= tainted;
    }

    pub(crate) fn set_taint(&mut self, tainted: bool) {
        self.tainted = tainted;
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn expression(&self) -> &SymExpr {
        &self.expression
    }

    /// The value this element writes, as a term for later formulas.
    pub fn reference(&self) -> SymExpr {
        SymExpr::reference(self.id, self.expression.bits())
    }

    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }
}
