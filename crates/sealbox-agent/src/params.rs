//! Four-slot command parameters and their declared types.

use std::fmt;

use crate::buffer::TransferBuffer;
use crate::error::{AgentError, AgentResult};

/// Number of parameter slots per invocation.
pub const PARAM_SLOTS: usize = 4;

/// Declared type of one parameter slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    None,
    ValueInput,
    ValueOutput,
    ValueInout,
    MemrefInput,
    MemrefOutput,
    MemrefInout,
}

impl ParamType {
    /// Wire encoding (one nibble).
    pub fn raw(self) -> u32 {
        match self {
            Self::None => 0x0,
            Self::ValueInput => 0x1,
            Self::ValueOutput => 0x2,
            Self::ValueInout => 0x3,
            Self::MemrefInput => 0x5,
            Self::MemrefOutput => 0x6,
            Self::MemrefInout => 0x7,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0x0 => Self::None,
            0x1 => Self::ValueInput,
            0x2 => Self::ValueOutput,
            0x3 => Self::ValueInout,
            0x5 => Self::MemrefInput,
            0x6 => Self::MemrefOutput,
            0x7 => Self::MemrefInout,
            _ => return None,
        })
    }

    fn is_value(self) -> bool {
        matches!(self, Self::ValueInput | Self::ValueOutput | Self::ValueInout)
    }

    fn is_memref(self) -> bool {
        matches!(self, Self::MemrefInput | Self::MemrefOutput | Self::MemrefInout)
    }
}

/// Declared types of all four slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParamTypes([ParamType; PARAM_SLOTS]);

impl ParamTypes {
    pub const NONE: Self = Self([ParamType::None; PARAM_SLOTS]);

    pub fn new(types: [ParamType; PARAM_SLOTS]) -> Self {
        Self(types)
    }

    /// Declared type of slot `index`, if the slot exists.
    pub fn get(&self, index: usize) -> Option<ParamType> {
        self.0.get(index).copied()
    }

    /// Pack into one word, slot 0 in the lowest nibble.
    pub fn raw(&self) -> u32 {
        self.0
            .iter()
            .enumerate()
            .fold(0, |acc, (i, t)| acc | (t.raw() << (i * 4)))
    }

    pub fn from_raw(raw: u32) -> AgentResult<Self> {
        if raw >> (PARAM_SLOTS * 4) != 0 {
            return Err(AgentError::BadParameters(format!(
                "param types {raw:#x} use more than {PARAM_SLOTS} slots"
            )));
        }
        let mut types = [ParamType::None; PARAM_SLOTS];
        for (i, slot) in types.iter_mut().enumerate() {
            let nibble = (raw >> (i * 4)) & 0xF;
            *slot = ParamType::from_raw(nibble).ok_or_else(|| {
                AgentError::BadParameters(format!("slot {i} has unknown type {nibble:#x}"))
            })?;
        }
        Ok(Self(types))
    }

    /// Require exactly the `expected` shape.
    pub fn ensure(&self, expected: ParamTypes) -> AgentResult<()> {
        if *self != expected {
            return Err(AgentError::BadParameters(format!(
                "param types {self} do not match {expected}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ParamTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.raw())
    }
}

/// Contents of one parameter slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Param {
    #[default]
    None,
    Value {
        a: u32,
        b: u32,
    },
    Memref(TransferBuffer),
}

impl Param {
    fn matches(&self, declared: ParamType) -> bool {
        match self {
            Self::None => declared == ParamType::None,
            Self::Value { .. } => declared.is_value(),
            Self::Memref(_) => declared.is_memref(),
        }
    }
}

/// The four parameter slots of one invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params([Param; PARAM_SLOTS]);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set slot `index` (builder style).
    pub fn with(mut self, index: usize, param: Param) -> AgentResult<Self> {
        *self.slot_mut(index)? = param;
        Ok(self)
    }

    /// The usual write/read shape: a buffer and an empty output value.
    pub fn transfer(buffer: TransferBuffer) -> Self {
        Self([
            Param::Memref(buffer),
            Param::Value { a: 0, b: 0 },
            Param::None,
            Param::None,
        ])
    }

    pub fn get(&self, index: usize) -> Option<&Param> {
        self.0.get(index)
    }

    fn slot(&self, index: usize) -> AgentResult<&Param> {
        self.0.get(index).ok_or_else(|| out_of_range(index))
    }

    fn slot_mut(&mut self, index: usize) -> AgentResult<&mut Param> {
        self.0.get_mut(index).ok_or_else(|| out_of_range(index))
    }

    /// Check each slot's contents against its declared type.
    pub fn check(&self, types: ParamTypes) -> AgentResult<()> {
        for (i, (param, declared)) in self.0.iter().zip(types.0).enumerate() {
            if !param.matches(declared) {
                return Err(AgentError::BadParameters(format!(
                    "slot {i} does not hold a {declared:?}"
                )));
            }
        }
        Ok(())
    }

    pub fn memref(&self, index: usize) -> AgentResult<&TransferBuffer> {
        match self.slot(index)? {
            Param::Memref(buffer) => Ok(buffer),
            _ => Err(AgentError::BadParameters(format!("slot {index} is not a buffer"))),
        }
    }

    pub fn memref_mut(&mut self, index: usize) -> AgentResult<&mut TransferBuffer> {
        match self.slot_mut(index)? {
            Param::Memref(buffer) => Ok(buffer),
            _ => Err(AgentError::BadParameters(format!("slot {index} is not a buffer"))),
        }
    }

    /// The `a` half of a value slot.
    pub fn value_a(&self, index: usize) -> Option<u32> {
        match self.0.get(index)? {
            Param::Value { a, .. } => Some(*a),
            _ => None,
        }
    }

    pub fn set_value(&mut self, index: usize, a: u32, b: u32) -> AgentResult<()> {
        match self.slot_mut(index)? {
            Param::Value { a: sa, b: sb } => {
                *sa = a;
                *sb = b;
                Ok(())
            }
            _ => Err(AgentError::BadParameters(format!("slot {index} is not a value"))),
        }
    }
}

fn out_of_range(index: usize) -> AgentError {
    AgentError::BadParameters(format!("slot {index} out of range (0..{PARAM_SLOTS})"))
}
