// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! PCI function numbers.
//!
//! A single slot may implement up to eight functions. Function 0 always exists
//! if the slot is populated; the rest only on multi-function devices (see
//! [`crate::pci::header::MULTI_FUNCTION`]).
//!
//! ```
//! # use pcitree_hardware::pci::function::Function;
//! #
//! let func = Function::try_from("3").unwrap();
//! assert_eq!(func.value(), 3);
//! assert_eq!(format!("{func}"), "3");
//! ```

/// A PCI function number, 0 through 7, displayed as a single digit.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    bytecheck::CheckBytes,
    num_derive::ToPrimitive,
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u8", into = "u8")
)]
#[repr(transparent)]
#[rkyv(attr(derive(PartialEq, Eq, Debug)))]
pub struct Function(u8);

impl Function {
    /// Maximum valid function number (7, or 0b111).
    pub const MAX: u8 = 0b111;

    /// Returns the raw function number value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl From<Function> for u8 {
    fn from(value: Function) -> Self {
        value.0
    }
}

/// Error type for invalid function numbers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPciFunction {
    /// Function number exceeds the 3-bit maximum.
    #[error("function maximum is 3 bits (0-7): {0} is too large")]
    TooLarge(u8),
}

impl std::fmt::LowerHex for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:01x}", self.0)
    }
}

impl std::fmt::Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:x}")
    }
}

impl TryFrom<u8> for Function {
    type Error = InvalidPciFunction;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > Self::MAX {
            Err(InvalidPciFunction::TooLarge(value))
        } else {
            Ok(Function(value))
        }
    }
}

/// Error type for function parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FunctionParseError {
    /// Not a single digit.
    #[error("invalid PCI function syntax (expected one digit): {0:?}")]
    InvalidSyntax(String),
    /// A digit, but out of range.
    #[error(transparent)]
    InvalidFunction(InvalidPciFunction),
}

impl TryFrom<&str> for Function {
    type Error = FunctionParseError;

    /// Parses a function number from a single digit between 0 and 7.
    ///
    /// ```
    /// # use pcitree_hardware::pci::function::Function;
    /// #
    /// assert!(Function::try_from("7").is_ok());
    /// assert!(Function::try_from("8").is_err());
    /// assert!(Function::try_from("a").is_err());
    /// assert!(Function::try_from("00").is_err());
    /// ```
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.as_bytes() {
            [digit] if digit.is_ascii_digit() => Function::try_from(digit - b'0')
                .map_err(FunctionParseError::InvalidFunction),
            _ => Err(FunctionParseError::InvalidSyntax(value.to_string())),
        }
    }
}

/// Test contract support for property-based testing.
#[cfg(any(test, feature = "bolero"))]
mod contract {
    use crate::pci::function::Function;

    impl bolero::TypeGenerator for Function {
        fn generate<D: bolero::Driver>(driver: &mut D) -> Option<Self> {
            Some(
                Function::try_from(driver.produce::<u8>()? & Self::MAX)
                    .unwrap_or_else(|_| unreachable!()),
            )
        }
    }
}
