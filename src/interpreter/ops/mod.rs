//! Instruction families and the value libraries behind them
//!
//! - [`integer`]: 16-bit arithmetic, logic and `CHK`
//! - [`real`]: REAL arithmetic and conversions
//! - [`compare`]: typed comparisons
//! - [`strings`]: string constants, assignment and indexing
//! - [`sets`]: the set library and set instructions
//! - [`decimal`]: the LONGINT decimal library behind `DECOPS`

pub mod compare;
pub mod decimal;
pub mod integer;
pub mod real;
pub mod sets;
pub mod strings;
