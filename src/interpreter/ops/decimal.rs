//! Decimal (LONGINT) arithmetic
//!
//! Values are sign and magnitude with up to 36 decimal digits. On the
//! evaluation stack a decimal occupies `N + 1` words:
//!
//! ```text
//! top     N            (1-10)
//!         sign         (nonzero = negative)
//!         digits 1-4   most significant BCD word
//!         ...
//!         digits       least significant BCD word   (N - 1 words in all)
//! ```
//!
//! [`execute`] is the DECOPS entry point; the operation code is on top of
//! the stack, above its operands.

use crate::interpreter::constants::DECIMAL_MAX_DIGITS;
use crate::interpreter::errors::ExecutionError;
use crate::memory::stack::EvalStack;
use crate::memory::Memory;
use std::cmp::Ordering;
use std::fmt;

/// DECOPS operation codes
pub mod decop {
    pub const ADJUST: u16 = 0;
    pub const ADD: u16 = 2;
    pub const SUBTRACT: u16 = 4;
    pub const NEGATE: u16 = 6;
    pub const MULTIPLY: u16 = 8;
    pub const DIVIDE: u16 = 10;
    pub const TO_STRING: u16 = 12;
    pub const COMPARE: u16 = 14;
    pub const FROM_INT: u16 = 16;
    pub const TO_INT: u16 = 18;
}

const DIGITS_PER_WORD: usize = 4;
const MAX_WORDS: usize = DECIMAL_MAX_DIGITS / DIGITS_PER_WORD;

/// A signed decimal integer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decimal {
    negative: bool,
    /// Most significant digit first, no leading zeros; empty for zero
    digits: Vec<u8>,
}

fn trim(mut digits: Vec<u8>) -> Vec<u8> {
    let leading = digits.iter().take_while(|&&d| d == 0).count();
    digits.drain(..leading);
    digits
}

fn compare_magnitude(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn add_magnitude(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(a.len().max(b.len()) + 1);
    let mut carry = 0u8;
    let mut ai = a.iter().rev();
    let mut bi = b.iter().rev();
    loop {
        let (x, y) = (ai.next(), bi.next());
        if x.is_none() && y.is_none() {
            break;
        }
        let sum = x.copied().unwrap_or(0) + y.copied().unwrap_or(0) + carry;
        result.push(sum % 10);
        carry = sum / 10;
    }
    if carry > 0 {
        result.push(carry);
    }
    result.reverse();
    trim(result)
}

/// `a - b` for `a >= b`
fn sub_magnitude(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(a.len());
    let mut borrow = 0i8;
    let mut bi = b.iter().rev();
    for &x in a.iter().rev() {
        let mut diff = x as i8 - bi.next().copied().unwrap_or(0) as i8 - borrow;
        borrow = 0;
        if diff < 0 {
            diff += 10;
            borrow = 1;
        }
        result.push(diff as u8);
    }
    result.reverse();
    trim(result)
}

fn mul_magnitude(a: &[u8], b: &[u8]) -> Vec<u8> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut acc = vec![0u32; a.len() + b.len()];
    for (i, &x) in a.iter().rev().enumerate() {
        for (j, &y) in b.iter().rev().enumerate() {
            acc[i + j] += x as u32 * y as u32;
        }
    }
    let mut carry = 0u32;
    for cell in acc.iter_mut() {
        let total = *cell + carry;
        *cell = total % 10;
        carry = total / 10;
    }
    trim(acc.into_iter().rev().map(|d| d as u8).collect())
}

fn mul_small(a: &[u8], factor: u8) -> Vec<u8> {
    mul_magnitude(a, &[factor])
}

/// Long division of magnitudes, `v` nonzero
///
/// Normalizes the divisor so its leading digit is at least 5, then estimates
/// each quotient digit from the leading two dividend digits and corrects the
/// estimate with the divisor's second digit.
fn div_magnitude(u: &[u8], v: &[u8]) -> Vec<u8> {
    if compare_magnitude(u, v) == Ordering::Less {
        return Vec::new();
    }
    if v.len() == 1 {
        let divisor = v[0] as u32;
        let mut remainder = 0u32;
        let quotient = u
            .iter()
            .map(|&d| {
                let current = remainder * 10 + d as u32;
                remainder = current % divisor;
                (current / divisor) as u8
            })
            .collect();
        return trim(quotient);
    }

    let scale = 10 / (v[0] + 1);
    let vn: Vec<i32> = mul_small(v, scale).into_iter().map(i32::from).collect();
    let scaled = mul_small(u, scale);
    let mut un: Vec<i32> = vec![0; u.len() + 1 - scaled.len()];
    un.extend(scaled.into_iter().map(i32::from));

    let n = vn.len();
    let m = un.len() - n - 1;
    let mut quotient = vec![0u8; m + 1];

    for j in 0..=m {
        let numerator = un[j] * 10 + un[j + 1];
        let mut qhat = numerator / vn[0];
        let mut rhat = numerator % vn[0];
        if qhat > 9 {
            qhat = 9;
            rhat = numerator - 9 * vn[0];
        }
        while rhat < 10 && qhat * vn[1] > rhat * 10 + un[j + 2] {
            qhat -= 1;
            rhat += vn[0];
        }

        let mut carry = 0;
        let mut borrow = 0;
        for i in (0..n).rev() {
            let product = qhat * vn[i] + carry;
            carry = product / 10;
            let mut digit = un[j + i + 1] - product % 10 - borrow;
            borrow = 0;
            if digit < 0 {
                digit += 10;
                borrow = 1;
            }
            un[j + i + 1] = digit;
        }
        un[j] -= carry + borrow;

        if un[j] < 0 {
            qhat -= 1;
            let mut carry = 0;
            for i in (0..n).rev() {
                let sum = un[j + i + 1] + vn[i] + carry;
                un[j + i + 1] = sum % 10;
                carry = sum / 10;
            }
            un[j] += carry;
        }
        quotient[j] = qhat as u8;
    }
    trim(quotient)
}

impl Decimal {
    pub fn zero() -> Self {
        Decimal::default()
    }

    fn from_parts(negative: bool, digits: Vec<u8>) -> Result<Self, ExecutionError> {
        let digits = trim(digits);
        if digits.len() > DECIMAL_MAX_DIGITS {
            return Err(ExecutionError::IntegerOverflow);
        }
        Ok(Decimal {
            negative: negative && !digits.is_empty(),
            digits,
        })
    }

    pub fn from_int(value: i16) -> Self {
        let digits = value
            .unsigned_abs()
            .to_string()
            .bytes()
            .map(|b| b - b'0')
            .collect();
        Decimal {
            negative: value < 0,
            digits: trim(digits),
        }
    }

    pub fn to_int(&self) -> Result<i16, ExecutionError> {
        if self.digits.len() > 5 {
            return Err(ExecutionError::IntegerOverflow);
        }
        let magnitude = self
            .digits
            .iter()
            .fold(0i32, |acc, &d| acc * 10 + d as i32);
        let value = if self.negative { -magnitude } else { magnitude };
        i16::try_from(value).map_err(|_| ExecutionError::IntegerOverflow)
    }

    pub fn parse(text: &str) -> Option<Self> {
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Self::from_parts(negative, body.bytes().map(|b| b - b'0').collect()).ok()
    }

    pub fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn negate(&self) -> Self {
        Decimal {
            negative: !self.negative && !self.is_zero(),
            digits: self.digits.clone(),
        }
    }

    pub fn add(&self, other: &Decimal) -> Result<Self, ExecutionError> {
        if self.negative == other.negative {
            return Self::from_parts(self.negative, add_magnitude(&self.digits, &other.digits));
        }
        match compare_magnitude(&self.digits, &other.digits) {
            Ordering::Less => {
                Self::from_parts(other.negative, sub_magnitude(&other.digits, &self.digits))
            }
            _ => Self::from_parts(self.negative, sub_magnitude(&self.digits, &other.digits)),
        }
    }

    pub fn subtract(&self, other: &Decimal) -> Result<Self, ExecutionError> {
        self.add(&other.negate())
    }

    pub fn multiply(&self, other: &Decimal) -> Result<Self, ExecutionError> {
        Self::from_parts(
            self.negative != other.negative,
            mul_magnitude(&self.digits, &other.digits),
        )
    }

    /// Truncating division
    pub fn divide(&self, other: &Decimal) -> Result<Self, ExecutionError> {
        if other.is_zero() {
            return Err(ExecutionError::DivideByZero);
        }
        Self::from_parts(
            self.negative != other.negative,
            div_magnitude(&self.digits, &other.digits),
        )
    }

    /// Number of BCD words needed for the magnitude
    pub fn digit_words(&self) -> usize {
        self.digits.len().div_ceil(DIGITS_PER_WORD).max(1)
    }

    /// Pop a decimal in stack format
    pub fn pop(stack: &mut EvalStack, mem: &Memory) -> Result<Self, ExecutionError> {
        let size = stack.pop(mem)? as usize;
        if !(1..=MAX_WORDS + 1).contains(&size) {
            return Err(ExecutionError::InvalidIndex { value: size as i16 });
        }
        let negative = stack.pop(mem)? != 0;
        let mut digits = Vec::with_capacity((size - 1) * DIGITS_PER_WORD);
        for _ in 1..size {
            let word = stack.pop(mem)?;
            for shift in [12, 8, 4, 0] {
                let digit = ((word >> shift) & 0xF) as u8;
                if digit > 9 {
                    return Err(ExecutionError::SystemError {
                        message: format!("invalid BCD word 0x{:04x}", word),
                    });
                }
                digits.push(digit);
            }
        }
        Self::from_parts(negative, digits)
    }

    /// Push in stack format using the minimal number of digit words
    pub fn push(&self, stack: &mut EvalStack, mem: &mut Memory) -> Result<(), ExecutionError> {
        self.push_sized(stack, mem, self.digit_words())
    }

    /// Push with exactly `words` digit words
    pub fn push_sized(
        &self,
        stack: &mut EvalStack,
        mem: &mut Memory,
        words: usize,
    ) -> Result<(), ExecutionError> {
        if words < self.digit_words() || words > MAX_WORDS {
            return Err(ExecutionError::IntegerOverflow);
        }
        let mut padded = vec![0u8; words * DIGITS_PER_WORD - self.digits.len()];
        padded.extend_from_slice(&self.digits);
        for chunk in padded.chunks(DIGITS_PER_WORD).rev() {
            let word = chunk.iter().fold(0u16, |acc, &d| (acc << 4) | d as u16);
            stack.push(mem, word)?;
        }
        stack.push(mem, self.negative as u16)?;
        stack.push(mem, words as u16 + 1)
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => compare_magnitude(&self.digits, &other.digits),
            (true, true) => compare_magnitude(&other.digits, &self.digits),
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        if self.negative {
            write!(f, "-")?;
        }
        for d in &self.digits {
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

/// Execute one DECOPS operation
pub fn execute(stack: &mut EvalStack, mem: &mut Memory) -> Result<(), ExecutionError> {
    let operation = stack.pop(mem)?;
    match operation {
        decop::ADJUST => {
            let words = stack.pop(mem)? as usize;
            if !(1..=MAX_WORDS).contains(&words) {
                return Err(ExecutionError::InvalidIndex { value: words as i16 });
            }
            let value = Decimal::pop(stack, mem)?;
            value.push_sized(stack, mem, words)
        }
        decop::ADD | decop::SUBTRACT | decop::MULTIPLY | decop::DIVIDE => {
            let b = Decimal::pop(stack, mem)?;
            let a = Decimal::pop(stack, mem)?;
            let result = match operation {
                decop::ADD => a.add(&b)?,
                decop::SUBTRACT => a.subtract(&b)?,
                decop::MULTIPLY => a.multiply(&b)?,
                _ => a.divide(&b)?,
            };
            result.push(stack, mem)
        }
        decop::NEGATE => Decimal::pop(stack, mem)?.negate().push(stack, mem),
        decop::TO_STRING => {
            let address = stack.pop(mem)?;
            let text = Decimal::pop(stack, mem)?.to_string();
            mem.write_byte(address, text.len() as u8)?;
            mem.write_bytes(address.wrapping_add(1), text.as_bytes())
        }
        decop::COMPARE => {
            let code = stack.pop(mem)?;
            let b = Decimal::pop(stack, mem)?;
            let a = Decimal::pop(stack, mem)?;
            let result = match code {
                0 => a < b,
                1 => a <= b,
                2 => a > b,
                3 => a >= b,
                4 => a == b,
                5 => a != b,
                _ => return Err(ExecutionError::InvalidIndex { value: code as i16 }),
            };
            stack.push_bool(mem, result)
        }
        decop::FROM_INT => {
            let value = stack.pop_int(mem)?;
            Decimal::from_int(value).push(stack, mem)
        }
        decop::TO_INT => {
            let value = Decimal::pop(stack, mem)?.to_int()?;
            stack.push_int(mem, value)
        }
        _ => Err(ExecutionError::UnimplementedInstruction {
            what: format!("DECOPS operation {}", operation),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(text: &str) -> Decimal {
        Decimal::parse(text).unwrap()
    }

    #[test]
    fn test_subtract_then_add_restores_value() {
        let values = ["0", "7", "-7", "123456789012345678", "-999999999999", "10000", "1"];
        for a in values {
            for b in values {
                let (a, b) = (dec(a), dec(b));
                assert_eq!(a.subtract(&b).unwrap().add(&b).unwrap(), a);
            }
        }
    }

    #[test]
    fn test_multiply_agrees_with_repeated_addition() {
        let a = dec("123");
        let repeated = a.add(&a).unwrap().add(&a).unwrap().add(&a).unwrap();
        assert_eq!(a.multiply(&dec("4")).unwrap().cmp(&repeated), Ordering::Equal);
        assert_eq!(repeated.to_string(), "492");
    }

    #[test]
    fn test_division_matches_host_arithmetic() {
        let samples: [i64; 9] = [0, 1, 7, -7, 492, 1000, 99999999999, -123456789, 3141592653589];
        let divisors: [i64; 7] = [1, 3, -4, 12, 99, 12345, 9999999];
        for &a in &samples {
            for &b in &divisors {
                let q = dec(&a.to_string()).divide(&dec(&b.to_string())).unwrap();
                assert_eq!(q.to_string(), (a / b).to_string(), "{} / {}", a, b);
            }
        }
    }

    #[test]
    fn test_divide_by_zero() {
        assert_eq!(dec("5").divide(&Decimal::zero()), Err(ExecutionError::DivideByZero));
    }

    #[test]
    fn test_overflow_past_36_digits() {
        let big = dec(&"9".repeat(36));
        assert_eq!(big.add(&dec("1")), Err(ExecutionError::IntegerOverflow));
        assert!(big.multiply(&dec("1")).is_ok());
    }

    #[test]
    fn test_stack_format_round_trip() {
        let mut mem = Memory::new();
        let mut stack = EvalStack::new();
        dec("-12345").push(&mut stack, &mut mem).unwrap();
        assert_eq!(stack.words(&mem, 8), vec![3, 1, 0x0001, 0x2345]);
        assert_eq!(Decimal::pop(&mut stack, &mem).unwrap(), dec("-12345"));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_decops_compare_and_to_string() {
        let mut mem = Memory::new();
        let mut stack = EvalStack::new();
        dec("100").push(&mut stack, &mut mem).unwrap();
        dec("-3").push(&mut stack, &mut mem).unwrap();
        stack.push(&mut mem, 2).unwrap();
        stack.push(&mut mem, decop::COMPARE).unwrap();
        execute(&mut stack, &mut mem).unwrap();
        assert!(stack.pop_bool(&mem).unwrap());

        dec("-42").push(&mut stack, &mut mem).unwrap();
        stack.push(&mut mem, 0x2000).unwrap();
        stack.push(&mut mem, decop::TO_STRING).unwrap();
        execute(&mut stack, &mut mem).unwrap();
        assert_eq!(mem.read_bytes(0x2000, 4).unwrap(), vec![3, b'-', b'4', b'2']);
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(Decimal::from_int(-32768).to_string(), "-32768");
        assert_eq!(dec("32767").to_int().unwrap(), 32767);
        assert_eq!(dec("32768").to_int(), Err(ExecutionError::IntegerOverflow));
    }
}
