//! Pascal `SET OF` values
//!
//! A set is a bit vector of up to 255 words; element `e` is bit `e % 16` of
//! word `e / 16`. On the stack the word count sits on top of the words, with
//! word 0 nearest the count:
//!
//! ```text
//! top     n
//!         word 0      elements 0-15
//!         ...
//!         word n-1
//! ```

use crate::interpreter::constants::SET_MAX_WORDS;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{ExecutionError, RuntimeError};
use crate::interpreter::opcodes::op;
use crate::memory::stack::EvalStack;
use crate::memory::Memory;

/// Largest representable element
pub const SET_MAX_ELEMENT: i16 = (SET_MAX_WORDS * 16 - 1) as i16;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PSet {
    words: Vec<u16>,
}

impl PSet {
    pub fn new() -> Self {
        PSet::default()
    }

    pub fn from_words(words: Vec<u16>) -> Self {
        PSet { words }
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }

    fn check_element(element: i16) -> Result<usize, ExecutionError> {
        if !(0..=SET_MAX_ELEMENT).contains(&element) {
            return Err(ExecutionError::InvalidIndex { value: element });
        }
        Ok(element as usize)
    }

    /// `[element]`
    pub fn singleton(element: i16) -> Result<Self, ExecutionError> {
        Self::range(element, element)
    }

    /// `[low..high]`; empty when `low > high`
    pub fn range(low: i16, high: i16) -> Result<Self, ExecutionError> {
        if low > high {
            return Ok(PSet::new());
        }
        let low = Self::check_element(low)?;
        let high = Self::check_element(high)?;
        let mut words = vec![0u16; high / 16 + 1];
        for element in low..=high {
            words[element / 16] |= 1 << (element % 16);
        }
        Ok(PSet { words })
    }

    /// Membership; elements outside the stored words are absent
    pub fn contains(&self, element: i16) -> bool {
        if element < 0 {
            return false;
        }
        let element = element as usize;
        self.words
            .get(element / 16)
            .is_some_and(|w| w & (1 << (element % 16)) != 0)
    }

    /// Both operands padded with zero words to the longer length
    fn padded(&self, other: &PSet) -> (Vec<u16>, Vec<u16>) {
        let len = self.words.len().max(other.words.len());
        let mut a = self.words.clone();
        let mut b = other.words.clone();
        a.resize(len, 0);
        b.resize(len, 0);
        (a, b)
    }

    fn combine(&self, other: &PSet, f: impl Fn(u16, u16) -> u16) -> PSet {
        let (a, b) = self.padded(other);
        PSet {
            words: a.iter().zip(&b).map(|(&x, &y)| f(x, y)).collect(),
        }
    }

    pub fn union(&self, other: &PSet) -> PSet {
        self.combine(other, |x, y| x | y)
    }

    pub fn intersection(&self, other: &PSet) -> PSet {
        self.combine(other, |x, y| x & y)
    }

    pub fn difference(&self, other: &PSet) -> PSet {
        self.combine(other, |x, y| x & !y)
    }

    /// Drop trailing zero words
    pub fn trimmed(&self) -> PSet {
        let len = self
            .words
            .iter()
            .rposition(|&w| w != 0)
            .map_or(0, |i| i + 1);
        PSet {
            words: self.words[..len].to_vec(),
        }
    }

    pub fn equals(&self, other: &PSet) -> bool {
        self.trimmed() == other.trimmed()
    }

    /// `self <= other`
    pub fn is_subset(&self, other: &PSet) -> bool {
        let (a, b) = (self.trimmed(), other.trimmed());
        if a.words.len() > b.words.len() {
            return false;
        }
        a.words.iter().zip(&b.words).all(|(&x, &y)| x & !y == 0)
    }

    /// `self < other`
    pub fn is_proper_subset(&self, other: &PSet) -> bool {
        self.is_subset(other) && !self.equals(other)
    }

    /// Resize to exactly `words` words, dropping or zero-filling
    pub fn adjusted(&self, words: usize) -> PSet {
        let mut adjusted = self.words.clone();
        adjusted.resize(words, 0);
        PSet { words: adjusted }
    }

    pub fn pop(stack: &mut EvalStack, mem: &Memory) -> Result<Self, ExecutionError> {
        let count = stack.pop(mem)? as usize;
        if count > SET_MAX_WORDS {
            return Err(ExecutionError::InvalidIndex { value: count as i16 });
        }
        Ok(PSet {
            words: stack.pop_block(mem, count)?,
        })
    }

    pub fn push(&self, stack: &mut EvalStack, mem: &mut Memory) -> Result<(), ExecutionError> {
        stack.push_block(mem, &self.words)?;
        stack.push(mem, self.words.len() as u16)
    }
}

impl Interpreter {
    pub(crate) fn set_op(&mut self, opcode: u8) -> Result<(), RuntimeError> {
        let result = match opcode {
            // Leaves exactly n words and no count
            op::ADJ => {
                let words = self.fetch_byte()? as usize;
                let set = PSet::pop(&mut self.stack, &self.mem)?;
                self.stack.push_block(&mut self.mem, set.adjusted(words).words())?;
                return Ok(());
            }
            op::SRS => {
                let high = self.pop_int()?;
                let low = self.pop_int()?;
                PSet::range(low, high)?
            }
            op::SGS => {
                let element = self.pop_int()?;
                PSet::singleton(element)?
            }
            op::INN => {
                let set = PSet::pop(&mut self.stack, &self.mem)?;
                let element = self.pop_int()?;
                return self.push_bool(set.contains(element));
            }
            _ => {
                let b = PSet::pop(&mut self.stack, &self.mem)?;
                let a = PSet::pop(&mut self.stack, &self.mem)?;
                match opcode {
                    op::UNI => a.union(&b),
                    op::INT => a.intersection(&b),
                    _ => a.difference(&b),
                }
            }
        };
        Ok(result.push(&mut self.stack, &mut self.mem)?)
    }
}
