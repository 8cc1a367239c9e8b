//! Fixed-size history of the most recently classified instructions.

use crate::instruction::Instruction;

/// Number of instructions kept in the history
pub const HISTORY_CAPACITY: usize = 100;

/// Circular buffer of the last [`HISTORY_CAPACITY`] instructions, in program
/// order.
///
/// Slots are overwritten on wraparound, never removed. Indices handed out by
/// [`push`](Self::push) stay meaningful only until the slot is reused
/// `HISTORY_CAPACITY` pushes later, which is why gadgets copy instructions out
/// instead of keeping indices.
#[derive(Debug, Clone)]
pub struct InstructionHistory {
    slots: Vec<Option<Instruction>>,
    cursor: usize,
}

impl Default for InstructionHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl InstructionHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self {
            slots: vec![None; HISTORY_CAPACITY],
            cursor: 0,
        }
    }

    /// Record an instruction and return the index of its slot.
    pub fn push(&mut self, instruction: Instruction) -> usize {
        let index = self.cursor % HISTORY_CAPACITY;
        self.slots[index] = Some(instruction);
        self.cursor = self.cursor.wrapping_add(1);
        index
    }

    /// Instruction stored at `index`, if that slot was ever written.
    pub fn at(&self, index: usize) -> Option<&Instruction> {
        self.slots.get(index % HISTORY_CAPACITY)?.as_ref()
    }

    /// Index of the slot written just before `index`.
    pub fn prev(&self, index: usize) -> usize {
        if index % HISTORY_CAPACITY == 0 {
            HISTORY_CAPACITY - 1
        } else {
            index % HISTORY_CAPACITY - 1
        }
    }

    /// Index of the most recently pushed instruction
    pub fn last_index(&self) -> Option<usize> {
        if self.cursor == 0 {
            None
        } else {
            Some(self.prev(self.cursor % HISTORY_CAPACITY))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Operation;
    use crate::RawInstruction;

    fn nop(address: u64) -> Instruction {
        Instruction::from_raw(&RawInstruction::from_text(address, 4, "nop", ""), Operation::Nop)
    }

    #[test]
    fn test_push_returns_slot_index() {
        let mut history = InstructionHistory::new();

        assert_eq!(history.last_index(), None);
        assert_eq!(history.push(nop(0x0)), 0);
        assert_eq!(history.push(nop(0x4)), 1);
        assert_eq!(history.last_index(), Some(1));
        assert_eq!(history.at(1).map(|i| i.address), Some(0x4));
        assert!(history.at(2).is_none());
    }

    #[test]
    fn test_wraparound_overwrites_oldest() {
        let mut history = InstructionHistory::new();

        for i in 0..HISTORY_CAPACITY as u64 {
            history.push(nop(i * 4));
        }
        assert_eq!(history.at(0).map(|i| i.address), Some(0));
        assert_eq!(history.last_index(), Some(99));

        let index = history.push(nop(0x1000));
        assert_eq!(index, 0);
        assert_eq!(history.at(0).map(|i| i.address), Some(0x1000));
        assert_eq!(history.last_index(), Some(0));
        assert_eq!(history.at(1).map(|i| i.address), Some(4));
    }

    #[test]
    fn test_prev_wraps() {
        let history = InstructionHistory::new();

        assert_eq!(history.prev(0), 99);
        assert_eq!(history.prev(1), 0);
        assert_eq!(history.prev(99), 98);
    }
}
