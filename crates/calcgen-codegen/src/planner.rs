//! Free-list allocator over a fixed, named slot space.
//!
//! A planner never hands out an identifier twice without an intervening
//! `free`; everything else in the generator relies on that.

use std::collections::HashSet;

use calcgen_types::{tokens, GenError, GenResult};

/// Allocator over one fixed, ordered set of slot identifiers.
#[derive(Debug, Clone)]
pub struct SlotPlanner {
    name: String,
    space: Vec<String>,
    allocated: HashSet<String>,
}

impl SlotPlanner {
    pub fn new(name: impl Into<String>, space: Vec<String>) -> Self {
        Self {
            name: name.into(),
            space,
            allocated: HashSet::new(),
        }
    }

    /// The 26 letter registers `A`..`Z`.
    pub fn registers() -> Self {
        Self::new("registers", ('A'..='Z').map(String::from).collect())
    }

    /// Memory-bank slots `1`..=`size`.
    pub fn bank(size: u32) -> Self {
        Self::new("memory bank", (1..=size).map(|n| n.to_string()).collect())
    }

    /// String slots `Chn0`..`Chn{count-1}`.
    pub fn strings(count: u32) -> Self {
        Self::new(
            "string slots",
            (0..count)
                .map(|n| format!("{}{n}", tokens::STRING_SLOT))
                .collect(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn space(&self) -> &[String] {
        &self.space
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.space.iter().any(|s| s == slot)
    }

    pub fn is_allocated(&self, slot: &str) -> bool {
        self.allocated.contains(slot)
    }

    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }

    pub fn available_count(&self) -> usize {
        self.space.len() - self.allocated.len()
    }

    /// First unallocated slot in space order.
    pub fn get(&self) -> GenResult<String> {
        self.space
            .iter()
            .find(|s| !self.allocated.contains(*s))
            .cloned()
            .ok_or_else(|| self.exhausted())
    }

    /// Mark `slot` unavailable.
    pub fn alloc(&mut self, slot: &str) -> GenResult<String> {
        if !self.contains(slot) {
            return Err(self.foreign(slot));
        }
        self.allocated.insert(slot.to_string());
        Ok(slot.to_string())
    }

    pub fn get_allocated(&mut self) -> GenResult<String> {
        let slot = self.get()?;
        self.alloc(&slot)
    }

    /// First run of `n` consecutive unallocated slots in space order.
    pub fn get_block(&self, n: usize) -> GenResult<Vec<String>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut run_start = 0;
        let mut run_len = 0;
        for (i, slot) in self.space.iter().enumerate() {
            if self.allocated.contains(slot) {
                run_len = 0;
                continue;
            }
            if run_len == 0 {
                run_start = i;
            }
            run_len += 1;
            if run_len == n {
                return Ok(self.space[run_start..run_start + n].to_vec());
            }
        }
        Err(self.exhausted())
    }

    pub fn get_allocated_block(&mut self, n: usize) -> GenResult<Vec<String>> {
        let block = self.get_block(n)?;
        for slot in &block {
            self.allocated.insert(slot.clone());
        }
        Ok(block)
    }

    /// Mark `slot` available again.
    pub fn free(&mut self, slot: &str) -> GenResult<()> {
        if !self.contains(slot) {
            return Err(self.foreign(slot));
        }
        if !self.allocated.remove(slot) {
            return Err(GenError::NotAllocated {
                space: self.name.clone(),
                slot: slot.to_string(),
            });
        }
        Ok(())
    }

    fn exhausted(&self) -> GenError {
        GenError::SlotExhausted {
            space: self.name.clone(),
        }
    }

    fn foreign(&self, slot: &str) -> GenError {
        GenError::ForeignSlot {
            space: self.name.clone(),
            slot: slot.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_is_first_free_in_space_order() {
        let mut p = SlotPlanner::registers();
        assert_eq!(p.get().unwrap(), "A");
        assert_eq!(p.get().unwrap(), "A", "get alone must not allocate");
        assert_eq!(p.get_allocated().unwrap(), "A");
        assert_eq!(p.get_allocated().unwrap(), "B");
        p.free("A").unwrap();
        assert_eq!(p.get_allocated().unwrap(), "A");
        assert_eq!(p.get_allocated().unwrap(), "C");
    }

    #[test]
    fn exhaustion() {
        let mut p = SlotPlanner::strings(2);
        p.get_allocated().unwrap();
        p.get_allocated().unwrap();
        let err = p.get_allocated().unwrap_err();
        assert_eq!(
            err,
            GenError::SlotExhausted {
                space: "string slots".into()
            }
        );
    }

    #[test]
    fn foreign_slot_rejected() {
        let mut p = SlotPlanner::registers();
        assert!(matches!(p.alloc("a"), Err(GenError::ForeignSlot { .. })));
        assert!(matches!(p.free("Chn0"), Err(GenError::ForeignSlot { .. })));
    }

    #[test]
    fn double_free_rejected() {
        let mut p = SlotPlanner::bank(10);
        let slot = p.get_allocated().unwrap();
        p.free(&slot).unwrap();
        assert_eq!(
            p.free(&slot).unwrap_err(),
            GenError::NotAllocated {
                space: "memory bank".into(),
                slot: "1".into()
            }
        );
    }

    #[test]
    fn block_skips_fragmented_runs() {
        let mut p = SlotPlanner::bank(10);
        for s in ["1", "2", "4"] {
            p.alloc(s).unwrap();
        }
        let block = p.get_allocated_block(3).unwrap();
        assert_eq!(block, vec!["5", "6", "7"]);
        assert_eq!(p.get_allocated().unwrap(), "3");
        assert!(p.get_block(4).is_err());
        assert_eq!(p.get_block(3).unwrap(), vec!["8", "9", "10"]);
    }

    #[test]
    fn exclusivity_over_mixed_sequence() {
        let mut p = SlotPlanner::bank(8);
        let mut live: Vec<String> = Vec::new();
        for step in 0..40 {
            if step % 3 == 2 && !live.is_empty() {
                let slot = live.remove(step % live.len());
                p.free(&slot).unwrap();
            } else if let Ok(slot) = p.get_allocated() {
                assert!(!live.contains(&slot), "{slot} handed out twice");
                live.push(slot);
            }
            assert_eq!(p.allocated_count(), live.len());
        }
    }

    #[test]
    fn default_spaces() {
        assert_eq!(SlotPlanner::registers().space().len(), 26);
        assert_eq!(SlotPlanner::bank(999).space().last().unwrap(), "999");
        assert_eq!(SlotPlanner::strings(10).space()[9], "Chn9");
    }
}
