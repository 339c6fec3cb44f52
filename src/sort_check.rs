use std::collections::HashSet;

use crate::errors::{DedupError, Result};

/// Verifies that records arrive grouped by chromosome and sorted by leftmost
/// position within each chromosome.
#[derive(Debug, Default)]
pub struct SortOrderGuard {
    current: Option<(String, i64)>,
    finished: HashSet<String>,
}

impl SortOrderGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the next record's chromosome and leftmost position.
    pub fn check(&mut self, chrom: &str, position: i64) -> Result<()> {
        if let Some((cur, last)) = &mut self.current {
            if cur.as_str() == chrom {
                if position < *last {
                    return Err(DedupError::UnsortedInput {
                        line: 0,
                        reason: format!("position {position} on '{chrom}' follows position {last}"),
                    });
                }
                *last = position;
                return Ok(());
            }
        }

        if self.finished.contains(chrom) {
            return Err(DedupError::UnsortedInput {
                line: 0,
                reason: format!("chromosome '{chrom}' appears in more than one block"),
            });
        }
        if let Some((prev, _)) = self.current.take() {
            self.finished.insert(prev);
        }
        self.current = Some((chrom.to_string(), position));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_input_passes() {
        let mut g = SortOrderGuard::new();
        for (chrom, pos) in [("1", 5), ("1", 5), ("1", 9), ("2", 1), ("10", 3), ("X", 0)] {
            g.check(chrom, pos).unwrap();
        }
    }

    #[test]
    fn test_position_going_backwards_fails() {
        let mut g = SortOrderGuard::new();
        g.check("1", 100).unwrap();
        let err = g.check("1", 99).unwrap_err();
        assert!(matches!(err, DedupError::UnsortedInput { .. }));
        assert!(format!("{err}").contains("position 99 on '1' follows position 100"));
    }

    #[test]
    fn test_chromosome_reappearing_fails() {
        let mut g = SortOrderGuard::new();
        g.check("1", 100).unwrap();
        g.check("2", 1).unwrap();
        let err = g.check("1", 200).unwrap_err();
        assert!(format!("{err}").contains("'1' appears in more than one block"));
    }
}
