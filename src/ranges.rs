//! Merge uncovered line numbers plus a context window into the minimal set
//! of disjoint source ranges for display.

use serde::Serialize;

/// A contiguous, 1-indexed span of source lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    #[must_use]
    pub fn contains(&self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }
}

/// Merge `lines` (any order, duplicates allowed) extended by `context` lines
/// on each side into disjoint, ordered ranges. Candidate ranges that overlap
/// or touch are merged; range starts never go below line 1.
#[must_use]
pub fn merge_ranges(lines: &[u32], context: u32) -> Vec<LineRange> {
    let mut sorted: Vec<u32> = lines.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges: Vec<LineRange> = Vec::new();
    let mut current: Option<LineRange> = None;

    for &line in &sorted {
        let candidate = LineRange {
            start: line.saturating_sub(context).max(1),
            end: line + context,
        };
        match current {
            Some(ref mut range) if candidate.start <= range.end + 1 => {
                range.end = candidate.end;
            }
            Some(range) => {
                ranges.push(range);
                current = Some(candidate);
            }
            None => current = Some(candidate),
        }
    }

    if let Some(range) = current {
        ranges.push(range);
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(merge_ranges(&[], 2), vec![]);
    }

    #[test]
    fn test_single_line_with_context() {
        assert_eq!(merge_ranges(&[10], 2), vec![LineRange { start: 8, end: 12 }]);
    }

    #[test]
    fn test_clamps_to_line_one() {
        assert_eq!(merge_ranges(&[1, 2], 3), vec![LineRange { start: 1, end: 5 }]);
    }

    #[test]
    fn test_nearby_lines_merge_distant_lines_split() {
        // 5 and 6 merge; 20 is distant.
        assert_eq!(
            merge_ranges(&[5, 6, 20], 2),
            vec![
                LineRange { start: 3, end: 8 },
                LineRange { start: 18, end: 22 },
            ]
        );
    }

    #[test]
    fn test_touching_ranges_merge() {
        // [8,12] and [13,17] touch (13 == 12 + 1) and must merge.
        assert_eq!(
            merge_ranges(&[10, 15], 2),
            vec![LineRange { start: 8, end: 17 }]
        );
    }

    #[test]
    fn test_zero_context_adjacent_lines() {
        // With C=0, adjacent lines still coalesce; isolated lines stand alone.
        assert_eq!(
            merge_ranges(&[4, 5, 9], 0),
            vec![
                LineRange { start: 4, end: 5 },
                LineRange { start: 9, end: 9 },
            ]
        );
    }

    #[test]
    fn test_unsorted_input_with_duplicates() {
        assert_eq!(
            merge_ranges(&[20, 5, 6, 5], 2),
            vec![
                LineRange { start: 3, end: 8 },
                LineRange { start: 18, end: 22 },
            ]
        );
    }

    #[test]
    fn test_ranges_are_disjoint_and_sorted() {
        let lines = [3, 7, 15, 16, 40, 41, 90];
        let ranges = merge_ranges(&lines, 2);
        for pair in ranges.windows(2) {
            assert!(pair[0].end < pair[1].start - 1);
        }
        for line in lines {
            let covering: Vec<_> = ranges.iter().filter(|r| r.contains(line)).collect();
            assert_eq!(covering.len(), 1, "line {line} must be in exactly one range");
        }
        for range in &ranges {
            assert!(range.start >= 1);
        }
    }
}
