//! Pre-flight overlap detection
//!
//! Applies the engine's placement rule over source sizes only, so a caller
//! can warn about intersecting ranges before committing a merge. The merge
//! itself never consults this module — later-wins overwriting is part of the
//! format contract, and the check exists purely to make it visible up front.

use crate::error::Result;
use crate::layout::{OffsetResolver, header_size_for_count, validate_entry_count};

/// A resolved placement produced during pre-flight planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedSpan {
    pub index: usize,
    pub start: u32,
    pub end: u32,
}

/// Two planned spans that intersect. The later entry will overwrite the
/// shared bytes when the merge runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
    pub earlier: PlannedSpan,
    pub later: PlannedSpan,
}

/// Resolve placements for `(requested offset, size)` pairs without reading
/// any payload, using the same rule the merge applies.
pub fn plan_spans(targets: &[(Option<u32>, u32)]) -> Result<Vec<PlannedSpan>> {
    validate_entry_count(targets.len())?;
    let header_size = header_size_for_count(targets.len());

    let mut resolver = OffsetResolver::new(header_size);
    let mut spans = Vec::with_capacity(targets.len());
    for (index, &(requested, size)) in targets.iter().enumerate() {
        let start = resolver.resolve(requested, size)?;
        spans.push(PlannedSpan {
            index,
            start,
            end: start + size,
        });
    }
    Ok(spans)
}

/// Find every pair of planned spans that intersect.
///
/// Pairs are reported as (earlier, later) in input order. Two spans
/// intersect when one starts before the other ends and vice versa; spans
/// that merely touch do not.
pub fn find_overlaps(spans: &[PlannedSpan]) -> Vec<Overlap> {
    let mut overlaps = Vec::new();
    for (i, later) in spans.iter().enumerate() {
        for earlier in &spans[..i] {
            if later.start < earlier.end && later.end > earlier.start {
                overlaps.push(Overlap {
                    earlier: *earlier,
                    later: *later,
                });
            }
        }
    }
    overlaps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_matches_resolution_rule() {
        // auto, explicit below header, explicit beyond header
        let spans = plan_spans(&[(None, 0x100), (Some(0), 0x40), (Some(0x1000), 0x10)]).unwrap();
        assert_eq!(spans[0].start, 0x110);
        assert_eq!(spans[1].start, 0x110);
        assert_eq!(spans[2].start, 0x1000);
        assert_eq!(spans[2].end, 0x1010);
    }

    #[test]
    fn test_disjoint_spans_have_no_overlaps() {
        let spans = plan_spans(&[(None, 0x100), (None, 0x100)]).unwrap();
        assert!(find_overlaps(&spans).is_empty());
    }

    #[test]
    fn test_all_pairs_reported() {
        // three entries forced onto the same starting point
        let spans = plan_spans(&[(None, 0x1000), (Some(0x100), 0x200), (Some(0), 0x50)]).unwrap();
        let overlaps = find_overlaps(&spans);
        let pairs: Vec<(usize, usize)> = overlaps
            .iter()
            .map(|o| (o.earlier.index, o.later.index))
            .collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn test_touching_spans_do_not_overlap() {
        let spans = plan_spans(&[(None, 0x100), (Some(0x1C0), 0x10)]).unwrap();
        // second span starts exactly where the first ends
        assert_eq!(spans[0].end, spans[1].start);
        assert!(find_overlaps(&spans).is_empty());
    }
}
