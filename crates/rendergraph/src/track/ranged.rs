use marpii::ash::vk;

use super::{Access, ALL_READ_ACCESS};

///One sub-range's current access state. `layout` is meaningless for the buffer
///instantiation and ignored there.
#[derive(Clone, Copy, Debug)]
struct RangeRecord<K> {
    start: K,
    end: K,
    write: (vk::PipelineStageFlags2, vk::AccessFlags2),
    read: (vk::PipelineStageFlags2, vk::AccessFlags2),
    unavailable: vk::AccessFlags2,
    layout: vk::ImageLayout,
}

///A sorted, non-overlapping list of `[start,end)` access records, generic over the key
///space: byte offsets for buffers, `mip*layerCount+layer` indices for images. Grounded on
///`VLocalResRangesManager.cpp`.
///
///Invariant maintained across every public method: `current` stays sorted by `start` and
///non-overlapping, and its union equals exactly the set of ranges ever touched since the
///last whole-resource reset.
pub struct RangedTracker<K: Ord + Copy> {
    current: Vec<RangeRecord<K>>,
    pending: Vec<(K, K, Access)>,
    default_layout: vk::ImageLayout,
}

impl<K: Ord + Copy> RangedTracker<K> {
    pub fn new(default_layout: vk::ImageLayout) -> Self {
        RangedTracker {
            current: Vec::new(),
            pending: Vec::new(),
            default_layout,
        }
    }

    ///Splits `[start,end)` against the pending list: any existing pending entry
    ///overlapping the new range is split at the boundaries and its overlapping portion is
    ///merged (OR of stage/access, max of exe_order) with the incoming access; portions of
    ///the incoming range not covered by any existing entry are appended as-is.
    pub fn add_pending_state(&mut self, start: K, end: K, access: Access) {
        if start >= end {
            return;
        }

        let mut remaining = vec![(start, end)];
        let mut result = Vec::with_capacity(self.pending.len() + 2);

        for (s, e, a) in std::mem::take(&mut self.pending) {
            if e <= start || s >= end {
                result.push((s, e, a));
                continue;
            }

            if s < start {
                result.push((s, start, a));
            }
            if e > end {
                result.push((end, e, a));
            }

            let os = s.max(start);
            let oe = e.min(end);
            let mut merged = a;
            merged.stage |= access.stage;
            merged.access |= access.access;
            merged.is_write |= access.is_write;
            merged.exe_order = merged.exe_order.max(access.exe_order);
            merged.layout = merged.layout.or(access.layout);
            result.push((os, oe, merged));

            remaining = subtract_interval(remaining, os, oe);
        }

        for (rs, re) in remaining {
            if rs < re {
                result.push((rs, re, access));
            }
        }

        result.sort_by(|a, b| a.0.cmp(&b.0));
        self.pending = result;
    }

    ///Walks the pending list; for each entry, locates the current records it intersects
    ///and emits one barrier per intersected sub-range via `emit`, then splices the merged
    ///state back into `current` preserving sort order and non-overlap.
    ///
    ///`emit(start, end, src_stage, dst_stage, src_access, dst_access, old_layout,
    ///new_layout)` is called once per intersected sub-range (or once for the whole pending
    ///range if it touches no existing record).
    #[allow(clippy::too_many_arguments)]
    pub fn commit_barrier(
        &mut self,
        mut emit: impl FnMut(K, K, vk::PipelineStageFlags2, vk::PipelineStageFlags2, vk::AccessFlags2, vk::AccessFlags2, vk::ImageLayout, vk::ImageLayout),
    ) {
        let pending = std::mem::take(&mut self.pending);

        for (s, e, access) in pending {
            let target_layout = access.layout.unwrap_or(self.default_layout);
            //first record whose end could possibly intersect [s, e)
            let start_idx = self.current.partition_point(|r| r.end <= s);
            let mut idx = start_idx;
            let mut leading: Option<RangeRecord<K>> = None;
            let mut trailing: Option<RangeRecord<K>> = None;
            let mut any_overlap = false;
            let mut unavailable_union = vk::AccessFlags2::empty();

            while idx < self.current.len() && self.current[idx].start < e {
                let rec = self.current[idx];
                if rec.end <= s {
                    idx += 1;
                    continue;
                }
                any_overlap = true;
                unavailable_union |= rec.unavailable;
                let os = rec.start.max(s);
                let oe = rec.end.min(e);

                let (src_stage, src_access) = if access.is_write {
                    if rec.read.0 != vk::PipelineStageFlags2::empty() {
                        (rec.read.0, vk::AccessFlags2::empty())
                    } else {
                        rec.write
                    }
                } else if rec.layout != target_layout {
                    if rec.read.0 != vk::PipelineStageFlags2::empty() {
                        (rec.read.0, vk::AccessFlags2::empty())
                    } else {
                        rec.write
                    }
                } else if rec.unavailable.intersects(access.access) {
                    rec.write
                } else {
                    idx += 1;
                    continue; //parallel reader over this sub-range: no barrier
                };

                emit(os, oe, src_stage, access.stage, src_access, access.access, rec.layout, target_layout);

                if rec.start < s && idx == start_idx {
                    leading = Some(RangeRecord { end: s, ..rec });
                }
                if rec.end > e {
                    trailing = Some(RangeRecord { start: e, ..rec });
                }
                idx += 1;
            }

            let new_state = |rec_unavailable: vk::AccessFlags2| RangeRecord {
                start: s,
                end: e,
                write: if access.is_write { (access.stage, access.access) } else { (vk::PipelineStageFlags2::empty(), vk::AccessFlags2::empty()) },
                read: if access.is_write { (vk::PipelineStageFlags2::empty(), vk::AccessFlags2::empty()) } else { (access.stage, access.access) },
                unavailable: if access.is_write { ALL_READ_ACCESS } else { rec_unavailable & !access.access },
                layout: target_layout,
            };

            if !any_overlap {
                emit(
                    s,
                    e,
                    vk::PipelineStageFlags2::empty(),
                    access.stage,
                    vk::AccessFlags2::empty(),
                    access.access,
                    self.default_layout,
                    target_layout,
                );
                self.splice_in(start_idx, None, new_state(vk::AccessFlags2::empty()), None);
            } else {
                self.splice_in(start_idx, leading, new_state(unavailable_union), trailing);
            }
        }
    }

    fn splice_in(&mut self, start_idx: usize, leading: Option<RangeRecord<K>>, middle: RangeRecord<K>, trailing: Option<RangeRecord<K>>) {
        let end_idx = self.current.partition_point(|r| r.start < middle.end).max(start_idx);
        let mut replacement = Vec::with_capacity(3);
        if let Some(l) = leading {
            replacement.push(l);
        }
        replacement.push(middle);
        if let Some(t) = trailing {
            replacement.push(t);
        }
        self.current.splice(start_idx..end_idx, replacement);
    }

    ///Number of distinct access records currently held. A whole-range access collapses to 1.
    pub fn record_count(&self) -> usize {
        self.current.len()
    }

    ///On destruction, makes every still-tracked sub-range's last access visible and
    ///returns it to the default layout, mirroring `VLocalResRangesManager`'s synthetic
    ///full-range read access on `Destroy`. Emitted per sub-range rather than as one
    ///whole-resource barrier, since the tracker never learns the resource's total size.
    pub fn destroy_barrier(
        &mut self,
        mut emit: impl FnMut(K, K, vk::PipelineStageFlags2, vk::PipelineStageFlags2, vk::AccessFlags2, vk::AccessFlags2, vk::ImageLayout, vk::ImageLayout),
    ) {
        debug_assert!(self.pending.is_empty(), "destroy_barrier with pending states outstanding; commit_barrier first");
        for rec in self.current.drain(..) {
            if rec.layout == self.default_layout && rec.unavailable == vk::AccessFlags2::empty() {
                continue;
            }
            let (src_stage, src_access) = if rec.read.0 != vk::PipelineStageFlags2::empty() {
                (rec.read.0, vk::AccessFlags2::empty())
            } else {
                rec.write
            };
            emit(
                rec.start,
                rec.end,
                src_stage,
                vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
                src_access,
                vk::AccessFlags2::empty(),
                rec.layout,
                self.default_layout,
            );
        }
    }
}

fn subtract_interval<K: Ord + Copy>(list: Vec<(K, K)>, os: K, oe: K) -> Vec<(K, K)> {
    let mut out = Vec::with_capacity(list.len() + 1);
    for (rs, re) in list {
        if re <= os || rs >= oe {
            out.push((rs, re));
            continue;
        }
        if rs < os {
            out.push((rs, os));
        }
        if oe < re {
            out.push((oe, re));
        }
    }
    out
}

pub type RangedBufferTracker = RangedTracker<u64>;
pub type RangedImageTracker = RangedTracker<u64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_range_access_collapses_to_one_record() {
        let mut tracker = RangedTracker::<u64>::new(vk::ImageLayout::UNDEFINED);
        tracker.add_pending_state(
            0,
            u64::MAX,
            Access { stage: vk::PipelineStageFlags2::TRANSFER, access: vk::AccessFlags2::TRANSFER_WRITE, is_write: true, exe_order: 1, layout: None },
        );
        tracker.commit_barrier(|_, _, _, _, _, _, _, _| {});
        assert_eq!(tracker.record_count(), 1);
    }

    #[test]
    fn disjoint_ranges_stay_separate() {
        let mut tracker = RangedTracker::<u64>::new(vk::ImageLayout::UNDEFINED);
        let access = Access { stage: vk::PipelineStageFlags2::TRANSFER, access: vk::AccessFlags2::TRANSFER_WRITE, is_write: true, exe_order: 1, layout: None };
        tracker.add_pending_state(0, 64, access);
        tracker.add_pending_state(128, 192, access);
        tracker.commit_barrier(|_, _, _, _, _, _, _, _| {});
        assert_eq!(tracker.record_count(), 2);
    }

    #[test]
    fn destroy_barrier_returns_each_record_to_default_layout() {
        let mut tracker = RangedTracker::<u64>::new(vk::ImageLayout::UNDEFINED);
        tracker.add_pending_state(
            0,
            64,
            Access {
                stage: vk::PipelineStageFlags2::TRANSFER,
                access: vk::AccessFlags2::TRANSFER_WRITE,
                is_write: true,
                exe_order: 1,
                layout: Some(vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            },
        );
        tracker.commit_barrier(|_, _, _, _, _, _, _, _| {});
        assert_eq!(tracker.record_count(), 1);

        let mut emitted = Vec::new();
        tracker.destroy_barrier(|s, e, _src_stage, _dst_stage, _src_access, _dst_access, old_layout, new_layout| {
            emitted.push((s, e, old_layout, new_layout));
        });
        assert_eq!(emitted, vec![(0, 64, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::UNDEFINED)]);
        assert_eq!(tracker.record_count(), 0);
    }

    #[test]
    fn destroy_barrier_skips_records_already_at_default_layout() {
        let mut tracker = RangedTracker::<u64>::new(vk::ImageLayout::UNDEFINED);
        tracker.add_pending_state(
            0,
            64,
            Access { stage: vk::PipelineStageFlags2::TRANSFER, access: vk::AccessFlags2::TRANSFER_READ, is_write: false, exe_order: 1, layout: Some(vk::ImageLayout::UNDEFINED) },
        );
        tracker.commit_barrier(|_, _, _, _, _, _, _, _| {});

        let mut emitted = 0;
        tracker.destroy_barrier(|_, _, _, _, _, _, _, _| emitted += 1);
        assert_eq!(emitted, 0);
    }
}
