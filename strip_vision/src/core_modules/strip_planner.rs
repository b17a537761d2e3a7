// THEORY:
// The `StripPlanner` is the single authoritative implementation of the work split.
// There is no "assignment" message in the protocol: every participant calls
// `plan_for` with its own rank and derives the same answer the coordinator expects.
// That only works because the formula is pure, so it lives here and nowhere else.
//
// The split, for `workers = worker_count - 1` (rank 0 is the coordinator):
// 1.  **Regular strips**: `image_height / workers` rows each, worker `r` taking
//     `[(r-1)*regular, r*regular)`.
// 2.  **Remainder rows**: the `image_height % workers` leftover rows at the bottom are
//     handed out one at a time to workers `1..=remainder`.
// 3.  **Over-provisioned groups**: with fewer rows than workers each of the first
//     `image_height` workers gets a single row and the rest sit idle.
// 4.  **Single participant**: rank 0 owns the whole image and no transport is used.
//
// Together these tile `[0, image_height)` exactly once.

use std::ops::Range;

/// Whether a strip is a worker's main share or one of the leftover rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StripKind {
    Regular,
    Remainder,
}

/// A contiguous row range owned by exactly one participant for one send/receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StripAssignment {
    pub start_row: usize,
    pub row_count: usize,
    pub kind: StripKind,
}

impl StripAssignment {
    pub fn regular(start_row: usize, row_count: usize) -> Self {
        Self {
            start_row,
            row_count,
            kind: StripKind::Regular,
        }
    }

    pub fn remainder(row: usize) -> Self {
        Self {
            start_row: row,
            row_count: 1,
            kind: StripKind::Remainder,
        }
    }

    pub fn rows(&self) -> Range<usize> {
        self.start_row..self.start_row + self.row_count
    }
}

/// Stateless planner; every method is a pure function of its arguments.
pub struct StripPlanner;

impl StripPlanner {
    /// The strips `worker_index` must compute, in the order it must send them.
    pub fn plan_for(
        worker_index: usize,
        image_height: usize,
        worker_count: usize,
    ) -> Vec<StripAssignment> {
        if worker_count == 0 || image_height == 0 || worker_index >= worker_count {
            return Vec::new();
        }
        if worker_count == 1 {
            return vec![StripAssignment::regular(0, image_height)];
        }
        // Rank 0 coordinates and computes nothing once there are workers.
        if worker_index == 0 {
            return Vec::new();
        }

        let workers = worker_count - 1;
        let rank = worker_index;

        if image_height < workers {
            return if rank <= image_height {
                vec![StripAssignment::regular(rank - 1, 1)]
            } else {
                Vec::new()
            };
        }

        let regular = image_height / workers;
        let remainder = image_height % workers;

        let mut plan = Vec::with_capacity(2);
        plan.push(StripAssignment::regular((rank - 1) * regular, regular));
        if rank <= remainder {
            plan.push(StripAssignment::remainder(regular * workers + (rank - 1)));
        }
        plan
    }

    /// The coordinator's receive order as `(rank, strip)`: every regular strip in
    /// ascending rank order, then every remainder strip in ascending rank order.
    pub fn receive_schedule(
        image_height: usize,
        worker_count: usize,
    ) -> Vec<(usize, StripAssignment)> {
        if worker_count < 2 {
            return Vec::new();
        }

        let plans: Vec<(usize, Vec<StripAssignment>)> = (1..worker_count)
            .map(|rank| (rank, Self::plan_for(rank, image_height, worker_count)))
            .collect();

        let of_kind = |kind: StripKind| {
            plans.iter().flat_map(move |(rank, plan)| {
                plan.iter()
                    .filter(move |strip| strip.kind == kind)
                    .map(move |strip| (*rank, *strip))
            })
        };

        of_kind(StripKind::Regular)
            .chain(of_kind(StripKind::Remainder))
            .collect()
    }

    /// Number of workers that receive at least one strip.
    pub fn participants(image_height: usize, worker_count: usize) -> usize {
        match worker_count {
            0 => 0,
            1 => usize::from(image_height > 0),
            _ => (worker_count - 1).min(image_height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covered_rows(image_height: usize, worker_count: usize) -> Vec<usize> {
        let mut hits = vec![0usize; image_height];
        let ranks = if worker_count == 1 { 0..1 } else { 1..worker_count };
        for rank in ranks {
            for strip in StripPlanner::plan_for(rank, image_height, worker_count) {
                for row in strip.rows() {
                    hits[row] += 1;
                }
            }
        }
        hits
    }

    #[test]
    fn height_ten_across_three_workers() {
        let plan = |rank| StripPlanner::plan_for(rank, 10, 4);
        assert_eq!(plan(0), vec![]);
        assert_eq!(
            plan(1),
            vec![StripAssignment::regular(0, 3), StripAssignment::remainder(9)]
        );
        assert_eq!(plan(2), vec![StripAssignment::regular(3, 3)]);
        assert_eq!(plan(3), vec![StripAssignment::regular(6, 3)]);
    }

    #[test]
    fn every_row_is_covered_exactly_once() {
        for image_height in 1..=64 {
            for worker_count in 1..=20 {
                let hits = covered_rows(image_height, worker_count);
                assert!(
                    hits.iter().all(|&count| count == 1),
                    "height {image_height}, workers {worker_count}: {hits:?}"
                );
            }
        }
        for (image_height, worker_count) in [(1080, 7), (1081, 9), (999, 33), (4096, 257)] {
            assert!(covered_rows(image_height, worker_count).iter().all(|&c| c == 1));
        }
    }

    #[test]
    fn over_provisioned_groups_leave_trailing_workers_idle() {
        // Three rows, five workers.
        for rank in 1..=3 {
            assert_eq!(
                StripPlanner::plan_for(rank, 3, 6),
                vec![StripAssignment::regular(rank - 1, 1)]
            );
        }
        assert!(StripPlanner::plan_for(4, 3, 6).is_empty());
        assert!(StripPlanner::plan_for(5, 3, 6).is_empty());
        assert_eq!(StripPlanner::participants(3, 6), 3);
    }

    #[test]
    fn rows_equal_to_workers_gives_one_row_each_and_no_remainder() {
        let schedule = StripPlanner::receive_schedule(4, 5);
        assert_eq!(schedule.len(), 4);
        assert!(schedule.iter().all(|(_, s)| s.kind == StripKind::Regular && s.row_count == 1));
    }

    #[test]
    fn single_participant_owns_the_whole_image() {
        assert_eq!(
            StripPlanner::plan_for(0, 17, 1),
            vec![StripAssignment::regular(0, 17)]
        );
        assert!(StripPlanner::receive_schedule(17, 1).is_empty());
    }

    #[test]
    fn degenerate_inputs_plan_nothing() {
        assert!(StripPlanner::plan_for(1, 0, 4).is_empty());
        assert!(StripPlanner::plan_for(0, 10, 0).is_empty());
        assert!(StripPlanner::plan_for(9, 10, 4).is_empty());
        assert_eq!(StripPlanner::participants(0, 4), 0);
    }

    #[test]
    fn receive_schedule_lists_regular_strips_before_remainder_rows() {
        let schedule = StripPlanner::receive_schedule(11, 4);
        let ranks: Vec<usize> = schedule.iter().map(|(rank, _)| *rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 1, 2]);
        assert_eq!(schedule[3].1, StripAssignment::remainder(9));
        assert_eq!(schedule[4].1, StripAssignment::remainder(10));
    }

    #[test]
    fn schedule_matches_what_each_worker_plans() {
        for (image_height, worker_count) in [(10, 4), (7, 8), (100, 13), (5, 2)] {
            let schedule = StripPlanner::receive_schedule(image_height, worker_count);
            for rank in 1..worker_count {
                let expected: Vec<StripAssignment> = schedule
                    .iter()
                    .filter(|(r, _)| *r == rank)
                    .map(|(_, s)| *s)
                    .collect();
                assert_eq!(expected, StripPlanner::plan_for(rank, image_height, worker_count));
            }
        }
    }
}
