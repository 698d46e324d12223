//! Lazy, time-ordered dispatch schedule across phases

use crate::phase::Phase;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

/// One unit of work bound to a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchEvent {
    pub phase_index: usize,
    /// Iteration index within the phase
    pub iteration: u64,
    /// Run-wide sequence number, dense from 0
    pub sequence: u64,
    /// Scheduled start, relative to run start
    pub offset: Duration,
}

/// Merges the per-phase arithmetic sequences into one ordered stream
///
/// Ties on offset break by phase declaration order, then iteration.
#[derive(Debug)]
pub struct Schedule<'a> {
    phases: &'a [Phase],
    heap: BinaryHeap<Reverse<(Duration, usize, u64)>>,
    next_sequence: u64,
}

impl<'a> Schedule<'a> {
    pub fn new(phases: &'a [Phase]) -> Self {
        let heap = phases
            .iter()
            .enumerate()
            .filter_map(|(index, phase)| phase.offset_of(0).map(|offset| Reverse((offset, index, 0))))
            .collect();
        Self {
            phases,
            heap,
            next_sequence: 0,
        }
    }

    /// Total events the schedule will yield
    pub fn expected_len(&self) -> u64 {
        self.phases.iter().map(Phase::expected_iterations).sum()
    }

    /// Offset of the last phase deadline
    pub fn horizon(&self) -> Duration {
        self.phases
            .iter()
            .map(Phase::deadline)
            .max()
            .unwrap_or(Duration::ZERO)
    }
}

impl Iterator for Schedule<'_> {
    type Item = DispatchEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse((offset, phase_index, iteration)) = self.heap.pop()?;
        if let Some(next) = self.phases[phase_index].offset_of(iteration + 1) {
            self.heap.push(Reverse((next, phase_index, iteration + 1)));
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Some(DispatchEvent {
            phase_index,
            iteration,
            sequence,
            offset,
        })
    }
}
