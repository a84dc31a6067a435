use std::collections::VecDeque;

use crate::report::AnomalyReport;

/// Ring buffer of past run reports. The oldest report is evicted once
/// `capacity` is reached.
#[derive(Debug)]
pub struct RunHistory {
    reports: VecDeque<AnomalyReport>,
    capacity: usize,
}

impl RunHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            reports: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, report: AnomalyReport) {
        while self.reports.len() >= self.capacity {
            self.reports.pop_front();
        }
        self.reports.push_back(report);
    }

    /// Up to `n` reports, newest first.
    pub fn recent(&self, n: usize) -> Vec<AnomalyReport> {
        self.reports.iter().rev().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}
