//! Aggregate statistics over session history records.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use veilnet_core::state::SessionHistory;

/// Rolled-up numbers for a set of sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub count: usize,
    pub data_sent: u64,
    pub data_received: u64,
    pub tokens: u64,
}

impl Stats {
    pub fn add(&mut self, session: &SessionHistory) {
        self.count += 1;
        self.data_sent += session.data_sent;
        self.data_received += session.data_received;
        self.tokens += session.tokens;
    }
}

/// Aggregate over all records.
pub fn aggregate(sessions: &[SessionHistory]) -> Stats {
    let mut stats = Stats::default();
    for session in sessions {
        stats.add(session);
    }
    stats
}

/// Aggregate grouped by the day the session started.
pub fn by_day(sessions: &[SessionHistory]) -> BTreeMap<NaiveDate, Stats> {
    let mut days: BTreeMap<NaiveDate, Stats> = BTreeMap::new();
    for session in sessions {
        days.entry(session.started.date_naive())
            .or_default()
            .add(session);
    }
    days
}
