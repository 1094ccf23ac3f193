//! Abnormality Sequencer - order in which indicators left Green
//!
//! Each indicator is either Normal or Flagged. The first tick an indicator is
//! Yellow or Red after being Green (or never seen), it is Flagged and gets the
//! next sequence number. Moving between Yellow and Red keeps the number; the
//! number says how long the indicator has been abnormal relative to the others,
//! not how bad it is now. Returning to Green retires the number, and once no
//! indicator is Flagged the counter restarts so the next one is #1 again.
//!
//! The sequencer is an ordinary owned value; the tick driver holds it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::types::{Indicator, RiskLevel};

/// Point-in-time copy of the sequencer's flagged set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSnapshot {
    /// Flagged indicator → sequence number
    pub flagged: BTreeMap<Indicator, u32>,
    /// Last number handed out since the most recent reset
    pub counter: u32,
}

impl SequenceSnapshot {
    /// Flagged indicators ordered by sequence number.
    pub fn in_arrival_order(&self) -> Vec<(u32, Indicator)> {
        let mut ordered: Vec<(u32, Indicator)> = self.flagged.iter().map(|(i, n)| (*n, *i)).collect();
        ordered.sort_unstable();
        ordered
    }
}

#[derive(Debug, Clone, Default)]
pub struct AbnormalitySequencer {
    sequence: BTreeMap<Indicator, u32>,
    previous: BTreeMap<Indicator, RiskLevel>,
    counter: u32,
}

impl AbnormalitySequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one classification outcome.
    pub fn update(&mut self, indicator: Indicator, level: RiskLevel) {
        let previous = self.previous.insert(indicator, level).unwrap_or(RiskLevel::Green);

        if level.is_abnormal() {
            if previous == RiskLevel::Green && !self.sequence.contains_key(&indicator) {
                self.counter += 1;
                self.sequence.insert(indicator, self.counter);
                info!(indicator = %indicator, %level, sequence = self.counter, "Indicator flagged");
            }
        } else if self.sequence.remove(&indicator).is_some() {
            debug!(indicator = %indicator, "Indicator back to normal");
            if self.sequence.is_empty() {
                self.counter = 0;
                debug!("All indicators normal, sequence numbering restarted");
            }
        }
    }

    /// Feed one tick of outcomes.
    ///
    /// Returns to Green are applied before new flags, so an indicator that
    /// turns abnormal in the same tick the last flagged one recovers starts
    /// again at #1. New flags within a tick are numbered in indicator order.
    pub fn update_all(&mut self, levels: &BTreeMap<Indicator, RiskLevel>) {
        for (&indicator, &level) in levels.iter().filter(|(_, l)| !l.is_abnormal()) {
            self.update(indicator, level);
        }
        for (&indicator, &level) in levels.iter().filter(|(_, l)| l.is_abnormal()) {
            self.update(indicator, level);
        }
    }

    pub fn sequence_number_of(&self, indicator: Indicator) -> Option<u32> {
        self.sequence.get(&indicator).copied()
    }

    pub fn all_flagged(&self) -> BTreeMap<Indicator, u32> {
        self.sequence.clone()
    }

    pub fn flagged_count(&self) -> usize {
        self.sequence.len()
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn snapshot(&self) -> SequenceSnapshot {
        SequenceSnapshot { flagged: self.sequence.clone(), counter: self.counter }
    }

    /// Operator reset: forget every flag, previous level and the counter.
    pub fn reset(&mut self) {
        self.sequence.clear();
        self.previous.clear();
        self.counter = 0;
        info!("Abnormality sequence reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RiskLevel::{Green, Red, Yellow};

    #[test]
    fn test_single_indicator_lifecycle() {
        let mut seq = AbnormalitySequencer::new();
        let a = Indicator::PitGainBbl;

        seq.update(a, Green);
        assert_eq!(seq.sequence_number_of(a), None);

        seq.update(a, Yellow);
        assert_eq!(seq.sequence_number_of(a), Some(1));

        seq.update(a, Red);
        assert_eq!(seq.sequence_number_of(a), Some(1));

        seq.update(a, Green);
        assert_eq!(seq.sequence_number_of(a), None);
        assert_eq!(seq.flagged_count(), 0);
        assert_eq!(seq.counter(), 0);
    }

    #[test]
    fn test_first_sighting_abnormal_is_flagged() {
        let mut seq = AbnormalitySequencer::new();
        seq.update(Indicator::Rop, Red);
        assert_eq!(seq.sequence_number_of(Indicator::Rop), Some(1));
    }

    #[test]
    fn test_numbers_increase_and_are_not_reused() {
        let mut seq = AbnormalitySequencer::new();
        seq.update(Indicator::Rop, Yellow);
        seq.update(Indicator::Wob, Red);
        seq.update(Indicator::HookLoad, Yellow);
        assert_eq!(seq.sequence_number_of(Indicator::Rop), Some(1));
        assert_eq!(seq.sequence_number_of(Indicator::Wob), Some(2));
        assert_eq!(seq.sequence_number_of(Indicator::HookLoad), Some(3));

        // Wob recovers while others stay flagged: counter keeps going
        seq.update(Indicator::Wob, Green);
        seq.update(Indicator::Wob, Yellow);
        assert_eq!(seq.sequence_number_of(Indicator::Wob), Some(4));
        assert_eq!(seq.flagged_count(), 3);
    }

    #[test]
    fn test_counter_restarts_when_all_recover() {
        let mut seq = AbnormalitySequencer::new();
        seq.update(Indicator::Rop, Yellow);
        seq.update(Indicator::Wob, Yellow);
        seq.update(Indicator::Rop, Green);
        assert_eq!(seq.counter(), 2);
        seq.update(Indicator::Wob, Green);
        assert_eq!(seq.counter(), 0);

        seq.update(Indicator::MudWeight, Red);
        assert_eq!(seq.sequence_number_of(Indicator::MudWeight), Some(1));
    }

    #[test]
    fn test_green_for_unflagged_does_not_reset_counter() {
        let mut seq = AbnormalitySequencer::new();
        seq.update(Indicator::Rop, Yellow);
        seq.update(Indicator::Wob, Green);
        assert_eq!(seq.counter(), 1);
    }

    #[test]
    fn test_update_all_recoveries_before_flags() {
        let mut seq = AbnormalitySequencer::new();
        seq.update(Indicator::MudWeight, Yellow);
        seq.update(Indicator::MudWeight, Red);

        let mut tick = BTreeMap::new();
        tick.insert(Indicator::ReturnFlowPercent, Yellow);
        tick.insert(Indicator::PitGainBbl, Red);
        tick.insert(Indicator::MudWeight, Green);
        seq.update_all(&tick);

        assert_eq!(seq.sequence_number_of(Indicator::MudWeight), None);
        assert_eq!(seq.sequence_number_of(Indicator::ReturnFlowPercent), Some(1));
        assert_eq!(seq.sequence_number_of(Indicator::PitGainBbl), Some(2));
    }

    #[test]
    fn test_flagged_keys_match_abnormal_levels() {
        let ticks = [
            [Green, Yellow, Red],
            [Yellow, Yellow, Green],
            [Red, Green, Green],
            [Green, Green, Yellow],
            [Green, Green, Green],
        ];
        let indicators = [Indicator::Rop, Indicator::Wob, Indicator::HookLoad];
        let mut seq = AbnormalitySequencer::new();

        for tick in ticks {
            let levels: BTreeMap<Indicator, RiskLevel> = indicators.into_iter().zip(tick).collect();
            let before = seq.all_flagged();
            seq.update_all(&levels);

            for (indicator, level) in &levels {
                assert_eq!(seq.sequence_number_of(*indicator).is_some(), level.is_abnormal());
            }

            // numbers handed out this tick exceed every number still held from before
            let after = seq.all_flagged();
            let retained_max = after.iter().filter(|(i, _)| before.contains_key(*i)).map(|(_, n)| *n).max();
            for (indicator, number) in &after {
                if !before.contains_key(indicator) {
                    assert!(retained_max.map_or(true, |m| *number > m));
                }
            }
        }
        assert_eq!(seq.counter(), 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut seq = AbnormalitySequencer::new();
        seq.update(Indicator::Rop, Yellow);
        seq.update(Indicator::Wob, Red);
        seq.reset();
        assert_eq!(seq.flagged_count(), 0);
        assert_eq!(seq.counter(), 0);

        // previous levels forgotten: still-Red indicator is re-flagged as #1
        seq.update(Indicator::Wob, Red);
        assert_eq!(seq.sequence_number_of(Indicator::Wob), Some(1));
    }

    #[test]
    fn test_snapshot_arrival_order() {
        let mut seq = AbnormalitySequencer::new();
        seq.update(Indicator::MudWeight, Yellow);
        seq.update(Indicator::Rop, Yellow);
        let snap = seq.snapshot();
        assert_eq!(snap.counter, 2);
        assert_eq!(
            snap.in_arrival_order(),
            vec![(1, Indicator::MudWeight), (2, Indicator::Rop)]
        );
    }
}
