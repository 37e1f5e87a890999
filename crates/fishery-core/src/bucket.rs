//! Aggregate buckets: batches of same-phase, order-insensitive actions.
//!
//! A bucket is one scheduled unit that runs its members in registration
//! order. The scheduler keeps one daily and one yearly bucket for every
//! non-randomized phase.

use crate::schedule::{ActionId, Steppable};
use crate::stoppable::Stoppable;

/// Cadence of an aggregate bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum BucketCadence {
    /// Fires on the last step of every day.
    Daily,
    /// Fires on the last step of every year.
    Yearly,
}

/// One action held by a bucket.
pub(crate) struct BucketMember<S> {
    pub(crate) id: ActionId,
    pub(crate) action: Box<dyn Steppable<S>>,
    pub(crate) handle: Stoppable,
}

/// Ordered members of one bucket.
pub(crate) struct AggregateBucket<S> {
    members: Vec<BucketMember<S>>,
}

impl<S> AggregateBucket<S> {
    pub(crate) const fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Append a member; it runs after every existing member.
    pub(crate) fn push(&mut self, member: BucketMember<S>) {
        self.members.push(member);
    }

    /// Remove every member for a run. Members added while the run is in
    /// progress land in the now-empty bucket.
    pub(crate) fn take(&mut self) -> Vec<BucketMember<S>> {
        std::mem::take(&mut self.members)
    }

    /// Put the survivors of a run back ahead of anything added during it.
    pub(crate) fn restore(&mut self, mut survivors: Vec<BucketMember<S>>) {
        survivors.append(&mut self.members);
        self.members = survivors;
    }

    /// Members whose handles are still live.
    pub(crate) fn live_len(&self) -> usize {
        self.members
            .iter()
            .filter(|m| !m.handle.is_stopped())
            .count()
    }

    /// Stop and drop every member.
    pub(crate) fn clear(&mut self) {
        for member in self.members.drain(..) {
            member.handle.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{ActionError, StepContext};

    fn member(id: u64) -> BucketMember<Vec<u64>> {
        BucketMember {
            id: ActionId::new(id),
            action: Box::new(
                |_: &mut Vec<u64>, _: &mut StepContext<'_, Vec<u64>>| -> Result<(), ActionError> {
                    Ok(())
                },
            ),
            handle: Stoppable::new(),
        }
    }

    fn ids(bucket: &mut AggregateBucket<Vec<u64>>) -> Vec<u64> {
        let members = bucket.take();
        let out = members.iter().map(|m| m.id.into_inner()).collect();
        bucket.restore(members);
        out
    }

    #[test]
    fn survivors_precede_members_added_during_a_run() {
        let mut bucket = AggregateBucket::new();
        bucket.push(member(1));
        bucket.push(member(2));

        let running = bucket.take();
        bucket.push(member(3));
        bucket.restore(running);

        assert_eq!(ids(&mut bucket), vec![1, 2, 3]);
    }

    #[test]
    fn clear_stops_members() {
        let mut bucket = AggregateBucket::new();
        let m = member(1);
        let handle = m.handle.clone();
        bucket.push(m);
        assert_eq!(bucket.live_len(), 1);
        bucket.clear();
        assert!(handle.is_stopped());
        assert_eq!(bucket.live_len(), 0);
    }
}
