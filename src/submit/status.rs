use crate::foundation::core::{FeedbackId, GpuContextId};
use crate::foundation::error::{CompositeError, CompositeResult};
use crate::foundation::math::tag_reached;

/// Completion state of a composite call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum QueryStatus {
    /// Submitted, not yet reported complete (or unknown feedback id).
    NotReady,
    /// The device reported completion.
    Ready,
    /// The call failed before or during submission.
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct StatusEntry {
    pub(crate) feedback_id: FeedbackId,
    pub(crate) ctx: GpuContextId,
    pub(crate) tag: u32,
    pub(crate) status: QueryStatus,
    pub(crate) stream_index: Option<u32>,
}

/// Ring of reported statuses with a power-of-two capacity.
///
/// `head` is the oldest live entry, `current` the next write position. A report for the same
/// feedback id as the newest entry replaces it in place.
pub(crate) struct StatusTable {
    entries: Vec<Option<StatusEntry>>,
    head: usize,
    current: usize,
    mask: usize,
}

impl StatusTable {
    pub(crate) fn new(capacity: usize) -> CompositeResult<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(CompositeError::validation(format!(
                "status table capacity must be a power of two, got {capacity}"
            )));
        }
        Ok(Self {
            entries: vec![None; capacity],
            head: 0,
            current: 0,
            mask: capacity - 1,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Live entries.
    pub(crate) fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    fn is_full(&self) -> bool {
        self.head == self.current && self.entries[self.current].is_some()
    }

    fn newest(&self) -> Option<usize> {
        let i = self.current.wrapping_sub(1) & self.mask;
        self.entries[i].map(|_| i)
    }

    pub(crate) fn report(&mut self, entry: StatusEntry) {
        if let Some(i) = self.newest()
            && self.entries[i].is_some_and(|e| e.feedback_id == entry.feedback_id)
        {
            self.entries[i] = Some(entry);
            return;
        }
        if self.is_full() {
            self.head = (self.head + 1) & self.mask;
        }
        self.entries[self.current] = Some(entry);
        self.current = (self.current + 1) & self.mask;
    }

    /// Look up the newest entry for `feedback_id`.
    pub(crate) fn find(&self, feedback_id: FeedbackId) -> Option<&StatusEntry> {
        (0..self.capacity())
            .map(|k| self.current.wrapping_sub(1 + k) & self.mask)
            .filter_map(|i| self.entries[i].as_ref())
            .find(|e| e.feedback_id == feedback_id)
    }

    /// Resolve `feedback_id` against the completion tag `reported` by its context.
    pub(crate) fn query(
        &self,
        feedback_id: FeedbackId,
        reported: impl Fn(GpuContextId) -> u32,
    ) -> QueryStatus {
        match self.find(feedback_id) {
            None => QueryStatus::NotReady,
            Some(e) if e.status == QueryStatus::Error => QueryStatus::Error,
            Some(e) if tag_reached(reported(e.ctx), e.tag) => QueryStatus::Ready,
            Some(_) => QueryStatus::NotReady,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/submit/status.rs"]
mod tests;
