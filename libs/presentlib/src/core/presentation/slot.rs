// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Single-sample hand-off between the producer and the presentation thread.

use crate::core::frames::Sample;

/// At most one sample, owned from acceptance until drawn, dropped, or
/// cleared. While the presentation thread draws it the slot stays occupied
/// (`Presenting`) so the producer cannot slip a second sample in.
pub enum PendingSlot<P> {
    Empty,
    Queued(Sample<P>),
    Presenting,
}

impl<P> Default for PendingSlot<P> {
    fn default() -> Self {
        Self::Empty
    }
}

impl<P> PendingSlot<P> {
    pub fn is_occupied(&self) -> bool {
        !matches!(self, Self::Empty)
    }

    pub fn queued(&self) -> Option<&Sample<P>> {
        match self {
            Self::Queued(sample) => Some(sample),
            _ => None,
        }
    }

    /// Store a sample, handing it back if the slot is occupied.
    pub fn put(&mut self, sample: Sample<P>) -> Result<(), Sample<P>> {
        if self.is_occupied() {
            return Err(sample);
        }
        *self = Self::Queued(sample);
        Ok(())
    }

    /// Lend the queued sample out for drawing.
    pub fn begin_presentation(&mut self) -> Option<Sample<P>> {
        match std::mem::replace(self, Self::Presenting) {
            Self::Queued(sample) => Some(sample),
            other => {
                *self = other;
                None
            }
        }
    }

    /// Release the slot after a draw. Returns `false` if a state change
    /// already cleared it.
    pub fn end_presentation(&mut self) -> bool {
        if matches!(self, Self::Presenting) {
            *self = Self::Empty;
            true
        } else {
            false
        }
    }

    /// Empty the slot, returning a sample that was never drawn.
    pub fn clear(&mut self) -> Option<Sample<P>> {
        match std::mem::take(self) {
            Self::Queued(sample) => Some(sample),
            _ => None,
        }
    }
}

impl<P> std::fmt::Debug for PendingSlot<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Queued(sample) => write!(f, "Queued({:?})", sample.times()),
            Self::Presenting => write!(f, "Presenting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_put_is_refused() {
        let mut slot = PendingSlot::default();
        assert!(slot.put(Sample::untimed(1)).is_ok());
        let refused = slot.put(Sample::untimed(2)).unwrap_err();
        assert_eq!(refused.into_payload(), 2);
        assert_eq!(slot.queued().map(|s| *s.payload()), Some(1));
    }

    #[test]
    fn test_presentation_keeps_slot_occupied() {
        let mut slot = PendingSlot::default();
        slot.put(Sample::untimed("a")).unwrap();

        let sample = slot.begin_presentation().unwrap();
        assert!(slot.is_occupied());
        assert!(slot.put(Sample::untimed("b")).is_err());
        assert!(slot.begin_presentation().is_none());

        assert!(slot.end_presentation());
        assert!(!slot.is_occupied());
        assert_eq!(sample.into_payload(), "a");
    }

    #[test]
    fn test_clear_returns_only_undrawn_samples() {
        let mut slot = PendingSlot::default();
        slot.put(Sample::untimed(7)).unwrap();
        assert_eq!(slot.clear().map(Sample::into_payload), Some(7));

        slot.put(Sample::untimed(8)).unwrap();
        let _drawing = slot.begin_presentation();
        assert!(slot.clear().is_none());
        assert!(!slot.end_presentation(), "cleared during the draw");
        assert!(slot.begin_presentation().is_none());
    }
}
