//! Programme identification (PI) confirmation
//!
//! A single bit error in block A changes the PI code that a
//! group reports. Since a change of PI discards everything
//! known about the station, the [`CachedPi`] only accepts a
//! new code once it has been received twice in a row.
//!
//! ```txt
//!                 observe(B)                 observe(B)
//!  +-----------+  Spurious   +-----------+  Confirmed   +-----------+
//!  | confirmed | ==========> | confirmed | ===========> | confirmed |
//!  |     A     |             |  A, B ?   |              |     B     |
//!  +-----------+ <========== +-----------+              +-----------+
//!                 observe(A)
//!                 NoChange
//! ```

#[cfg(not(test))]
use log::trace;

#[cfg(test)]
use std::println as trace;

/// Result of a PI observation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PiStatus {
    /// The observed code is the confirmed code
    NoChange,

    /// The observed code differs and is not (yet) trusted
    ///
    /// The confirmed code is unchanged. The observation is
    /// held, and a repeat of it will confirm it.
    SpuriousChange,

    /// A new code has been confirmed by repetition
    ChangeConfirmed,
}

/// Debounces received PI codes into a confirmed PI
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CachedPi {
    confirmed: Option<u16>,
    pending: Option<u16>,
}

impl CachedPi {
    /// New tracker, holding no code
    pub fn new() -> Self {
        Self::default()
    }

    /// New tracker with `pi` already confirmed
    ///
    /// This is equivalent to observing `pi` twice.
    pub fn with_confirmed(pi: u16) -> Self {
        Self {
            confirmed: Some(pi),
            pending: None,
        }
    }

    /// Observe a received PI code
    ///
    /// When no code is confirmed, the first observation is
    /// held and reported as a
    /// [`SpuriousChange`](PiStatus::SpuriousChange).
    pub fn observe(&mut self, pi: u16) -> PiStatus {
        if self.confirmed == Some(pi) {
            self.pending = None;
            return PiStatus::NoChange;
        }

        if self.pending == Some(pi) {
            self.confirmed = Some(pi);
            self.pending = None;
            PiStatus::ChangeConfirmed
        } else {
            trace!(
                "pi: holding {:04X} (confirmed {:X?})",
                pi,
                self.confirmed
            );
            self.pending = Some(pi);
            PiStatus::SpuriousChange
        }
    }

    /// The confirmed PI code, if any
    pub fn get(&self) -> Option<u16> {
        self.confirmed
    }

    /// Forget all codes
    ///
    /// The next code must be observed twice before it is
    /// confirmed.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_from_empty() {
        let mut pi = CachedPi::new();
        assert_eq!(None, pi.get());
        assert_eq!(PiStatus::SpuriousChange, pi.observe(0x6201));
        assert_eq!(None, pi.get());
        assert_eq!(PiStatus::ChangeConfirmed, pi.observe(0x6201));
        assert_eq!(Some(0x6201), pi.get());
        assert_eq!(PiStatus::NoChange, pi.observe(0x6201));
    }

    #[test]
    fn test_change_needs_repeat() {
        let mut pi = CachedPi::with_confirmed(0xA000);
        assert_eq!(PiStatus::SpuriousChange, pi.observe(0xB000));
        assert_eq!(Some(0xA000), pi.get());
        assert_eq!(PiStatus::ChangeConfirmed, pi.observe(0xB000));
        assert_eq!(Some(0xB000), pi.get());
    }

    #[test]
    fn test_different_deviations_discarded() {
        let mut pi = CachedPi::with_confirmed(0xA000);
        assert_eq!(PiStatus::SpuriousChange, pi.observe(0xB000));
        assert_eq!(PiStatus::SpuriousChange, pi.observe(0xC000));
        assert_eq!(Some(0xA000), pi.get());

        // B is no longer pending
        assert_eq!(PiStatus::SpuriousChange, pi.observe(0xB000));
        assert_eq!(Some(0xA000), pi.get());
    }

    #[test]
    fn test_revert_clears_pending() {
        let mut pi = CachedPi::with_confirmed(0xA000);
        assert_eq!(PiStatus::SpuriousChange, pi.observe(0xB000));
        assert_eq!(PiStatus::NoChange, pi.observe(0xA000));
        assert_eq!(PiStatus::SpuriousChange, pi.observe(0xB000));
        assert_eq!(Some(0xA000), pi.get());
    }

    #[test]
    fn test_reset() {
        let mut pi = CachedPi::with_confirmed(0xA000);
        pi.reset();
        assert_eq!(None, pi.get());
        assert_eq!(PiStatus::SpuriousChange, pi.observe(0xA000));
        assert_eq!(PiStatus::ChangeConfirmed, pi.observe(0xA000));
    }
}
