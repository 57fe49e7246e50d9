//! Request state flags reported with every completion

use std::fmt;

/// Bit set describing how far a transport operation progressed
///
/// A completion carries the final state. `DONE` is always set on delivery;
/// exactly one of `TRUNCATED`, `CANCELED` or `ERROR` may accompany it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RequestState(u16);

impl RequestState {
    pub const POSTED: Self = Self(0x0001);
    /// Data transfer has begun: a receive matched or a send left the socket
    pub const IO_STARTED: Self = Self(0x0002);
    pub const DONE: Self = Self(0x0004);
    pub const TRUNCATED: Self = Self(0x0008);
    pub const CANCELED: Self = Self(0x0010);
    pub const ERROR: Self = Self(0x0020);

    const NAMES: [(Self, &'static str); 6] = [
        (Self::POSTED, "posted"),
        (Self::IO_STARTED, "io_started"),
        (Self::DONE, "done"),
        (Self::TRUNCATED, "truncated"),
        (Self::CANCELED, "canceled"),
        (Self::ERROR, "error"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Delivered in full
    pub fn is_success(self) -> bool {
        self.contains(Self::DONE)
            && !self.contains(Self::TRUNCATED)
            && !self.contains(Self::CANCELED)
            && !self.contains(Self::ERROR)
    }

    pub fn is_truncated(self) -> bool {
        self.contains(Self::TRUNCATED) && !self.contains(Self::ERROR)
    }

    pub fn is_canceled(self) -> bool {
        self.contains(Self::CANCELED)
    }
}

impl std::ops::BitOr for RequestState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for RequestState {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classification() {
        let done = RequestState::POSTED | RequestState::IO_STARTED | RequestState::DONE;
        assert!(done.is_success());

        let truncated = done | RequestState::TRUNCATED;
        assert!(!truncated.is_success());
        assert!(truncated.is_truncated());

        let canceled = RequestState::POSTED | RequestState::DONE | RequestState::CANCELED;
        assert!(canceled.is_canceled());
        assert!(!canceled.is_success());
    }

    #[test]
    fn test_state_display_lists_flags() {
        let state = RequestState::POSTED | RequestState::DONE | RequestState::ERROR;
        assert_eq!(state.to_string(), "posted|done|error");
        assert_eq!(RequestState::empty().to_string(), "none");
    }
}
