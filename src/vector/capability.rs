//! Native vector search capability state.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Whether the store's native vector index can serve searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityState {
    /// Not probed yet
    Unknown,
    /// Vector index confirmed present and usable
    Enabled,
    /// Probed and unusable, or demoted after a failure
    Disabled,
}

impl CapabilityState {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Enabled => 1,
            Self::Disabled => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Enabled,
            2 => Self::Disabled,
            _ => Self::Unknown,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for CapabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free cell holding the current [`CapabilityState`].
///
/// Readers never block. A reader racing a demotion may still see `Enabled`
/// and take the native path once more; that request falls back on its own.
#[derive(Debug)]
pub struct CapabilityFlag(AtomicU8);

impl CapabilityFlag {
    pub const fn new() -> Self {
        Self(AtomicU8::new(CapabilityState::Unknown.to_u8()))
    }

    pub fn get(&self) -> CapabilityState {
        CapabilityState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: CapabilityState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }

    /// Move `Enabled` to `Disabled`. Returns `true` if this call demoted.
    ///
    /// There is no promotion back to `Enabled` short of a new probe.
    pub fn demote(&self) -> bool {
        self.0
            .compare_exchange(
                CapabilityState::Enabled.to_u8(),
                CapabilityState::Disabled.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for CapabilityFlag {
    fn default() -> Self {
        Self::new()
    }
}
