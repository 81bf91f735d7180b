//! Audio focus coordination
//!
//! Audio focus is a process-wide resource owned by the host. The coordinator
//! is its only writer inside the engine: it requests focus before audible
//! playback, abandons it when playback stops, and turns host notifications
//! into [`FocusChange`]s for the state machine.

use crate::types::AudioFocus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Host side of audio focus
pub trait AudioFocusProvider: Send + Sync {
    /// Ask for focus; true when granted
    fn request_focus(&self) -> bool;

    /// Give focus back
    fn abandon_focus(&self);
}

/// Provider that always grants focus (hosts without a focus concept)
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

impl AudioFocusProvider for AlwaysGranted {
    fn request_focus(&self) -> bool {
        true
    }

    fn abandon_focus(&self) {}
}

/// Focus notification from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusChange {
    /// Focus regained
    Gained,

    /// Focus lost; `can_duck` means we may keep playing at reduced volume
    Lost { can_duck: bool },
}

/// Held focus registration; dropping it abandons focus
pub struct FocusGrant {
    provider: Arc<dyn AudioFocusProvider>,
}

impl Drop for FocusGrant {
    fn drop(&mut self) {
        self.provider.abandon_focus();
    }
}

/// Tracks the focus registration and the current focus level
pub struct AudioFocusCoordinator {
    provider: Arc<dyn AudioFocusProvider>,
    grant: Option<FocusGrant>,
    current: AudioFocus,
    duck_volume: f32,
}

impl AudioFocusCoordinator {
    /// Create a coordinator; `duck_volume` is clamped to `0.0..=1.0`
    pub fn new(provider: Arc<dyn AudioFocusProvider>, duck_volume: f32) -> Self {
        Self {
            provider,
            grant: None,
            current: AudioFocus::NoFocus,
            duck_volume: clamp_volume(duck_volume),
        }
    }

    /// Current focus level
    pub fn current(&self) -> AudioFocus {
        self.current
    }

    /// Whether a registration is held (even while focus is temporarily lost)
    pub fn is_registered(&self) -> bool {
        self.grant.is_some()
    }

    /// Volume matching the current focus level
    pub fn volume(&self) -> f32 {
        match self.current {
            AudioFocus::TransientDuck => self.duck_volume,
            AudioFocus::Focused | AudioFocus::NoFocus => 1.0,
        }
    }

    pub fn set_duck_volume(&mut self, volume: f32) {
        self.duck_volume = clamp_volume(volume);
    }

    /// Request focus unless already held
    ///
    /// Returns true when playback may be audible.
    pub fn request_focus(&mut self) -> bool {
        if matches!(self.current, AudioFocus::Focused | AudioFocus::TransientDuck) {
            return true;
        }

        if !self.provider.request_focus() {
            debug!("Audio focus request denied");
            return false;
        }

        if self.grant.is_none() {
            self.grant = Some(FocusGrant {
                provider: Arc::clone(&self.provider),
            });
        }
        self.current = AudioFocus::Focused;
        true
    }

    /// Abandon focus (idempotent)
    pub fn abandon_focus(&mut self) {
        // Dropping the grant abandons focus with the provider
        self.grant = None;
        self.current = AudioFocus::NoFocus;
    }

    /// Apply a host notification
    ///
    /// Returns `None` when no registration is held, e.g. for notifications
    /// that arrive after the session ended.
    pub fn apply(&mut self, change: FocusChange) -> Option<FocusChange> {
        if self.grant.is_none() {
            debug!("Ignoring focus change without registration: {:?}", change);
            return None;
        }

        self.current = match change {
            FocusChange::Gained => AudioFocus::Focused,
            FocusChange::Lost { can_duck: true } => AudioFocus::TransientDuck,
            FocusChange::Lost { can_duck: false } => AudioFocus::NoFocus,
        };
        Some(change)
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        deny: AtomicBool,
        requests: AtomicUsize,
        abandons: AtomicUsize,
    }

    impl AudioFocusProvider for CountingProvider {
        fn request_focus(&self) -> bool {
            self.requests.fetch_add(1, Ordering::SeqCst);
            !self.deny.load(Ordering::SeqCst)
        }

        fn abandon_focus(&self) {
            self.abandons.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn coordinator() -> (Arc<CountingProvider>, AudioFocusCoordinator) {
        let provider = Arc::new(CountingProvider::default());
        let coordinator = AudioFocusCoordinator::new(provider.clone(), 0.2);
        (provider, coordinator)
    }

    #[test]
    fn request_is_not_repeated_while_focused() {
        let (provider, mut focus) = coordinator();

        assert!(focus.request_focus());
        assert!(focus.request_focus());
        assert_eq!(provider.requests.load(Ordering::SeqCst), 1);
        assert_eq!(focus.current(), AudioFocus::Focused);
    }

    #[test]
    fn abandon_is_idempotent() {
        let (provider, mut focus) = coordinator();
        focus.request_focus();

        focus.abandon_focus();
        focus.abandon_focus();

        assert_eq!(provider.abandons.load(Ordering::SeqCst), 1);
        assert_eq!(focus.current(), AudioFocus::NoFocus);
        assert!(!focus.is_registered());
    }

    #[test]
    fn denied_request_keeps_no_focus() {
        let (provider, mut focus) = coordinator();
        provider.deny.store(true, Ordering::SeqCst);

        assert!(!focus.request_focus());
        assert_eq!(focus.current(), AudioFocus::NoFocus);
        assert!(!focus.is_registered());
    }

    #[test]
    fn duck_and_regain() {
        let (_provider, mut focus) = coordinator();
        focus.request_focus();

        assert_eq!(
            focus.apply(FocusChange::Lost { can_duck: true }),
            Some(FocusChange::Lost { can_duck: true })
        );
        assert_eq!(focus.current(), AudioFocus::TransientDuck);
        assert_eq!(focus.volume(), 0.2);

        focus.apply(FocusChange::Gained);
        assert_eq!(focus.current(), AudioFocus::Focused);
        assert_eq!(focus.volume(), 1.0);
    }

    #[test]
    fn transient_loss_keeps_registration() {
        let (provider, mut focus) = coordinator();
        focus.request_focus();

        focus.apply(FocusChange::Lost { can_duck: false });
        assert_eq!(focus.current(), AudioFocus::NoFocus);
        assert!(focus.is_registered());

        // Re-requesting after a loss asks the host again
        assert!(focus.request_focus());
        assert_eq!(provider.requests.load(Ordering::SeqCst), 2);
        assert_eq!(provider.abandons.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn changes_without_registration_are_ignored() {
        let (_provider, mut focus) = coordinator();
        assert_eq!(focus.apply(FocusChange::Gained), None);
        assert_eq!(focus.current(), AudioFocus::NoFocus);
    }

    #[test]
    fn duck_volume_is_clamped() {
        let mut focus = AudioFocusCoordinator::new(Arc::new(AlwaysGranted), 3.0);
        focus.request_focus();
        focus.apply(FocusChange::Lost { can_duck: true });
        assert_eq!(focus.volume(), 1.0);

        focus.set_duck_volume(-1.0);
        assert_eq!(focus.volume(), 0.0);

        focus.set_duck_volume(f32::NAN);
        assert_eq!(focus.volume(), 0.0);
    }
}
