//! Photo-to-photo crossfade.
//!
//! During a switch the outgoing photo's frame must stay renderable until the
//! fade fully completes; retiring it early would flash the background. The
//! session holds both frames in [`TransitionState`] and advances a
//! [`Crossfade`] clock tick by tick.

use std::time::Duration;

use crate::types::{EditState, WorkingCopy};

/// A photo frame retained for rendering during a switch.
#[derive(Debug, Clone)]
pub struct CrossfadeFrame {
    /// Collection index of the photo this frame shows.
    pub index: usize,
    pub working_copy: WorkingCopy,
    pub edit_state: EditState,
}

/// What the host renders while photos overlap.
#[derive(Debug, Clone, Default)]
pub enum TransitionState {
    #[default]
    Idle,
    Crossfading {
        outgoing: CrossfadeFrame,
        incoming: CrossfadeFrame,
    },
}

impl TransitionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, TransitionState::Idle)
    }
}

/// Opacity pair for one animation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossfadeOpacity {
    pub outgoing: f64,
    pub incoming: f64,
}

/// Fixed-duration linear crossfade clock.
///
/// A zero duration completes immediately, which is how headless callers
/// switch photos without animating.
#[derive(Debug)]
pub struct Crossfade {
    duration: Duration,
    elapsed: Duration,
}

impl Crossfade {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            elapsed: Duration::ZERO,
        }
    }

    /// Advance the clock by `dt` and return the opacities to render.
    pub fn tick(&mut self, dt: Duration) -> CrossfadeOpacity {
        self.elapsed = self.elapsed.saturating_add(dt);
        self.opacity()
    }

    /// Opacities at the current position, without advancing.
    pub fn opacity(&self) -> CrossfadeOpacity {
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
        };
        CrossfadeOpacity {
            outgoing: 1.0 - progress,
            incoming: progress,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_is_complete_immediately() {
        let fade = Crossfade::new(Duration::ZERO);
        assert!(fade.is_complete());
        assert_eq!(fade.opacity().incoming, 1.0);
        assert_eq!(fade.opacity().outgoing, 0.0);
    }

    #[test]
    fn opacities_are_complementary_and_monotonic() {
        let mut fade = Crossfade::new(Duration::from_millis(100));
        let mut last_incoming = -1.0;
        while !fade.is_complete() {
            let o = fade.tick(Duration::from_millis(16));
            assert!((o.incoming + o.outgoing - 1.0).abs() < 1e-12);
            assert!(o.incoming > last_incoming);
            last_incoming = o.incoming;
        }
        assert_eq!(fade.opacity().incoming, 1.0);
    }

    #[test]
    fn completes_after_total_duration() {
        let mut fade = Crossfade::new(Duration::from_millis(48));
        fade.tick(Duration::from_millis(16));
        assert!(!fade.is_complete());
        fade.tick(Duration::from_millis(16));
        assert!(!fade.is_complete());
        fade.tick(Duration::from_millis(16));
        assert!(fade.is_complete());
    }

    #[test]
    fn transition_state_defaults_to_idle() {
        assert!(TransitionState::default().is_idle());
    }
}
