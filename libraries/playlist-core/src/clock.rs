//! Playback clock with overridable position and duration
//!
//! Some streams report a position that keeps growing across items (gapless
//! live streams) or no duration at all. For those the host can override the
//! position with a stopwatch plus offset, and the duration with a fixed
//! value.

use crate::renderer::Renderer;
use crate::types::MediaProgress;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Accumulating stopwatch
#[derive(Debug, Clone, Default)]
pub struct StopWatch {
    /// Time accumulated by earlier runs
    accumulated: Duration,

    /// Start of the current run
    started_at: Option<Instant>,
}

impl StopWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Start (or keep) running
    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Stop and keep the accumulated time
    pub fn stop(&mut self) {
        if let Some(started_at) = self.started_at.take() {
            self.accumulated += started_at.elapsed();
        }
    }

    /// Zero the accumulated time; a running stopwatch keeps running
    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Replace the accumulated time
    pub fn override_time(&mut self, time: Duration) {
        self.accumulated = time;
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Total elapsed time
    pub fn time(&self) -> Duration {
        self.accumulated
            + self
                .started_at
                .map_or(Duration::ZERO, |started_at| started_at.elapsed())
    }
}

/// Host adjustments to the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockOverride {
    /// Report the stopwatch (plus offset) instead of the renderer position
    OverridePosition(bool),

    /// Report a fixed duration instead of the renderer duration
    OverrideDuration(bool),

    /// Offset added to the stopwatch, in milliseconds
    PositionOffset(u64),

    /// Fixed duration in milliseconds
    Duration(u64),

    /// Zero the stopwatch and offset
    RestartPosition,

    /// Set the stopwatch to this many milliseconds, keeping the offset
    SetPosition(u64),
}

/// Position, duration and buffer level of the active renderer
#[derive(Debug, Clone, Default)]
pub struct ProgressClock {
    stopwatch: StopWatch,
    override_position: bool,
    override_duration: bool,
    position_offset_ms: u64,
    overridden_duration_ms: u64,
}

impl ProgressClock {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Stopwatch (driven in lockstep with the ticker) =====

    pub fn start(&mut self) {
        self.stopwatch.start();
    }

    pub fn stop(&mut self) {
        self.stopwatch.stop();
    }

    /// Zero the stopwatch and offsets
    pub fn reset(&mut self) {
        self.stopwatch.reset();
        self.position_offset_ms = 0;
    }

    // ===== Overrides =====

    pub fn apply(&mut self, change: ClockOverride) {
        match change {
            ClockOverride::OverridePosition(enabled) => self.override_position = enabled,
            ClockOverride::OverrideDuration(enabled) => self.override_duration = enabled,
            ClockOverride::PositionOffset(offset_ms) => self.position_offset_ms = offset_ms,
            ClockOverride::Duration(duration_ms) => self.overridden_duration_ms = duration_ms,
            ClockOverride::RestartPosition => self.reset(),
            ClockOverride::SetPosition(position_ms) => {
                self.stopwatch
                    .override_time(Duration::from_millis(position_ms));
            }
        }
    }

    pub fn is_position_overridden(&self) -> bool {
        self.override_position
    }

    pub fn is_duration_overridden(&self) -> bool {
        self.override_duration
    }

    // ===== Sampling =====

    /// Position in milliseconds (0 without a renderer)
    pub fn position(&self, renderer: Option<&dyn Renderer>) -> u64 {
        let Some(renderer) = renderer else {
            return 0;
        };

        if self.override_position {
            let elapsed = u64::try_from(self.stopwatch.time().as_millis()).unwrap_or(u64::MAX);
            elapsed.saturating_add(self.position_offset_ms)
        } else {
            renderer.current_position()
        }
    }

    /// Duration in milliseconds (0 without a renderer)
    pub fn duration(&self, renderer: Option<&dyn Renderer>) -> u64 {
        match renderer {
            None => 0,
            Some(_) if self.override_duration => self.overridden_duration_ms,
            Some(renderer) => renderer.duration(),
        }
    }

    /// Buffered percentage (0 without a renderer)
    pub fn buffered_percent(&self, renderer: Option<&dyn Renderer>) -> u8 {
        renderer.map_or(0, |renderer| renderer.buffered_percent().min(100))
    }

    /// Clamped progress snapshot
    pub fn sample(&self, renderer: Option<&dyn Renderer>) -> MediaProgress {
        MediaProgress::new(
            self.position(renderer),
            self.buffered_percent(renderer),
            self.duration(renderer),
        )
    }
}
