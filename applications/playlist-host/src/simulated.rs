//! Simulated renderer
//!
//! Plays nothing. A worker thread advances a virtual clock and reports
//! preparation, seek completion and end of media through the handle the
//! engine gave it, with configurable latencies.

use playlist_core::{MediaEvent, MediaStatusHandle, MediaType, PlaylistItem, Renderer};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Latencies of the simulated device
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub prepare: Duration,
    pub seek: Duration,

    /// Length of every item
    pub item_length: Duration,
}

/// A pending operation and the handle it must complete through
struct Pending {
    due: Instant,
    handle: MediaStatusHandle,
    event: MediaEvent,
}

#[derive(Default)]
struct Device {
    handle: Option<MediaStatusHandle>,
    pending: Vec<Pending>,
    position_ms: u64,
    playing_since: Option<Instant>,
    duration_ms: u64,
    completed: bool,
    released: bool,
}

impl Device {
    fn position(&self) -> u64 {
        let running = self.playing_since.map_or(0, |since| {
            u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
        });
        self.position_ms
            .saturating_add(running)
            .min(self.duration_ms)
    }

    fn freeze(&mut self) {
        self.position_ms = self.position();
        self.playing_since = None;
    }

    fn schedule(&mut self, after: Duration, event: MediaEvent) {
        if let Some(handle) = self.handle.clone() {
            self.pending.push(Pending {
                due: Instant::now() + after,
                handle,
                event,
            });
        }
    }
}

/// Renderer backed by a virtual clock
pub struct SimulatedRenderer {
    name: String,
    media_type: MediaType,
    timing: Timing,
    device: Arc<Mutex<Device>>,
    worker: Option<JoinHandle<()>>,
}

impl SimulatedRenderer {
    pub fn new(name: impl Into<String>, media_type: MediaType, timing: Timing) -> std::io::Result<Self> {
        let name = name.into();
        let device = Arc::new(Mutex::new(Device::default()));
        let worker_device = Arc::clone(&device);

        let worker = thread::Builder::new()
            .name(format!("sim-{name}"))
            .spawn(move || run_device(&worker_device))?;

        Ok(Self {
            name,
            media_type,
            timing,
            device,
            worker: Some(worker),
        })
    }

    fn device(&self) -> MutexGuard<'_, Device> {
        lock(&self.device)
    }
}

impl Renderer for SimulatedRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn claims(&self, item: &PlaylistItem) -> bool {
        item.media_type.intersects(self.media_type)
    }

    fn play_item(&mut self, item: &PlaylistItem, uri: &str) {
        debug!("[{}] Opening {}", self.name, uri);
        let prepare = self.timing.prepare;
        let length = self.timing.item_length;

        let mut device = self.device();
        device.pending.clear();
        device.position_ms = 0;
        device.playing_since = None;
        device.duration_ms = u64::try_from(length.as_millis()).unwrap_or(u64::MAX);
        device.completed = false;

        // Items without a usable URI fail like a real decoder would
        if uri.is_empty() {
            let message = format!("item {} has no media URI", item.id);
            device.schedule(prepare, MediaEvent::Error { message });
        } else {
            device.schedule(prepare, MediaEvent::Prepared);
        }
    }

    fn play(&mut self) {
        let mut device = self.device();
        if device.playing_since.is_none() {
            device.playing_since = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.device().freeze();
    }

    fn stop(&mut self) {
        let mut device = self.device();
        device.freeze();
        device.pending.clear();
    }

    fn reset(&mut self) {
        let mut device = self.device();
        device.pending.clear();
        device.position_ms = 0;
        device.playing_since = None;
        device.duration_ms = 0;
        device.completed = false;
    }

    fn release(&mut self) {
        self.device().released = true;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("[{}] Device worker panicked", self.name);
            }
        }
    }

    fn set_volume(&mut self, left: f32, right: f32) {
        debug!("[{}] Volume {:.2}/{:.2}", self.name, left, right);
    }

    fn seek_to(&mut self, position_ms: u64) {
        let seek = self.timing.seek;
        let mut device = self.device();
        let resume = device.playing_since.is_some();

        device.position_ms = position_ms.min(device.duration_ms);
        device.playing_since = resume.then(Instant::now);
        device.completed = false;
        device.schedule(seek, MediaEvent::SeekComplete);
    }

    fn current_position(&self) -> u64 {
        self.device().position()
    }

    fn duration(&self) -> u64 {
        self.device().duration_ms
    }

    fn buffered_percent(&self) -> u8 {
        100
    }

    fn set_media_status_listener(&mut self, handle: MediaStatusHandle) {
        self.device().handle = Some(handle);
    }
}

impl Drop for SimulatedRenderer {
    fn drop(&mut self) {
        self.release();
    }
}

fn lock(device: &Mutex<Device>) -> MutexGuard<'_, Device> {
    device.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_device(device: &Mutex<Device>) {
    loop {
        let due = {
            let mut device = lock(device);
            if device.released {
                break;
            }

            let now = Instant::now();
            let (mut due, waiting): (Vec<_>, Vec<_>) =
                device.pending.drain(..).partition(|pending| pending.due <= now);
            device.pending = waiting;

            let reached_end = device.playing_since.is_some()
                && device.duration_ms > 0
                && device.position() >= device.duration_ms;
            if reached_end && !device.completed {
                device.completed = true;
                device.freeze();
                if let Some(handle) = device.handle.clone() {
                    due.push(Pending {
                        due: now,
                        handle,
                        event: MediaEvent::Completed,
                    });
                }
            }

            due
        };

        // Post outside the lock
        for pending in due {
            if !pending.handle.post(pending.event) {
                debug!("Engine gone; dropping device event");
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> Timing {
        Timing {
            prepare: Duration::ZERO,
            seek: Duration::ZERO,
            item_length: Duration::from_secs(60),
        }
    }

    #[test]
    fn claims_configured_type() {
        let renderer = SimulatedRenderer::new("sim", MediaType::AUDIO, timing()).unwrap();
        let song = PlaylistItem::new(1, 1, MediaType::AUDIO, "a.mp3");
        let clip = PlaylistItem::new(2, 1, MediaType::VIDEO, "b.mp4");

        assert!(renderer.claims(&song));
        assert!(!renderer.claims(&clip));
    }

    #[test]
    fn position_is_clamped_to_duration() {
        let mut renderer = SimulatedRenderer::new("sim", MediaType::AUDIO, timing()).unwrap();
        renderer.play_item(&PlaylistItem::new(1, 1, MediaType::AUDIO, "a.mp3"), "a.mp3");

        renderer.seek_to(90_000);
        assert_eq!(renderer.current_position(), 60_000);

        renderer.seek_to(1_000);
        assert_eq!(renderer.current_position(), 1_000);
        assert_eq!(renderer.duration(), 60_000);
    }

    #[test]
    fn paused_position_does_not_advance() {
        let mut renderer = SimulatedRenderer::new("sim", MediaType::AUDIO, timing()).unwrap();
        renderer.play_item(&PlaylistItem::new(1, 1, MediaType::AUDIO, "a.mp3"), "a.mp3");
        renderer.seek_to(5_000);

        let before = renderer.current_position();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(renderer.current_position(), before);
    }
}
