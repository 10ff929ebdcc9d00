//! The render/control loop's brain.
//!
//! Owns the display state machine (SPECTRUM / METADATA_SCROLL / IDLE),
//! pulls the newest bands and metadata each tick without blocking, applies
//! the time-of-day brightness and composes the frame. Pure with respect to
//! time: `tick` takes the clock values so transitions are testable.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::audio::bands::SpectrumBands;
use crate::config::Settings;
use crate::display::frame::{Frame, Rgb};
use crate::display::render::{self, Scroller, Spinner};
use crate::metadata::TrackMetadata;
use crate::shared::Latest;

/// How long the "no audio" cross stays up before the spinner takes over.
const NO_AUDIO_CROSS_SECS: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Spectrum,
    MetadataScroll,
    Idle,
}

/// Monotonic-clock cooldown gate for one-shot actions.
pub struct Debounce {
    cooldown: Duration,
    last: Option<Instant>,
}

impl Debounce {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: None,
        }
    }

    /// Returns true (and arms the cooldown) unless fired too recently.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.cooldown => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Render-facing state, mutated once per tick, owned here exclusively.
struct DisplayState {
    mode: Mode,
    brightness: f32,
    scroller: Option<Scroller>,
    scroll_started: Instant,
    scroll_deadline: Instant,
    last_scroll_step: Instant,
    spinner: Spinner,
    splash_until: Option<Instant>,
    idle_since: Option<Instant>,
}

pub struct Controller {
    settings: Settings,
    bands: Arc<Latest<SpectrumBands>>,
    metadata: Arc<Latest<TrackMetadata>>,
    state: DisplayState,
    levels: Vec<f32>,
    bands_generation: u64,
    meta_generation: u64,
    track_line: String,
    track_color: Rgb,
    last_audio_active: Instant,
    started: Instant,
    splash_guard: Debounce,
}

impl Controller {
    pub fn new(
        settings: Settings,
        bands: Arc<Latest<SpectrumBands>>,
        metadata: Arc<Latest<TrackMetadata>>,
        now: Instant,
    ) -> Self {
        let n_bands = settings.audio.n_bands;
        let cooldown = Duration::from_secs_f32(settings.display.splash_cooldown_secs);
        Self {
            state: DisplayState {
                mode: Mode::Spectrum,
                brightness: settings.brightness.night,
                scroller: None,
                scroll_started: now,
                scroll_deadline: now,
                last_scroll_step: now,
                spinner: Spinner::new(),
                splash_until: None,
                idle_since: None,
            },
            levels: vec![0.0; n_bands],
            bands_generation: 0,
            meta_generation: 0,
            track_line: String::new(),
            track_color: Rgb::new(255, 255, 255),
            last_audio_active: now,
            started: now,
            splash_guard: Debounce::new(cooldown),
            settings,
            bands,
            metadata,
        }
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.settings.display.tick_hz)
    }

    /// One control cycle: ingest the latest inputs, advance the state
    /// machine, compose the frame.
    pub fn tick(&mut self, now: Instant, hour: f32) -> Frame {
        self.ingest_bands(now);
        self.ingest_metadata(now);
        self.apply_idle_transitions(now);
        self.state.brightness = self.settings.brightness.factor_at(hour);

        let frame = self.compose(now);
        frame
            .scaled(self.state.brightness)
            .rotated(self.settings.display.rotation)
    }

    fn ingest_bands(&mut self, now: Instant) {
        let (bands, generation) = self.bands.peek();
        if generation == self.bands_generation {
            // Analyzer hasn't produced a new cycle: reuse the last levels.
            return;
        }
        self.bands_generation = generation;
        if let Some(bands) = bands {
            if bands.mean > self.settings.audio.silence_threshold {
                self.last_audio_active = now;
            }
            self.levels = bands.levels;
        }
    }

    fn ingest_metadata(&mut self, now: Instant) {
        let (meta, generation) = self.metadata.peek();
        if generation == self.meta_generation {
            return;
        }
        self.meta_generation = generation;
        let Some(meta) = meta else { return };

        if !meta.playing && self.state.mode == Mode::MetadataScroll {
            debug!("playback paused, ending scroll early");
            self.finish_scroll();
        }

        if meta.title.is_empty() {
            // Source disconnected or cleared; nothing worth scrolling.
            self.track_line.clear();
            return;
        }
        let line = meta.display_line();
        if line == self.track_line {
            return;
        }
        info!("track: {}", line);
        self.track_line = line;
        self.track_color = self.settings.colors.source_color(&meta.source_app).into();
        self.start_scroll(now);
    }

    fn start_scroll(&mut self, now: Instant) {
        self.state.mode = Mode::MetadataScroll;
        self.state.scroller = Some(Scroller::new(&self.track_line, self.track_color));
        self.state.scroll_started = now;
        self.state.scroll_deadline =
            now + Duration::from_secs_f32(self.settings.display.scroll_timeout_secs);
        self.state.last_scroll_step = now;
        self.state.idle_since = None;
        if self.settings.display.splash_secs > 0.0 && self.splash_guard.try_fire(now) {
            self.state.splash_until =
                Some(now + Duration::from_secs_f32(self.settings.display.splash_secs));
        }
    }

    fn finish_scroll(&mut self) {
        self.state.mode = Mode::Spectrum;
        self.state.scroller = None;
    }

    fn apply_idle_transitions(&mut self, now: Instant) {
        let grace = Duration::from_secs_f32(self.settings.display.idle_grace_secs);
        let idle_for = now.duration_since(self.last_audio_active);
        match self.state.mode {
            // Silence can cancel a scroll, but the scroll itself gets one
            // grace period first: track metadata often lands a moment
            // before the audio does.
            Mode::MetadataScroll => {
                if idle_for >= grace
                    && now.duration_since(self.state.scroll_started) >= grace
                {
                    debug!("no audio through the scroll, going idle");
                    self.finish_scroll();
                    self.state.mode = Mode::Idle;
                    self.state.idle_since = Some(now);
                }
            }
            Mode::Spectrum if idle_for >= grace => {
                debug!("no audio for {:.1?}, going idle", idle_for);
                self.state.mode = Mode::Idle;
                self.state.idle_since = Some(now);
            }
            Mode::Idle if idle_for < grace => {
                debug!("audio resumed");
                self.state.mode = Mode::Spectrum;
                self.state.idle_since = None;
            }
            _ => {}
        }
    }

    fn compose(&mut self, now: Instant) -> Frame {
        let mut frame = Frame::black();

        if let Some(until) = self.state.splash_until {
            if now < until {
                render::render_note_icon(&mut frame, Rgb::new(255, 255, 255), self.track_color);
                return frame;
            }
            self.state.splash_until = None;
        }

        match self.state.mode {
            Mode::Spectrum => {
                render::render_bars(&mut frame, &self.levels, &self.settings.colors);
            }
            Mode::MetadataScroll => {
                let step_interval = Duration::from_millis(self.settings.display.scroll_step_ms);
                let mut finished = now >= self.state.scroll_deadline;
                if let Some(scroller) = &mut self.state.scroller {
                    scroller.render(&mut frame);
                    if !finished
                        && now.duration_since(self.state.last_scroll_step) >= step_interval
                    {
                        self.state.last_scroll_step = now;
                        finished = scroller.step();
                    }
                } else {
                    finished = true;
                }
                if finished {
                    self.finish_scroll();
                }
            }
            Mode::Idle => {
                let cross = self
                    .state
                    .idle_since
                    .map(|since| {
                        now.duration_since(since) < Duration::from_secs_f32(NO_AUDIO_CROSS_SECS)
                    })
                    .unwrap_or(false);
                if cross {
                    render::render_no_audio(&mut frame, self.settings.colors.error.into());
                } else {
                    self.state.spinner.step();
                    let t = now.duration_since(self.started).as_secs_f32();
                    let pulse = 0.6 + 0.4 * (0.5 + 0.5 * (t * 1.5).sin());
                    self.state
                        .spinner
                        .render(&mut frame, self.settings.colors.spinner.into(), pulse);
                }
            }
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::frame::WIDTH;

    fn test_settings() -> Settings {
        let mut settings = Settings::default();
        settings.display.scroll_step_ms = 0;
        settings.display.splash_secs = 0.0;
        settings.display.rotation = 0;
        settings
    }

    fn controller(settings: Settings) -> (Controller, Arc<Latest<SpectrumBands>>, Arc<Latest<TrackMetadata>>, Instant) {
        let bands = Arc::new(Latest::new());
        let metadata = Arc::new(Latest::new());
        let now = Instant::now();
        let c = Controller::new(settings, bands.clone(), metadata.clone(), now);
        (c, bands, metadata, now)
    }

    fn track(title: &str, artist: &str, app: &str) -> TrackMetadata {
        TrackMetadata {
            title: title.into(),
            artist: artist.into(),
            source_app: app.into(),
            playing: true,
        }
    }

    fn loud_bands(n: usize) -> SpectrumBands {
        SpectrumBands {
            levels: vec![0.8; n],
            mean: 0.8,
        }
    }

    #[test]
    fn new_title_triggers_scroll_within_one_tick() {
        let (mut c, _bands, metadata, t0) = controller(test_settings());
        assert_eq!(c.mode(), Mode::Spectrum);
        metadata.publish(track("Song Title", "The Artist", "AirPlay"));
        c.tick(t0, 12.0);
        assert_eq!(c.mode(), Mode::MetadataScroll);
    }

    #[test]
    fn empty_title_does_not_trigger_scroll() {
        let (mut c, _bands, metadata, t0) = controller(test_settings());
        metadata.publish(track("", "The Artist", "AirPlay"));
        c.tick(t0, 12.0);
        assert_eq!(c.mode(), Mode::Spectrum);
    }

    #[test]
    fn repeated_metadata_does_not_restart_scroll() {
        let (mut c, _bands, metadata, t0) = controller(test_settings());
        metadata.publish(track("Song", "Artist", "AirPlay"));
        c.tick(t0, 12.0);
        // Let the scroll finish completely.
        let mut at = t0;
        for i in 1..2000 {
            at = t0 + Duration::from_millis(50 * i);
            c.tick(at, 12.0);
            if c.mode() != Mode::MetadataScroll {
                break;
            }
        }
        assert_ne!(c.mode(), Mode::MetadataScroll);
        // Same track republished: no new scroll pass.
        metadata.publish(track("Song", "Artist", "AirPlay"));
        c.tick(at + Duration::from_millis(50), 12.0);
        assert_ne!(c.mode(), Mode::MetadataScroll);
    }

    #[test]
    fn scroll_completes_and_returns_to_spectrum() {
        let (mut c, bands, metadata, t0) = controller(test_settings());
        metadata.publish(track("Hi", "", "Spotify"));
        c.tick(t0, 12.0);
        assert_eq!(c.mode(), Mode::MetadataScroll);

        let mut returned = false;
        for i in 1..500 {
            // Keep audio active so idle never interferes after the pass.
            bands.publish(loud_bands(8));
            c.tick(t0 + Duration::from_millis(50 * i), 12.0);
            if c.mode() == Mode::Spectrum {
                returned = true;
                break;
            }
        }
        assert!(returned, "scroll pass never completed");
    }

    #[test]
    fn scroll_times_out() {
        let mut settings = test_settings();
        settings.display.scroll_step_ms = 60_000;
        settings.display.scroll_timeout_secs = 1.0;
        let (mut c, _bands, metadata, t0) = controller(settings);
        metadata.publish(track("Very Long Track Name", "Somebody", ""));
        c.tick(t0, 12.0);
        assert_eq!(c.mode(), Mode::MetadataScroll);
        c.tick(t0 + Duration::from_secs(2), 12.0);
        assert_eq!(c.mode(), Mode::Spectrum);
    }

    #[test]
    fn silence_past_grace_goes_idle_and_audio_resumes() {
        let (mut c, bands, _metadata, t0) = controller(test_settings());
        c.tick(t0, 12.0);
        assert_eq!(c.mode(), Mode::Spectrum);

        // Default grace is 10 s.
        c.tick(t0 + Duration::from_secs(11), 12.0);
        assert_eq!(c.mode(), Mode::Idle);

        bands.publish(loud_bands(8));
        c.tick(t0 + Duration::from_secs(12), 12.0);
        assert_eq!(c.mode(), Mode::Spectrum);
    }

    #[test]
    fn pause_cancels_active_scroll() {
        let (mut c, _bands, metadata, t0) = controller(test_settings());
        metadata.publish(track("Song", "Artist", "AirPlay"));
        c.tick(t0, 12.0);
        assert_eq!(c.mode(), Mode::MetadataScroll);

        let mut paused = track("Song", "Artist", "AirPlay");
        paused.playing = false;
        metadata.publish(paused);
        c.tick(t0 + Duration::from_millis(50), 12.0);
        assert_eq!(c.mode(), Mode::Spectrum);
    }

    #[test]
    fn silent_scroll_yields_to_idle_after_grace() {
        let mut settings = test_settings();
        settings.display.scroll_step_ms = 60_000;
        settings.display.scroll_timeout_secs = 30.0;
        let (mut c, _bands, metadata, t0) = controller(settings);
        metadata.publish(track("Song", "Artist", "AirPlay"));
        c.tick(t0, 12.0);
        assert_eq!(c.mode(), Mode::MetadataScroll);

        // Inside the scroll's own grace allowance it keeps running.
        c.tick(t0 + Duration::from_secs(5), 12.0);
        assert_eq!(c.mode(), Mode::MetadataScroll);

        // Default grace is 10 s; silence through the whole scroll wins.
        c.tick(t0 + Duration::from_secs(11), 12.0);
        assert_eq!(c.mode(), Mode::Idle);
    }

    #[test]
    fn stale_bands_do_not_count_as_activity() {
        let (mut c, bands, _metadata, t0) = controller(test_settings());
        bands.publish(loud_bands(8));
        c.tick(t0, 12.0);
        assert_eq!(c.mode(), Mode::Spectrum);
        // Same snapshot, no new generation: activity must not refresh.
        c.tick(t0 + Duration::from_secs(11), 12.0);
        assert_eq!(c.mode(), Mode::Idle);
    }

    #[test]
    fn brightness_scales_rendered_frame() {
        let (mut c, bands, _metadata, t0) = controller(test_settings());
        bands.publish(loud_bands(8));
        // 02:00 is deep night: default factor 0.01.
        let frame = c.tick(t0, 2.0);
        let mut max_channel = 0u8;
        for y in 0..8 {
            for x in 0..WIDTH {
                let p = frame.get(x, y);
                max_channel = max_channel.max(p.r).max(p.g).max(p.b);
            }
        }
        assert!(max_channel > 0, "nothing rendered");
        assert!(
            max_channel <= 3,
            "night frame too bright: {}",
            max_channel
        );
    }

    #[test]
    fn debounce_gates_repeat_triggers() {
        let t0 = Instant::now();
        let mut guard = Debounce::new(Duration::from_secs(5));
        assert!(guard.try_fire(t0));
        assert!(!guard.try_fire(t0 + Duration::from_secs(1)));
        assert!(guard.try_fire(t0 + Duration::from_secs(6)));
    }
}
