use crate::{
    config::LoadingConfig,
    tween::{Ease, Tween},
};

/// Counts loaded items and drives the black overlay and loading bar.
///
/// The overlay starts opaque. Once every item is done (loaded or failed), it
/// waits `fade_delay`, fades out over `fade_duration`, and the bar retracts
/// towards the right edge over `bar_exit_duration`.
pub struct LoadingManager {
    items_total: usize,
    items_loaded: usize,
    items_failed: usize,
    config: LoadingConfig,
    overlay_alpha: Tween,
    bar_exit: Option<Tween>,
    ended: bool,
}

/// Horizontal extent of the loading bar in 0..1 screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadingBar {
    pub start: f32,
    pub end: f32,
}

impl LoadingManager {
    pub fn new(config: LoadingConfig) -> Self {
        Self {
            items_total: 0,
            items_loaded: 0,
            items_failed: 0,
            config,
            overlay_alpha: Tween::new(1.0, 1.0, 0.0, Ease::Linear),
            bar_exit: None,
            ended: false,
        }
    }

    pub fn item_start(&mut self, url: &str) {
        self.items_total += 1;
        log::debug!("Loading {}", url);
    }

    pub fn item_end(&mut self, url: &str) {
        self.items_loaded += 1;
        log::info!(
            "Loaded {} ({}/{})",
            url,
            self.items_loaded,
            self.items_total
        );
        self.check_finished();
    }

    /// Failed items still count as done so the overlay does not stay up forever.
    pub fn item_error(&mut self, url: &str, error: &anyhow::Error) {
        self.items_failed += 1;
        self.items_loaded += 1;
        log::error!("Failed to load {}: {:?}", url, error);
        self.check_finished();
    }

    fn check_finished(&mut self) {
        if self.ended || self.items_loaded < self.items_total {
            return;
        }

        self.ended = true;
        log::info!(
            "All {} items loaded ({} failed)",
            self.items_total,
            self.items_failed
        );

        self.overlay_alpha = Tween::new(1.0, 0.0, self.config.fade_duration, Ease::Power1Out)
            .with_delay(self.config.fade_delay);
        self.bar_exit = Some(
            Tween::new(1.0, 0.0, self.config.bar_exit_duration, Ease::Power1Out)
                .with_delay(self.config.fade_delay),
        );
    }

    pub fn update(&mut self, delta_time: f32) {
        self.overlay_alpha.advance(delta_time);

        if let Some(bar_exit) = &mut self.bar_exit {
            bar_exit.advance(delta_time);
        }
    }

    pub fn progress_ratio(&self) -> f32 {
        if self.items_total == 0 {
            return 0.0;
        }

        self.items_loaded as f32 / self.items_total as f32
    }

    pub fn is_finished(&self) -> bool {
        self.ended
    }

    pub fn failed_items(&self) -> usize {
        self.items_failed
    }

    pub fn overlay_alpha(&self) -> f32 {
        self.overlay_alpha.value()
    }

    pub fn loading_bar(&self) -> LoadingBar {
        match &self.bar_exit {
            // Grows from the left while loading
            None => LoadingBar {
                start: 0.0,
                end: self.progress_ratio(),
            },
            // Shrinks towards the right edge once done
            Some(exit) => LoadingBar {
                start: 1.0 - exit.value(),
                end: 1.0,
            },
        }
    }
}
