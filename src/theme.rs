use std::{fmt, sync::Arc};

use sodium::{Cell, Listener, SodiumCtx, Stream};
use tracing::{debug, warn};

use crate::store::PreferenceStore;

/// Preference key the theme marker is stored under.
pub const THEME_KEY: &str = "theme";

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    /// Anything other than the exact `"dark"` marker is light.
    pub fn from_marker(marker: Option<&str>) -> Theme {
        match marker {
            Some("dark") => Theme::Dark,
            _ => Theme::Light,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggle(&self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn is_dark(&self) -> bool {
        matches!(self, Theme::Dark)
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// Puts a theme on screen.
pub trait ThemeApplier: Send + Sync {
    fn apply(&self, theme: Theme);
}

pub struct ThemeManager {
    pub theme: Cell<Theme>,
    pub is_dark: Cell<bool>,
    _effect: Listener,
}

impl ThemeManager {
    /// Loads the saved theme and flips it on every `toggles` event.
    ///
    /// The current theme is applied and written back to `store` once at
    /// construction and again after every change.
    pub fn new(
        ctx: &SodiumCtx,
        toggles: &Stream<()>,
        store: Arc<dyn PreferenceStore>,
        applier: Arc<dyn ThemeApplier>,
    ) -> ThemeManager {
        let saved = store.get(THEME_KEY);
        let initial = Theme::from_marker(saved.as_deref());
        debug!(saved = ?saved, theme = %initial, "loaded theme preference");

        ctx.transaction(|| {
            let theme = toggles.accum(initial, |_: &(), theme: &Theme| theme.toggle());
            let is_dark = theme.map(|theme: &Theme| theme.is_dark());

            let effect = theme.listen(move |theme: &Theme| {
                debug!(theme = %theme, "applying theme");
                applier.apply(*theme);
                if let Err(err) = store.set(THEME_KEY, theme.marker()) {
                    warn!(%err, theme = %theme, "failed to persist theme");
                }
            });

            ThemeManager {
                theme,
                is_dark,
                _effect: effect,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use sodium::StreamSink;

    use super::*;
    use crate::{store::MemoryStore, Error};

    #[derive(Default)]
    struct RecordingApplier {
        applied: Mutex<Vec<Theme>>,
    }

    impl ThemeApplier for RecordingApplier {
        fn apply(&self, theme: Theme) {
            self.applied.lock().push(theme);
        }
    }

    struct BrokenStore;

    impl PreferenceStore for BrokenStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), Error> {
            Err(Error::Store("read-only".to_string()))
        }
    }

    fn build(
        store: Arc<dyn PreferenceStore>,
    ) -> (StreamSink<()>, ThemeManager, Arc<RecordingApplier>) {
        let ctx = SodiumCtx::new();
        let toggles: StreamSink<()> = ctx.new_stream_sink();
        let applier = Arc::new(RecordingApplier::default());
        let manager = ThemeManager::new(&ctx, &toggles.stream(), store, applier.clone());
        (toggles, manager, applier)
    }

    #[test]
    fn markers() {
        assert_eq!(Theme::from_marker(Some("dark")), Theme::Dark);
        assert_eq!(Theme::from_marker(Some("light")), Theme::Light);
        assert_eq!(Theme::from_marker(Some("Dark")), Theme::Light);
        assert_eq!(Theme::from_marker(Some("")), Theme::Light);
        assert_eq!(Theme::from_marker(None), Theme::Light);
        assert_eq!(Theme::Dark.toggle(), Theme::Light);
    }

    #[test]
    fn defaults_to_light_and_applies_on_startup() {
        let store = Arc::new(MemoryStore::new());
        let (_toggles, manager, applier) = build(store.clone());
        assert_eq!(manager.theme.sample(), Theme::Light);
        assert!(!manager.is_dark.sample());
        assert_eq!(*applier.applied.lock(), vec![Theme::Light]);
        assert_eq!(store.get(THEME_KEY).as_deref(), Some("light"));
    }

    #[test]
    fn toggle_persists_and_reloads_dark() {
        let store = Arc::new(MemoryStore::new());
        {
            let (toggles, manager, applier) = build(store.clone());
            toggles.send(());
            assert!(manager.is_dark.sample());
            assert_eq!(store.get(THEME_KEY).as_deref(), Some("dark"));
            assert_eq!(*applier.applied.lock(), vec![Theme::Light, Theme::Dark]);
        }

        let (_toggles, manager, applier) = build(store);
        assert!(manager.is_dark.sample());
        assert_eq!(*applier.applied.lock(), vec![Theme::Dark]);
    }

    #[test]
    fn toggling_twice_restores_saved_theme() {
        let store = Arc::new(MemoryStore::with_value(THEME_KEY, "dark"));
        let (toggles, manager, _applier) = build(store.clone());
        toggles.send(());
        toggles.send(());
        assert_eq!(manager.theme.sample(), Theme::Dark);
        assert_eq!(store.get(THEME_KEY).as_deref(), Some("dark"));
    }

    #[test]
    fn unknown_marker_starts_light() {
        let store = Arc::new(MemoryStore::with_value(THEME_KEY, "solarized"));
        let (_toggles, manager, _applier) = build(store.clone());
        assert_eq!(manager.theme.sample(), Theme::Light);
        assert_eq!(store.get(THEME_KEY).as_deref(), Some("light"));
    }

    #[test]
    fn persist_failure_still_toggles() {
        let (toggles, manager, applier) = build(Arc::new(BrokenStore));
        toggles.send(());
        assert_eq!(manager.theme.sample(), Theme::Dark);
        assert_eq!(*applier.applied.lock(), vec![Theme::Light, Theme::Dark]);
    }
}
