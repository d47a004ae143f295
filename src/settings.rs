//! Player preferences
//!
//! Persisted separately from the profile in LocalStorage.

use serde::{Deserialize, Serialize};

/// Toggleable preferences. Everything here is cosmetic or input-related;
/// nothing in the simulation reads these directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Mouse aim override; `None` falls back to the device heuristic
    /// (fine pointer plus hover support)
    pub mouse_aim: Option<bool>,

    // === Audio ===
    /// Background music
    pub music: bool,
    /// One-shot effect sounds
    pub sfx: bool,

    // === Behavior ===
    /// Pause automatically when the tab loses focus
    pub pause_on_blur: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mouse_aim: None,
            music: true,
            sfx: true,
            pause_on_blur: true,
        }
    }
}

impl Settings {
    /// Effective mouse aim, given whether the device has a fine pointer
    pub fn mouse_aim_enabled(&self, fine_pointer: bool) -> bool {
        self.mouse_aim.unwrap_or(fine_pointer)
    }

    /// Flip mouse aim, pinning the choice so it survives reloads
    pub fn toggle_mouse_aim(&mut self, fine_pointer: bool) -> bool {
        let next = !self.mouse_aim_enabled(fine_pointer);
        self.mouse_aim = Some(next);
        next
    }

    /// LocalStorage key
    const STORAGE_KEY: &'static str = "yolk_drift_settings_v1";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match serde_json::from_str(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(err) => log::warn!("Stored settings unreadable, resetting: {}", err),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}
