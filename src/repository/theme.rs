use std::sync::Arc;

use crate::app::Result;
use crate::store::PreferenceStore;

const PREFS_NAMESPACE: &str = "newsbite_prefs";
const KEY_DARK_MODE: &str = "dark_mode";

/// Persisted dark-mode preference. Defaults to light.
pub struct ThemeManager<S> {
    store: Arc<S>,
}

impl<S: PreferenceStore> ThemeManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn is_dark_mode(&self) -> Result<bool> {
        let value = self.store.get_preference(PREFS_NAMESPACE, KEY_DARK_MODE)?;
        Ok(value.as_deref() == Some("true"))
    }

    pub fn set_dark_mode(&self, dark: bool) -> Result<()> {
        self.store
            .set_preference(PREFS_NAMESPACE, KEY_DARK_MODE, if dark { "true" } else { "false" })
    }

    /// Flips the preference and returns the new value.
    pub fn toggle(&self) -> Result<bool> {
        let dark = !self.is_dark_mode()?;
        self.set_dark_mode(dark)?;
        Ok(dark)
    }
}
