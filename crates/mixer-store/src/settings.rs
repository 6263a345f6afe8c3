use mixer_core::settings::MixerSettings;

use crate::{db::Store, error::StoreError};

const SETTINGS_KEY: &str = "mixer.settings";

impl Store {
    pub async fn load_settings(&self) -> Result<MixerSettings, StoreError> {
        match self.get_config(SETTINGS_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(MixerSettings::default()),
        }
    }

    pub async fn save_settings(&self, settings: &MixerSettings) -> Result<(), StoreError> {
        let data = serde_json::to_string(settings)?;
        self.set_config(SETTINGS_KEY, &data).await
    }
}
