//! Settings record in non-volatile storage.

use esp_idf_hal::sys::EspError;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

use crate::traits::SettingsStore;

/// NVS namespace holding the record.
pub const NVS_NAMESPACE: &str = "relay";

/// Key of the settings blob.
const SETTINGS_KEY: &str = "settings";

/// [`SettingsStore`] on the default NVS partition.
pub struct NvsStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStore {
    /// Open (creating if needed) the settings namespace.
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)?;
        Ok(Self { nvs })
    }
}

impl SettingsStore for NvsStore {
    type Error = EspError;

    fn load(&mut self, buf: &mut [u8]) -> Result<usize, EspError> {
        Ok(self
            .nvs
            .get_blob(SETTINGS_KEY, buf)?
            .map_or(0, |blob| blob.len()))
    }

    fn save(&mut self, record: &[u8]) -> Result<(), EspError> {
        self.nvs.set_blob(SETTINGS_KEY, record)
    }
}
