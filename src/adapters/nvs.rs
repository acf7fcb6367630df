//! NVS (Non-Volatile Storage) config adapter.
//!
//! Implements [`ConfigPort`] by storing [`FeederConfig`] as a single
//! `postcard` blob under `feeder/cfg`.
//!
//! - **`target_os = "espidf"`**: ESP-IDF NVS, one namespace, atomic per
//!   `nvs_commit()`.
//! - **host**: an in-memory map, so the save/load path is exercised in tests.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::FeederConfig;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg_attr(target_os = "espidf", allow(dead_code))]
const CONFIG_NAMESPACE: &str = "feeder";
#[cfg_attr(target_os = "espidf", allow(dead_code))]
const CONFIG_KEY: &str = "cfg";

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// On first boot or after a layout version change the partition is
    /// erased and re-initialised. Unrecoverable failures return
    /// [`ConfigError::IoError`].
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK
                {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key() -> String {
        format!("{}::{}", CONFIG_NAMESPACE, CONFIG_KEY)
    }

    /// Host-only: plant raw bytes as the stored config.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_put_raw(&self, bytes: &[u8]) {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(), bytes.to_vec());
    }

    /// Open the config namespace, run `f` with the handle, then close it.
    #[cfg(target_os = "espidf")]
    fn with_handle<T>(
        write: bool,
        f: impl FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
    ) -> Result<T, esp_err_t> {
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(c"feeder".as_ptr(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob() -> Result<Option<Vec<u8>>, esp_err_t> {
        let result = Self::with_handle(false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(handle, c"cfg".as_ptr(), core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, c"cfg".as_ptr(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(buf) => Ok(Some(buf)),
            // Namespace is only created on first write.
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Option<Vec<u8>> {
        self.store.borrow().get(&Self::composite_key()).cloned()
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<FeederConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        let blob = self.read_blob();

        #[cfg(target_os = "espidf")]
        let blob = match Self::read_blob() {
            Ok(blob) => blob,
            Err(e) => {
                warn!("NvsAdapter: read error {}, using defaults", e);
                None
            }
        };

        let Some(bytes) = blob else {
            info!("NvsAdapter: no stored config, using defaults");
            return Ok(FeederConfig::default());
        };
        let cfg: FeederConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &FeederConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(), bytes.clone());
        }

        #[cfg(target_os = "espidf")]
        {
            if bytes.len() > MAX_BLOB_SIZE {
                return Err(ConfigError::StorageFull);
            }
            Self::with_handle(true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(handle, c"cfg".as_ptr(), bytes.as_ptr().cast(), bytes.len())
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            })
            .map_err(|e| {
                warn!("NvsAdapter: write error {}", e);
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    ConfigError::StorageFull
                } else {
                    ConfigError::IoError
                }
            })?;
        }

        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
