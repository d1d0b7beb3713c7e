//! Linux sysfs PWM backend (`/sys/class/pwm/pwmchipN/pwmM`).

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{IllumError, IlluminationControl, MAX_DUTY};

/// An exported sysfs PWM channel programmed with a fixed period.
///
/// The duty register is shared between the lifecycle dispatcher and the HTTP
/// workers, so writes are serialized internally.
pub struct SysfsPwm {
    duty_path: PathBuf,
    period_ns: u64,
    register: Mutex<()>,
}

impl SysfsPwm {
    /// Open an already-exported channel directory, program its period, and
    /// enable the output at duty 0.
    pub fn open(channel_dir: impl AsRef<Path>, period_ns: u64) -> Result<Self, IllumError> {
        let dir = channel_dir.as_ref();
        let program = |name: &str, value: String| {
            fs::write(dir.join(name), value).map_err(|source| IllumError::Unavailable {
                path: dir.to_path_buf(),
                source,
            })
        };
        program("period", period_ns.to_string())?;
        program("duty_cycle", "0".to_string())?;
        program("enable", "1".to_string())?;
        Ok(Self {
            duty_path: dir.join("duty_cycle"),
            period_ns,
            register: Mutex::new(()),
        })
    }
}

impl IlluminationControl for SysfsPwm {
    fn set_duty(&self, raw: u32) -> Result<(), IllumError> {
        let raw = raw.min(MAX_DUTY);
        let ns = self.period_ns * u64::from(raw) / u64::from(MAX_DUTY);
        let _register = match self.register.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        fs::write(&self.duty_path, ns.to_string())?;
        Ok(())
    }
}
