//! Illumination control: a single PWM-driven brightness channel.
//!
//! The appliance's LED head is a 12-bit PWM output. Callers work either in
//! raw duty units (`[0, MAX_DUTY]`) or in percent via
//! [`duty_from_percent`]; both clamp so the register can never be driven
//! past its ceiling.

use std::{io, path::PathBuf};

use thiserror::Error;
use tracing::debug;

pub use sysfs::SysfsPwm;

mod sysfs;

/// Hardware duty-cycle ceiling of the 12-bit PWM peripheral.
pub const MAX_DUTY: u32 = 4095;

/// Map a `[0, 100]` brightness percentage onto the raw duty range.
///
/// Inputs past 100 are accepted and clamp at [`MAX_DUTY`].
pub fn duty_from_percent(percent: u32) -> u32 {
    let scaled = u64::from(percent) * (u64::from(MAX_DUTY) + 1) / 100;
    scaled.min(u64::from(MAX_DUTY)) as u32
}

/// Capability driving the illumination duty-cycle register.
pub trait IlluminationControl: Send + Sync {
    /// Set the raw duty value. Values above [`MAX_DUTY`] are clamped.
    fn set_duty(&self, raw: u32) -> Result<(), IllumError>;
}

#[derive(Debug, Error)]
pub enum IllumError {
    #[error("pwm channel unavailable at {path:?}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("pwm register write failed")]
    Write(#[from] io::Error),
}

/// Stand-in used when the appliance runs without an illumination head.
pub struct NullIllumination;

impl IlluminationControl for NullIllumination {
    fn set_duty(&self, raw: u32) -> Result<(), IllumError> {
        debug!("illumination disabled; ignoring duty {}", raw.min(MAX_DUTY));
        Ok(())
    }
}
