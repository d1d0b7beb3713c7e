use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use illum_ctl::MAX_DUTY;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SourceSpec {
    /// Generated test pattern; no capture hardware required.
    Synthetic,
    /// Cycle the JPEG files of a directory.
    JpegDir(PathBuf),
}

impl SourceSpec {
    fn from_arg(value: &str) -> Self {
        if value == "synthetic" {
            SourceSpec::Synthetic
        } else {
            SourceSpec::JpegDir(PathBuf::from(value))
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct AppConfig {
    pub(crate) iface: String,
    pub(crate) listen: String,
    pub(crate) source: SourceSpec,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) fps: u32,
    pub(crate) pwm_dir: Option<PathBuf>,
    pub(crate) pwm_period_ns: u64,
    pub(crate) idle_duty: u32,
    pub(crate) verbose: bool,
}

const USAGE: &str = "Usage: ethcam [--iface <name>] [--listen <addr:port>] \
[--source <synthetic|jpeg-dir>] [--width <px>] [--height <px>] [--fps <n>] \
[--pwm <channel-dir>] [--pwm-period-ns <ns>] [--idle-duty <raw>] [--verbose]";

impl AppConfig {
    pub(crate) fn from_args(args: &[String]) -> Result<Self> {
        let mut iface = "eth0".to_string();
        let mut listen = "0.0.0.0:8080".to_string();
        let mut source = SourceSpec::Synthetic;
        let mut width: u32 = 320;
        let mut height: u32 = 240;
        let mut fps: u32 = 15;
        let mut pwm_dir: Option<PathBuf> = None;
        let mut pwm_period_ns: u64 = 1_000_000;
        let mut idle_duty: u32 = 64;
        let mut verbose = false;

        let mut idx = 1;
        while idx < args.len() {
            match args[idx].as_str() {
                "--iface" => {
                    idx += 1;
                    iface = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--iface requires a value"))?
                        .clone();
                    idx += 1;
                }
                "--listen" => {
                    idx += 1;
                    listen = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--listen requires a value"))?
                        .clone();
                    idx += 1;
                }
                "--source" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--source requires a value"))?;
                    source = SourceSpec::from_arg(value);
                    idx += 1;
                }
                "--width" => {
                    idx += 1;
                    width = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--width requires a value"))?
                        .parse::<u32>()
                        .with_context(|| "--width must be a positive integer".to_string())?;
                    idx += 1;
                }
                "--height" => {
                    idx += 1;
                    height = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--height requires a value"))?
                        .parse::<u32>()
                        .with_context(|| "--height must be a positive integer".to_string())?;
                    idx += 1;
                }
                "--fps" => {
                    idx += 1;
                    fps = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--fps requires a value"))?
                        .parse::<u32>()
                        .with_context(|| "--fps must be a positive integer".to_string())?;
                    idx += 1;
                }
                "--pwm" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--pwm requires a value"))?;
                    pwm_dir = Some(PathBuf::from(value));
                    idx += 1;
                }
                "--pwm-period-ns" => {
                    idx += 1;
                    pwm_period_ns = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--pwm-period-ns requires a value"))?
                        .parse::<u64>()
                        .with_context(|| "--pwm-period-ns must be an integer".to_string())?;
                    idx += 1;
                }
                "--idle-duty" => {
                    idx += 1;
                    idle_duty = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--idle-duty requires a value"))?
                        .parse::<u32>()
                        .with_context(|| "--idle-duty must be an integer".to_string())?;
                    idx += 1;
                }
                "--verbose" => {
                    verbose = true;
                    idx += 1;
                }
                "--help" | "-h" => bail!(USAGE),
                arg => bail!("Unrecognised flag: {arg}\n{USAGE}"),
            }
        }

        if width == 0 || height == 0 {
            bail!("--width and --height must be at least 1");
        }
        if fps == 0 {
            bail!("--fps must be at least 1");
        }
        if pwm_period_ns == 0 {
            bail!("--pwm-period-ns must be at least 1");
        }
        if idle_duty > MAX_DUTY {
            bail!("--idle-duty must not exceed {MAX_DUTY}");
        }

        Ok(Self {
            iface,
            listen,
            source,
            width,
            height,
            fps,
            pwm_dir,
            pwm_period_ns,
            idle_duty,
            verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(tail: &[&str]) -> Vec<String> {
        let mut all = vec!["ethcam".to_string()];
        all.extend(tail.iter().map(|s| s.to_string()));
        all
    }

    #[test]
    fn defaults_are_applied_when_no_flags_given() {
        let config = AppConfig::from_args(&args(&[])).expect("defaults parse");
        assert_eq!(config.iface, "eth0");
        assert_eq!(config.listen, "0.0.0.0:8080");
        assert_eq!(config.source, SourceSpec::Synthetic);
        assert_eq!((config.width, config.height, config.fps), (320, 240, 15));
        assert!(config.pwm_dir.is_none());
        assert!(!config.verbose);
    }

    #[test]
    fn flags_override_defaults() {
        let config = AppConfig::from_args(&args(&[
            "--iface", "eth1", "--listen", "127.0.0.1:9000", "--source", "/var/frames", "--fps",
            "30", "--pwm", "/sys/class/pwm/pwmchip0/pwm0", "--idle-duty", "100", "--verbose",
        ]))
        .expect("flags parse");
        assert_eq!(config.iface, "eth1");
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(
            config.source,
            SourceSpec::JpegDir(PathBuf::from("/var/frames"))
        );
        assert_eq!(config.fps, 30);
        assert_eq!(
            config.pwm_dir,
            Some(PathBuf::from("/sys/class/pwm/pwmchip0/pwm0"))
        );
        assert_eq!(config.idle_duty, 100);
        assert!(config.verbose);
    }

    #[test]
    fn non_numeric_dimensions_are_rejected() {
        assert!(AppConfig::from_args(&args(&["--width", "wide"])).is_err());
        assert!(AppConfig::from_args(&args(&["--width", "0"])).is_err());
    }

    #[test]
    fn idle_duty_cannot_exceed_the_pwm_ceiling() {
        assert!(AppConfig::from_args(&args(&["--idle-duty", "4095"])).is_ok());
        assert!(AppConfig::from_args(&args(&["--idle-duty", "4096"])).is_err());
    }

    #[test]
    fn unknown_flags_are_rejected_with_usage() {
        let err = AppConfig::from_args(&args(&["--frobnicate"]))
            .err()
            .expect("unknown flag must fail");
        assert!(err.to_string().contains("Unrecognised flag"));
    }

    #[test]
    fn missing_flag_value_is_rejected() {
        assert!(AppConfig::from_args(&args(&["--iface"])).is_err());
    }
}
