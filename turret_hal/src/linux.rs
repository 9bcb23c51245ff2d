//! Real Linux backend: GPIO character device lines and sysfs PWM.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use gpio_cdev::{Chip, LineHandle as CdevLineHandle, LineRequestFlags};
use tracing::{debug, info};

use crate::backend::{HalBackend, LineHandle, PwmHandle};
use crate::error::DeviceError;

const PWM_SYSFS_ROOT: &str = "/sys/class/pwm";

/// Backend over a real `gpiochip` character device and the sysfs PWM
/// ABI (`/sys/class/pwm/pwmchipN/pwmM/...`).
pub struct LinuxGpioPwmBackend {
    chip: Mutex<Chip>,
    lines: Mutex<HashMap<u32, CdevLineHandle>>,
    pwm_paths: Mutex<HashMap<u32, PathBuf>>,
    next_pwm_handle: Mutex<u32>,
}

impl LinuxGpioPwmBackend {
    /// Open `chip` (e.g. `"gpiochip0"`). Lines are requested lazily via
    /// `get_output`/`get_input`.
    pub fn open(chip: &str) -> Result<Self, DeviceError> {
        let path = if chip.starts_with('/') {
            PathBuf::from(chip)
        } else {
            PathBuf::from("/dev").join(chip)
        };
        let handle = Chip::new(&path).map_err(|e| DeviceError::ChipOpen {
            chip: chip.to_string(),
            source: std::io::Error::other(e.to_string()),
        })?;
        info!(chip = %path.display(), "opened GPIO chip");
        Ok(Self {
            chip: Mutex::new(handle),
            lines: Mutex::new(HashMap::new()),
            pwm_paths: Mutex::new(HashMap::new()),
            next_pwm_handle: Mutex::new(0),
        })
    }

    fn request_line(
        &self,
        offset: u32,
        consumer: &str,
        flags: LineRequestFlags,
        default: u8,
    ) -> Result<LineHandle, DeviceError> {
        let mut chip = self.chip.lock().unwrap();
        let line = chip
            .get_line(offset)
            .map_err(|e| DeviceError::LineRequest {
                offset,
                consumer: consumer.to_string(),
                source: e,
            })?;
        let handle =
            line.request(flags, default, consumer)
                .map_err(|e| DeviceError::LineRequest {
                    offset,
                    consumer: consumer.to_string(),
                    source: e,
                })?;
        self.lines.lock().unwrap().insert(offset, handle);
        debug!(offset, consumer, "requested GPIO line");
        Ok(LineHandle(offset))
    }
}

impl HalBackend for LinuxGpioPwmBackend {
    fn get_output(&self, offset: u32, consumer: &str) -> Result<LineHandle, DeviceError> {
        self.request_line(offset, consumer, LineRequestFlags::OUTPUT, 0)
    }

    fn get_input(&self, offset: u32, consumer: &str) -> Result<LineHandle, DeviceError> {
        self.request_line(offset, consumer, LineRequestFlags::INPUT, 0)
    }

    fn set(&self, line: LineHandle, value: u8) -> Result<(), DeviceError> {
        let lines = self.lines.lock().unwrap();
        let handle = lines.get(&line.0).ok_or(DeviceError::UnknownHandle)?;
        handle.set_value(value)?;
        Ok(())
    }

    fn read(&self, line: LineHandle) -> Result<u8, DeviceError> {
        let lines = self.lines.lock().unwrap();
        let handle = lines.get(&line.0).ok_or(DeviceError::UnknownHandle)?;
        Ok(handle.get_value()?)
    }

    fn release(&self, line: LineHandle) -> Result<(), DeviceError> {
        self.lines.lock().unwrap().remove(&line.0);
        Ok(())
    }

    fn pwm_export(&self, chip: u32, channel: u32) -> Result<PwmHandle, DeviceError> {
        let chip_dir = PathBuf::from(PWM_SYSFS_ROOT).join(format!("pwmchip{chip}"));
        let channel_dir = chip_dir.join(format!("pwm{channel}"));
        if !channel_dir.exists() {
            fs::write(chip_dir.join("export"), channel.to_string().as_bytes())
                .map_err(DeviceError::PwmIo)?;
        }
        let mut next = self.next_pwm_handle.lock().unwrap();
        let id = *next;
        *next += 1;
        self.pwm_paths.lock().unwrap().insert(id, channel_dir);
        Ok(PwmHandle(id))
    }

    fn pwm_set_period_ns(&self, pwm: PwmHandle, ns: u64) -> Result<(), DeviceError> {
        let paths = self.pwm_paths.lock().unwrap();
        let dir = paths.get(&pwm.0).ok_or(DeviceError::UnknownHandle)?;
        fs::write(dir.join("period"), ns.to_string().as_bytes()).map_err(DeviceError::PwmIo)
    }

    fn pwm_set_duty_ns(&self, pwm: PwmHandle, ns: u64) -> Result<(), DeviceError> {
        let paths = self.pwm_paths.lock().unwrap();
        let dir = paths.get(&pwm.0).ok_or(DeviceError::UnknownHandle)?;
        fs::write(dir.join("duty_cycle"), ns.to_string().as_bytes()).map_err(DeviceError::PwmIo)
    }

    fn pwm_enable(&self, pwm: PwmHandle, on: bool) -> Result<(), DeviceError> {
        let paths = self.pwm_paths.lock().unwrap();
        let dir = paths.get(&pwm.0).ok_or(DeviceError::UnknownHandle)?;
        let v = if on { b"1".as_ref() } else { b"0".as_ref() };
        fs::write(dir.join("enable"), v).map_err(DeviceError::PwmIo)
    }

    fn pwm_unexport(&self, pwm: PwmHandle) -> Result<(), DeviceError> {
        let mut paths = self.pwm_paths.lock().unwrap();
        if let Some(dir) = paths.remove(&pwm.0) {
            if let Some(chip_dir) = dir.parent() {
                if let Some(channel) = dir
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_prefix("pwm"))
                {
                    let _ = fs::write(chip_dir.join("unexport"), channel.as_bytes());
                }
            }
        }
        Ok(())
    }
}
