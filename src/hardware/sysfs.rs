//! Linux sysfs GPIO backend
//!
//! Uses the `/sys/class/gpio` export interface. Pin numbers are BCM numbers.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{InputPin, OutputPin};
use crate::{Error, Result};

const GPIO_ROOT: &str = "/sys/class/gpio";

/// Whether the sysfs GPIO interface exists on this host
#[must_use]
pub fn is_supported() -> bool {
    Path::new(GPIO_ROOT).join("export").exists()
}

/// An exported GPIO line with its value file held open
#[derive(Debug)]
pub struct SysfsPin {
    number: u32,
    value: File,
}

impl SysfsPin {
    /// Export `number` as an output driven low
    ///
    /// # Errors
    ///
    /// Returns error if the line cannot be exported or configured
    pub fn output(number: u32) -> Result<Self> {
        Self::open(number, "low")
    }

    /// Export `number` as an input
    ///
    /// # Errors
    ///
    /// Returns error if the line cannot be exported or configured
    pub fn input(number: u32) -> Result<Self> {
        Self::open(number, "in")
    }

    fn open(number: u32, direction: &str) -> Result<Self> {
        let dir = pin_dir(number);
        if !dir.exists() {
            std::fs::write(Path::new(GPIO_ROOT).join("export"), number.to_string())
                .map_err(|e| Error::Hardware(format!("failed to export GPIO {number}: {e}")))?;
            // udev needs a moment to fix permissions on the new node
            std::thread::sleep(Duration::from_millis(50));
        }

        std::fs::write(dir.join("direction"), direction)
            .map_err(|e| Error::Hardware(format!("failed to set GPIO {number} direction: {e}")))?;

        let value = OpenOptions::new()
            .read(true)
            .write(direction != "in")
            .open(dir.join("value"))
            .map_err(|e| Error::Hardware(format!("failed to open GPIO {number}: {e}")))?;

        tracing::debug!(pin = number, direction, "GPIO exported");
        Ok(Self { number, value })
    }

    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }
}

impl OutputPin for SysfsPin {
    fn write(&mut self, high: bool) -> Result<()> {
        self.value.seek(SeekFrom::Start(0))?;
        self.value.write_all(if high { b"1" } else { b"0" })?;
        Ok(())
    }
}

impl InputPin for SysfsPin {
    fn is_high(&mut self) -> Result<bool> {
        let mut buf = [0u8; 1];
        self.value.seek(SeekFrom::Start(0))?;
        self.value.read_exact(&mut buf)?;
        Ok(buf[0] == b'1')
    }
}

fn pin_dir(number: u32) -> PathBuf {
    Path::new(GPIO_ROOT).join(format!("gpio{number}"))
}
