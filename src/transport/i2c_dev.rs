//! Linux i2c-dev Transport.
//!
//! Drives a bus through the kernel's `/dev/i2c-N` character device. The
//! slave address is bound with the `I2C_SLAVE` ioctl; plain `read(2)` and
//! `write(2)` calls then become single bus transactions.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};

use super::Transport;

/// `I2C_SLAVE` request from `<linux/i2c-dev.h>`.
#[cfg(target_os = "linux")]
const I2C_SLAVE: libc::c_ulong = 0x0703;

/// Transport over a Linux i2c-dev character device.
pub struct I2cDev {
    path: String,
    file: Option<File>,
    selected: Option<u8>,
}

impl I2cDev {
    /// Opens the character device at `path` for reading and writing.
    pub fn open(path: &str) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            path: path.to_string(),
            file: Some(file),
            selected: None,
        })
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "i2c device closed"))
    }
}

impl Transport for I2cDev {
    fn name(&self) -> &str {
        &self.path
    }

    #[cfg(target_os = "linux")]
    fn select(&mut self, address: u8) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        if self.selected == Some(address) {
            return Ok(());
        }
        let fd = self.file()?.as_raw_fd();
        // SAFETY: `fd` is an open descriptor owned by `self.file`, and
        // I2C_SLAVE takes its argument by value.
        let rc = unsafe { libc::ioctl(fd, I2C_SLAVE as _, libc::c_ulong::from(address)) };
        if rc < 0 {
            self.selected = None;
            return Err(io::Error::last_os_error());
        }
        self.selected = Some(address);
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn select(&mut self, _address: u8) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "i2c-dev is only available on Linux",
        ))
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let written = self.file()?.write(bytes)?;
        if written != bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short i2c write: {} of {} bytes", written, bytes.len()),
            ));
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<()> {
        let wanted = buffer.len();
        let read = self.file()?.read(buffer)?;
        if read != wanted {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short i2c read: {} of {} bytes", read, wanted),
            ));
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.selected = None;
        // Dropping the file closes the descriptor.
        self.file.take();
        Ok(())
    }
}
