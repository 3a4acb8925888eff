//! Integration tests for the device register cache.

use std::io;

use openservo::common::{Error, Result, TransportOp};
use openservo::registers::{Register, SPACE_SIZE};
use openservo::servo::{Channel, Device};

const ADDR: u8 = 0x10;

/// A channel backed by a flat register image that records every call.
struct RecordingChannel {
    image: [u8; SPACE_SIZE],
    sends: Vec<(u8, u8, Vec<u8>)>,
    receives: Vec<(u8, u8, usize)>,
    sends_until_failure: Option<usize>,
    fail_receives: bool,
}

impl RecordingChannel {
    fn new() -> Self {
        let mut image = [0u8; SPACE_SIZE];
        image[Register::Type.offset()] = 1;
        image[Register::VersionMinor.offset()] = 10;
        image[Register::Address.offset()] = ADDR;
        image[Register::Position.offset()] = 0x01;
        image[Register::Position.offset() + 1] = 0xF4;
        Self {
            image,
            sends: Vec::new(),
            receives: Vec::new(),
            sends_until_failure: None,
            fail_receives: false,
        }
    }

    fn clear(&mut self) {
        self.sends.clear();
        self.receives.clear();
    }

    fn data_sends(&self) -> Vec<(u8, Vec<u8>)> {
        self.sends
            .iter()
            .filter(|(_, _, data)| !data.is_empty())
            .map(|(_, reg, data)| (*reg, data.clone()))
            .collect()
    }

    fn commands(&self) -> Vec<u8> {
        self.sends
            .iter()
            .filter(|(_, _, data)| data.is_empty())
            .map(|(_, code, _)| *code)
            .collect()
    }
}

fn timeout(op: TransportOp) -> Error {
    Error::TransportUnavailable {
        op,
        source: io::Error::new(io::ErrorKind::TimedOut, "no ack"),
    }
}

impl Channel for RecordingChannel {
    fn send(&mut self, address: u8, register: u8, data: &[u8]) -> Result<()> {
        if let Some(remaining) = self.sends_until_failure.as_mut() {
            if *remaining == 0 {
                return Err(timeout(TransportOp::Write));
            }
            *remaining -= 1;
        }
        if !data.is_empty() {
            let start = register as usize;
            self.image[start..start + data.len()].copy_from_slice(data);
        }
        self.sends.push((address, register, data.to_vec()));
        Ok(())
    }

    fn receive(&mut self, address: u8, register: u8, data: &mut [u8]) -> Result<()> {
        if self.fail_receives {
            return Err(timeout(TransportOp::Read));
        }
        let start = register as usize;
        data.copy_from_slice(&self.image[start..start + data.len()]);
        self.receives.push((address, register, data.len()));
        Ok(())
    }
}

/// Creates an attached device and a channel with its construction traffic cleared.
fn attached() -> (Device, RecordingChannel) {
    let mut channel = RecordingChannel::new();
    let device = Device::attach(&mut channel, ADDR).unwrap();
    channel.clear();
    (device, channel)
}

/// Tests that construction performs one full refresh.
#[test]
fn test_attach_reads_full_space() {
    let mut channel = RecordingChannel::new();
    let device = Device::attach(&mut channel, ADDR).unwrap();

    assert!(channel.sends.is_empty());
    assert_eq!(channel.receives, vec![(ADDR, 0x00, 0x36)]);
    assert_eq!(device.address(), ADDR);
    assert_eq!(device.value(Register::Address), ADDR as u16);
    assert_eq!(device.value(Register::Position), 500);
    assert_eq!(device.version(), (0, 10));
    assert!(device.is_locked());
    assert!(!device.has_pending());
}

/// Tests that a failed initial refresh produces no device.
#[test]
fn test_attach_fails_when_refresh_fails() {
    let mut channel = RecordingChannel::new();
    channel.fail_receives = true;

    let err = Device::attach(&mut channel, ADDR).unwrap_err();
    assert!(err.is_transport());
}

/// Tests that set followed by get returns the value truncated to the register width.
#[test]
fn test_set_get_truncates_to_width() {
    let (mut device, _) = attached();
    device.unlock();

    for &reg in Register::ALL {
        if !reg.access().is_writable() {
            continue;
        }
        device.write(reg, 0x1_A5C3).unwrap();
        let expected = if reg.width() == 2 { 0xA5C3 } else { 0xC3 };
        assert_eq!(device.value(reg), expected, "{}", reg.name());
        assert_eq!(device.get(reg.name()).unwrap(), expected);
    }
}

/// Tests that two-byte values are stored big-endian.
#[test]
fn test_set_stores_big_endian() {
    let (mut device, _) = attached();
    device.set("seek", 512).unwrap();

    let offset = Register::Seek.offset();
    assert_eq!(device.registers()[offset], 0x02);
    assert_eq!(device.registers()[offset + 1], 0x00);
}

/// Tests that mixed-case and underscore names reach the same register.
#[test]
fn test_names_are_normalized() {
    let (mut device, _) = attached();
    device.set("Seek_Velocity", 7).unwrap();

    assert_eq!(device.get("seek.velocity").unwrap(), 7);
    assert_eq!(device.get("SEEK_VELOCITY").unwrap(), 7);
}

/// Tests that unknown names are reported instead of read as zero.
#[test]
fn test_unknown_register() {
    let (mut device, _) = attached();

    assert!(matches!(device.get("pwm"), Err(Error::UnknownRegister(name)) if name == "pwm"));
    assert!(matches!(device.set("bogus", 1), Err(Error::UnknownRegister(_))));
    assert!(!device.has_pending());
}

/// Tests that read-only registers reject writes without side effects.
#[test]
fn test_read_only_rejected() {
    let (mut device, _) = attached();
    let before = device.clone();

    for name in ["type", "position", "flags", "pwm.cw"] {
        assert!(matches!(device.set(name, 42), Err(Error::ReadOnlyRegister(_))));
    }
    device.unlock();
    assert!(matches!(device.set("velocity", 1), Err(Error::ReadOnlyRegister("velocity"))));

    assert_eq!(device.registers(), before.registers());
    assert!(!device.has_pending());
}

/// Tests that protected registers need an unlock.
#[test]
fn test_protected_requires_unlock() {
    let (mut device, _) = attached();

    assert!(matches!(device.set("pid.deadband", 5), Err(Error::Locked("pid.deadband"))));
    assert!(!device.is_dirty(Register::PidDeadband));

    device.unlock();
    device.set("pid.deadband", 5).unwrap();
    assert!(device.is_dirty(Register::PidDeadband));
    assert_eq!(device.pending_runs(), vec![0x21..0x22]);
}

/// Tests that adjacent writes are coalesced into one transaction.
#[test]
fn test_adjacent_writes_coalesce() {
    let (mut device, mut channel) = attached();
    device.set("seek", 0x0123).unwrap();
    device.set("seek.velocity", 0x0456).unwrap();
    assert_eq!(device.pending_runs(), vec![0x10..0x14]);

    device.update(&mut channel, false).unwrap();

    assert_eq!(
        channel.data_sends(),
        vec![(0x10, vec![0x01, 0x23, 0x04, 0x56])]
    );
    assert!(channel.commands().is_empty());
    assert!(!device.has_pending());
}

/// Tests that repeated writes to one register cost a single transaction.
#[test]
fn test_rewrites_before_flush_coalesce() {
    let (mut device, mut channel) = attached();
    device.set("seek", 100).unwrap();
    device.set("seek", 200).unwrap();
    device.set("seek", 300).unwrap();

    device.update(&mut channel, false).unwrap();

    assert_eq!(channel.data_sends(), vec![(0x10, vec![0x01, 0x2C])]);
    assert_eq!(device.value(Register::Seek), 300);
}

/// Tests that non-adjacent writes become separate transactions wrapped in write-enable.
#[test]
fn test_non_adjacent_writes_split() {
    let (mut device, mut channel) = attached();
    device.unlock();
    device.set("seek", 512).unwrap();
    device.set("cutoff", 0x0300).unwrap();

    device.update(&mut channel, false).unwrap();

    assert_eq!(
        channel.data_sends(),
        vec![(0x10, vec![0x02, 0x00]), (0x32, vec![0x03, 0x00])]
    );
    assert_eq!(channel.commands(), vec![0x84, 0x85]);
    assert_eq!(channel.sends.first().map(|s| s.1), Some(0x84));
    assert_eq!(channel.sends.last().map(|s| s.1), Some(0x85));
    assert!(device.is_locked());
}

/// Tests that an unlock without protected writes still issues the enable pair.
#[test]
fn test_unlock_without_writes() {
    let (mut device, mut channel) = attached();
    device.unlock();

    device.update(&mut channel, false).unwrap();

    assert_eq!(channel.commands(), vec![0x84, 0x85]);
    assert!(channel.data_sends().is_empty());
    assert!(device.is_locked());
}

/// Tests the refresh window of a status update and a full update.
#[test]
fn test_update_refresh_windows() {
    let (mut device, mut channel) = attached();

    device.update(&mut channel, false).unwrap();
    assert_eq!(channel.receives, vec![(ADDR, 0x04, 18)]);

    channel.clear();
    device.update(&mut channel, true).unwrap();
    assert_eq!(channel.receives, vec![(ADDR, 0x00, 0x36)]);
}

/// Tests that the refresh picks up values changed on the device.
#[test]
fn test_update_refreshes_cache() {
    let (mut device, mut channel) = attached();
    channel.image[Register::Position.offset()] = 0x03;
    channel.image[Register::Position.offset() + 1] = 0x00;
    channel.image[Register::Cutoff.offset()] = 0x01;

    device.update(&mut channel, false).unwrap();
    assert_eq!(device.value(Register::Position), 0x0300);
    assert_eq!(device.value(Register::Cutoff), 0);

    device.update(&mut channel, true).unwrap();
    assert_eq!(device.value(Register::Cutoff), 0x0100);
}

/// Tests that a failed flush keeps unsent runs dirty and a retry resumes.
#[test]
fn test_partial_flush_failure_and_retry() {
    let (mut device, mut channel) = attached();
    device.unlock();
    device.set("seek", 512).unwrap();
    device.set("cutoff", 0x0300).unwrap();

    // write-enable and the seek run go through, the cutoff run fails
    channel.sends_until_failure = Some(2);
    let err = device.update(&mut channel, false).unwrap_err();

    assert!(matches!(
        err,
        Error::PartialFlushFailure {
            address: ADDR,
            flushed: 1,
            total: 2,
            ..
        }
    ));
    assert!(err.is_transport());
    assert!(!device.is_dirty(Register::Seek));
    assert!(device.is_dirty(Register::Cutoff));
    assert!(!device.is_locked());
    assert!(channel.receives.is_empty());

    channel.clear();
    channel.sends_until_failure = None;
    device.update(&mut channel, false).unwrap();

    assert_eq!(channel.data_sends(), vec![(0x32, vec![0x03, 0x00])]);
    assert_eq!(channel.commands(), vec![0x84, 0x85]);
    assert!(device.is_locked());
    assert!(!device.has_pending());
}

/// Tests that a failure on the first run is reported as a transport error.
#[test]
fn test_first_run_failure_keeps_everything_dirty() {
    let (mut device, mut channel) = attached();
    device.set("seek", 1).unwrap();
    device.set("voltage", 2).unwrap();

    channel.sends_until_failure = Some(0);
    let err = device.update(&mut channel, false).unwrap_err();

    assert!(matches!(
        err,
        Error::TransportUnavailable {
            op: TransportOp::Write,
            ..
        }
    ));
    assert_eq!(device.pending_runs(), vec![0x10..0x12, 0x14..0x16]);
    assert!(device.is_locked());
}

/// Tests that a failed write-enable leaves the device unlocked and dirty.
#[test]
fn test_write_enable_failure() {
    let (mut device, mut channel) = attached();
    device.unlock();
    device.set("servo", 9).unwrap();

    channel.sends_until_failure = Some(0);
    assert!(device.update(&mut channel, false).is_err());

    assert!(!device.is_locked());
    assert!(device.is_dirty(Register::Servo));
}

/// Tests that a failed refresh keeps the cached values.
#[test]
fn test_refresh_failure_keeps_cache() {
    let (mut device, mut channel) = attached();
    device.set("seek", 700).unwrap();
    channel.fail_receives = true;

    assert!(device.update(&mut channel, false).is_err());
    assert_eq!(device.value(Register::Seek), 700);
    assert_eq!(device.value(Register::Position), 500);
    assert!(!device.is_dirty(Register::Seek));
}

/// Tests that a confirmed write-disable re-locks even if the refresh fails.
#[test]
fn test_refresh_failure_after_write_disable_relocks() {
    let (mut device, mut channel) = attached();
    device.unlock();
    device.set("cutoff", 0x0200).unwrap();
    channel.fail_receives = true;

    assert!(device.update(&mut channel, false).is_err());
    assert!(device.is_locked());
    assert!(!device.is_dirty(Register::Cutoff));
    assert_eq!(channel.commands(), vec![0x84, 0x85]);
    assert!(matches!(
        device.set("pid.deadband", 4),
        Err(Error::Locked("pid.deadband"))
    ));

    channel.clear();
    channel.fail_receives = false;
    device.update(&mut channel, false).unwrap();

    assert!(channel.data_sends().is_empty());
    assert!(channel.commands().is_empty());
    assert!(device.is_locked());
}

/// Tests that each command sends its code as a zero-length transaction.
#[test]
fn test_commands() {
    let (device, mut channel) = attached();

    device.reset(&mut channel).unwrap();
    device.enable(&mut channel).unwrap();
    device.disable(&mut channel).unwrap();
    device.registers_commit(&mut channel).unwrap();
    device.registers_restore(&mut channel).unwrap();
    device.registers_default(&mut channel).unwrap();

    assert_eq!(channel.commands(), vec![0x80, 0x82, 0x83, 0x86, 0x87, 0x88]);
    assert!(channel.sends.iter().all(|(addr, _, _)| *addr == ADDR));
}

/// Tests that a pending address change keeps routing to the discovery address.
#[test]
fn test_address_register_does_not_reroute() {
    let (mut device, mut channel) = attached();
    device.unlock();
    device.set("address", 0x22).unwrap();

    device.update(&mut channel, false).unwrap();

    assert_eq!(device.address(), ADDR);
    assert_eq!(device.value(Register::Address), 0x22);
    assert!(channel.sends.iter().all(|(addr, _, _)| *addr == ADDR));
}

/// Tests the serializable snapshot.
#[test]
fn test_snapshot() {
    let (mut device, _) = attached();
    device.set("seek", 321).unwrap();

    let snapshot = device.snapshot();
    assert_eq!(snapshot.address, ADDR);
    assert!(snapshot.locked);
    assert_eq!(snapshot.registers.len(), Register::ALL.len());
    assert_eq!(snapshot.registers["seek"], 321);
    assert_eq!(snapshot.registers["position"], 500);
}
