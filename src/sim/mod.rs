//! Simulated Servo Bus.
//!
//! An in-process [`Transport`] that hosts [`VirtualServo`]s instead of
//! talking to hardware. Every delivered frame is logged so callers can check
//! exactly what went over the wire, and faults can be injected to exercise
//! the driver's failure paths.
//!
//! The transport and its [`SimHandle`] share state, so the handle keeps
//! working after the transport has been moved into a bus.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::ops::RangeInclusive;
use std::rc::Rc;

use crate::registers::{Command, Register};
use crate::transport::Transport;

/// Register-level model of a single servo.
pub mod servo;

pub use servo::VirtualServo;

/// One transaction delivered to a simulated servo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Write { address: u8, bytes: Vec<u8> },
    Read { address: u8, len: usize },
}

/// A register data write decoded from a [`Frame::Write`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataWrite {
    pub address: u8,
    pub register: u8,
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct SimState {
    servos: BTreeMap<u8, VirtualServo>,
    selected: Option<u8>,
    frames: Vec<Frame>,
    writes_until_failure: Option<usize>,
    fail_reads: bool,
    fail_probe: bool,
    closed: bool,
}

impl SimState {
    fn target(&mut self) -> io::Result<&mut VirtualServo> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "sim bus closed"));
        }
        let address = self
            .selected
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no slave selected"))?;
        self.servos
            .get_mut(&address)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "slave did not acknowledge"))
    }
}

/// Transport backed by simulated servos.
pub struct SimTransport {
    state: Rc<RefCell<SimState>>,
}

impl SimTransport {
    /// Creates an empty simulated bus.
    pub fn new() -> (Self, SimHandle) {
        let state = Rc::new(RefCell::new(SimState::default()));
        let handle = SimHandle {
            state: Rc::clone(&state),
        };
        (Self { state }, handle)
    }

    /// Creates a simulated bus with factory-default servos at `addresses`.
    pub fn with_servos(addresses: &[u8]) -> (Self, SimHandle) {
        let (transport, handle) = Self::new();
        for &address in addresses {
            handle.attach(address);
        }
        (transport, handle)
    }
}

impl Transport for SimTransport {
    fn name(&self) -> &str {
        "sim"
    }

    fn select(&mut self, address: u8) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "sim bus closed"));
        }
        state.selected = Some(address);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if let Some(remaining) = state.writes_until_failure.as_mut() {
            if *remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "injected write failure"));
            }
            *remaining -= 1;
        }
        state.target()?.handle_write(bytes);
        let address = state.selected.unwrap_or_default();
        state.frames.push(Frame::Write {
            address,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_reads {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "injected read failure"));
        }
        state.target()?.handle_read(buffer);
        let address = state.selected.unwrap_or_default();
        state.frames.push(Frame::Read {
            address,
            len: buffer.len(),
        });
        Ok(())
    }

    fn probe(&mut self, range: RangeInclusive<u8>) -> io::Result<Vec<u8>> {
        let state = self.state.borrow();
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "sim bus closed"));
        }
        if state.fail_probe {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "injected probe failure"));
        }
        Ok(state.servos.range(range).map(|(&addr, _)| addr).collect())
    }

    fn close(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.closed = true;
        state.selected = None;
        Ok(())
    }
}

/// Test-side view of a simulated bus.
#[derive(Clone)]
pub struct SimHandle {
    state: Rc<RefCell<SimState>>,
}

impl SimHandle {
    /// Attaches a factory-default servo at `address`, replacing any servo
    /// already there.
    pub fn attach(&self, address: u8) {
        self.attach_servo(address, VirtualServo::new(address));
    }

    pub fn attach_servo(&self, address: u8, servo: VirtualServo) {
        self.state.borrow_mut().servos.insert(address, servo);
    }

    /// Removes the servo at `address`, as if it had been unplugged.
    pub fn detach(&self, address: u8) -> Option<VirtualServo> {
        self.state.borrow_mut().servos.remove(&address)
    }

    pub fn servo(&self, address: u8) -> Option<VirtualServo> {
        self.state.borrow().servos.get(&address).cloned()
    }

    pub fn register(&self, address: u8, reg: Register) -> Option<u16> {
        self.state
            .borrow()
            .servos
            .get(&address)
            .map(|servo| servo.register(reg))
    }

    /// Changes a register from the firmware side.
    pub fn set_register(&self, address: u8, reg: Register, value: u16) {
        if let Some(servo) = self.state.borrow_mut().servos.get_mut(&address) {
            servo.set_register(reg, value);
        }
    }

    /// Lets `count` more writes through, then fails every write until
    /// [`recover`](Self::recover).
    pub fn fail_writes_after(&self, count: usize) {
        self.state.borrow_mut().writes_until_failure = Some(count);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    pub fn fail_probe(&self, fail: bool) {
        self.state.borrow_mut().fail_probe = fail;
    }

    /// Clears every injected fault.
    pub fn recover(&self) {
        let mut state = self.state.borrow_mut();
        state.writes_until_failure = None;
        state.fail_reads = false;
        state.fail_probe = false;
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Every frame delivered so far.
    pub fn frames(&self) -> Vec<Frame> {
        self.state.borrow().frames.clone()
    }

    pub fn clear_frames(&self) {
        self.state.borrow_mut().frames.clear();
    }

    /// Register data writes, i.e. write frames carrying a payload.
    pub fn data_writes(&self) -> Vec<DataWrite> {
        self.state
            .borrow()
            .frames
            .iter()
            .filter_map(|frame| match frame {
                Frame::Write { address, bytes } if bytes.len() > 1 && (bytes[0] & 0x80) == 0 => {
                    Some(DataWrite {
                        address: *address,
                        register: bytes[0],
                        payload: bytes[1..].to_vec(),
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Command frames, decoded.
    pub fn commands(&self) -> Vec<(u8, Command)> {
        self.state
            .borrow()
            .frames
            .iter()
            .filter_map(|frame| match frame {
                Frame::Write { address, bytes } if bytes.len() == 1 && (bytes[0] & 0x80) != 0 => {
                    Command::from_code(bytes[0]).map(|cmd| (*address, cmd))
                }
                _ => None,
            })
            .collect()
    }
}
