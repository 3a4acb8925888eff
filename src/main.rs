//! OpenServo Control CLI.
//!
//! Scans a bus for servos and prints their state, or reads and writes the
//! registers of one servo.
//!
//! # Usage
//!
//! 1. **Scan**: `servoctl` lists every servo found on the bus.
//! 2. **Inspect**: `servoctl 16` prints one servo and its writable registers.
//! 3. **Write**: `servoctl 16 seek=512 seek.velocity=20` applies the writes
//!    in one update. Protected registers need `--unlock`.

use clap::Parser;
use std::process;

use env_logger::Env;
use log::error;

use openservo::config::Config;
use openservo::registers::{self, Register};
use openservo::servo::Device;
use openservo::transport;
use openservo::{Access, Bus, Error, Result};

#[derive(Parser, Debug)]
#[command(author, version, about = "Scan and control OpenServo devices")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Bus locator: an i2c-dev path, or `sim:16,17` for a simulated bus.
    #[arg(short, long, default_value = "")]
    bus: String,

    #[arg(short, long)]
    verbose: bool,

    /// Print register snapshots as JSON.
    #[arg(long)]
    json: bool,

    /// Allow writes to protected registers.
    #[arg(long)]
    unlock: bool,

    /// Save configuration registers to EEPROM after writing.
    #[arg(long)]
    commit: bool,

    /// Print bus statistics before exiting.
    #[arg(long)]
    stats: bool,

    /// Servo address, decimal or 0x-prefixed hex.
    address: Option<String>,

    /// Register writes as NAME=VALUE.
    updates: Vec<String>,
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().filter_or("OPENSERVO_LOG", level)).init();

    if let Err(e) = run(&args) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut bus = Bus::with_config(&config);
    bus.open(&args.bus)?;

    if !args.json {
        println!("Scanning for OpenServo devices ...");
    }
    let found = bus.scan(false)?;

    match &args.address {
        None => list_servos(&bus, found, args),
        Some(address) => {
            let address = transport::parse_address(address)
                .ok_or_else(|| Error::Config(format!("invalid servo address `{}`", address)))?;
            if args.updates.is_empty() {
                inspect_servo(&bus, address, args)
            } else {
                write_servo(&mut bus, address, args)
            }
        }
    }?;

    if args.stats {
        match bus.stats() {
            Some(stats) if args.json => print_json(stats)?,
            Some(stats) => stats.print(),
            None => {}
        }
    }
    bus.close()
}

fn list_servos(bus: &Bus, found: usize, args: &Args) -> Result<()> {
    if args.json {
        let snapshots: Vec<_> = bus.devices().map(Device::snapshot).collect();
        return print_json(&snapshots);
    }

    if found == 0 {
        println!("Found no servos");
        return Ok(());
    }
    println!("Found {} servos", found);
    for (i, device) in bus.devices().enumerate() {
        println!(" * Servo {}", i);
        print_status(device, args.verbose);
    }
    Ok(())
}

fn inspect_servo(bus: &Bus, address: u8, args: &Args) -> Result<()> {
    let device = bus.find(address).ok_or(Error::NoDevice(address))?;
    if args.json {
        return print_json(&device.snapshot());
    }

    print_status(device, args.verbose);
    let writable: Vec<&str> = Register::ALL
        .iter()
        .filter(|reg| reg.access().is_writable())
        .map(|reg| reg.name())
        .collect();
    println!("Registers: {}", writable.join(", "));
    Ok(())
}

fn write_servo(bus: &mut Bus, address: u8, args: &Args) -> Result<()> {
    let updates = args
        .updates
        .iter()
        .map(|update| parse_update(update, args.unlock))
        .collect::<Result<Vec<_>>>()?;

    let mut servo = bus.find_mut(address).ok_or(Error::NoDevice(address))?;
    if args.unlock {
        servo.unlock();
    }
    for (reg, value) in updates {
        servo.write(reg, value)?;
    }
    servo.update(false)?;
    if args.commit {
        servo.registers_commit()?;
    }

    if args.json {
        print_json(&servo.snapshot())
    } else {
        print_status(&servo, args.verbose);
        Ok(())
    }
}

/// Parses `NAME=VALUE`, rejecting registers the caller may not write.
fn parse_update(update: &str, unlock: bool) -> Result<(Register, i32)> {
    let (name, value) = update
        .split_once('=')
        .ok_or_else(|| Error::Config(format!("expected NAME=VALUE, got `{}`", update)))?;
    let reg = registers::resolve(name).ok_or_else(|| Error::UnknownRegister(name.to_string()))?;
    match reg.access() {
        Access::ReadOnly => return Err(Error::ReadOnlyRegister(reg.name())),
        Access::Protected if !unlock => return Err(Error::Locked(reg.name())),
        _ => {}
    }
    let value = parse_value(value.trim())
        .ok_or_else(|| Error::Config(format!("invalid value `{}` for {}", value, reg.name())))?;
    Ok((reg, value))
}

fn parse_value(s: &str) -> Option<i32> {
    match s.strip_prefix("0x") {
        Some(hex) => i32::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn print_status(device: &Device, verbose: bool) {
    let (major, minor) = device.version();
    println!(
        "   - Address: {} ({:#04x})",
        device.address(),
        device.address()
    );
    println!(
        "   - Type: {} / {}",
        device.value(Register::Type),
        device.value(Register::Subtype)
    );
    println!("   - Version: {}.{}", major, minor);
    println!("   - Position: {}", device.value(Register::Position));
    println!("   - Seek: {}", device.value(Register::Seek));
    println!("   - Min: {}", device.value(Register::SeekMin));
    println!("   - Max: {}", device.value(Register::SeekMax));

    if verbose {
        println!("   - Flags: {:#06x}", device.value(Register::Flags));
        println!("   - Timer: {}", device.value(Register::Timer));
        println!("   - Power: {}", device.value(Register::Power));
        println!(
            "   - PWM: {} / {}",
            device.value(Register::PwmCw),
            device.value(Register::PwmCcw)
        );
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{}", text);
    Ok(())
}
