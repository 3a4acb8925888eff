//! Test module organization.
//!
//! This module organizes all integration tests for the OpenServo driver.



/// Configuration parsing tests.
mod config_tests;

/// Register cache and write-back tests.
mod device_tests;
