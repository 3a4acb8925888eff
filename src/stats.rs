//! Bus transaction statistics.
//!
//! Counts the framed transactions a bus link has issued, split by kind, and
//! the failures reported by the transport.

use std::time::Instant;

use serde::Serialize;

/// Transaction counters for one bus link.
#[derive(Clone, Debug, Serialize)]
pub struct BusStats {
    #[serde(skip)]
    start_time: Instant,
    pub commands: u64,
    pub data_writes: u64,
    pub reads: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub failures: u64,
}

impl Default for BusStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            commands: 0,
            data_writes: 0,
            reads: 0,
            bytes_written: 0,
            bytes_read: 0,
            failures: 0,
        }
    }
}

impl BusStats {
    /// Total framed transactions issued, successful or not.
    pub fn transactions(&self) -> u64 {
        self.commands + self.data_writes + self.reads
    }

    /// Prints a summary to standard output.
    pub fn print(&self) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        println!("Bus Statistics");
        println!("--------------");
        println!("  Elapsed:        {:.3} s", elapsed);
        println!("  Commands:       {}", self.commands);
        println!("  Data writes:    {}", self.data_writes);
        println!("  Reads:          {}", self.reads);
        println!("  Bytes written:  {}", self.bytes_written);
        println!("  Bytes read:     {}", self.bytes_read);
        println!("  Failures:       {}", self.failures);
    }
}
