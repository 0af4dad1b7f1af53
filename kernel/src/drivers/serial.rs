//! Serial port (COM1) driver, used as the kernel log sink

use core::fmt::{self, Write};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use nic_boot::LogLevel;
use spin::Mutex;
use x86_64::instructions::port::Port;

const COM1_PORT: u16 = 0x3F8;

/// Global serial port instance
pub static SERIAL1: Mutex<SerialPort> = Mutex::new(SerialPort::new(COM1_PORT));

static LOGGER: SerialLogger = SerialLogger;

/// Serial port wrapper
pub struct SerialPort {
    base: u16,
    data: Port<u8>,
    line_status: Port<u8>,
}

impl SerialPort {
    pub const fn new(base: u16) -> Self {
        Self {
            base,
            data: Port::new(base),
            line_status: Port::new(base + 5),
        }
    }

    /// Initialize the serial port: 115200 baud, 8N1, FIFOs on
    pub fn init(&mut self) {
        let base = self.base;
        unsafe {
            // Disable interrupts
            Port::<u8>::new(base + 1).write(0x00);
            // Enable DLAB (set baud rate divisor)
            Port::<u8>::new(base + 3).write(0x80);
            // Divisor 1, lo byte then hi byte
            Port::<u8>::new(base).write(0x01);
            Port::<u8>::new(base + 1).write(0x00);
            // 8 bits, no parity, one stop bit
            Port::<u8>::new(base + 3).write(0x03);
            // Enable FIFO, clear them, with 14-byte threshold
            Port::<u8>::new(base + 2).write(0xC7);
            // RTS/DSR set
            Port::<u8>::new(base + 4).write(0x0B);
        }
    }

    fn is_transmit_empty(&mut self) -> bool {
        unsafe { self.line_status.read() & 0x20 != 0 }
    }

    /// Write a single byte to the serial port
    pub fn write_byte(&mut self, byte: u8) {
        while !self.is_transmit_empty() {
            core::hint::spin_loop();
        }
        unsafe {
            self.data.write(byte);
        }
    }
}

impl Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
        Ok(())
    }
}

/// `log` backend writing one line per record to COM1
pub struct SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = writeln!(
            SERIAL1.lock(),
            "[{:<5} {}] {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Map a command line log level onto the `log` crate's filter
pub fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::Error,
        LogLevel::Warn => LevelFilter::Warn,
        LogLevel::Info => LevelFilter::Info,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Trace => LevelFilter::Trace,
    }
}

/// Initialize COM1 and install it as the global logger
pub fn init_logging(level: LogLevel) -> Result<(), SetLoggerError> {
    SERIAL1.lock().init();
    log::set_logger(&LOGGER)?;
    log::set_max_level(level_filter(level));
    Ok(())
}
