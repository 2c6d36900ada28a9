//! Diagnostics sink (C10): a minimal, allocation-free logger that writes to
//! terminal0's transmitter, polling rather than going through the interrupt
//! path so it stays usable from anywhere — including inside the panic
//! handler, where nothing else in the nucleus is trustworthy any more.

use core::fmt::Write;

use spin::Mutex;

use crate::hal::device::{command_code, status_code, terminal_register};

pub struct Console;

impl Console {
    fn write_byte(&mut self, byte: u8) {
        unsafe {
            let term = terminal_register(0);
            while (*term).trans_status.read() == status_code::BUSY {
                core::hint::spin_loop();
            }
            (*term).trans_command.write((byte as u32) << 8 | command_code::ACK);
        }
    }
}

impl Write for Console {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
        Ok(())
    }
}

pub static CONSOLE: Mutex<Console> = Mutex::new(Console);

#[doc(hidden)]
pub fn _print(args: core::fmt::Arguments) {
    let _ = CONSOLE.lock().write_fmt(args);
}

#[macro_export]
macro_rules! nucleus_log_info {
    ($($arg:tt)*) => {
        $crate::console::_print(format_args!("[INFO] "));
        $crate::console::_print(format_args!($($arg)*));
        $crate::console::_print(format_args!("\n"));
    };
}

#[macro_export]
macro_rules! nucleus_log_warn {
    ($($arg:tt)*) => {
        $crate::console::_print(format_args!("[WARN] "));
        $crate::console::_print(format_args!($($arg)*));
        $crate::console::_print(format_args!("\n"));
    };
}

#[macro_export]
macro_rules! nucleus_log_error {
    ($($arg:tt)*) => {
        $crate::console::_print(format_args!("[ERROR] "));
        $crate::console::_print(format_args!($($arg)*));
        $crate::console::_print(format_args!("\n"));
    };
}
