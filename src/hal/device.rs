//! Device register layout and addressing (§6).
//!
//! Five device classes sit on interrupt lines 3-7, eight devices per line.
//! Lines 3-6 are plain devices (status/command/data0/data1); line 7
//! (terminals) splits into independent receiver and transmitter
//! sub-devices.

use volatile::Volatile;

use super::RAMBASEADDR;

pub const DEV_PER_INT: u32 = 8;
pub const DEV_INT_LINES: u32 = 5;
pub const DEV_REG_LEN: u32 = 4;
pub const DEV_REG_SIZE: u32 = 16;

pub const DISK_LINE: u32 = 3;
pub const FLASH_LINE: u32 = 4;
pub const NETWORK_LINE: u32 = 5;
pub const PRINTER_LINE: u32 = 6;
pub const TERMINAL_LINE: u32 = 7;

/// Number of plain (non-terminal) device semaphores: 4 lines * 8 devices.
pub const NUM_PLAIN_DEVICES: usize = 4 * DEV_PER_INT as usize;
/// Number of terminal sub-device semaphores: 8 terminals * 2 sub-devices.
pub const NUM_TERMINAL_SEMAPHORES: usize = 2 * DEV_PER_INT as usize;
/// Total device semaphores, not counting the pseudo-clock.
pub const NUM_DEVICES: usize = NUM_PLAIN_DEVICES + NUM_TERMINAL_SEMAPHORES;
/// Index of the pseudo-clock semaphore, one past the last device semaphore.
pub const PSEUDO_CLOCK_INDEX: usize = NUM_DEVICES;
/// Total semaphore count the device-semaphore array holds (49).
pub const TOTAL_SEMAPHORES: usize = NUM_DEVICES + 1;

/// Common device status codes shared by all device classes.
pub mod status_code {
    pub const UNINSTALLED: u32 = 0;
    pub const READY: u32 = 1;
    pub const BUSY: u32 = 3;
}

/// Common device command codes.
pub mod command_code {
    pub const RESET: u32 = 0;
    pub const ACK: u32 = 1;
}

/// Register block for a non-terminal device.
#[repr(C)]
pub struct DeviceRegister {
    pub status: Volatile<u32>,
    pub command: Volatile<u32>,
    pub data0: Volatile<u32>,
    pub data1: Volatile<u32>,
}

/// Register block for a terminal device: independent receiver and
/// transmitter sub-devices.
#[repr(C)]
pub struct TerminalRegister {
    pub recv_status: Volatile<u32>,
    pub recv_command: Volatile<u32>,
    pub trans_status: Volatile<u32>,
    pub trans_command: Volatile<u32>,
}

/// Address of the register block for device `dev` on interrupt `line`
/// (3..=7). Caller is responsible for interpreting it as a [`DeviceRegister`]
/// or a [`TerminalRegister`] depending on the line.
fn device_register_addr(line: u32, dev: u32) -> u32 {
    RAMBASEADDR + (line - DISK_LINE) * DEV_PER_INT * DEV_REG_SIZE + dev * DEV_REG_SIZE
}

/// Raw pointer to the register block of a non-terminal device.
///
/// # Safety
/// `line` must be in `3..=6` and `dev` must be `< DEV_PER_INT`.
pub unsafe fn device_register(line: u32, dev: u32) -> *mut DeviceRegister {
    device_register_addr(line, dev) as *mut DeviceRegister
}

/// Raw pointer to the register block of a terminal device.
///
/// # Safety
/// `dev` must be `< DEV_PER_INT`.
pub unsafe fn terminal_register(dev: u32) -> *mut TerminalRegister {
    device_register_addr(TERMINAL_LINE, dev) as *mut TerminalRegister
}

/// Address of the interrupting-devices bitmap word for `line`.
fn bitmap_addr(line: u32) -> u32 {
    super::BITMAPADDR + (line - DISK_LINE) * super::WORDLEN
}

/// Read the interrupting-devices bitmap for `line`, masked to its 8 device
/// bits.
///
/// # Safety
/// `line` must be in `3..=7`.
pub unsafe fn interrupting_devices_bitmap(line: u32) -> u32 {
    core::ptr::read_volatile(bitmap_addr(line) as *const u32) & super::MAPMASK
}

/// Lowest-numbered (highest priority) set bit in a device bitmap, if any.
pub fn lowest_set_device(bitmap: u32) -> Option<u32> {
    if bitmap == 0 {
        None
    } else {
        Some(bitmap.trailing_zeros())
    }
}

/// Sub-device selector within a terminal's two semaphores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalSub {
    Transmit = 0,
    Receive = 1,
}

/// Device-semaphore index for a plain device on `line` (3..=6).
pub fn plain_device_index(line: u32, dev: u32) -> usize {
    ((line - DISK_LINE) * DEV_PER_INT + dev) as usize
}

/// Device-semaphore index for a terminal sub-device.
pub fn terminal_device_index(dev: u32, sub: TerminalSub) -> usize {
    NUM_PLAIN_DEVICES + (dev * 2 + sub as u32) as usize
}

/// Device-semaphore index per §6's indexing rule, given a syscall-style
/// `(line, dev, is_term_read)` triple as passed to `WaitIO`.
pub fn device_semaphore_index(line: u32, dev: u32, wait_for_term_read: bool) -> usize {
    if line == TERMINAL_LINE {
        let sub = if wait_for_term_read {
            TerminalSub::Receive
        } else {
            TerminalSub::Transmit
        };
        terminal_device_index(dev, sub)
    } else {
        plain_device_index(line, dev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_index_covers_full_range() {
        assert_eq!(plain_device_index(DISK_LINE, 0), 0);
        assert_eq!(plain_device_index(PRINTER_LINE, 7), 31);
    }

    #[test]
    fn terminal_index_follows_plain_block() {
        assert_eq!(terminal_device_index(0, TerminalSub::Transmit), 32);
        assert_eq!(terminal_device_index(0, TerminalSub::Receive), 33);
        assert_eq!(terminal_device_index(7, TerminalSub::Receive), 47);
    }

    #[test]
    fn pseudo_clock_is_one_past_devices() {
        assert_eq!(PSEUDO_CLOCK_INDEX, 48);
        assert_eq!(TOTAL_SEMAPHORES, 49);
    }

    #[test]
    fn waitio_index_matches_interrupt_index() {
        assert_eq!(
            device_semaphore_index(TERMINAL_LINE, 3, true),
            terminal_device_index(3, TerminalSub::Receive)
        );
        assert_eq!(
            device_semaphore_index(DISK_LINE, 2, false),
            plain_device_index(DISK_LINE, 2)
        );
    }

    #[test]
    fn lowest_set_device_picks_smallest_bit() {
        assert_eq!(lowest_set_device(0b0010_1000), Some(3));
        assert_eq!(lowest_set_device(0), None);
    }
}
