//! Status and cause register bit layouts.

use bit_field::BitField;
use bitflags::bitflags;

bitflags! {
    /// Bits of the processor status register the nucleus cares about.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Status: u32 {
        /// Previous interrupt-enable bit (bit 2).
        const IEP = 0x0000_0004;
        /// Previous kernel/user mode bit (bit 3); set means user mode.
        const KUP = 0x0000_0008;
        /// Local (process) timer enable (bit 27).
        const TE  = 0x0800_0000;
        /// Interrupt mask, bits 8-15.
        const IM  = 0x0000_FF00;
    }
}

impl Status {
    /// Status value for a freshly created kernel-mode process with
    /// interrupts and the local timer enabled and all interrupt lines
    /// unmasked.
    pub fn initial_kernel() -> u32 {
        (Self::IEP.bits() | Self::TE.bits() | Self::IM.bits()) & !Self::KUP.bits()
    }
}

/// Exception classes distinguished by the `ExcCode` field of the cause
/// register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExceptionClass {
    Interrupt,
    TlbException,
    Syscall,
    ProgramTrap,
    Undefined(u32),
}

/// Decode the `ExcCode` field (bits 2-6) of a cause register value into a
/// coarse exception class per the dispatch table in §4.4.
pub fn classify_cause(cause: u32) -> ExceptionClass {
    let code = cause.get_bits(2..7);
    match code {
        0 => ExceptionClass::Interrupt,
        1..=3 => ExceptionClass::TlbException,
        8 => ExceptionClass::Syscall,
        4..=7 | 9..=12 => ExceptionClass::ProgramTrap,
        other => ExceptionClass::Undefined(other),
    }
}

/// Decode the pending-interrupt bitmask (`Cause.IP`, bits 8-15) and return
/// the lowest-numbered (highest priority) pending line, if any.
pub fn highest_priority_interrupt_line(cause: u32) -> Option<u32> {
    let ip = cause.get_bits(8..16);
    (0..8).find(|&line| ip.get_bit(line as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_interrupt() {
        assert_eq!(classify_cause(0), ExceptionClass::Interrupt);
    }

    #[test]
    fn classifies_tlb_range() {
        for code in 1..=3u32 {
            assert_eq!(classify_cause(code << 2), ExceptionClass::TlbException);
        }
    }

    #[test]
    fn classifies_syscall() {
        assert_eq!(classify_cause(8 << 2), ExceptionClass::Syscall);
    }

    #[test]
    fn classifies_program_traps() {
        for code in [4u32, 5, 6, 7, 9, 10, 11, 12] {
            assert_eq!(classify_cause(code << 2), ExceptionClass::ProgramTrap);
        }
    }

    #[test]
    fn classifies_undefined() {
        assert_eq!(classify_cause(13 << 2), ExceptionClass::Undefined(13));
    }

    #[test]
    fn finds_lowest_pending_line() {
        // lines 3 and 5 pending: IP bits 3 and 5 set.
        let cause = (1u32 << 3 | 1u32 << 5) << 8;
        assert_eq!(highest_priority_interrupt_line(cause), Some(3));
    }

    #[test]
    fn no_pending_line() {
        assert_eq!(highest_priority_interrupt_line(0), None);
    }
}
