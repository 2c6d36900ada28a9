//! Hardware abstraction layer: the one place in the crate that knows the
//! memory layout of the emulated MIPS-style machine.
//!
//! Every fixed address, register layout and hardware primitive named in the
//! nucleus' external interfaces lives here. Nothing outside `hal` is allowed
//! to hardcode an address or poke a register directly.

pub mod device;
pub mod state;
pub mod status;

pub use device::*;
pub use state::*;
pub use status::*;

/// Word size in bytes.
pub const WORDLEN: u32 = 4;

/// Base of the bus-mapped hardware region (TOD clock, interval timer, device
/// register blocks, interrupting-devices bitmap).
pub const RAMBASEADDR: u32 = 0x1000_0000;

/// Free-running time-of-day counter, in raw ticks.
pub const TODLOADDR: u32 = 0x1000_001C;

/// Interval timer (pseudo-clock). Loaded in raw ticks = microseconds * timescale.
pub const INTERVALTMR: u32 = 0x1000_0020;

/// Ticks-per-microsecond scale factor for this machine.
pub const TIMESCALEADDR: u32 = 0x1000_0024;

/// Base of the per-interrupt-line "which device is pending" bitmap.
pub const BITMAPADDR: u32 = 0x1000_0040;
/// Mask selecting the 8 device bits out of a bitmap word.
pub const MAPMASK: u32 = 0x0000_00FF;

/// Fixed address of the BIOS data page; offset 0 holds the saved processor
/// state written by hardware on every exception.
pub const BIOSDATAPAGE: u32 = 0x0FFF_F000;
/// Offset of the pass-up vector within the BIOS data page's containing region.
pub const PASSUPVECTOR: u32 = 0x0FFF_F900;

/// Top of RAM, used as the initial stack pointer for the first process.
pub const RAMTOP: u32 = 0x2000_1000;

/// Size of the PCB free pool.
pub const MAXPROC: usize = 20;

/// Interval-timer reload value for a 100 ms pseudo-clock tick, in microseconds.
pub const CLOCK_INTERVAL_US: u32 = 100_000;
/// Process-local timer quantum, in microseconds.
pub const QUANTUM_US: u32 = 5_000;

/// Read the TOD clock, scaled to microseconds.
pub fn read_tod() -> u32 {
    unsafe {
        let raw = core::ptr::read_volatile(TODLOADDR as *const u32);
        let scale = core::ptr::read_volatile(TIMESCALEADDR as *const u32);
        raw / scale.max(1)
    }
}

/// Reload the interval timer so it next fires `micros` microseconds from now.
pub fn load_interval_timer(micros: u32) {
    unsafe {
        let scale = core::ptr::read_volatile(TIMESCALEADDR as *const u32);
        core::ptr::write_volatile(INTERVALTMR as *mut u32, micros.saturating_mul(scale.max(1)));
    }
}

/// The pass-up vector installed once at boot: entry points and stacks the
/// hardware jumps to on a TLB refill miss or on any other exception.
#[repr(C)]
pub struct PassUpVector {
    pub tlb_refill_pc: u32,
    pub tlb_refill_stack_ptr: u32,
    pub exception_pc: u32,
    pub exception_stack_ptr: u32,
}

/// Returns a pointer to the pass-up vector at its fixed address.
///
/// # Safety
/// Caller must only write this once, at boot, before interrupts are enabled.
pub unsafe fn pass_up_vector() -> *mut PassUpVector {
    PASSUPVECTOR as *mut PassUpVector
}

/// Returns a pointer to the saved processor state at offset 0 of the BIOS
/// data page — the record hardware writes on every exception.
///
/// # Safety
/// Only valid to read while handling the exception that just occurred,
/// before any other exception can overwrite the page.
pub unsafe fn saved_state() -> *mut ProcessorState {
    BIOSDATAPAGE as *mut ProcessorState
}

// ---------------------------------------------------------------------
// Hardware primitives. These are implemented by the board-support runtime
// (the BIOS ROM / libumps-equivalent glue, both out of this crate's scope)
// and linked in externally. This `extern "C"` block is the crate's one FFI
// boundary; everything above and below it is ordinary safe-ish Rust.
// ---------------------------------------------------------------------
unsafe extern "C" {
    fn nucleus_ldst(state: *const ProcessorState) -> !;
    fn nucleus_ldcxt(stack_ptr: u32, status: u32, pc: u32) -> !;
    fn nucleus_halt() -> !;
    fn nucleus_panic() -> !;
    fn nucleus_wait();
    fn nucleus_get_status() -> u32;
    fn nucleus_set_status(value: u32);
    fn nucleus_set_timer(value: u32);
}

/// Atomically replace the processor state with `state` and resume execution.
/// Never returns.
pub fn ldst(state: &ProcessorState) -> ! {
    unsafe { nucleus_ldst(state as *const ProcessorState) }
}

/// Atomically load a fresh stack pointer / status / PC (used by
/// Pass-Up-or-Die to hand off to a user-level exception handler). Never
/// returns.
pub fn ldcxt(stack_ptr: u32, status: u32, pc: u32) -> ! {
    unsafe { nucleus_ldcxt(stack_ptr, status, pc) }
}

/// Halt the machine cleanly. Never returns.
pub fn halt() -> ! {
    unsafe { nucleus_halt() }
}

/// Halt the machine abnormally (deadlock, invariant violation). Never returns.
pub fn machine_panic() -> ! {
    unsafe { nucleus_panic() }
}

/// Wait for the next interrupt. Does not itself touch interrupt masking or
/// the local timer; callers set status beforehand (the scheduler's
/// soft-block wait leaves the local timer off and interrupts enabled,
/// per the wait-state contract).
pub fn wait_for_interrupt() {
    unsafe { nucleus_wait() }
}

/// Read the processor status register.
pub fn get_status() -> u32 {
    unsafe { nucleus_get_status() }
}

/// Write the processor status register.
pub fn set_status(value: u32) {
    unsafe { nucleus_set_status(value) }
}

/// Arm the process-local timer with `value` microseconds.
pub fn set_plt(value: u32) {
    unsafe { nucleus_set_timer(value) }
}
