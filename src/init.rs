//! Boot sequence (C4): install the pass-up vector, create the first
//! process, and hand off to the scheduler. This module runs exactly once,
//! at the hardware's initial entry point, and never returns.

use crate::exceptions;
use crate::hal::{self, Status, RAMTOP};
use crate::nucleus;
use crate::scheduler;

unsafe extern "C" {
    /// The TLB-refill stub. Out of scope — provided externally.
    fn tlb_refill_handler() -> !;
    /// The first user-level process. Out of scope — provided externally.
    fn test();
}

/// Point the pass-up vector at the externally supplied TLB-refill stub and
/// at this crate's own exception dispatcher, each given `RAMTOP` as its
/// initial stack. Must run before interrupts are ever enabled.
fn install_pass_up_vector() {
    unsafe {
        let vector = hal::pass_up_vector();
        (*vector).tlb_refill_pc = tlb_refill_handler as usize as u32;
        (*vector).tlb_refill_stack_ptr = RAMTOP;
        (*vector).exception_pc = exceptions::nucleus_exception_handler as usize as u32;
        (*vector).exception_stack_ptr = RAMTOP;
    }
}

/// Allocate and seed the first process: kernel mode, interrupts and the
/// local timer enabled, stack at `RAMTOP`, PC and `t9` both pointed at the
/// externally supplied test program. Places it on the ready queue.
fn create_first_process() {
    let mut n = nucleus::lock();
    let p = n.pcb_mut().alloc_pcb().expect("fresh pool always has a free pcb");

    {
        let state = n.pcb_mut().state_mut(p);
        state.status = Status::initial_kernel();
        state.set_sp(RAMTOP);
        state.pc = test as usize as u32;
        state.set_t9(test as usize as u32);
    }

    n.ready_enqueue(p);
    n.inc_proc_count();
}

/// Boot the nucleus. Never returns: control passes to the scheduler, which
/// either loads the first process or halts/panics if something upstream
/// went wrong.
pub fn run() -> ! {
    install_pass_up_vector();
    hal::load_interval_timer(hal::CLOCK_INTERVAL_US);
    create_first_process();
    scheduler::run()
}
