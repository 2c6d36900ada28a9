//! Round-robin scheduler (C5). Dequeues the next ready process and loads
//! it; when the ready queue is empty it halts, idles, or panics depending
//! on whether any process could ever become ready again.
//!
//! Every caller that needs "re-dispatch" — the interrupt handler and every
//! blocking syscall — ends by calling [`run`]. It never returns to them;
//! the one place it can structurally "come back" is the soft-block wait
//! case, which is folded into this function's own loop rather than
//! modeled as a return, since on real hardware control only resumes here
//! via a fresh call from the interrupt path anyway.

use crate::hal;
use crate::nucleus;
use crate::nucleus_log_error;

/// Select and dispatch the next process. Never returns.
pub fn run() -> ! {
    loop {
        let mut n = nucleus::lock();
        match n.ready_dequeue() {
            Some(p) => {
                n.set_current_process(Some(p));
                hal::set_plt(hal::QUANTUM_US);
                let now = hal::read_tod();
                n.pcb_mut().set_start_tod(p, now);
                let state = *n.pcb().state(p);
                drop(n);
                hal::ldst(&state);
            }
            None if n.proc_count() == 0 => {
                drop(n);
                hal::halt();
            }
            None if n.soft_block_count() > 0 => {
                drop(n);
                hal::set_status((hal::get_status() | hal::Status::IM.bits()) & !hal::Status::TE.bits());
                hal::wait_for_interrupt();
                // Control returns here only once an interrupt has actually
                // unblocked something; loop back and re-select.
            }
            None => {
                drop(n);
                nucleus_log_error!("deadlock: ready queue empty, processes alive, none soft-blocked");
                hal::machine_panic();
            }
        }
    }
}
