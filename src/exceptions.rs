//! Exception dispatcher and Pass-Up-or-Die (C6).
//!
//! [`nucleus_exception_handler`] is the address installed into the pass-up
//! vector's `exception_pc` field; the hardware jumps here directly on every
//! exception with the faulting state already saved at the BIOS data page.

use crate::hal::status::ExceptionClass;
use crate::hal::{self, ExceptionKind, ProcessorState, Status, SupportStruct};
use crate::interrupts;
use crate::nucleus;
use crate::nucleus_log_warn;
use crate::scheduler;
use crate::syscalls;

/// Entry point the pass-up vector's `exception_pc` is set to. Never
/// returns — every path out ends in a hardware context load, a halt, or a
/// panic.
#[unsafe(no_mangle)]
pub extern "C" fn nucleus_exception_handler() -> ! {
    handle()
}

fn handle() -> ! {
    let state = unsafe { *hal::saved_state() };
    match hal::status::classify_cause(state.cause) {
        ExceptionClass::Interrupt => interrupts::handle(),
        ExceptionClass::TlbException => pass_up_or_die(ExceptionKind::PageFault, &state),
        ExceptionClass::ProgramTrap => pass_up_or_die(ExceptionKind::General, &state),
        ExceptionClass::Syscall => syscall_handler(&state),
        ExceptionClass::Undefined(code) => {
            nucleus_log_warn!("undefined exception code {}", code);
            terminate_current_and_schedule()
        }
    }
}

fn terminate_current_and_schedule() -> ! {
    let mut n = nucleus::lock();
    let halt = match n.current_process() {
        Some(p) => syscalls::terminate(&mut n, p),
        None => false,
    };
    drop(n);
    if halt {
        hal::halt();
    }
    scheduler::run()
}

/// If the current process registered a support-level handler for `kind`,
/// hand the fault to it; otherwise terminate the process (and its
/// progeny) and reschedule.
fn pass_up_or_die(kind: ExceptionKind, state: &ProcessorState) -> ! {
    let mut n = nucleus::lock();
    let current = n
        .current_process()
        .expect("an exception always has a current process");
    match n.pcb().support(current) {
        None => {
            drop(n);
            terminate_current_and_schedule()
        }
        Some(support) => {
            drop(n);
            unsafe {
                (*support).except_state[kind as usize] = *state;
                let ctx = (*support).except_context[kind as usize];
                hal::ldcxt(ctx.stack_ptr, ctx.status, ctx.pc)
            }
        }
    }
}

/// Syscall dispatch. Advances the saved PC by one instruction before
/// anything else, per §4.5, so both the privileged handlers and
/// Pass-Up-or-Die see the post-trap return address.
fn syscall_handler(state: &ProcessorState) -> ! {
    let mut advanced = *state;
    advanced.pc = advanced.pc.wrapping_add(4);

    let user_mode = Status::from_bits_truncate(advanced.status).contains(Status::KUP);
    if advanced.a0() >= 9 || user_mode {
        return pass_up_or_die(ExceptionKind::General, &advanced);
    }

    let mut n = nucleus::lock();
    let now = hal::read_tod();
    match advanced.a0() {
        syscalls::CREATEPROCESS => {
            let new_state = unsafe { *(advanced.a1() as *const ProcessorState) };
            let support_ptr = advanced.a2() as *mut SupportStruct;
            let support = if support_ptr.is_null() { None } else { Some(support_ptr) };
            advanced.set_v0(syscalls::create_process(&mut n, &new_state, support) as u32);
            drop(n);
            hal::ldst(&advanced)
        }
        syscalls::TERMINATEPROCESS => {
            let current = n
                .current_process()
                .expect("a syscall always has a current process");
            let halted = syscalls::terminate(&mut n, current);
            drop(n);
            if halted {
                hal::halt();
            }
            scheduler::run()
        }
        syscalls::PASSEREN => {
            let sem_addr = advanced.a1() as *mut i32;
            let blocked = syscalls::passeren(&mut n, sem_addr, &advanced, now);
            drop(n);
            if blocked {
                scheduler::run()
            } else {
                hal::ldst(&advanced)
            }
        }
        syscalls::VERHOGEN => {
            let sem_addr = advanced.a1() as *mut i32;
            syscalls::verhogen(&mut n, sem_addr);
            drop(n);
            hal::ldst(&advanced)
        }
        syscalls::WAITIO => {
            let line = advanced.a1();
            let dev = advanced.a2();
            let wait_for_term_read = advanced.a3() != 0;
            let blocked = syscalls::wait_io(&mut n, &advanced, now, line, dev, wait_for_term_read);
            drop(n);
            if blocked {
                scheduler::run()
            } else {
                hal::ldst(&advanced)
            }
        }
        syscalls::GETCPUTIME => {
            advanced.set_v0(syscalls::get_cpu_time(&n, now));
            drop(n);
            hal::ldst(&advanced)
        }
        syscalls::WAITCLOCK => {
            let blocked = syscalls::wait_clock(&mut n, &advanced, now);
            drop(n);
            if blocked {
                scheduler::run()
            } else {
                hal::ldst(&advanced)
            }
        }
        syscalls::GETSUPPORTPTR => {
            let support = syscalls::get_support_ptr(&n).map(|p| p as u32).unwrap_or(0);
            advanced.set_v0(support);
            drop(n);
            hal::ldst(&advanced)
        }
        _ => {
            drop(n);
            terminate_current_and_schedule()
        }
    }
}
