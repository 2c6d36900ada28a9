//! The eight nucleus syscalls (C7).
//!
//! Every function here takes the CPU-time sample (`now`) as a parameter
//! instead of reading the TOD clock itself, so this whole module stays
//! `core`-only bookkeeping over [`Nucleus`] and is exercised by ordinary
//! host-run unit tests; the one hardware read each syscall needs is taken
//! once by the exception dispatcher and threaded through.

use crate::hal::device;
use crate::hal::{ProcessorState, SupportStruct};
use crate::nucleus::Nucleus;
use crate::pcb::ProcessId;

pub const CREATEPROCESS: u32 = 1;
pub const TERMINATEPROCESS: u32 = 2;
pub const PASSEREN: u32 = 3;
pub const VERHOGEN: u32 = 4;
pub const WAITIO: u32 = 5;
pub const GETCPUTIME: u32 = 6;
pub const WAITCLOCK: u32 = 7;
pub const GETSUPPORTPTR: u32 = 8;

fn update_cpu_time(n: &mut Nucleus, p: ProcessId, now: u32) {
    let elapsed = now.wrapping_sub(n.pcb().start_tod(p));
    let cpu = n.pcb().cpu_time(p);
    n.pcb_mut().set_cpu_time(p, cpu.wrapping_add(elapsed));
    n.pcb_mut().set_start_tod(p, now);
}

/// CreateProcess: returns `0` on success, `-1` if the PCB pool is
/// exhausted. The new process is a child of the caller, starts at zero CPU
/// time, unblocked, on the tail of the ready queue.
pub fn create_process(
    n: &mut Nucleus,
    state: &ProcessorState,
    support: Option<*mut SupportStruct>,
) -> i32 {
    let parent = n
        .current_process()
        .expect("a syscall always has a current process");
    match n.pcb_mut().alloc_pcb() {
        None => -1,
        Some(child) => {
            n.pcb_mut().set_state(child, *state);
            n.pcb_mut().set_support(child, support);
            n.pcb_mut().insert_child(parent, child);
            n.ready_enqueue(child);
            n.inc_proc_count();
            0
        }
    }
}

fn finalize_one(n: &mut Nucleus, p: ProcessId) -> bool {
    if let Some(sem_addr) = n.pcb().sem_addr(p) {
        let is_device = n.is_device_semaphore(sem_addr);
        if !is_device {
            unsafe {
                *sem_addr += 1;
            }
        }
        let (pcb, asl) = n.pcb_and_asl_mut();
        asl.out_blocked(pcb, p);
        if is_device {
            n.dec_soft_block_count();
        }
    }

    n.ready_out(p);
    n.pcb_mut().out_child(p);
    if n.current_process() == Some(p) {
        n.set_current_process(None);
    }
    n.pcb_mut().free_pcb(p);
    n.dec_proc_count();
    n.proc_count() == 0
}

/// Terminate: recursively tears down `root` and every descendant,
/// post-order (a child is fully cleaned up before its parent), using an
/// explicit work-stack bounded by the process-tree depth rather than host
/// recursion. Returns `true` if `proc_count` reached zero — the caller
/// halts in that case.
pub fn terminate(n: &mut Nucleus, root: ProcessId) -> bool {
    use crate::hal::MAXPROC;

    let mut stack = [root; MAXPROC];
    let mut len = 1usize;
    let mut halted = false;
    while len > 0 {
        let cur = stack[len - 1];
        match n.pcb_mut().remove_child(cur) {
            Some(child) => {
                stack[len] = child;
                len += 1;
            }
            None => {
                len -= 1;
                halted = finalize_one(n, cur);
            }
        }
    }
    halted
}

/// Passeren (P / wait). Returns `true` if the caller blocked and must
/// invoke the scheduler; `false` if it should simply resume.
pub fn passeren(n: &mut Nucleus, sem_addr: *mut i32, saved_state: &ProcessorState, now: u32) -> bool {
    let current = n
        .current_process()
        .expect("a syscall always has a current process");
    update_cpu_time(n, current, now);

    unsafe {
        *sem_addr -= 1;
    }
    if unsafe { *sem_addr } < 0 {
        n.pcb_mut().set_state(current, *saved_state);
        let (pcb, asl) = n.pcb_and_asl_mut();
        asl.insert_blocked(pcb, sem_addr, current)
            .expect("the SEMD pool holds MAXPROC descriptors, one per process, and is never over-subscribed");
        n.set_current_process(None);
        true
    } else {
        false
    }
}

/// Verhogen (V / signal). Never blocks; wakes the semaphore's head waiter,
/// if any, onto the ready queue.
pub fn verhogen(n: &mut Nucleus, sem_addr: *mut i32) {
    unsafe {
        *sem_addr += 1;
    }
    if unsafe { *sem_addr } <= 0 {
        let (pcb, asl) = n.pcb_and_asl_mut();
        if let Some(p) = asl.remove_blocked(pcb, sem_addr) {
            n.ready_enqueue(p);
        }
    }
}

/// WaitIO: resolve `(line, dev, wait_for_term_read)` to a device-semaphore
/// index, account the process as soft-blocked, then perform an internal P
/// on that semaphore. The interrupt handler is responsible for writing the
/// device status into the resumed process's `v0` — this syscall does not
/// read the device register itself.
pub fn wait_io(
    n: &mut Nucleus,
    saved_state: &ProcessorState,
    now: u32,
    line: u32,
    dev: u32,
    wait_for_term_read: bool,
) -> bool {
    let idx = device::device_semaphore_index(line, dev, wait_for_term_read);
    n.inc_soft_block_count();
    let sem_addr = n.device_sem_ptr(idx);
    passeren(n, sem_addr, saved_state, now)
}

/// GetCPUTime: accumulated CPU time plus time elapsed since the process
/// last became current.
pub fn get_cpu_time(n: &Nucleus, now: u32) -> u32 {
    let p = n
        .current_process()
        .expect("a syscall always has a current process");
    n.pcb()
        .cpu_time(p)
        .wrapping_add(now.wrapping_sub(n.pcb().start_tod(p)))
}

/// WaitClock: soft-block the caller on the pseudo-clock semaphore.
pub fn wait_clock(n: &mut Nucleus, saved_state: &ProcessorState, now: u32) -> bool {
    n.inc_soft_block_count();
    let sem_addr = n.device_sem_ptr(device::PSEUDO_CLOCK_INDEX);
    passeren(n, sem_addr, saved_state, now)
}

/// GetSupportPtr: the current process's support structure, or `None`.
pub fn get_support_ptr(n: &Nucleus) -> Option<*mut SupportStruct> {
    let p = n
        .current_process()
        .expect("a syscall always has a current process");
    n.pcb().support(p)
}
