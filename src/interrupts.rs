//! Interrupt handler (C8): decode the pending-interrupt bitmask, ack the
//! responsible device, signal its semaphore, reload timers.
//!
//! Entered from [`crate::exceptions::handle`] once the dispatcher has
//! classified the exception as an external interrupt; the saved state is
//! already sitting at the BIOS data page.

use crate::hal::device::{self, command_code, status_code, TerminalSub};
use crate::hal::{self, ProcessorState};
use crate::nucleus;
use crate::scheduler;

/// Decode `Cause.IP`, route to the matching line handler. Never returns.
pub fn handle() -> ! {
    let state = unsafe { *hal::saved_state() };
    match hal::status::highest_priority_interrupt_line(state.cause) {
        Some(0) => hal::ldst(&state),
        Some(1) => handle_plt(),
        Some(2) => handle_interval_timer(&state),
        Some(line) if (3..=7).contains(&line) => handle_device(line, &state),
        _ => hal::machine_panic(),
    }
}

/// Process-local timer: quantum expired. Reload the PLT, park the current
/// process on the ready queue with its CPU time accounted, and reschedule.
fn handle_plt() -> ! {
    hal::set_plt(hal::QUANTUM_US);
    let mut n = nucleus::lock();
    if let Some(p) = n.current_process() {
        let state = unsafe { *hal::saved_state() };
        n.pcb_mut().set_state(p, state);

        let now = hal::read_tod();
        let elapsed = now.wrapping_sub(n.pcb().start_tod(p));
        let cpu = n.pcb().cpu_time(p);
        n.pcb_mut().set_cpu_time(p, cpu.wrapping_add(elapsed));

        n.ready_enqueue(p);
        n.set_current_process(None);
    }
    drop(n);
    scheduler::run()
}

/// Interval timer: 100 ms pseudo-clock tick. Reload it, wake every process
/// waiting on the pseudo-clock semaphore, and reset the semaphore to 0.
fn handle_interval_timer(state: &ProcessorState) -> ! {
    hal::load_interval_timer(hal::CLOCK_INTERVAL_US);
    let mut n = nucleus::lock();

    let idx = device::PSEUDO_CLOCK_INDEX;
    loop {
        let sem_addr = n.device_sem_ptr(idx);
        let unblocked = {
            let (pcb, asl) = n.pcb_and_asl_mut();
            asl.remove_blocked(pcb, sem_addr)
        };
        match unblocked {
            Some(p) => {
                n.ready_enqueue(p);
                n.dec_soft_block_count();
            }
            None => break,
        }
    }
    let sem_addr = n.device_sem_ptr(idx);
    unsafe {
        *sem_addr = 0;
    }

    let has_current = n.current_process().is_some();
    drop(n);
    if has_current {
        hal::ldst(state)
    } else {
        scheduler::run()
    }
}

/// Read and ack the highest-priority pending device on `line`, return its
/// saved status and device-semaphore index.
fn ack_device(line: u32, dev: u32) -> (u32, usize) {
    unsafe {
        if line == device::TERMINAL_LINE {
            let term = device::terminal_register(dev);
            let trans_status = (*term).trans_status.read();
            if trans_status != status_code::READY {
                (*term).trans_command.write(command_code::ACK);
                (trans_status, device::terminal_device_index(dev, TerminalSub::Transmit))
            } else {
                let recv_status = (*term).recv_status.read();
                (*term).recv_command.write(command_code::ACK);
                (recv_status, device::terminal_device_index(dev, TerminalSub::Receive))
            }
        } else {
            let reg = device::device_register(line, dev);
            let status = (*reg).status.read();
            (*reg).command.write(command_code::ACK);
            (status, device::plain_device_index(line, dev))
        }
    }
}

/// Device interrupt on `line`: identify the highest-priority device, ack
/// it, V its semaphore, and hand its saved status to whichever process
/// that unblocks.
fn handle_device(line: u32, state: &ProcessorState) -> ! {
    let bitmap = unsafe { device::interrupting_devices_bitmap(line) };
    let dev = match device::lowest_set_device(bitmap) {
        Some(d) => d,
        None => hal::machine_panic(),
    };
    let (status, idx) = ack_device(line, dev);

    let mut n = nucleus::lock();
    let sem_addr = n.device_sem_ptr(idx);
    unsafe {
        *sem_addr += 1;
    }
    let unblocked = {
        let (pcb, asl) = n.pcb_and_asl_mut();
        asl.remove_blocked(pcb, sem_addr)
    };
    if let Some(p) = unblocked {
        n.pcb_mut().state_mut(p).set_v0(status);
        n.dec_soft_block_count();
        n.ready_enqueue(p);
    }

    let has_current = n.current_process().is_some();
    drop(n);
    if has_current {
        hal::ldst(state)
    } else {
        scheduler::run()
    }
}
