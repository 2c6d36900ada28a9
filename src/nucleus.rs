//! Nucleus aggregate (C3): the process count, soft-block count, ready-queue
//! tail, current-process pointer and device-semaphore array that the rest
//! of the crate treats as "the kernel's global state".
//!
//! Everything here is encapsulated behind a single lock. The pass-up vector
//! and interrupt entry points are where hardware hands control to a fixed
//! address rather than a call site, and both need one well-known place to
//! reach into.

use lazy_static::lazy_static;
use spin::{Mutex, MutexGuard};

use crate::asl::AslPool;
use crate::hal::device::TOTAL_SEMAPHORES;
use crate::pcb::{PcbPool, ProcessId};

pub struct Nucleus {
    proc_count: u32,
    soft_block_count: u32,
    ready_queue_tail: Option<ProcessId>,
    current_process: Option<ProcessId>,
    device_semaphores: [i32; TOTAL_SEMAPHORES],
    pcb: PcbPool,
    asl: AslPool,
}

impl Nucleus {
    pub const fn new() -> Self {
        Nucleus {
            proc_count: 0,
            soft_block_count: 0,
            ready_queue_tail: None,
            current_process: None,
            device_semaphores: [0; TOTAL_SEMAPHORES],
            pcb: PcbPool::new(),
            asl: AslPool::new(),
        }
    }

    pub fn pcb(&self) -> &PcbPool {
        &self.pcb
    }

    pub fn pcb_mut(&mut self) -> &mut PcbPool {
        &mut self.pcb
    }

    pub fn asl_mut(&mut self) -> &mut AslPool {
        &mut self.asl
    }

    /// Borrow the PCB pool and the ASL simultaneously — needed by every
    /// operation that moves a process between the ready queue / a blocked
    /// queue and the semaphore table in one step.
    pub fn pcb_and_asl_mut(&mut self) -> (&mut PcbPool, &mut AslPool) {
        (&mut self.pcb, &mut self.asl)
    }

    /// Remove `p` from the ready queue by identity, if present.
    pub fn ready_out(&mut self, p: ProcessId) -> Option<ProcessId> {
        self.pcb.out_procq(&mut self.ready_queue_tail, p)
    }

    pub fn proc_count(&self) -> u32 {
        self.proc_count
    }

    pub fn inc_proc_count(&mut self) {
        self.proc_count += 1;
    }

    pub fn dec_proc_count(&mut self) {
        self.proc_count = self.proc_count.saturating_sub(1);
    }

    pub fn soft_block_count(&self) -> u32 {
        self.soft_block_count
    }

    pub fn inc_soft_block_count(&mut self) {
        self.soft_block_count += 1;
    }

    pub fn dec_soft_block_count(&mut self) {
        self.soft_block_count = self.soft_block_count.saturating_sub(1);
    }

    pub fn current_process(&self) -> Option<ProcessId> {
        self.current_process
    }

    pub fn set_current_process(&mut self, p: Option<ProcessId>) {
        self.current_process = p;
    }

    pub fn ready_is_empty(&self) -> bool {
        PcbPool::empty_procq(self.ready_queue_tail)
    }

    /// Append `p` to the tail of the ready queue.
    pub fn ready_enqueue(&mut self, p: ProcessId) {
        self.pcb.insert_procq(&mut self.ready_queue_tail, p);
    }

    /// Remove and return the head of the ready queue.
    pub fn ready_dequeue(&mut self) -> Option<ProcessId> {
        self.pcb.remove_procq(&mut self.ready_queue_tail)
    }

    /// Device-semaphore array index into a raw pointer suitable for use as
    /// an ASL key — semaphore identity is the address of the counter cell,
    /// not an arena index (see DESIGN.md).
    pub fn device_sem_ptr(&mut self, idx: usize) -> *mut i32 {
        &mut self.device_semaphores[idx] as *mut i32
    }

    pub fn device_sem_value(&self, idx: usize) -> i32 {
        self.device_semaphores[idx]
    }

    /// True if `addr` is one of this nucleus's own device-semaphore cells
    /// (including the pseudo-clock semaphore — it is soft-blocking exactly
    /// like a device semaphore per the `soft_block_count` invariant in
    /// §3, so it is treated as one here).
    pub fn is_device_semaphore(&mut self, addr: *mut i32) -> bool {
        let base = self.device_semaphores.as_mut_ptr();
        let end = unsafe { base.add(TOTAL_SEMAPHORES) };
        addr >= base && addr < end
    }
}

impl Default for Nucleus {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    pub static ref NUCLEUS: Mutex<Nucleus> = Mutex::new(Nucleus::new());
}

/// Lock the global nucleus state. Every entry point that is not itself
/// already holding the lock (interrupt entry, syscall dispatch, scheduler)
/// takes it exactly once per invocation and holds it for the whole critical
/// section, matching §5's "interrupts stay masked for the lock's entire
/// critical section" discipline.
pub fn lock() -> MutexGuard<'static, Nucleus> {
    NUCLEUS.lock()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_nucleus_has_no_current_process() {
        let n = Nucleus::new();
        assert_eq!(n.current_process(), None);
        assert_eq!(n.proc_count(), 0);
        assert!(n.ready_is_empty());
    }

    #[test]
    fn ready_queue_is_fifo() {
        let mut n = Nucleus::new();
        let a = n.pcb_mut().alloc_pcb().unwrap();
        let b = n.pcb_mut().alloc_pcb().unwrap();
        n.ready_enqueue(a);
        n.ready_enqueue(b);
        assert_eq!(n.ready_dequeue(), Some(a));
        assert_eq!(n.ready_dequeue(), Some(b));
        assert!(n.ready_is_empty());
    }

    #[test]
    fn counters_saturate_at_zero() {
        let mut n = Nucleus::new();
        n.dec_proc_count();
        n.dec_soft_block_count();
        assert_eq!(n.proc_count(), 0);
        assert_eq!(n.soft_block_count(), 0);
    }

    #[test]
    fn device_sem_ptr_addresses_the_backing_cell() {
        let mut n = Nucleus::new();
        let ptr = n.device_sem_ptr(0);
        unsafe {
            *ptr = 5;
        }
        assert_eq!(n.device_sem_value(0), 5);
    }
}
