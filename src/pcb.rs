//! Process control block pool (C1): a fixed-size arena of 20 PCBs, the
//! circular ready/blocked-queue primitives, and the process-tree primitives.
//!
//! PCBs never move once allocated — everything that would otherwise be a
//! pointer (queue links, tree links, the free list) is a stable index into
//! the arena, so a PCB can be referenced simultaneously from a queue, the
//! tree, and `current_process` without any aliasing hazard.

use crate::hal::{ProcessorState, SupportStruct, MAXPROC};

/// A stable index into the PCB arena. `usize` rather than a raw pointer —
/// see the arena note in DESIGN.md.
#[derive(Clone, Copy, PartialEq, Eq, Debug, PartialOrd, Ord)]
pub struct ProcessId(pub usize);

#[derive(Clone, Copy)]
struct Pcb {
    in_use: bool,
    state: ProcessorState,
    support: Option<*mut SupportStruct>,
    cpu_time: u32,
    start_tod: u32,
    sem_addr: Option<*mut i32>,
    prev: Option<ProcessId>,
    next: Option<ProcessId>,
    parent: Option<ProcessId>,
    child: Option<ProcessId>,
    sib_left: Option<ProcessId>,
    sib_right: Option<ProcessId>,
}

impl Pcb {
    const fn empty() -> Self {
        Pcb {
            in_use: false,
            state: ProcessorState::zeroed(),
            support: None,
            cpu_time: 0,
            start_tod: 0,
            sem_addr: None,
            prev: None,
            next: None,
            parent: None,
            child: None,
            sib_left: None,
            sib_right: None,
        }
    }
}

// Raw pointers make `Pcb` (and therefore `PcbPool`) `!Send`/`!Sync` by
// default. The nucleus runs on a single core with interrupts masked for
// every critical section that touches the pool, so there is never real
// concurrent access.
unsafe impl Send for Pcb {}

/// Fixed-size PCB pool plus the free list threaded through it.
pub struct PcbPool {
    table: [Pcb; MAXPROC],
    free_head: Option<ProcessId>,
}

impl PcbPool {
    pub const fn new() -> Self {
        let mut table = [Pcb::empty(); MAXPROC];
        let mut i = 0;
        while i < MAXPROC - 1 {
            table[i].next = Some(ProcessId(i + 1));
            i += 1;
        }
        PcbPool {
            table,
            free_head: Some(ProcessId(0)),
        }
    }

    /// Number of PCBs currently allocated.
    pub fn live_count(&self) -> usize {
        self.table.iter().filter(|p| p.in_use).count()
    }

    /// Number of PCBs still on the free list.
    pub fn free_count(&self) -> usize {
        MAXPROC - self.live_count()
    }

    /// Allocate a zero-initialized PCB, or `None` if the pool is exhausted.
    pub fn alloc_pcb(&mut self) -> Option<ProcessId> {
        let id = self.free_head?;
        self.free_head = self.table[id.0].next;
        self.table[id.0] = Pcb {
            in_use: true,
            ..Pcb::empty()
        };
        Some(id)
    }

    /// Return `p` to the free pool. `p` must not be linked into any queue
    /// or tree.
    pub fn free_pcb(&mut self, p: ProcessId) {
        self.table[p.0] = Pcb::empty();
        self.table[p.0].next = self.free_head;
        self.free_head = Some(p);
    }

    // -- saved-state / bookkeeping field accessors ----------------------

    pub fn state(&self, p: ProcessId) -> &ProcessorState {
        &self.table[p.0].state
    }

    pub fn state_mut(&mut self, p: ProcessId) -> &mut ProcessorState {
        &mut self.table[p.0].state
    }

    pub fn set_state(&mut self, p: ProcessId, state: ProcessorState) {
        self.table[p.0].state = state;
    }

    pub fn support(&self, p: ProcessId) -> Option<*mut SupportStruct> {
        self.table[p.0].support
    }

    pub fn set_support(&mut self, p: ProcessId, support: Option<*mut SupportStruct>) {
        self.table[p.0].support = support;
    }

    pub fn cpu_time(&self, p: ProcessId) -> u32 {
        self.table[p.0].cpu_time
    }

    pub fn set_cpu_time(&mut self, p: ProcessId, value: u32) {
        self.table[p.0].cpu_time = value;
    }

    pub fn start_tod(&self, p: ProcessId) -> u32 {
        self.table[p.0].start_tod
    }

    pub fn set_start_tod(&mut self, p: ProcessId, value: u32) {
        self.table[p.0].start_tod = value;
    }

    pub fn sem_addr(&self, p: ProcessId) -> Option<*mut i32> {
        self.table[p.0].sem_addr
    }

    pub fn set_sem_addr(&mut self, p: ProcessId, sem_addr: Option<*mut i32>) {
        self.table[p.0].sem_addr = sem_addr;
    }

    pub fn parent(&self, p: ProcessId) -> Option<ProcessId> {
        self.table[p.0].parent
    }

    // -- circular queue primitives (§4.1) --------------------------------

    pub fn mk_empty_procq() -> Option<ProcessId> {
        None
    }

    pub fn empty_procq(tail: Option<ProcessId>) -> bool {
        tail.is_none()
    }

    /// Insert `p` at the tail of the circular queue. O(1).
    pub fn insert_procq(&mut self, tail: &mut Option<ProcessId>, p: ProcessId) {
        match *tail {
            None => {
                self.table[p.0].next = Some(p);
                self.table[p.0].prev = Some(p);
            }
            Some(t) => {
                let head = self.table[t.0].next.expect("non-empty queue has a head");
                self.table[p.0].next = Some(head);
                self.table[p.0].prev = Some(t);
                self.table[head.0].prev = Some(p);
                self.table[t.0].next = Some(p);
            }
        }
        *tail = Some(p);
    }

    /// Remove and return the head of the queue. O(1).
    pub fn remove_procq(&mut self, tail: &mut Option<ProcessId>) -> Option<ProcessId> {
        let t = (*tail)?;
        let head = self.table[t.0].next.expect("non-empty queue has a head");
        self.out_procq(tail, head)
    }

    /// Remove `p` from the queue by identity. O(n). Returns `None` if `p`
    /// is not a member.
    pub fn out_procq(&mut self, tail: &mut Option<ProcessId>, p: ProcessId) -> Option<ProcessId> {
        let t = (*tail)?;
        let head = self.table[t.0].next.expect("non-empty queue has a head");
        let mut current = head;
        loop {
            if current == p {
                if current == t && self.table[current.0].next == Some(current) {
                    *tail = None;
                } else {
                    let prev = self.table[current.0].prev.unwrap();
                    let next = self.table[current.0].next.unwrap();
                    self.table[prev.0].next = Some(next);
                    self.table[next.0].prev = Some(prev);
                    if t == current {
                        *tail = Some(prev);
                    }
                }
                self.table[p.0].next = None;
                self.table[p.0].prev = None;
                return Some(p);
            }
            current = self.table[current.0].next.unwrap();
            if current == head {
                break;
            }
        }
        None
    }

    /// Peek the head of the queue without removing it.
    pub fn head_procq(&self, tail: Option<ProcessId>) -> Option<ProcessId> {
        tail.map(|t| self.table[t.0].next.expect("non-empty queue has a head"))
    }

    // -- process-tree primitives (§4.1) ----------------------------------

    pub fn empty_child(&self, p: ProcessId) -> bool {
        self.table[p.0].child.is_none()
    }

    /// Make `p` the first child of `parent`.
    pub fn insert_child(&mut self, parent: ProcessId, p: ProcessId) {
        let first_sib = self.table[parent.0].child;
        self.table[parent.0].child = Some(p);
        self.table[p.0].parent = Some(parent);
        self.table[p.0].sib_right = first_sib;
        self.table[p.0].sib_left = None;
        if let Some(fs) = first_sib {
            self.table[fs.0].sib_left = Some(p);
        }
    }

    /// Detach and return `p`'s first child, if any.
    pub fn remove_child(&mut self, p: ProcessId) -> Option<ProcessId> {
        let child = self.table[p.0].child?;
        self.out_child(child)
    }

    /// Detach `p` from its parent's child list regardless of position.
    pub fn out_child(&mut self, p: ProcessId) -> Option<ProcessId> {
        let parent = self.table[p.0].parent?;
        if self.table[parent.0].child == Some(p) {
            self.table[parent.0].child = self.table[p.0].sib_right;
        }
        if let Some(left) = self.table[p.0].sib_left {
            self.table[left.0].sib_right = self.table[p.0].sib_right;
        }
        if let Some(right) = self.table[p.0].sib_right {
            self.table[right.0].sib_left = self.table[p.0].sib_left;
        }
        self.table[p.0].parent = None;
        self.table[p.0].sib_left = None;
        self.table[p.0].sib_right = None;
        Some(p)
    }
}

impl Default for PcbPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_starts_full() {
        let pool = PcbPool::new();
        assert_eq!(pool.free_count(), MAXPROC);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn alloc_exhausts_then_refuses() {
        let mut pool = PcbPool::new();
        let mut ids = std::vec::Vec::new();
        for _ in 0..MAXPROC {
            ids.push(pool.alloc_pcb().expect("pool should not be exhausted yet"));
        }
        assert!(pool.alloc_pcb().is_none());
        assert_eq!(pool.live_count(), MAXPROC);

        pool.free_pcb(ids[0]);
        assert_eq!(pool.live_count(), MAXPROC - 1);
        assert!(pool.alloc_pcb().is_some());
    }

    #[test]
    fn alloc_pcb_is_zeroed() {
        let mut pool = PcbPool::new();
        let p = pool.alloc_pcb().unwrap();
        assert_eq!(pool.cpu_time(p), 0);
        assert_eq!(pool.sem_addr(p), None);
        assert_eq!(pool.support(p), None);
        assert_eq!(*pool.state(p), ProcessorState::zeroed());
    }

    #[test]
    fn alloc_then_free_restores_pool() {
        let mut pool = PcbPool::new();
        let before = pool.free_count();
        let p = pool.alloc_pcb().unwrap();
        pool.free_pcb(p);
        assert_eq!(pool.free_count(), before);
    }

    #[test]
    fn insert_then_remove_single_element_queue() {
        let mut pool = PcbPool::new();
        let p = pool.alloc_pcb().unwrap();
        let mut tail = PcbPool::mk_empty_procq();
        pool.insert_procq(&mut tail, p);
        assert!(!PcbPool::empty_procq(tail));
        assert_eq!(pool.head_procq(tail), Some(p));

        let removed = pool.remove_procq(&mut tail);
        assert_eq!(removed, Some(p));
        assert!(PcbPool::empty_procq(tail));
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut pool = PcbPool::new();
        let a = pool.alloc_pcb().unwrap();
        let b = pool.alloc_pcb().unwrap();
        let c = pool.alloc_pcb().unwrap();
        let mut tail = PcbPool::mk_empty_procq();
        pool.insert_procq(&mut tail, a);
        pool.insert_procq(&mut tail, b);
        pool.insert_procq(&mut tail, c);

        assert_eq!(pool.remove_procq(&mut tail), Some(a));
        assert_eq!(pool.remove_procq(&mut tail), Some(b));
        assert_eq!(pool.remove_procq(&mut tail), Some(c));
        assert!(PcbPool::empty_procq(tail));
    }

    #[test]
    fn out_procq_removes_middle_element() {
        let mut pool = PcbPool::new();
        let a = pool.alloc_pcb().unwrap();
        let b = pool.alloc_pcb().unwrap();
        let c = pool.alloc_pcb().unwrap();
        let mut tail = PcbPool::mk_empty_procq();
        pool.insert_procq(&mut tail, a);
        pool.insert_procq(&mut tail, b);
        pool.insert_procq(&mut tail, c);

        assert_eq!(pool.out_procq(&mut tail, b), Some(b));
        assert_eq!(pool.remove_procq(&mut tail), Some(a));
        assert_eq!(pool.remove_procq(&mut tail), Some(c));
        assert!(PcbPool::empty_procq(tail));
    }

    #[test]
    fn out_procq_on_tail_shifts_tail_back() {
        let mut pool = PcbPool::new();
        let a = pool.alloc_pcb().unwrap();
        let b = pool.alloc_pcb().unwrap();
        let mut tail = PcbPool::mk_empty_procq();
        pool.insert_procq(&mut tail, a);
        pool.insert_procq(&mut tail, b);
        assert_eq!(tail, Some(b));

        pool.out_procq(&mut tail, b);
        assert_eq!(tail, Some(a));
        assert_eq!(pool.head_procq(tail), Some(a));
    }

    #[test]
    fn out_procq_missing_element_returns_none() {
        let mut pool = PcbPool::new();
        let a = pool.alloc_pcb().unwrap();
        let b = pool.alloc_pcb().unwrap();
        let mut tail = PcbPool::mk_empty_procq();
        pool.insert_procq(&mut tail, a);
        assert_eq!(pool.out_procq(&mut tail, b), None);
    }

    #[test]
    fn insert_then_out_restores_queue() {
        let mut pool = PcbPool::new();
        let a = pool.alloc_pcb().unwrap();
        let b = pool.alloc_pcb().unwrap();
        let mut tail = PcbPool::mk_empty_procq();
        pool.insert_procq(&mut tail, a);
        let snapshot = tail;
        pool.insert_procq(&mut tail, b);
        pool.out_procq(&mut tail, b);
        assert_eq!(tail, snapshot);
    }

    #[test]
    fn tree_insert_child_makes_first_child() {
        let mut pool = PcbPool::new();
        let parent = pool.alloc_pcb().unwrap();
        let c1 = pool.alloc_pcb().unwrap();
        let c2 = pool.alloc_pcb().unwrap();
        pool.insert_child(parent, c1);
        pool.insert_child(parent, c2);

        assert_eq!(pool.remove_child(parent), Some(c2));
        assert_eq!(pool.remove_child(parent), Some(c1));
        assert!(pool.empty_child(parent));
    }

    #[test]
    fn out_child_detaches_regardless_of_position() {
        let mut pool = PcbPool::new();
        let parent = pool.alloc_pcb().unwrap();
        let c1 = pool.alloc_pcb().unwrap();
        let c2 = pool.alloc_pcb().unwrap();
        let c3 = pool.alloc_pcb().unwrap();
        pool.insert_child(parent, c1);
        pool.insert_child(parent, c2);
        pool.insert_child(parent, c3);
        // child list is now c3 -> c2 -> c1 (each insert becomes first child)

        assert_eq!(pool.out_child(c2), Some(c2));
        assert_eq!(pool.parent(c2), None);

        // remaining tree still walks: c3 (first child) -> c1
        assert_eq!(pool.remove_child(parent), Some(c3));
        assert_eq!(pool.remove_child(parent), Some(c1));
        assert!(pool.empty_child(parent));
    }

    #[test]
    fn out_child_without_parent_returns_none() {
        let mut pool = PcbPool::new();
        let p = pool.alloc_pcb().unwrap();
        assert_eq!(pool.out_child(p), None);
    }
}
