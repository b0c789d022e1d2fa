//! Process-group service.
//!
//! The engine is written against a rank-count query, the same surface an MPI
//! communicator would provide. Here the group is virtual: all ranks live in
//! one address space and the redistribution layer executes their
//! point-to-point schedule deterministically on the control thread.

/// The active process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcGroup {
    nprocs: usize,
}

impl ProcGroup {
    #[must_use]
    pub fn new(nprocs: usize) -> Self {
        assert!(nprocs >= 1, "process group must have at least one rank");
        Self { nprocs }
    }

    #[must_use]
    pub fn nprocs(&self) -> usize {
        self.nprocs
    }
}

impl Default for ProcGroup {
    fn default() -> Self {
        Self::new(1)
    }
}
