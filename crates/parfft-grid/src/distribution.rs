//! Assignment of boxes to owning ranks.

/// Maps each box of a [`crate::BoxArray`] to the rank that owns it.
///
/// Invariant: a mapping is only meaningful next to a box array of the same
/// length; the engine checks this where the pair travels together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DistributionMapping {
    owners: Vec<usize>,
}

impl DistributionMapping {
    #[must_use]
    pub fn new(owners: Vec<usize>) -> Self {
        Self { owners }
    }

    /// Order-preserving mapping: box `i` is owned by rank `i`.
    #[must_use]
    pub fn iota(n: usize) -> Self {
        Self {
            owners: (0..n).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    #[must_use]
    pub fn owner(&self, box_id: usize) -> usize {
        self.owners[box_id]
    }
}

#[cfg(test)]
mod tests {
    use super::DistributionMapping;

    #[test]
    fn iota_assigns_ranks_in_order() {
        let dm = DistributionMapping::iota(4);
        assert_eq!(dm.len(), 4);
        for i in 0..4 {
            assert_eq!(dm.owner(i), i);
        }
    }
}
