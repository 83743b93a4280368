//! Balanced partitioning of a manifest across workers.

/// A contiguous, non-empty slice of the manifest assigned to one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    index: usize,
    names: Vec<String>,
}

impl Partition {
    /// Position of this partition in the split, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }

    /// File names assigned to this partition.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of files in this partition.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false for partitions produced by [`partition`].
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Consume the partition, returning its names.
    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

/// Split `names` into `min(workers, names.len())` balanced groups.
///
/// Groups keep input order. The first `names.len() % groups` groups receive
/// one extra element, so sizes differ by at most one. An empty input yields
/// no partitions. A `workers` value of 0 is treated as 1.
pub fn partition(names: &[String], workers: usize) -> Vec<Partition> {
    let groups = workers.max(1).min(names.len());
    if groups == 0 {
        return Vec::new();
    }

    let base = names.len() / groups;
    let remainder = names.len() % groups;

    let mut partitions = Vec::with_capacity(groups);
    let mut start = 0;
    for index in 0..groups {
        let size = base + usize::from(index < remainder);
        partitions.push(Partition {
            index,
            names: names[start..start + size].to_vec(),
        });
        start += size;
    }

    partitions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("file-{:03}.bin", i)).collect()
    }

    fn sizes(partitions: &[Partition]) -> Vec<usize> {
        partitions.iter().map(Partition::len).collect()
    }

    #[test]
    fn test_five_files_four_workers() {
        let input: Vec<String> = ["a.txt", "b.txt", "c.txt", "d.txt", "e.txt"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let partitions = partition(&input, 4);

        assert_eq!(sizes(&partitions), vec![2, 1, 1, 1]);
        assert_eq!(partitions[0].names(), &["a.txt", "b.txt"]);
        assert_eq!(partitions[3].names(), &["e.txt"]);
    }

    #[test]
    fn test_ten_files_three_workers() {
        let partitions = partition(&names(10), 3);
        assert_eq!(sizes(&partitions), vec![4, 3, 3]);
    }

    #[test]
    fn test_fewer_files_than_workers() {
        let partitions = partition(&names(2), 8);
        assert_eq!(sizes(&partitions), vec![1, 1]);
    }

    #[test]
    fn test_empty_manifest() {
        assert!(partition(&[], 4).is_empty());
    }

    #[test]
    fn test_indices_are_sequential() {
        let partitions = partition(&names(7), 3);
        let indices: Vec<usize> = partitions.iter().map(Partition::index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_zero_workers_treated_as_one() {
        let partitions = partition(&names(3), 0);
        assert_eq!(sizes(&partitions), vec![3]);
    }

    #[test]
    fn test_deterministic() {
        let input = names(23);
        assert_eq!(partition(&input, 5), partition(&input, 5));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_partitions_cover_manifest_exactly(
                count in 0usize..200,
                workers in 1usize..32
            ) {
                let input = names(count);
                let partitions = partition(&input, workers);

                let rejoined: Vec<String> = partitions
                    .iter()
                    .flat_map(|p| p.names().iter().cloned())
                    .collect();
                prop_assert_eq!(rejoined, input);
            }

            #[test]
            fn test_partitions_are_balanced(
                count in 1usize..200,
                workers in 1usize..32
            ) {
                let partitions = partition(&names(count), workers);
                let sizes = sizes(&partitions);

                prop_assert_eq!(partitions.len(), workers.min(count));
                let max = *sizes.iter().max().unwrap();
                let min = *sizes.iter().min().unwrap();
                prop_assert!(min >= 1, "empty partition in {:?}", sizes);
                prop_assert!(max - min <= 1, "unbalanced sizes {:?}", sizes);
            }
        }
    }
}
