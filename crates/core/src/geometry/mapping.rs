//! Inverse of the report buffer layout
//!
//! Reports give, per cell and section, where the section's compartments start
//! in the flat frame buffer. Geometry is looked up by cell and section, but
//! frames are consumed by increasing offset, so the pairs are flattened and
//! sorted by offset.

/// One contiguous run of compartments in the frame buffer
///
/// Ordering compares the buffer offset first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MappingElement {
    /// Offset of the first compartment in the frame buffer
    pub offset: u64,
    /// Index of the cell within the mapped batch
    pub cell_index: u32,
    /// Section id within the cell (0 is the soma)
    pub section_id: u32,
    /// Number of compartments in the run
    pub compartments: u16,
}

/// Runs sorted by increasing buffer offset
pub type FlatInverseMapping = Vec<MappingElement>;

/// Flatten per-cell offsets and counts into runs sorted by offset
///
/// Sections without compartments are skipped.
pub fn compute_inverse_mapping(offsets: &[Vec<u64>], counts: &[Vec<u16>]) -> FlatInverseMapping {
    let mut mapping: FlatInverseMapping = offsets
        .iter()
        .zip(counts)
        .enumerate()
        .flat_map(|(cell_index, (cell_offsets, cell_counts))| {
            cell_offsets
                .iter()
                .zip(cell_counts)
                .enumerate()
                .filter(|&(_, (_, &count))| count != 0)
                .map(move |(section_id, (&offset, &compartments))| MappingElement {
                    offset,
                    cell_index: cell_index as u32,
                    section_id: section_id as u32,
                    compartments,
                })
        })
        .collect();
    mapping.sort_unstable();
    mapping
}
