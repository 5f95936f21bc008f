//! Concurrent Merkle tree account geometry.
//!
//! Layout of an account owned by the compression program:
//! - 2 bytes account type and header version
//! - 54 bytes header: max_buffer_size u32, max_depth u32, authority, creation slot, padding
//! - 24 bytes tree counters (sequence number, active index, buffer size)
//! - `max_buffer_size` change logs of `40 + 32 * max_depth` bytes each
//! - one rightmost proof of `40 + 32 * max_depth` bytes
//! - the canopy, `(2^(canopy_depth + 1) - 2) * 32` bytes

use thiserror::Error;

pub const TREE_HEADER_SIZE: usize = 2 + 54;
const TREE_COUNTERS_SIZE: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeGeometry {
    pub max_depth: u32,
    pub max_buffer_size: u32,
    pub canopy_depth: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeAccountError {
    #[error("tree account too small: {0} bytes")]
    TooSmall(usize),
    #[error("canopy region of {0} bytes is not a whole canopy")]
    BadCanopy(usize),
    #[error("unsupported tree header depth={max_depth} buffer={max_buffer_size}")]
    Unsupported { max_depth: u32, max_buffer_size: u32 },
}

const MAX_TREE_DEPTH: u32 = 30;
const MAX_BUFFER_SIZE: u32 = 2048;

fn path_size(max_depth: u32) -> usize {
    40 + 32 * max_depth as usize
}

fn tree_body_size(max_depth: u32, max_buffer_size: u32) -> usize {
    TREE_COUNTERS_SIZE + max_buffer_size as usize * path_size(max_depth) + path_size(max_depth)
}

fn canopy_size(canopy_depth: u32) -> usize {
    if canopy_depth == 0 {
        return 0;
    }
    ((1usize << (canopy_depth + 1)) - 2) * 32
}

/// Account size needed for a tree of the given shape.
pub fn tree_account_size(max_depth: u32, max_buffer_size: u32, canopy_depth: u32) -> usize {
    TREE_HEADER_SIZE + tree_body_size(max_depth, max_buffer_size) + canopy_size(canopy_depth)
}

/// Read depth and buffer size from the header and derive the canopy depth from
/// whatever space is left after the tree body.
pub fn read_geometry(data: &[u8]) -> Result<TreeGeometry, TreeAccountError> {
    if data.len() < TREE_HEADER_SIZE {
        return Err(TreeAccountError::TooSmall(data.len()));
    }
    let max_buffer_size = u32::from_le_bytes([data[2], data[3], data[4], data[5]]);
    let max_depth = u32::from_le_bytes([data[6], data[7], data[8], data[9]]);
    if max_depth == 0 || max_depth > MAX_TREE_DEPTH || max_buffer_size > MAX_BUFFER_SIZE {
        return Err(TreeAccountError::Unsupported {
            max_depth,
            max_buffer_size,
        });
    }

    let body_end = TREE_HEADER_SIZE + tree_body_size(max_depth, max_buffer_size);
    if data.len() < body_end {
        return Err(TreeAccountError::TooSmall(data.len()));
    }

    let canopy_bytes = data.len() - body_end;
    if canopy_bytes % 32 != 0 {
        return Err(TreeAccountError::BadCanopy(canopy_bytes));
    }
    // nodes = 2^(c+1) - 2
    let nodes = canopy_bytes / 32 + 2;
    if !nodes.is_power_of_two() {
        return Err(TreeAccountError::BadCanopy(canopy_bytes));
    }
    let canopy_depth = nodes.trailing_zeros().saturating_sub(1);

    Ok(TreeGeometry {
        max_depth,
        max_buffer_size,
        canopy_depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_account(max_depth: u32, max_buffer_size: u32, canopy_depth: u32) -> Vec<u8> {
        let mut data = vec![0u8; tree_account_size(max_depth, max_buffer_size, canopy_depth)];
        data[0] = 1;
        data[2..6].copy_from_slice(&max_buffer_size.to_le_bytes());
        data[6..10].copy_from_slice(&max_depth.to_le_bytes());
        data
    }

    #[test]
    fn known_sizes() {
        // depth 14 / buffer 64 / canopy 0 as reported by the compression SDK
        assert_eq!(tree_account_size(14, 64, 0), 31_800);
        assert_eq!(tree_account_size(3, 8, 0), 1_304);
    }

    #[test]
    fn geometry_round_trips_through_account_size() {
        for (d, b, c) in [(14, 64, 8), (14, 64, 0), (20, 1024, 10), (3, 8, 1)] {
            let g = read_geometry(&fake_account(d, b, c)).unwrap();
            assert_eq!(
                g,
                TreeGeometry {
                    max_depth: d,
                    max_buffer_size: b,
                    canopy_depth: c
                }
            );
        }
    }

    #[test]
    fn truncated_account_is_rejected() {
        let mut data = fake_account(14, 64, 8);
        data.truncate(100);
        assert_eq!(read_geometry(&data), Err(TreeAccountError::TooSmall(100)));
        assert!(read_geometry(&[0u8; 10]).is_err());
        // zeroed header from an account that is not a tree
        assert!(matches!(
            read_geometry(&[0u8; 512]),
            Err(TreeAccountError::Unsupported { .. })
        ));
    }
}
