//! Fixed, little-endian wire records for the transfer collectives.
//!
//! Every multi-byte field is stored pre-LE with `.to_le()` and decoded with
//! `.from_le()`; floats travel as their IEEE-754 bit patterns. Validity is an
//! explicit flag, never a sentinel value.

use crate::geometry::{BoundingBox, Point};
use crate::problem::ProblemId;
use crate::transfer_error::TransferError;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Decode a received buffer into records, rejecting partial records.
/// Copies, so the buffer needs no particular alignment.
pub fn decode_records<T: Pod>(bytes: &[u8]) -> Result<Vec<T>, TransferError> {
    let size = size_of::<T>();
    if bytes.len() % size != 0 {
        return Err(TransferError::WireLength {
            expected: (bytes.len() / size + 1) * size,
            found: bytes.len(),
        });
    }
    Ok(bytes
        .chunks_exact(size)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

/// Like [`decode_records`] but also requires exactly `n` records.
pub fn decode_exact<T: Pod>(bytes: &[u8], n: usize) -> Result<Vec<T>, TransferError> {
    let expected = n * size_of::<T>();
    if bytes.len() != expected {
        return Err(TransferError::WireLength {
            expected,
            found: bytes.len(),
        });
    }
    decode_records(bytes)
}

fn point_to_wire(p: &Point) -> [u64; 3] {
    p.map(|x| x.to_bits().to_le())
}

fn point_from_wire(w: &[u64; 3]) -> Point {
    w.map(|x| f64::from_bits(u64::from_le(x)))
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }

    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// A query point as shipped to an evaluating rank.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireQueryPoint {
    pub coords_le: [u64; 3],
    pub division_le: u32,
    pub has_division_le: u32,
    pub target_problem_le: u32,
    pub _pad: u32,
}

const_assert_eq!(size_of::<WireQueryPoint>(), 40);

impl WireQueryPoint {
    pub fn new(point: &Point, target_problem: ProblemId, division: Option<u32>) -> Self {
        Self {
            coords_le: point_to_wire(point),
            division_le: division.unwrap_or(0).to_le(),
            has_division_le: u32::from(division.is_some()).to_le(),
            target_problem_le: target_problem.0.to_le(),
            _pad: 0,
        }
    }

    pub fn point(&self) -> Point {
        point_from_wire(&self.coords_le)
    }

    pub fn target_problem(&self) -> ProblemId {
        ProblemId(u32::from_le(self.target_problem_le))
    }

    pub fn division(&self) -> Option<u32> {
        (u32::from_le(self.has_division_le) != 0).then(|| u32::from_le(self.division_le))
    }
}

/// One evaluation answer; `valid == 0` is the out-of-domain marker.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireResponse {
    pub value_le: u64,
    pub distance_le: u64,
    pub source_le: u32,
    pub valid_le: u32,
}

const_assert_eq!(size_of::<WireResponse>(), 24);

impl WireResponse {
    pub fn new(answer: Option<(f64, f64, ProblemId)>) -> Self {
        match answer {
            Some((value, distance, source)) => Self {
                value_le: value.to_bits().to_le(),
                distance_le: distance.to_bits().to_le(),
                source_le: source.0.to_le(),
                valid_le: 1u32.to_le(),
            },
            None => Self::zeroed(),
        }
    }

    pub fn get(&self) -> Option<(f64, f64, ProblemId)> {
        (u32::from_le(self.valid_le) != 0).then(|| {
            (
                f64::from_bits(u64::from_le(self.value_le)),
                f64::from_bits(u64::from_le(self.distance_le)),
                ProblemId(u32::from_le(self.source_le)),
            )
        })
    }
}

/// A source problem's reference-frame box plus its position offset.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireBox {
    pub min_le: [u64; 3],
    pub max_le: [u64; 3],
    pub position_le: [u64; 3],
    pub problem_le: u32,
    pub valid_le: u32,
}

const_assert_eq!(size_of::<WireBox>(), 80);

impl WireBox {
    pub fn new(bbox: &BoundingBox, position: &Point, problem: ProblemId) -> Self {
        Self {
            min_le: point_to_wire(&bbox.min),
            max_le: point_to_wire(&bbox.max),
            position_le: point_to_wire(position),
            problem_le: problem.0.to_le(),
            valid_le: u32::from(bbox.is_valid()).to_le(),
        }
    }

    /// The box, invalid if the sender's box was.
    pub fn bbox(&self) -> BoundingBox {
        if u32::from_le(self.valid_le) == 0 {
            return BoundingBox::invalid();
        }
        BoundingBox::new(point_from_wire(&self.min_le), point_from_wire(&self.max_le))
    }

    pub fn position(&self) -> Point {
        point_from_wire(&self.position_le)
    }

    pub fn problem(&self) -> ProblemId {
        ProblemId(u32::from_le(self.problem_le))
    }
}
