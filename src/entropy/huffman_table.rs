//! Canonical Huffman tables.
//!
//! Tables are described the way JPEG's DHT segment describes them: a count of
//! codes for each length 1..=16 followed by the symbols in code order. Tables
//! can be built from symbol frequencies (deterministic tree construction plus
//! length limiting) or taken from the standard JPEG luminance tables.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::constants::MAX_HUFFMAN_CODE_LENGTH;
use crate::entropy::bit_io::{BitReader, BitWriter};
use crate::error::{CompressionError, Result};

/// Code bits (right-aligned) and their length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuffmanCode {
    pub value: u16,
    pub length: u8,
}

/// Standard JPEG DC luminance table (ITU-T T.81 Table K.3).
pub const STD_LUMINANCE_DC_COUNTS: [u16; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
pub const STD_LUMINANCE_DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// Standard JPEG AC luminance table (ITU-T T.81 Table K.5).
pub const STD_LUMINANCE_AC_COUNTS: [u16; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 125];
#[rustfmt::skip]
pub const STD_LUMINANCE_AC_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12,
    0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07,
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08,
    0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52, 0xd1, 0xf0,
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16,
    0x17, 0x18, 0x19, 0x1a, 0x25, 0x26, 0x27, 0x28,
    0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39,
    0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
    0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59,
    0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69,
    0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79,
    0x7a, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98,
    0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7,
    0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6,
    0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5,
    0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3, 0xd4,
    0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2,
    0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9, 0xea,
    0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

/// Encoding and decoding view of one canonical code.
#[derive(Clone)]
pub struct HuffmanTable {
    pub codes: [HuffmanCode; 256],
    pub counts: [u16; MAX_HUFFMAN_CODE_LENGTH],
    pub values: Vec<u8>,

    // Decoding fields
    min_code: [i32; MAX_HUFFMAN_CODE_LENGTH],
    max_code: [i32; MAX_HUFFMAN_CODE_LENGTH],
    val_ptr: [i32; MAX_HUFFMAN_CODE_LENGTH],
}

impl HuffmanTable {
    fn empty() -> Self {
        Self {
            codes: [HuffmanCode::default(); 256],
            counts: [0; MAX_HUFFMAN_CODE_LENGTH],
            values: Vec::new(),
            min_code: [0; MAX_HUFFMAN_CODE_LENGTH],
            max_code: [-1; MAX_HUFFMAN_CODE_LENGTH],
            val_ptr: [0; MAX_HUFFMAN_CODE_LENGTH],
        }
    }

    /// Builds a table from per-length code counts and the symbols in code order.
    pub fn from_counts(counts: &[u16; MAX_HUFFMAN_CODE_LENGTH], values: &[u8]) -> Result<Self> {
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        if total == 0 || total > 256 || total != values.len() {
            return Err(CompressionError::DecodeFailure(format!(
                "huffman table declares {total} codes for {} symbols",
                values.len()
            )));
        }

        let mut table = Self::empty();
        table.counts = *counts;
        table.values = values.to_vec();

        let mut code = 0u32;
        let mut val_idx = 0usize;
        for i in 0..MAX_HUFFMAN_CODE_LENGTH {
            let n_codes = counts[i] as usize;
            if n_codes == 0 {
                table.max_code[i] = -1;
            } else {
                table.val_ptr[i] = val_idx as i32;
                table.min_code[i] = code as i32;
                for _ in 0..n_codes {
                    let symbol = values[val_idx] as usize;
                    if table.codes[symbol].length != 0 {
                        return Err(CompressionError::DecodeFailure(format!(
                            "huffman symbol {symbol} listed twice"
                        )));
                    }
                    table.codes[symbol] = HuffmanCode {
                        value: code as u16,
                        length: (i + 1) as u8,
                    };
                    code += 1;
                    val_idx += 1;
                }
                if code > 1u32 << (i + 1) {
                    return Err(CompressionError::DecodeFailure(
                        "huffman code lengths are over-subscribed".into(),
                    ));
                }
                table.max_code[i] = code as i32 - 1;
            }
            code <<= 1;
        }
        Ok(table)
    }

    /// Builds an optimal length-limited table for the given symbol frequencies.
    ///
    /// Ties between equal weights are broken by insertion order (symbols in
    /// ascending order, merged nodes in creation order), so equal inputs always
    /// yield identical tables. A single-symbol alphabet gets a 1-bit code.
    pub fn from_frequencies(frequencies: &[u64; 256]) -> Result<Self> {
        let tree_lengths = tree_code_lengths(frequencies);

        let mut symbols: Vec<usize> = (0..256).filter(|&s| tree_lengths[s] > 0).collect();
        symbols.sort_by_key(|&s| (tree_lengths[s], s));

        let mut bits = [0u32; 256];
        for &s in &symbols {
            bits[tree_lengths[s] as usize] += 1;
        }
        limit_code_lengths(&mut bits);

        let mut counts = [0u16; MAX_HUFFMAN_CODE_LENGTH];
        for (length, count) in counts.iter_mut().enumerate() {
            *count = bits[length + 1] as u16;
        }
        let values: Vec<u8> = symbols.iter().map(|&s| s as u8).collect();
        Self::from_counts(&counts, &values)
    }

    pub fn standard_luminance_dc() -> Result<Self> {
        Self::from_counts(&STD_LUMINANCE_DC_COUNTS, &STD_LUMINANCE_DC_VALUES)
    }

    pub fn standard_luminance_ac() -> Result<Self> {
        Self::from_counts(&STD_LUMINANCE_AC_COUNTS, &STD_LUMINANCE_AC_VALUES)
    }

    pub fn encode(&self, symbol: u8, writer: &mut BitWriter) -> Result<()> {
        let code = self.codes[symbol as usize];
        if code.length == 0 {
            return Err(CompressionError::DecodeFailure(format!(
                "symbol {symbol} has no code in this table"
            )));
        }
        writer.write_bits(code.value, code.length);
        Ok(())
    }

    /// Decodes the next symbol from the bit reader.
    pub fn decode(&self, reader: &mut BitReader) -> Result<u8> {
        let mut code = 0i32;
        for i in 0..MAX_HUFFMAN_CODE_LENGTH {
            let bit = reader.read_bit()? as i32;
            code = (code << 1) | bit;
            if code <= self.max_code[i] && code >= self.min_code[i] {
                let idx = self.val_ptr[i] + (code - self.min_code[i]);
                return Ok(self.values[idx as usize]);
            }
        }
        Err(CompressionError::DecodeFailure("invalid huffman code".into()))
    }
}

/// Code lengths from the classic two-lowest merge. Unused symbols get 0.
fn tree_code_lengths(frequencies: &[u64; 256]) -> [u8; 256] {
    let mut lengths = [0u8; 256];
    let leaves: Vec<usize> = (0..256).filter(|&s| frequencies[s] > 0).collect();
    match leaves.len() {
        0 => return lengths,
        1 => {
            lengths[leaves[0]] = 1;
            return lengths;
        }
        _ => {}
    }

    // Node ids double as the insertion order used to break weight ties.
    let mut parent = vec![usize::MAX; leaves.len()];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = leaves
        .iter()
        .enumerate()
        .map(|(node, &s)| Reverse((frequencies[s], node)))
        .collect();

    loop {
        let Some(Reverse((low_weight, low))) = heap.pop() else {
            break;
        };
        let Some(Reverse((high_weight, high))) = heap.pop() else {
            break;
        };
        let node = parent.len();
        parent.push(usize::MAX);
        parent[low] = node;
        parent[high] = node;
        heap.push(Reverse((low_weight + high_weight, node)));
    }

    for (leaf, &symbol) in leaves.iter().enumerate() {
        let mut depth = 0usize;
        let mut node = leaf;
        while parent[node] != usize::MAX {
            node = parent[node];
            depth += 1;
        }
        lengths[symbol] = depth.min(u8::MAX as usize) as u8;
    }
    lengths
}

/// Moves codes longer than 16 bits up the tree (ITU-T T.81 Figure K.3).
fn limit_code_lengths(bits: &mut [u32; 256]) {
    let mut i = bits.len() - 1;
    while i > MAX_HUFFMAN_CODE_LENGTH {
        while bits[i] > 0 {
            let mut j = i - 2;
            while bits[j] == 0 {
                j -= 1;
            }
            bits[i] -= 2;
            bits[i - 1] += 1;
            bits[j + 1] += 2;
            bits[j] -= 1;
        }
        i -= 1;
    }
}

/// Magnitude category of a coefficient (ITU-T T.81 F.1.2.1).
pub fn magnitude_category(value: i16) -> u8 {
    if value == 0 {
        return 0;
    }
    (16 - value.unsigned_abs().leading_zeros()) as u8
}

/// Additional bits written after a category symbol (ITU-T T.81 F.1.2.1.1).
pub fn magnitude_bits(value: i16, category: u8) -> (u16, u8) {
    if category == 0 {
        return (0, 0);
    }
    if value >= 0 {
        (value as u16, category)
    } else {
        ((value as i32 + (1 << category) - 1) as u16, category)
    }
}

pub fn decode_magnitude(bits: u16, category: u8) -> i16 {
    if category == 0 {
        return 0;
    }
    let threshold = 1u16 << (category - 1);
    if bits >= threshold {
        bits as i16
    } else {
        (bits as i32 - (1i32 << category) + 1) as i16
    }
}
