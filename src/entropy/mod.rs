//! Entropy coding building blocks shared by the Huffman and DCT codecs.

pub mod bit_io;
pub mod huffman_table;

pub use bit_io::{BitReader, BitWriter};
pub use huffman_table::{HuffmanCode, HuffmanTable};
