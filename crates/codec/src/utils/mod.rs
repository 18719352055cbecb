/// Hexadecimal encoding and word packing helpers.
pub mod hex;
