//! Deterministic per-file IV derivation.
//!
//! The inherited wire format derives each file's IV by incrementing one byte
//! of a shared 16-byte seed and handing out the mutated seed. Reimplemented
//! here as a pure function returning updated state, so there is no hidden
//! mutable aliasing, while the output stays bit-for-bit compatible.
//!
//! # Security
//!
//! - For sessions with at most [`IV_LEN`] files every IV touches a distinct
//!   seed position, so all IVs are pairwise distinct
//! - Past [`IV_LEN`] files seed positions are reused; uniqueness then holds
//!   only modulo byte wraparound. This is an inherited property of the
//!   format, preserved for compatibility rather than strengthened

/// IV length in bytes (one AES block).
pub const IV_LEN: usize = 16;

/// Derive the IV for the file at position `counter` within a session.
///
/// Increments `seed[counter % 16]` by one (wrapping) and returns the mutated
/// seed twice: once as the state to carry into the next call, once as the IV
/// for the file about to be encrypted. Deterministic: the IV sequence is a
/// function of the initial seed alone.
pub fn derive_iv(seed: [u8; IV_LEN], counter: u32) -> ([u8; IV_LEN], [u8; IV_LEN]) {
    let mut next = seed;
    let position = counter as usize % IV_LEN;
    next[position] = next[position].wrapping_add(1);
    (next, next)
}
