//! Cross-cutting utilities.
//!
//! Currently just filesystem helpers; see [`fs`].

pub mod fs;
