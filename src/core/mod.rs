// Core modules: pure parsing, normalization, and error modeling (no I/O).
pub mod error;
pub mod expires;
pub mod fragment;
pub mod paste_ref;
