//! Recursion guard (A5), mirroring the teacher's `resource.rs`
//! `DEFAULT_MAX_RECURSION_DEPTH`: a ceiling on activation-stack depth so
//! unbounded recursion surfaces as an [`crate::error::ErrorKind::Fatal`]
//! error rather than a native stack overflow.

pub const MAX_RECURSION_DEPTH: usize = 512;
