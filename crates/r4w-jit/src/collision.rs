//! Overlap test between two reserved TX windows.
//!
//! A window is centred on a TX timestamp and reserves `pre` microseconds
//! before it and `post` microseconds after it. Two windows collide when
//! either one starts before the other has finished, plus a fixed margin:
//!
//! ```text
//!   (t1 - t2) <= pre1 + post2 + margin   ||   (t2 - t1) <= pre2 + post1 + margin
//! ```
//!
//! Both differences wrap at 32 bits, so exactly one of them is "small" when
//! the windows are close and the test stays valid across counter rollover.

use crate::timing::CountUs;

/// A reserved interval around a TX timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub center: CountUs,
    pub pre: u32,
    pub post: u32,
}

impl Window {
    pub const fn new(center: CountUs, pre: u32, post: u32) -> Self {
        Self { center, pre, post }
    }

    /// Whether `self` and `other` overlap once `margin` is added between them.
    #[inline]
    pub fn collides(&self, other: &Window, margin: u32) -> bool {
        collides(self, other, margin)
    }
}

/// Wraparound-safe overlap test.
#[inline]
pub fn collides(a: &Window, b: &Window, margin: u32) -> bool {
    let a_after_b = a.center.wrapping_sub(b.center);
    let b_after_a = b.center.wrapping_sub(a.center);

    a_after_b <= a.pre.wrapping_add(b.post).wrapping_add(margin)
        || b_after_a <= b.pre.wrapping_add(a.post).wrapping_add(margin)
}
