//! Flattened buffer addressing
//!
//! All four bindings (input, output, weights, bias) share one convention: a
//! coordinate `(col, row, depth)` lands at `col + width * (row + height * depth)`,
//! where `width`/`height` are the *addressed buffer's own* strides. A worker
//! computes offsets into several buffers, each with its own [`Strides`].
//!
//! ```text
//! depth 0            depth 1
//! +----+----+----+   +----+----+----+
//! |  0 |  1 |  2 |   |  6 |  7 |  8 |   width = 3, height = 2
//! +----+----+----+   +----+----+----+
//! |  3 |  4 |  5 |   |  9 | 10 | 11 |
//! +----+----+----+   +----+----+----+
//! ```

/// Declared `(width, height)` of one flattened buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Strides {
    /// Elements per row
    pub width: usize,
    /// Rows per depth slice
    pub height: usize,
}

impl Strides {
    /// Create a stride pair
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Linear offset of `(col, row, depth)` in this buffer
    #[inline]
    pub const fn offset(self, col: usize, row: usize, depth: usize) -> usize {
        offset(col, row, depth, self)
    }

    /// Elements in `depth` full slices
    pub const fn len_for_depth(self, depth: usize) -> usize {
        self.width * self.height * depth
    }
}

/// `col + width * (row + height * depth)`
///
/// No bounds checking; callers guarantee the coordinate is inside the buffer.
#[inline]
pub const fn offset(col: usize, row: usize, depth: usize, strides: Strides) -> usize {
    col + strides.width * (row + strides.height * depth)
}
