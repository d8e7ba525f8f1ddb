//! Dispatch grid, workgroups and the per-worker bounds check
//!
//! A dispatch launches `workgroup_count × workgroup_size` workers per axis,
//! which usually overshoots the real output shape. The [`WorkloadExtent`]
//! carries the true shape; workers outside it do nothing.
//!
//! Worker `x` owns output columns `2x` and `2x + 1`, worker `y` one output
//! row, worker `z` one output channel-group (4 channels).

/// Grid axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Column pairs
    X,
    /// Rows
    Y,
    /// Channel-groups
    Z,
}

/// A worker's coordinate in the dispatch grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl GlobalId {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// The two output columns this worker produces
    #[inline]
    pub const fn columns(self) -> [usize; 2] {
        [self.x * 2, self.x * 2 + 1]
    }
}

/// Logical grid shape a dispatch computes over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WorkloadExtent {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl WorkloadExtent {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Bounds check: `false` if any axis meets or exceeds its extent
    #[inline]
    pub const fn contains(self, id: GlobalId) -> bool {
        id.x < self.x && id.y < self.y && id.z < self.z
    }

    /// Number of workers that do real work
    pub const fn volume(self) -> usize {
        self.x * self.y * self.z
    }

    pub const fn is_empty(self) -> bool {
        self.volume() == 0
    }

    /// All in-extent coordinates, `x` fastest
    pub fn ids(self) -> impl Iterator<Item = GlobalId> {
        grid_ids(self.x, self.y, self.z)
    }
}

/// Workers per workgroup along each axis
///
/// A locality hint only: outputs never depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Default for WorkgroupSize {
    fn default() -> Self {
        Self { x: 8, y: 4, z: 8 }
    }
}

impl WorkgroupSize {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Workers per workgroup
    pub const fn invocations(self) -> u32 {
        self.x * self.y * self.z
    }

    /// Workgroups needed per axis to cover `extent` (ceiling division)
    pub fn workgroup_count(self, extent: WorkloadExtent) -> [u32; 3] {
        [
            div_ceil_u32(extent.x, self.x),
            div_ceil_u32(extent.y, self.y),
            div_ceil_u32(extent.z, self.z),
        ]
    }

    /// Full launched grid covering `extent`, rounded up to whole workgroups
    pub fn dispatch_grid(self, extent: WorkloadExtent) -> DispatchGrid {
        let [gx, gy, gz] = self.workgroup_count(extent);
        DispatchGrid {
            x: gx as usize * self.x as usize,
            y: gy as usize * self.y as usize,
            z: gz as usize * self.z as usize,
        }
    }
}

fn div_ceil_u32(extent: usize, size: u32) -> u32 {
    // a zero-sized workgroup is rejected by ConvParams::validate
    let size = size.max(1) as usize;
    u32::try_from(extent.div_ceil(size)).unwrap_or(u32::MAX)
}

/// Launched grid shape, possibly larger than the workload extent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchGrid {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl DispatchGrid {
    /// Every launched coordinate, in or out of extent, `x` fastest
    pub fn ids(self) -> impl Iterator<Item = GlobalId> {
        grid_ids(self.x, self.y, self.z)
    }

    pub const fn volume(self) -> usize {
        self.x * self.y * self.z
    }
}

fn grid_ids(nx: usize, ny: usize, nz: usize) -> impl Iterator<Item = GlobalId> {
    (0..nz).flat_map(move |z| (0..ny).flat_map(move |y| (0..nx).map(move |x| GlobalId::new(x, y, z))))
}
