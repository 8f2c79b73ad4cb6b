use crate::graph::TileKey;
use linfa::Float;
use ndarray::{s, Array1, Array2, ArrayBase, Data, Ix1, Ix2};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

static NEXT_GRID_ID: AtomicUsize = AtomicUsize::new(0);

/// A two-dimensional grid of independently locked tiles.
///
/// Tiles are addressed by `(row, col)` tile indices and stored row-major. Each grid gets a
/// process-unique identifier so that its slots can be named by [TileKey]s when declaring
/// the accesses of a [crate::TaskGraph] task.
///
/// Locks are only there to hand tiles over between tasks: the task graph orders every
/// conflicting access, hence a lock is never waited on.
pub struct Tiles<T> {
    id: usize,
    n_rows: usize,
    n_cols: usize,
    slots: Vec<RwLock<T>>,
}

/// A grid of matrix tiles
pub type TiledMatrix<F> = Tiles<Array2<F>>;
/// A column of vector tiles (grid with one column)
pub type TiledVector<F> = Tiles<Array1<F>>;
/// A single scalar slot used as a reduction accumulator
pub type TiledScalar<F> = Tiles<F>;

impl<T> Tiles<T> {
    /// Build a `n_rows x n_cols` grid where tile `(i, j)` is `f(i, j)`
    pub fn from_fn(n_rows: usize, n_cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut slots = Vec::with_capacity(n_rows * n_cols);
        for i in 0..n_rows {
            for j in 0..n_cols {
                slots.push(RwLock::new(f(i, j)));
            }
        }
        Tiles {
            id: NEXT_GRID_ID.fetch_add(1, Ordering::Relaxed),
            n_rows,
            n_cols,
            slots,
        }
    }

    /// Number of tile rows
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of tile columns
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    fn index(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.n_rows && col < self.n_cols,
            "tile ({row}, {col}) out of a {}x{} grid",
            self.n_rows,
            self.n_cols
        );
        row * self.n_cols + col
    }

    /// Key naming tile `(row, col)` in task access declarations
    pub fn key(&self, row: usize, col: usize) -> TileKey {
        TileKey {
            grid: self.id,
            index: self.index(row, col),
        }
    }

    /// Shared access to tile `(row, col)`
    pub fn read(&self, row: usize, col: usize) -> RwLockReadGuard<'_, T> {
        self.slots[self.index(row, col)]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive access to tile `(row, col)`
    pub fn write(&self, row: usize, col: usize) -> RwLockWriteGuard<'_, T> {
        self.slots[self.index(row, col)]
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutable access to tile `(row, col)` outside of any task graph
    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut T {
        let idx = self.index(row, col);
        self.slots[idx]
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Consume the grid and return its tiles in row-major order
    pub fn into_vec(self) -> Vec<T> {
        self.slots
            .into_iter()
            .map(|slot| slot.into_inner().unwrap_or_else(PoisonError::into_inner))
            .collect()
    }
}

impl<T> fmt::Debug for Tiles<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Tiles(id={}, grid={}x{})",
            self.id, self.n_rows, self.n_cols
        )
    }
}

impl<F: Float> Tiles<Array2<F>> {
    /// Grid of empty (0x0) tiles, meant to be filled by generation tasks
    pub fn empty(n_rows: usize, n_cols: usize) -> Self {
        Self::from_fn(n_rows, n_cols, |_, _| Array2::zeros((0, 0)))
    }

    /// Split a dense matrix into square tiles of size `tile_size`.
    /// *Panics* if the matrix dimensions are not multiples of `tile_size`.
    pub fn from_dense(a: &ArrayBase<impl Data<Elem = F>, Ix2>, tile_size: usize) -> Self {
        assert!(
            tile_size > 0 && a.nrows() % tile_size == 0 && a.ncols() % tile_size == 0,
            "matrix {:?} cannot be split in tiles of size {tile_size}",
            a.shape()
        );
        Self::from_fn(a.nrows() / tile_size, a.ncols() / tile_size, |i, j| {
            a.slice(s![
                i * tile_size..(i + 1) * tile_size,
                j * tile_size..(j + 1) * tile_size
            ])
            .to_owned()
        })
    }

    /// Assemble the full dense matrix
    pub fn into_dense(self) -> Array2<F> {
        let (n_rows, n_cols) = (self.n_rows, self.n_cols);
        let tiles = self.into_vec();
        let heights: Vec<usize> = (0..n_rows).map(|i| tiles[i * n_cols].nrows()).collect();
        let widths: Vec<usize> = (0..n_cols).map(|j| tiles[j].ncols()).collect();
        assemble(&tiles, n_cols, &heights, &widths, |_, _| true)
    }

    /// Assemble the dense lower triangular matrix of a square grid of which only
    /// the tiles on and below the diagonal are meaningful
    pub fn into_dense_lower(self) -> Array2<F> {
        let n = self.n_rows;
        let tiles = self.into_vec();
        let heights: Vec<usize> = (0..n).map(|i| tiles[i * n + i].nrows()).collect();
        let widths: Vec<usize> = (0..n).map(|j| tiles[j * n + j].ncols()).collect();
        assemble(&tiles, n, &heights, &widths, |i, j| j <= i)
    }
}

fn assemble<F: Float>(
    tiles: &[Array2<F>],
    n_cols: usize,
    heights: &[usize],
    widths: &[usize],
    keep: impl Fn(usize, usize) -> bool,
) -> Array2<F> {
    let mut dense = Array2::zeros((heights.iter().sum(), widths.iter().sum()));
    let mut row_offset = 0;
    for (i, h) in heights.iter().enumerate() {
        let mut col_offset = 0;
        for (j, w) in widths.iter().enumerate() {
            if keep(i, j) {
                dense
                    .slice_mut(s![row_offset..row_offset + h, col_offset..col_offset + w])
                    .assign(&tiles[i * n_cols + j]);
            }
            col_offset += w;
        }
        row_offset += h;
    }
    dense
}

impl<F: Float> Tiles<Array1<F>> {
    /// Column of `n` empty tiles, meant to be filled by generation tasks
    pub fn empty(n: usize) -> Self {
        Self::from_fn(n, 1, |_, _| Array1::zeros(0))
    }

    /// Split a vector into tiles of size `tile_size`.
    /// *Panics* if the length is not a multiple of `tile_size`.
    pub fn from_array(x: &ArrayBase<impl Data<Elem = F>, Ix1>, tile_size: usize) -> Self {
        assert!(
            tile_size > 0 && x.len() % tile_size == 0,
            "vector of length {} cannot be split in tiles of size {tile_size}",
            x.len()
        );
        Self::from_fn(x.len() / tile_size, 1, |i, _| {
            x.slice(s![i * tile_size..(i + 1) * tile_size]).to_owned()
        })
    }

    /// Concatenate the tiles into one vector
    pub fn into_vector(self) -> Array1<F> {
        self.into_vec()
            .iter()
            .flat_map(|tile| tile.iter().copied())
            .collect()
    }
}

impl<F: Float> Tiles<F> {
    /// Single slot accumulator starting at `init`
    pub fn scalar(init: F) -> Self {
        Self::from_fn(1, 1, |_, _| init)
    }

    /// Value held by a single slot accumulator
    pub fn into_scalar(self) -> F {
        self.into_vec().into_iter().next().unwrap_or_else(F::zero)
    }
}
