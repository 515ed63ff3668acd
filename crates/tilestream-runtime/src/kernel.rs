/// Arguments of one tile kernel invocation.
///
/// `lhs` is a row-major `out.len() / out_width` × `reduce_len` tile, `rhs` a row-major
/// `reduce_len` × `out_width` tile, and `out` receives their product.
#[derive(new, Debug)]
pub struct TileArgs<'a> {
    /// The left-hand side tile.
    pub lhs: &'a [f32],
    /// The right-hand side tile.
    pub rhs: &'a [f32],
    /// The output tile, overwritten by the kernel.
    pub out: &'a mut [f32],
    /// Length of the reduction dimension.
    pub reduce_len: usize,
    /// Number of columns of the output tile.
    pub out_width: usize,
}

impl TileArgs<'_> {
    /// Number of rows of the output tile.
    pub fn out_rows(&self) -> usize {
        if self.out_width == 0 {
            0
        } else {
            self.out.len() / self.out_width
        }
    }

    /// Checks that the tile lengths agree with the launch dimensions.
    pub fn validate(&self) -> Result<(), alloc::string::String> {
        let rows = self.out_rows();

        if rows * self.out_width != self.out.len() {
            return Err(alloc::format!(
                "output length {} is not a multiple of the output width {}",
                self.out.len(),
                self.out_width
            ));
        }
        if self.lhs.len() < rows * self.reduce_len {
            return Err(alloc::format!(
                "lhs tile holds {} elements, {rows}x{} required",
                self.lhs.len(),
                self.reduce_len
            ));
        }
        if self.rhs.len() < self.reduce_len * self.out_width {
            return Err(alloc::format!(
                "rhs tile holds {} elements, {}x{} required",
                self.rhs.len(),
                self.reduce_len,
                self.out_width
            ));
        }

        Ok(())
    }
}

/// A compute kernel producing one output tile from two input tiles.
///
/// The kernel is compiled and bound by the setup layer; the pipeline only relies on the
/// contract `out = lhs · rhs`.
pub trait TileKernel: Send + Sync + core::fmt::Debug {
    /// Name used when logging launches.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Computes the tile product, overwriting `args.out`.
    fn compute(&self, args: TileArgs<'_>);
}
