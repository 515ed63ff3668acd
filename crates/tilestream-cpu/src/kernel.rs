use tilestream_runtime::{TileArgs, TileKernel};

/// Tile kernel running a plain triple loop on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaiveTileKernel;

impl TileKernel for NaiveTileKernel {
    fn name(&self) -> &str {
        "naive-tile"
    }

    fn compute(&self, args: TileArgs<'_>) {
        let rows = args.out_rows();
        let TileArgs {
            lhs,
            rhs,
            out,
            reduce_len,
            out_width,
        } = args;

        out.fill(0.0);
        for row in 0..rows {
            let out_row = &mut out[row * out_width..(row + 1) * out_width];
            for t in 0..reduce_len {
                let a = lhs[row * reduce_len + t];
                let rhs_row = &rhs[t * out_width..(t + 1) * out_width];
                for (acc, b) in out_row.iter_mut().zip(rhs_row) {
                    *acc += a * b;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplies_square_tile() {
        // [1 2]   [5 6]   [19 22]
        // [3 4] x [7 8] = [43 50]
        let lhs = [1.0, 2.0, 3.0, 4.0];
        let rhs = [5.0, 6.0, 7.0, 8.0];
        let mut out = [f32::NAN; 4];

        NaiveTileKernel.compute(TileArgs::new(&lhs, &rhs, &mut out, 2, 2));

        assert_eq!(out, [19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn multiplies_rectangular_tile() {
        // 1x3 times 3x2
        let lhs = [1.0, 2.0, 3.0];
        let rhs = [1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut out = [0.0; 2];

        NaiveTileKernel.compute(TileArgs::new(&lhs, &rhs, &mut out, 3, 2));

        assert_eq!(out, [4.0, 5.0]);
    }
}
