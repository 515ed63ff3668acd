use tilestream_runtime::HostBuffer;

use super::{MatrixMut, TileCoord, TilePlan, TileRole};

/// Adds the part of the downloaded tile that falls inside `out` to `out`.
///
/// Must be called exactly once per tile, after its download completed.
pub fn merge_into(out: &mut MatrixMut<'_>, plan: &TilePlan, coord: &TileCoord, staging: &HostBuffer) {
    let region = plan.region(TileRole::Out, coord);
    let tile = staging.lock();

    for row in 0..region.rows {
        let start = row * region.tile_width;
        let src = &tile[start..start + region.cols];
        let dst = &mut out.row_mut(region.row + row)[region.col..region.col + region.cols];

        for (acc, value) in dst.iter_mut().zip(src) {
            *acc += value;
        }
    }
}
