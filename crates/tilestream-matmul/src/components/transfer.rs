use tilestream_runtime::{DeviceContext, DeviceError, HostBuffer};

use super::{DoubleBufferedPool, MatrixRef, SlotIdent, TileCoord, TilePlan, TileRole};

/// Packs the tile of `source` at `coord` into the staging tile of `role`, then uploads it into
/// the other slot of that role.
///
/// Elements of the tile falling outside of `source` are zero. The staging tile must not be in
/// use by a transfer anymore. The slots aren't swapped.
pub fn stage_and_upload<D: DeviceContext>(
    device: &mut D,
    pool: &mut DoubleBufferedPool<D>,
    plan: &TilePlan,
    role: TileRole,
    source: &MatrixRef<'_>,
    coord: &TileCoord,
) -> Result<D::Signal, DeviceError> {
    let staging = pool.staging(role);
    pack(staging, source, plan, role, coord);

    let signal = device.upload(staging, pool.other_slot(role), &[])?;
    pool.set_transfer(role, signal.clone());
    pool.set_consumer(role, SlotIdent::Other, signal.clone());

    Ok(signal)
}

/// Downloads the current out slot into the out staging tile once every `wait_on` signal
/// completed.
///
/// The returned staging tile is only valid after the returned signal completed.
pub fn download_async<D: DeviceContext>(
    device: &mut D,
    pool: &mut DoubleBufferedPool<D>,
    wait_on: &[D::Signal],
) -> Result<(D::Signal, HostBuffer), DeviceError> {
    let staging = pool.staging(TileRole::Out).clone();

    let signal = device.download(pool.current_slot(TileRole::Out), &staging, wait_on)?;
    pool.set_transfer(TileRole::Out, signal.clone());
    pool.set_consumer(TileRole::Out, SlotIdent::Current, signal.clone());

    Ok((signal, staging))
}

fn pack(
    staging: &HostBuffer,
    source: &MatrixRef<'_>,
    plan: &TilePlan,
    role: TileRole,
    coord: &TileCoord,
) {
    let region = plan.region(role, coord);
    let mut tile = staging.lock();

    tile.fill(0.0);
    for row in 0..region.rows {
        let src = &source.row(region.row + row)[region.col..region.col + region.cols];
        let start = row * region.tile_width;
        tile[start..start + region.cols].copy_from_slice(src);
    }
}
