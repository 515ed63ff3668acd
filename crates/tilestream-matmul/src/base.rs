use tilestream_runtime::{
    DeviceContext,
    config::{GlobalConfig, Logger},
};

use crate::{
    components::{
        ConfigurationError, DoubleBufferedPool, LoggingListener, MatmulError, MatmulProblem,
        MatrixMut, MatrixRef, StageEvent, StageEventListener, TilePlan, TileRole, TileShape,
    },
    pipeline::{MatmulOperands, PipelineDriver},
};

/// Accumulates `lhs · rhs` into `out`, streaming tiles of the given shape through the device.
///
/// `out` must be zero-initialized for it to receive the product. Dimensions don't need to be
/// multiples of the tile shape: tiles are padded with zeros, and only the true region of each
/// tile is read from or written to the host matrices.
///
/// On a device error the pipeline stops and releases its buffers, while `out` may already hold
/// part of the product.
pub fn multiply_tiled<D: DeviceContext>(
    device: &mut D,
    kernel: &D::Kernel,
    lhs: MatrixRef<'_>,
    rhs: MatrixRef<'_>,
    out: MatrixMut<'_>,
    problem: MatmulProblem,
    tile_shape: TileShape,
) -> Result<(), MatmulError> {
    multiply_tiled_with_listener(device, kernel, lhs, rhs, out, problem, tile_shape, &mut ())
}

/// Same as [multiply_tiled], reporting every stage to the listener.
#[allow(clippy::too_many_arguments)]
pub fn multiply_tiled_with_listener<D: DeviceContext, L: StageEventListener>(
    device: &mut D,
    kernel: &D::Kernel,
    lhs: MatrixRef<'_>,
    rhs: MatrixRef<'_>,
    out: MatrixMut<'_>,
    problem: MatmulProblem,
    tile_shape: TileShape,
    listener: &mut L,
) -> Result<(), MatmulError> {
    let plan = TilePlan::new(problem, tile_shape)?;
    check_shape(TileRole::Lhs, &problem, (lhs.rows(), lhs.cols()))?;
    check_shape(TileRole::Rhs, &problem, (rhs.rows(), rhs.cols()))?;
    check_shape(TileRole::Out, &problem, (out.rows(), out.cols()))?;

    let mut pool = match DoubleBufferedPool::allocate(device, &tile_shape) {
        Ok(pool) => pool,
        Err(err) => {
            listener.on_event(&StageEvent::Aborted {
                reason: format!("can't allocate the {tile_shape} tile pool"),
            });
            return Err(err.into());
        }
    };

    let operands = MatmulOperands::new(lhs, rhs, out);
    let result = PipelineDriver::new(device, kernel, &mut pool, plan, operands, listener).run();

    if let Err(err) = &result {
        log::warn!("Tiled matmul {problem} aborted: {}", err.summary());

        // Operations still enqueued reference the pool buffers.
        if let Err(err) = pool.settle(device) {
            log::debug!("Settling the pool after an abort: {}", err.summary());
        }
    }
    pool.release(device);

    let tiles = result?;
    log::debug!("Tiled matmul {problem} accumulated {tiles} tiles");

    Ok(())
}

/// Same as [multiply_tiled], with the tile shape and the stage logging of the
/// [global configuration](GlobalConfig).
pub fn multiply<D: DeviceContext>(
    device: &mut D,
    kernel: &D::Kernel,
    lhs: MatrixRef<'_>,
    rhs: MatrixRef<'_>,
    out: MatrixMut<'_>,
    problem: MatmulProblem,
) -> Result<(), MatmulError> {
    let config = GlobalConfig::get();
    let tile_shape = TileShape::from(config.pipeline.tile_shape);
    let mut listener = LoggingListener::from_logger(Logger::from_config(config));

    multiply_tiled_with_listener(
        device,
        kernel,
        lhs,
        rhs,
        out,
        problem,
        tile_shape,
        &mut listener,
    )
}

fn check_shape(
    operand: TileRole,
    problem: &MatmulProblem,
    actual: (usize, usize),
) -> Result<(), ConfigurationError> {
    let expected = problem.shape(operand);
    if expected != actual {
        return Err(ConfigurationError::ShapeMismatch {
            operand,
            expected,
            actual,
        });
    }

    Ok(())
}
