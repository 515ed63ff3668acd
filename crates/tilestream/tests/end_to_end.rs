#![cfg(feature = "cpu")]

use std::sync::Arc;

use rand::{Rng, SeedableRng, rngs::StdRng};
use tilestream::{
    components::{MatmulError, MatmulProblem, Matrix, TileShape},
    cpu::{CpuDevice, NaiveTileKernel},
    multiply_tiled,
    reference::{assert_equals_approx, matmul_reference},
    runtime::{
        DeviceError, TileArgs, TileKernel,
        config::{GlobalConfig, Logger, device::DeviceConfig},
    },
};

fn device(memory_budget: Option<usize>) -> CpuDevice {
    let config = DeviceConfig {
        memory_budget,
        ..Default::default()
    };
    CpuDevice::from_config(&config, Logger::from_config(Arc::new(GlobalConfig::default())))
        .unwrap()
}

fn naive() -> Arc<dyn TileKernel> {
    Arc::new(NaiveTileKernel)
}

fn run(
    device: &mut CpuDevice,
    kernel: &Arc<dyn TileKernel>,
    lhs: &Matrix,
    rhs: &Matrix,
    tile_shape: TileShape,
) -> Result<Matrix, MatmulError> {
    let problem = MatmulProblem::new(lhs.rows(), lhs.cols(), rhs.cols());
    let mut out = Matrix::zeros(lhs.rows(), rhs.cols());

    multiply_tiled(
        device,
        kernel,
        lhs.view(),
        rhs.view(),
        out.view_mut(),
        problem,
        tile_shape,
    )?;

    Ok(out)
}

#[test_log::test]
fn ones_times_twos_on_the_cpu_device() {
    let mut device = device(None);
    let lhs = Matrix::filled(4, 4, 1.0);
    let rhs = Matrix::filled(4, 4, 2.0);

    let out = run(&mut device, &naive(), &lhs, &rhs, TileShape::square(2)).unwrap();

    assert_eq!(out, Matrix::filled(4, 4, 8.0));
    assert_eq!(device.num_allocations(), 0);
}

#[test_log::test]
fn padded_tiles_on_the_cpu_device() {
    let mut device = device(None);
    let lhs = Matrix::sequential(3, 5);
    let rhs = Matrix::sequential(5, 3);

    let out = run(&mut device, &naive(), &lhs, &rhs, TileShape::square(2)).unwrap();
    let expected = matmul_reference(lhs.view(), rhs.view()).unwrap();

    pretty_assertions::assert_eq!(out, expected);
}

#[test_log::test]
fn random_matrices_on_the_cpu_device() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut device = device(None);
    let kernel = naive();

    for (m, k, n, tile) in [
        (17, 9, 23, TileShape::new(4, 3, 8)),
        (32, 32, 32, TileShape::square(8)),
        (1, 40, 5, TileShape::new(2, 16, 2)),
    ] {
        let lhs = Matrix::from_fn(m, k, |_, _| rng.random_range(-1.0..1.0));
        let rhs = Matrix::from_fn(k, n, |_, _| rng.random_range(-1.0..1.0));

        let out = run(&mut device, &kernel, &lhs, &rhs, tile).unwrap();
        let expected = matmul_reference(lhs.view(), rhs.view()).unwrap();

        assert_equals_approx(&expected, &out, 1e-4);
    }

    assert_eq!(device.memory_used(), 0);
}

#[test_log::test]
fn small_memory_budget_is_reported() {
    // Room for four of the six 2x2 tiles.
    let mut device = device(Some(64));
    let lhs = Matrix::filled(4, 4, 1.0);
    let rhs = Matrix::filled(4, 4, 1.0);

    let err = run(&mut device, &naive(), &lhs, &rhs, TileShape::square(2)).unwrap_err();

    assert!(matches!(err, MatmulError::ResourceExhaustion(_)));
    assert_eq!(device.memory_used(), 0);
    assert_eq!(device.num_allocations(), 0);
}

#[derive(Debug)]
struct PanickingKernel;

impl TileKernel for PanickingKernel {
    fn compute(&self, _args: TileArgs<'_>) {
        panic!("tile kernel failure");
    }
}

#[test_log::test]
fn kernel_failure_stops_the_pipeline() {
    let mut device = device(None);
    let kernel: Arc<dyn TileKernel> = Arc::new(PanickingKernel);
    let lhs = Matrix::filled(6, 6, 1.0);
    let rhs = Matrix::filled(6, 6, 1.0);

    let err = run(&mut device, &kernel, &lhs, &rhs, TileShape::square(2)).unwrap_err();

    assert!(matches!(
        err,
        MatmulError::Device(DeviceError::Execution { .. } | DeviceError::DependencyFailed { .. })
    ));
    assert_eq!(device.num_allocations(), 0);

    // Nothing of the failed pipeline is left on the queues.
    device.sync().unwrap();

    // The device keeps working after a failed pipeline.
    let out = run(&mut device, &naive(), &lhs, &rhs, TileShape::square(2)).unwrap();
    assert_eq!(out, Matrix::filled(6, 6, 6.0));
}
