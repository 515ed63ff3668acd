use tilestream_runtime::{DeviceContext, DeviceError, TileBindings};

use super::{DoubleBufferedPool, SlotIdent, TileRole};

/// Launches the kernel over the current lhs and rhs slots, writing the other out slot.
///
/// The kernel doesn't start before every `wait_on` signal completed. Padded elements of the
/// input tiles are zero, so they don't contribute to the output.
pub fn launch<D: DeviceContext>(
    device: &mut D,
    kernel: &D::Kernel,
    pool: &mut DoubleBufferedPool<D>,
    reduce_len: usize,
    out_width: usize,
    wait_on: &[D::Signal],
) -> Result<D::Signal, DeviceError> {
    let bindings = TileBindings::new(
        pool.current_slot(TileRole::Lhs),
        pool.current_slot(TileRole::Rhs),
        pool.other_slot(TileRole::Out),
        reduce_len,
        out_width,
    );
    let signal = device.launch(kernel, bindings, wait_on)?;

    pool.set_consumer(TileRole::Lhs, SlotIdent::Current, signal.clone());
    pool.set_consumer(TileRole::Rhs, SlotIdent::Current, signal.clone());
    pool.set_consumer(TileRole::Out, SlotIdent::Other, signal.clone());

    Ok(signal)
}
