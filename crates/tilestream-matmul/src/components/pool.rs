use tilestream_runtime::{AllocationError, DeviceContext, DeviceError, HostBuffer};

use super::{SlotIdent, TileRole, TileShape};

/// Device slots and staging tile of one role.
#[derive(Debug)]
struct RoleBuffers<D: DeviceContext> {
    slots: [D::Buffer; 2],
    current: usize,
    consumers: [Option<D::Signal>; 2],
    staging: HostBuffer,
    last_transfer: Option<D::Signal>,
}

impl<D: DeviceContext> RoleBuffers<D> {
    fn allocate(device: &mut D, shape: &TileShape, role: TileRole) -> Result<Self, AllocationError> {
        let len = shape.num_elems(role);
        let first = device.allocate(len)?;
        let second = match device.allocate(len) {
            Ok(buffer) => buffer,
            Err(err) => {
                device.release(first);
                return Err(err);
            }
        };

        Ok(Self {
            slots: [first, second],
            current: 0,
            consumers: [None, None],
            staging: HostBuffer::zeros(len),
            last_transfer: None,
        })
    }

    fn release(self, device: &mut D) {
        for buffer in self.slots {
            device.release(buffer);
        }
    }

    fn index(&self, slot: SlotIdent) -> usize {
        match slot {
            SlotIdent::Current => self.current,
            SlotIdent::Other => 1 - self.current,
        }
    }
}

/// Two device slots per [role](TileRole) and one staging tile per role, all sized for a tile.
///
/// While a tile is being processed from the current slot, the next one is issued into the
/// other slot. The driver [swaps](DoubleBufferedPool::swap) the slots once an operation
/// targeting the other slot was issued.
///
/// The pool records the signal of the last operation issued against every slot and every
/// staging tile. A buffer is free to be reused once that signal has completed.
#[derive(Debug)]
pub struct DoubleBufferedPool<D: DeviceContext> {
    roles: [RoleBuffers<D>; 3],
}

impl<D: DeviceContext> DoubleBufferedPool<D> {
    /// Allocates every slot and staging tile.
    ///
    /// When an allocation fails, the buffers already allocated are released before the error
    /// is returned.
    pub fn allocate(device: &mut D, shape: &TileShape) -> Result<Self, AllocationError> {
        let lhs = RoleBuffers::allocate(device, shape, TileRole::Lhs)?;
        let rhs = match RoleBuffers::allocate(device, shape, TileRole::Rhs) {
            Ok(buffers) => buffers,
            Err(err) => {
                lhs.release(device);
                return Err(err);
            }
        };
        let out = match RoleBuffers::allocate(device, shape, TileRole::Out) {
            Ok(buffers) => buffers,
            Err(err) => {
                lhs.release(device);
                rhs.release(device);
                return Err(err);
            }
        };

        Ok(Self {
            roles: [lhs, rhs, out],
        })
    }

    /// Releases every device slot. Staging tiles are dropped with the pool.
    pub fn release(self, device: &mut D) {
        for role in self.roles {
            role.release(device);
        }
    }

    pub fn current_slot(&self, role: TileRole) -> &D::Buffer {
        self.slot(role, SlotIdent::Current)
    }

    pub fn other_slot(&self, role: TileRole) -> &D::Buffer {
        self.slot(role, SlotIdent::Other)
    }

    pub fn slot(&self, role: TileRole, slot: SlotIdent) -> &D::Buffer {
        let buffers = self.role(role);
        &buffers.slots[buffers.index(slot)]
    }

    /// Makes the other slot current.
    pub fn swap(&mut self, role: TileRole) {
        let buffers = self.role_mut(role);
        buffers.current = 1 - buffers.current;
    }

    pub fn staging(&self, role: TileRole) -> &HostBuffer {
        &self.role(role).staging
    }

    /// Records the signal of the latest operation issued against a slot.
    pub fn set_consumer(&mut self, role: TileRole, slot: SlotIdent, signal: D::Signal) {
        let buffers = self.role_mut(role);
        let index = buffers.index(slot);
        buffers.consumers[index] = Some(signal);
    }

    /// Takes the signal of the latest operation issued against a slot.
    pub fn take_consumer(&mut self, role: TileRole, slot: SlotIdent) -> Option<D::Signal> {
        let buffers = self.role_mut(role);
        let index = buffers.index(slot);
        buffers.consumers[index].take()
    }

    /// Records the signal of the latest transfer reading or writing a staging tile.
    pub fn set_transfer(&mut self, role: TileRole, signal: D::Signal) {
        self.role_mut(role).last_transfer = Some(signal);
    }

    /// Takes the signal of the latest transfer reading or writing a staging tile.
    pub fn take_transfer(&mut self, role: TileRole) -> Option<D::Signal> {
        self.role_mut(role).last_transfer.take()
    }

    /// Waits on every recorded signal and forgets them.
    ///
    /// Every signal is awaited even when one reports an error, the first error is returned.
    pub fn settle(&mut self, device: &mut D) -> Result<(), DeviceError> {
        let signals = self
            .roles
            .iter_mut()
            .flat_map(|role| {
                let [first, second] = &mut role.consumers;
                [first.take(), second.take(), role.last_transfer.take()]
            })
            .flatten()
            .collect::<Vec<_>>();

        device.wait(&signals)
    }

    fn role(&self, role: TileRole) -> &RoleBuffers<D> {
        &self.roles[role.index()]
    }

    fn role_mut(&mut self, role: TileRole) -> &mut RoleBuffers<D> {
        &mut self.roles[role.index()]
    }
}
