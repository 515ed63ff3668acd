use tilestream_runtime::{DeviceContext, DeviceError, HostBuffer};

use super::{InFlight, RoleState};
use crate::components::{
    DoubleBufferedPool, MatrixMut, MatrixRef, SlotIdent, StageEvent, StageEventListener,
    TileCoord, TilePlan, TileRole, WaitTarget, accumulate, compute, transfer,
};

/// The host matrices of one matmul.
#[derive(new, Debug)]
pub struct MatmulOperands<'a> {
    pub lhs: MatrixRef<'a>,
    pub rhs: MatrixRef<'a>,
    pub out: MatrixMut<'a>,
}

/// Walks the tile grid, keeping one tile loading, one computing and one being read back.
///
/// Each step issues, in order, the download of the tile computed at the previous step, the
/// kernel of the tile loaded at the previous step, the uploads of the next tile, and finally
/// accumulates the downloaded tile into the output. The lhs tile is shared by every tile of a
/// `(row, reduce)` group, so it is only uploaded for the first column block.
///
/// Before issuing into a slot or a staging tile, the driver waits on the last operation
/// recorded against that buffer only.
pub struct PipelineDriver<'a, D: DeviceContext, L: StageEventListener> {
    device: &'a mut D,
    kernel: &'a D::Kernel,
    pool: &'a mut DoubleBufferedPool<D>,
    plan: TilePlan,
    operands: MatmulOperands<'a>,
    listener: &'a mut L,
    standing_lhs: Option<D::Signal>,
    loaded: InFlight<D::Signal>,
    computed: InFlight<D::Signal>,
    downloaded: InFlight<D::Signal, HostBuffer>,
    roles: [RoleState; 3],
    accumulated: usize,
}

impl<'a, D: DeviceContext, L: StageEventListener> PipelineDriver<'a, D, L> {
    pub fn new(
        device: &'a mut D,
        kernel: &'a D::Kernel,
        pool: &'a mut DoubleBufferedPool<D>,
        plan: TilePlan,
        operands: MatmulOperands<'a>,
        listener: &'a mut L,
    ) -> Self {
        Self {
            device,
            kernel,
            pool,
            plan,
            operands,
            listener,
            standing_lhs: None,
            loaded: InFlight::Empty,
            computed: InFlight::Empty,
            downloaded: InFlight::Empty,
            roles: [RoleState::Idle; 3],
            accumulated: 0,
        }
    }

    /// Runs the whole grid, then drains the pipeline.
    ///
    /// Returns the number of accumulated tiles. On error the pipeline stops right away, the
    /// output may be partially accumulated and operations may still be running on the device.
    pub fn run(mut self) -> Result<usize, DeviceError> {
        self.emit(StageEvent::Started { plan: self.plan });

        match self.drive() {
            Ok(()) => {
                self.emit(StageEvent::Drained {
                    tiles: self.accumulated,
                });
                Ok(self.accumulated)
            }
            Err(err) => {
                self.emit(StageEvent::Aborted {
                    reason: err.summary(),
                });
                Err(err)
            }
        }
    }

    fn drive(&mut self) -> Result<(), DeviceError> {
        for coord in self.plan.grid() {
            self.advance(Some(coord))?;
        }

        while !self.is_drained() {
            self.advance(None)?;
        }

        for role in TileRole::ALL {
            self.set_role_state(role, RoleState::Idle);
        }

        Ok(())
    }

    /// Performs one step, loading `next` if any.
    pub fn advance(&mut self, next: Option<TileCoord>) -> Result<(), DeviceError> {
        self.issue_download()?;
        self.issue_launch()?;

        if let Some(coord) = next {
            self.issue_loads(coord)?;
        }

        self.observe_download()?;
        self.accumulate_ready();

        Ok(())
    }

    /// Whether no tile is in flight anymore.
    pub fn is_drained(&self) -> bool {
        self.loaded.is_empty() && self.computed.is_empty() && self.downloaded.is_empty()
    }

    fn issue_download(&mut self) -> Result<(), DeviceError> {
        let InFlight::Pending { signal, coord, .. } = self.computed.take() else {
            return Ok(());
        };

        self.reclaim_staging(TileRole::Out)?;
        let (download, staging) = transfer::download_async(self.device, self.pool, &[signal])?;

        self.downloaded = InFlight::Pending {
            signal: download,
            coord,
            staging,
        };
        self.emit(StageEvent::Download { coord });
        self.set_role_state(TileRole::Out, RoleState::Downloading);

        Ok(())
    }

    fn issue_launch(&mut self) -> Result<(), DeviceError> {
        let InFlight::Pending {
            signal: rhs_upload,
            coord,
            ..
        } = self.loaded.take()
        else {
            return Ok(());
        };

        self.reclaim_slot(TileRole::Out)?;

        let mut wait_on = Vec::with_capacity(2);
        if let Some(lhs_upload) = self.standing_lhs.clone() {
            self.observe_loaded(TileRole::Lhs, &lhs_upload);
            wait_on.push(lhs_upload);
        }
        self.observe_loaded(TileRole::Rhs, &rhs_upload);
        wait_on.push(rhs_upload);

        let tile = self.plan.tile_shape();
        let signal = compute::launch(
            self.device,
            self.kernel,
            self.pool,
            tile.reduce,
            tile.cols,
            &wait_on,
        )?;
        self.pool.swap(TileRole::Out);

        self.computed = InFlight::Pending {
            signal,
            coord,
            staging: (),
        };
        self.emit(StageEvent::Launch { coord });
        for role in TileRole::ALL {
            self.set_role_state(role, RoleState::Computing);
        }

        Ok(())
    }

    fn issue_loads(&mut self, coord: TileCoord) -> Result<(), DeviceError> {
        if coord.starts_group() {
            let lhs = self.operands.lhs;
            let signal = self.load(TileRole::Lhs, &lhs, coord)?;
            self.standing_lhs = Some(signal);
        }

        let rhs = self.operands.rhs;
        let signal = self.load(TileRole::Rhs, &rhs, coord)?;
        self.loaded = InFlight::Pending {
            signal,
            coord,
            staging: (),
        };

        Ok(())
    }

    fn load(
        &mut self,
        role: TileRole,
        source: &MatrixRef<'_>,
        coord: TileCoord,
    ) -> Result<D::Signal, DeviceError> {
        self.reclaim_staging(role)?;
        self.reclaim_slot(role)?;

        let signal =
            transfer::stage_and_upload(self.device, self.pool, &self.plan, role, source, &coord)?;
        self.pool.swap(role);

        self.emit(StageEvent::Upload { role, coord });
        self.set_role_state(role, RoleState::Loading);

        Ok(signal)
    }

    fn observe_download(&mut self) -> Result<(), DeviceError> {
        let InFlight::Pending {
            signal,
            coord,
            staging,
        } = self.downloaded.take()
        else {
            return Ok(());
        };

        self.device.wait(&[signal])?;
        self.downloaded = InFlight::Ready { coord, staging };

        Ok(())
    }

    fn accumulate_ready(&mut self) {
        let (coord, staging) = match self.downloaded.take() {
            InFlight::Ready { coord, staging } => (coord, staging),
            other => {
                self.downloaded = other;
                return;
            }
        };

        accumulate::merge_into(&mut self.operands.out, &self.plan, &coord, &staging);
        self.accumulated += 1;

        self.emit(StageEvent::Accumulate { coord });
        if self.computed.is_empty() {
            self.set_role_state(TileRole::Out, RoleState::Idle);
        }
    }

    // Waits until the other slot of the role isn't used by the device anymore.
    fn reclaim_slot(&mut self, role: TileRole) -> Result<(), DeviceError> {
        match self.pool.take_consumer(role, SlotIdent::Other) {
            Some(signal) => self.reclaim(role, WaitTarget::Slot, signal),
            None => Ok(()),
        }
    }

    // Waits until the staging tile of the role isn't used by a transfer anymore.
    fn reclaim_staging(&mut self, role: TileRole) -> Result<(), DeviceError> {
        match self.pool.take_transfer(role) {
            Some(signal) => self.reclaim(role, WaitTarget::Staging, signal),
            None => Ok(()),
        }
    }

    fn reclaim(
        &mut self,
        role: TileRole,
        target: WaitTarget,
        signal: D::Signal,
    ) -> Result<(), DeviceError> {
        if !self.device.is_complete(&signal) {
            self.emit(StageEvent::Wait { role, target });
        }

        self.device.wait(&[signal])
    }

    fn observe_loaded(&mut self, role: TileRole, upload: &D::Signal) {
        if self.device.is_complete(upload) {
            self.set_role_state(role, RoleState::Loaded);
        }
    }

    fn set_role_state(&mut self, role: TileRole, state: RoleState) {
        let current = &mut self.roles[role.index()];
        if *current != state {
            *current = state;
            self.emit(StageEvent::RoleState { role, state });
        }
    }

    fn emit(&mut self, event: StageEvent) {
        self.listener.on_event(&event);
    }
}
