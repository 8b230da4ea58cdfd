//! Map-cell dispatch: one invocation per cell of a grid.

use log::debug;

use crate::algs::backend::Backend;
use crate::data::element::Id;
use crate::dispatch::binding::{self, Extras, SlotPlan};
use crate::mesh_error::MeshWorkletError;
use crate::worklet::arg::Arg;
use crate::worklet::invocation::ReadAt;
use crate::worklet::{Association, Role, Signature, Worklet};

/// Runs a worklet once per cell of the grid bound to its `TopologyIn`
/// parameter. Point fields are gathered through each cell's points.
#[derive(Debug)]
pub struct DispatcherMapCell<W, B> {
    worklet: W,
    backend: B,
}

impl<W: Worklet, B: Backend> DispatcherMapCell<W, B> {
    pub fn new(worklet: W, backend: B) -> Self {
        Self { worklet, backend }
    }

    pub fn worklet(&self) -> &W {
        &self.worklet
    }

    pub fn invoke(&self, args: &mut [Arg<'_, B>]) -> Result<(), MeshWorkletError> {
        let (cells, plans) = plan(&self.worklet.signature(), args)?;
        debug!("map-cell dispatch over {cells} cells on {}", self.backend.name());
        binding::run_region(&self.worklet, &self.backend, args, &plans, cells, Extras::default())
    }
}

/// Validate `args` for a map-cell dispatch; returns the cell count.
pub(crate) fn plan<B: Backend>(sig: &Signature, args: &[Arg<'_, B>]) -> Result<(Id, Vec<SlotPlan>), MeshWorkletError> {
    binding::check_arity(sig, args)?;
    let (_, grid) = binding::single_topology(sig, args)?;
    let (points, cells) = (grid.number_of_points(), grid.number_of_cells());

    let mut plans = Vec::with_capacity(sig.len());
    for (slot, (param, arg)) in sig.params().iter().zip(args).enumerate() {
        binding::check_kind(slot, param, arg)?;
        let plan = match param.role {
            Role::TopologyIn => SlotPlan::Topology,
            Role::FieldIn(Association::Point) => {
                binding::check_len(slot, arg, points, "one per point")?;
                SlotPlan::input(ReadAt::Points)
            }
            Role::FieldIn(_) => {
                binding::check_len(slot, arg, cells, "one per cell")?;
                SlotPlan::input(ReadAt::Own)
            }
            Role::FieldOut => SlotPlan::output(cells),
            Role::FieldInOut => {
                binding::check_len(slot, arg, cells, "one per cell")?;
                SlotPlan::in_place()
            }
            Role::Key | Role::Value => {
                return Err(MeshWorkletError::mismatch(
                    slot,
                    format!("{:?} is not available in a map-cell dispatch", param.role),
                ));
            }
        };
        plans.push(plan);
    }
    Ok((cells, plans))
}
