//! Map-field dispatch: one invocation per element of the input fields.

use log::debug;

use crate::algs::backend::Backend;
use crate::data::element::Id;
use crate::dispatch::binding::{self, Extras, SlotPlan};
use crate::mesh_error::MeshWorkletError;
use crate::worklet::arg::Arg;
use crate::worklet::invocation::ReadAt;
use crate::worklet::{Role, Signature, Worklet};

/// Runs a worklet once per element of its longest input field.
///
/// Every non-constant input must have that length; outputs are allocated
/// to it.
#[derive(Debug)]
pub struct DispatcherMapField<W, B> {
    worklet: W,
    backend: B,
}

impl<W: Worklet, B: Backend> DispatcherMapField<W, B> {
    pub fn new(worklet: W, backend: B) -> Self {
        Self { worklet, backend }
    }

    pub fn worklet(&self) -> &W {
        &self.worklet
    }

    pub fn invoke(&self, args: &mut [Arg<'_, B>]) -> Result<(), MeshWorkletError> {
        let sig = self.worklet.signature();
        let (n, plans) = plan(&sig, args)?;
        debug!("map-field dispatch of {n} invocations on {}", self.backend.name());
        binding::run_region(&self.worklet, &self.backend, args, &plans, n, Extras::default())
    }
}

fn plan<B: Backend>(sig: &Signature, args: &[Arg<'_, B>]) -> Result<(Id, Vec<SlotPlan>), MeshWorkletError> {
    binding::check_arity(sig, args)?;
    for (slot, (param, arg)) in sig.params().iter().zip(args).enumerate() {
        if matches!(param.role, Role::TopologyIn | Role::Key | Role::Value) {
            return Err(MeshWorkletError::mismatch(
                slot,
                format!("{:?} is not available in a map-field dispatch", param.role),
            ));
        }
        binding::check_kind(slot, param, arg)?;
    }

    let inputs = || {
        sig.params()
            .iter()
            .zip(args)
            .enumerate()
            .filter(|(_, (p, _))| matches!(p.role, Role::FieldIn(_) | Role::FieldInOut))
            .filter_map(|(slot, (_, a))| a.as_field().filter(|f| !f.is_constant()).map(|f| (slot, f.len())))
    };
    let Some(n) = inputs().map(|(_, len)| len).max() else {
        return Err(MeshWorkletError::mismatch(
            0,
            "a map-field dispatch needs at least one non-constant input field",
        ));
    };
    if let Some((slot, len)) = inputs().find(|&(_, len)| len != n) {
        return Err(MeshWorkletError::mismatch(
            slot,
            format!("input has {len} values but the dispatch domain is {n}"),
        ));
    }

    let plans = sig
        .params()
        .iter()
        .map(|p| match p.role {
            Role::FieldOut => SlotPlan::output(n),
            Role::FieldInOut => SlotPlan::in_place(),
            _ => SlotPlan::input(ReadAt::Own),
        })
        .collect();
    Ok((n, plans))
}
