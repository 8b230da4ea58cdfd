//! Bind-time checks and the shared parallel-region driver.
//!
//! Every dispatcher turns a worklet signature plus caller arguments into a
//! list of [`SlotPlan`]s. Validation only looks at metadata (roles, element
//! types, lengths), so it is `O(parameters)` and completes before any array
//! is transferred or any primitive runs.

use log::warn;

use crate::algs::backend::Backend;
use crate::data::element::Id;
use crate::mesh_error::MeshWorkletError;
use crate::topology::Grid;
use crate::worklet::arg::Arg;
use crate::worklet::error_buffer::ErrorMessageBuffer;
use crate::worklet::invocation::{BoundSlot, Bindings, CellsOut, Groups, Invocation, ReadAt, Scatter};
use crate::worklet::{Param, Role, Signature, Worklet};

/// How one field parameter is prepared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Access {
    Input,
    Output(Id),
    InPlace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotPlan {
    Field { access: Access, read_at: ReadAt },
    Topology,
}

impl SlotPlan {
    pub(crate) fn input(read_at: ReadAt) -> Self {
        SlotPlan::Field {
            access: Access::Input,
            read_at,
        }
    }

    pub(crate) fn output(n: Id) -> Self {
        SlotPlan::Field {
            access: Access::Output(n),
            read_at: ReadAt::Own,
        }
    }

    pub(crate) fn in_place() -> Self {
        SlotPlan::Field {
            access: Access::InPlace,
            read_at: ReadAt::Own,
        }
    }
}

/// Extra per-dispatch context beyond the bound slots.
#[derive(Default)]
pub(crate) struct Extras<'p> {
    pub(crate) scatter: Option<Scatter<'p>>,
    pub(crate) cells_out: Option<CellsOut<'p>>,
    pub(crate) groups: Option<Groups<'p>>,
    pub(crate) key_slot: Option<usize>,
}

pub(crate) fn check_arity<B: Backend>(sig: &Signature, args: &[Arg<'_, B>]) -> Result<(), MeshWorkletError> {
    if sig.len() != args.len() {
        return Err(MeshWorkletError::mismatch(
            sig.len().min(args.len()),
            format!("worklet declares {} parameters, {} arguments given", sig.len(), args.len()),
        ));
    }
    Ok(())
}

/// Check that `arg` can fill `param`: topology roles take a grid, field
/// roles take a field of the declared element type, and outputs cannot be
/// constants.
pub(crate) fn check_kind<B: Backend>(slot: usize, param: &Param, arg: &Arg<'_, B>) -> Result<(), MeshWorkletError> {
    match (param.role, arg.as_field()) {
        (Role::TopologyIn, None) => Ok(()),
        (Role::TopologyIn, Some(_)) => Err(MeshWorkletError::mismatch(
            slot,
            format!("TopologyIn requires a grid, got a {} argument", arg.kind()),
        )),
        (_, None) => Err(MeshWorkletError::mismatch(
            slot,
            format!("{:?} requires a field, got a topology argument", param.role),
        )),
        (role, Some(field)) => {
            if let Some(expected) = param.value_type {
                if expected != field.value_type() {
                    return Err(MeshWorkletError::mismatch(
                        slot,
                        format!(
                            "expected {} values, got {}",
                            expected.name(),
                            field.value_type().name()
                        ),
                    ));
                }
            }
            if field.is_constant() && (role.is_output() || role == Role::Value) {
                return Err(MeshWorkletError::mismatch(
                    slot,
                    format!("{role:?} cannot be bound to a constant"),
                ));
            }
            Ok(())
        }
    }
}

/// Require a non-constant field argument to have exactly `expected` values.
pub(crate) fn check_len<B: Backend>(
    slot: usize,
    arg: &Arg<'_, B>,
    expected: Id,
    what: &str,
) -> Result<(), MeshWorkletError> {
    match arg.as_field() {
        Some(field) if !field.is_constant() && field.len() != expected => Err(MeshWorkletError::mismatch(
            slot,
            format!("expected {expected} values ({what}), got {}", field.len()),
        )),
        _ => Ok(()),
    }
}

/// The single grid bound to a `TopologyIn` parameter.
pub(crate) fn single_topology<'a, B: Backend>(
    sig: &Signature,
    args: &'a [Arg<'_, B>],
) -> Result<(usize, &'a dyn Grid<B>), MeshWorkletError> {
    let mut slots = sig.slots_with(Role::TopologyIn);
    let Some(slot) = slots.next() else {
        return Err(MeshWorkletError::mismatch(0, "a TopologyIn parameter is required"));
    };
    if let Some(extra) = slots.next() {
        return Err(MeshWorkletError::mismatch(extra, "only one TopologyIn parameter is supported"));
    }
    match args.get(slot).and_then(Arg::as_grid) {
        Some(grid) => Ok((slot, grid)),
        None => Err(MeshWorkletError::mismatch(slot, "TopologyIn requires a grid")),
    }
}

/// Prepare every argument as planned.
fn bind<'a, B: Backend>(
    args: &'a mut [Arg<'_, B>],
    plans: &[SlotPlan],
) -> Result<(Vec<BoundSlot<'a>>, Option<crate::topology::TopologyPortal<'a>>), MeshWorkletError> {
    let mut slots = Vec::with_capacity(args.len());
    let mut topology = None;
    for (slot, (arg, plan)) in args.iter_mut().zip(plans).enumerate() {
        match (arg, *plan) {
            (Arg::Topology(grid), SlotPlan::Topology) => {
                topology = Some(grid.prepare_topology()?);
                slots.push(BoundSlot::Topology);
            }
            (Arg::Field(field), SlotPlan::Field { access, read_at }) => {
                let broadcast = field.is_constant();
                let portal = match access {
                    Access::Input => field.bind_input()?,
                    Access::Output(n) => field.bind_output(n)?,
                    Access::InPlace => field.bind_in_place()?,
                };
                slots.push(BoundSlot::Field {
                    portal,
                    broadcast,
                    read_at,
                });
            }
            (Arg::Constant(field), SlotPlan::Field { access, read_at }) => {
                let portal = match access {
                    Access::Input => field.bind_input()?,
                    _ => return Err(MeshWorkletError::mismatch(slot, "a constant cannot be written")),
                };
                slots.push(BoundSlot::Field {
                    portal,
                    broadcast: true,
                    read_at,
                });
            }
            (arg, _) => {
                return Err(MeshWorkletError::mismatch(
                    slot,
                    format!("unexpected {} argument", arg.kind()),
                ));
            }
        }
    }
    Ok((slots, topology))
}

/// Bind `args`, run `worklet` over `[0, n)` and surface any raised error.
pub(crate) fn run_region<W, B>(
    worklet: &W,
    backend: &B,
    args: &mut [Arg<'_, B>],
    plans: &[SlotPlan],
    n: Id,
    extras: Extras<'_>,
) -> Result<(), MeshWorkletError>
where
    W: Worklet + ?Sized,
    B: Backend,
{
    let errors = ErrorMessageBuffer::new();
    let (slots, topology) = bind(args, plans)?;
    let bindings = Bindings {
        slots,
        topology,
        scatter: extras.scatter,
        cells_out: extras.cells_out,
        groups: extras.groups,
        key_slot: extras.key_slot,
        errors: &errors,
    };
    backend.schedule(|i| worklet.execute(&Invocation::new(i, &bindings)), n);
    drop(bindings);
    match errors.take() {
        None => Ok(()),
        Some(message) => {
            warn!("dispatch aborted on {}: {message}", backend.name());
            Err(MeshWorkletError::WorkletRuntime(message))
        }
    }
}
