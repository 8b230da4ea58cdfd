//! Reduce-by-key dispatch: one invocation per distinct key.
//!
//! Keys are sorted together with their original positions, deduplicated,
//! and the start of each key's run is found with a lower-bound search. The
//! worklet then sees, for every unique key, the group of `Value` entries
//! that carried it.

use log::debug;

use crate::algs::backend::Backend;
use crate::algs::primitives;
use crate::data::array_handle::ArrayHandle;
use crate::data::element::{Element, Id, ValueType};
use crate::dispatch::binding::{self, Extras, SlotPlan};
use crate::mesh_error::MeshWorkletError;
use crate::worklet::arg::Arg;
use crate::worklet::invocation::{Groups, ReadAt};
use crate::worklet::{Role, Signature, Worklet};

/// Runs a worklet once per unique key.
///
/// The worklet's single `Key` parameter is bound by the dispatcher; the
/// caller supplies every other argument. `Value` inputs have one entry per
/// key occurrence; `FieldIn`, `FieldOut` and `FieldInOut` have one entry per
/// unique key.
#[derive(Debug)]
pub struct DispatcherReduceKeysValues<W, B> {
    worklet: W,
    backend: B,
}

impl<W: Worklet, B: Backend> DispatcherReduceKeysValues<W, B> {
    pub fn new(worklet: W, backend: B) -> Self {
        Self { worklet, backend }
    }

    pub fn worklet(&self) -> &W {
        &self.worklet
    }

    /// Group by `keys` and run the worklet; returns the sorted unique keys,
    /// which index every per-key output.
    pub fn invoke<K: Element + Ord>(
        &self,
        keys: &mut ArrayHandle<K, B>,
        args: &mut [Arg<'_, B>],
    ) -> Result<ArrayHandle<K, B>, MeshWorkletError> {
        let sig = self.worklet.signature();
        let key_slot = key_slot(&sig)?;
        if args.len() + 1 != sig.len() {
            return Err(MeshWorkletError::mismatch(
                sig.len().min(args.len() + 1),
                format!(
                    "worklet declares {} parameters besides its key, {} arguments given",
                    sig.len() - 1,
                    args.len()
                ),
            ));
        }
        let n = keys.len();
        precheck::<K, B>(&sig, key_slot, args, n)?;

        // Sort (key, position) pairs so equal keys are contiguous.
        let mut pairs = ArrayHandle::<(K, Id), B>::new(self.backend.clone());
        {
            let src = keys.prepare_for_input()?;
            let out = pairs.prepare_for_output(n)?;
            self.backend.schedule(
                |i| {
                    // SAFETY: each unit writes only its own index.
                    unsafe { out.set(i, (src[i], i)) };
                },
                n,
            );
        }
        primitives::sort(&mut pairs)?;

        let mut sorted_keys = ArrayHandle::<K, B>::new(self.backend.clone());
        let mut permutation = ArrayHandle::<Id, B>::new(self.backend.clone());
        {
            let src = pairs.prepare_for_input()?;
            let key_out = sorted_keys.prepare_for_output(n)?;
            let perm_out = permutation.prepare_for_output(n)?;
            self.backend.schedule(
                |i| {
                    let (key, at) = src[i];
                    // SAFETY: each unit writes only its own index.
                    unsafe {
                        key_out.set(i, key);
                        perm_out.set(i, at);
                    }
                },
                n,
            );
        }
        drop(pairs);

        let mut unique_keys = ArrayHandle::new(self.backend.clone());
        primitives::copy(&mut sorted_keys, &mut unique_keys)?;
        let groups = primitives::unique(&mut unique_keys)?;
        let mut starts = ArrayHandle::new(self.backend.clone());
        primitives::lower_bounds(&mut sorted_keys, &mut unique_keys, &mut starts)?;
        drop(sorted_keys);
        debug!("reduce-by-key: {n} values in {groups} groups");

        {
            let mut full: Vec<Arg<'_, B>> = Vec::with_capacity(sig.len());
            let mut key_arg = Some(Arg::field(&mut unique_keys));
            let mut user = args.iter_mut();
            for slot in 0..sig.len() {
                if slot == key_slot {
                    full.extend(key_arg.take());
                } else if let Some(arg) = user.next() {
                    full.push(arg.reborrow());
                }
            }
            let plans = plan(&sig, &full, n, groups)?;
            let extras = Extras {
                groups: Some(Groups {
                    permutation: permutation.prepare_for_input()?,
                    starts: starts.prepare_for_input()?,
                }),
                key_slot: Some(key_slot),
                ..Extras::default()
            };
            binding::run_region(&self.worklet, &self.backend, &mut full, &plans, groups, extras)?;
        }
        Ok(unique_keys)
    }
}

fn key_slot(sig: &Signature) -> Result<usize, MeshWorkletError> {
    let mut slots = sig.slots_with(Role::Key);
    match (slots.next(), slots.next()) {
        (Some(slot), None) => Ok(slot),
        (None, _) => Err(MeshWorkletError::mismatch(0, "a reduce-by-key worklet needs a Key parameter")),
        (Some(_), Some(extra)) => Err(MeshWorkletError::mismatch(extra, "only one Key parameter is supported")),
    }
}

/// Checks that do not depend on the group count, run before any primitive.
fn precheck<K: Element, B: Backend>(
    sig: &Signature,
    key_slot: usize,
    args: &[Arg<'_, B>],
    values: Id,
) -> Result<(), MeshWorkletError> {
    if sig.params()[key_slot].value_type != Some(ValueType::of::<K>()) {
        return Err(MeshWorkletError::mismatch(
            key_slot,
            format!("keys are {} values", std::any::type_name::<K>()),
        ));
    }
    let user_slots = (0..sig.len()).filter(|&slot| slot != key_slot);
    for (slot, arg) in user_slots.zip(args) {
        let param = &sig.params()[slot];
        if param.role == Role::TopologyIn {
            return Err(MeshWorkletError::mismatch(
                slot,
                "TopologyIn is not available in a reduce-by-key dispatch",
            ));
        }
        binding::check_kind(slot, param, arg)?;
        if param.role == Role::Value {
            binding::check_len(slot, arg, values, "one per key occurrence")?;
        }
    }
    Ok(())
}

fn plan<B: Backend>(
    sig: &Signature,
    args: &[Arg<'_, B>],
    values: Id,
    groups: Id,
) -> Result<Vec<SlotPlan>, MeshWorkletError> {
    binding::check_arity(sig, args)?;
    let mut plans = Vec::with_capacity(sig.len());
    for (slot, (param, arg)) in sig.params().iter().zip(args).enumerate() {
        binding::check_kind(slot, param, arg)?;
        let plan = match param.role {
            Role::Key => SlotPlan::input(ReadAt::Own),
            Role::Value => {
                binding::check_len(slot, arg, values, "one per key occurrence")?;
                SlotPlan::input(ReadAt::Group)
            }
            Role::FieldIn(_) => {
                binding::check_len(slot, arg, groups, "one per unique key")?;
                SlotPlan::input(ReadAt::Own)
            }
            Role::FieldOut => SlotPlan::output(groups),
            Role::FieldInOut => {
                binding::check_len(slot, arg, groups, "one per unique key")?;
                SlotPlan::in_place()
            }
            Role::TopologyIn => {
                return Err(MeshWorkletError::mismatch(
                    slot,
                    "TopologyIn is not available in a reduce-by-key dispatch",
                ));
            }
        };
        plans.push(plan);
    }
    Ok(plans)
}
