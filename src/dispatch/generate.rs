//! Generate-interpolated-cells dispatch: the classify and generate worklets
//! plus the pipeline options.

use crate::algs::backend::Backend;
use crate::algs::generate_topology::{GenerateConfig, GenerateSummary, GenerateTopology, PointMap};
use crate::data::element::Id;
use crate::dispatch::binding::{self, SlotPlan};
use crate::mesh_error::MeshWorkletError;
use crate::topology::{Grid, UnstructuredGrid};
use crate::worklet::arg::Arg;
use crate::worklet::invocation::ReadAt;
use crate::worklet::{Association, Role, Signature, Worklet};

/// Runs a topology-changing algorithm as a classification worklet and a
/// generation worklet over the [`GenerateTopology`] pipeline.
///
/// The generation worklet runs once per output cell. Its cell fields are
/// read at the source cell, its point fields through the source cell's
/// points, and its outputs have one value per output cell.
#[derive(Debug)]
pub struct DispatcherGenerateTopology<C, G, B: Backend> {
    classify: C,
    generate: G,
    pipeline: GenerateTopology<B>,
}

impl<C: Worklet, G: Worklet, B: Backend> DispatcherGenerateTopology<C, G, B> {
    pub fn new(classify: C, generate: G, backend: B) -> Self {
        Self {
            classify,
            generate,
            pipeline: GenerateTopology::new(backend),
        }
    }

    pub fn with_config(mut self, config: GenerateConfig) -> Self {
        *self.pipeline.config_mut() = config;
        self
    }

    pub fn set_remove_duplicate_points(&mut self, remove: bool) {
        self.pipeline.config_mut().remove_duplicate_points = remove;
    }

    pub fn remove_duplicate_points(&self) -> bool {
        self.pipeline.config().remove_duplicate_points
    }

    pub fn classify_worklet(&self) -> &C {
        &self.classify
    }

    pub fn generate_worklet(&self) -> &G {
        &self.generate
    }

    pub fn invoke(
        &self,
        input: &mut dyn Grid<B>,
        classify_args: &mut [Arg<'_, B>],
        generate_args: &mut [Arg<'_, B>],
        output: &mut UnstructuredGrid<B>,
    ) -> Result<GenerateSummary, MeshWorkletError> {
        self.invoke_with_point_map(input, classify_args, generate_args, output, |_| Ok(()))
    }

    /// Like [`invoke`](Self::invoke); `on_points` can carry additional point
    /// fields over to the output grid.
    pub fn invoke_with_point_map<F>(
        &self,
        input: &mut dyn Grid<B>,
        classify_args: &mut [Arg<'_, B>],
        generate_args: &mut [Arg<'_, B>],
        output: &mut UnstructuredGrid<B>,
        on_points: F,
    ) -> Result<GenerateSummary, MeshWorkletError>
    where
        F: FnMut(&mut PointMap<B>) -> Result<(), MeshWorkletError>,
    {
        self.pipeline.run(
            &self.classify,
            &self.generate,
            input,
            classify_args,
            generate_args,
            output,
            on_points,
        )
    }
}

/// Validate the generation stage for `output_cells` output cells.
pub(crate) fn plan<B: Backend>(
    sig: &Signature,
    args: &[Arg<'_, B>],
    output_cells: Id,
) -> Result<Vec<SlotPlan>, MeshWorkletError> {
    binding::check_arity(sig, args)?;
    let (_, grid) = binding::single_topology(sig, args)?;
    let (points, cells) = (grid.number_of_points(), grid.number_of_cells());

    let mut plans = Vec::with_capacity(sig.len());
    for (slot, (param, arg)) in sig.params().iter().zip(args).enumerate() {
        binding::check_kind(slot, param, arg)?;
        let plan = match param.role {
            Role::TopologyIn => SlotPlan::Topology,
            Role::FieldIn(Association::Point) => {
                binding::check_len(slot, arg, points, "one per input point")?;
                SlotPlan::input(ReadAt::Points)
            }
            Role::FieldIn(_) => {
                binding::check_len(slot, arg, cells, "one per input cell")?;
                SlotPlan::input(ReadAt::Source)
            }
            Role::FieldOut => SlotPlan::output(output_cells),
            Role::FieldInOut | Role::Key | Role::Value => {
                return Err(MeshWorkletError::mismatch(
                    slot,
                    format!("{:?} is not available when generating cells", param.role),
                ));
            }
        };
        plans.push(plan);
    }
    Ok(plans)
}
