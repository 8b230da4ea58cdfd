//! Generate-topology pipeline: classify → scan/expand → generate → compact.
//!
//! Builds an output grid in which every input cell contributes a
//! data-dependent number of output cells, without the worklet author
//! writing any indexing logic:
//!
//! 1. **Classify**: a map-cell dispatch writes one output count per input cell.
//! 2. **Expand**: inclusive scan of the counts gives the total `T` and the
//!    cumulative offsets; a lower-bound search of `1..=T` against the offsets
//!    maps every output cell back to the input cell that produced it.
//! 3. **Generate**: the generation worklet runs once per output cell and
//!    writes that cell's connectivity (input point ids).
//! 4. **Compact**: input points no generated cell references are dropped and
//!    the connectivity is renumbered, or (with duplicate removal off) every
//!    connectivity entry gets its own copy of its point.
//!
//! Every stage is synchronous; a stage starts only after the previous one
//! has returned, and an error in any stage aborts the whole pipeline.

use std::sync::atomic::{AtomicU8, Ordering};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::algs::backend::Backend;
use crate::algs::primitives;
use crate::data::array_handle::ArrayHandle;
use crate::data::element::{Element, Id, Mask};
use crate::dispatch::binding::{self, Extras};
use crate::dispatch::{generate, map_cell};
use crate::mesh_error::MeshWorkletError;
use crate::topology::{Grid, UnstructuredGrid};
use crate::worklet::arg::Arg;
use crate::worklet::invocation::{CellsOut, Scatter};
use crate::worklet::{Param, Role, Signature, Worklet};

/// Per-invocation options of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Share points between output cells (compact + renumber). When off,
    /// every connectivity entry gets its own output point.
    pub remove_duplicate_points: bool,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            remove_duplicate_points: true,
        }
    }
}

/// Sizes of one pipeline run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenerateSummary {
    pub input_cells: Id,
    pub output_cells: Id,
    pub output_points: Id,
}

enum Mapping<B: Backend> {
    Compact(ArrayHandle<Mask, B>),
    Gather(ArrayHandle<Id, B>),
}

/// How input points became output points; apply it to carry any other
/// per-point field over to the output grid.
pub struct PointMap<B: Backend> {
    input_points: Id,
    mapping: Mapping<B>,
}

impl<B: Backend> PointMap<B> {
    pub fn input_points(&self) -> Id {
        self.input_points
    }

    /// The point-usage mask when points were compacted.
    pub fn mask(&mut self) -> Option<&mut ArrayHandle<Mask, B>> {
        match &mut self.mapping {
            Mapping::Compact(mask) => Some(mask),
            Mapping::Gather(_) => None,
        }
    }

    /// Map an input point field (one value per input point) to the output
    /// points.
    pub fn apply<T: Element>(&mut self, field: &mut ArrayHandle<T, B>) -> Result<ArrayHandle<T, B>, MeshWorkletError> {
        if field.len() != self.input_points {
            return Err(MeshWorkletError::LengthMismatch {
                expected: self.input_points,
                found: field.len(),
            });
        }
        match &mut self.mapping {
            Mapping::Compact(mask) => primitives::stream_compact(field, mask),
            Mapping::Gather(ids) => primitives::gather(field, ids),
        }
    }
}

/// The pipeline itself: options plus the backend every stage runs on.
#[derive(Clone, Debug)]
pub struct GenerateTopology<B: Backend> {
    config: GenerateConfig,
    backend: B,
}

impl<B: Backend> GenerateTopology<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(GenerateConfig::default(), backend)
    }

    pub fn with_config(config: GenerateConfig, backend: B) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> GenerateConfig {
        self.config
    }

    pub fn config_mut(&mut self) -> &mut GenerateConfig {
        &mut self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run all four stages from `input` into `output`.
    ///
    /// `classify`'s last parameter must be `FieldOut` of [`Id`]; the pipeline
    /// binds its count array there. The `TopologyIn` parameter of both
    /// worklets is bound to `input`; `classify_args` and `generate_args`
    /// fill the remaining parameters in order. The output cell shape is
    /// `output`'s. `on_points` receives the point mapping once the output
    /// grid is complete.
    #[allow(clippy::too_many_arguments)]
    pub fn run<C, G, F>(
        &self,
        classify: &C,
        generate: &G,
        input: &mut dyn Grid<B>,
        classify_args: &mut [Arg<'_, B>],
        generate_args: &mut [Arg<'_, B>],
        output: &mut UnstructuredGrid<B>,
        mut on_points: F,
    ) -> Result<GenerateSummary, MeshWorkletError>
    where
        C: Worklet + ?Sized,
        G: Worklet + ?Sized,
        F: FnMut(&mut PointMap<B>) -> Result<(), MeshWorkletError>,
    {
        let backend = &self.backend;
        let classify_sig = classify.signature();
        let generate_sig = generate.signature();
        check_count_param(&classify_sig)?;
        let input_cells = input.number_of_cells();
        let input_points = input.number_of_points();
        let per_cell = output.shape().num_points();

        // Both signatures are checked before anything runs.
        {
            let args = compose(&generate_sig, &mut *input, generate_args, None)?;
            generate::plan(&generate_sig, &args, 0)?;
        }

        // Stage 1: classify.
        let mut counts = ArrayHandle::<Id, B>::new(backend.clone());
        {
            let mut args = compose(&classify_sig, &mut *input, classify_args, Some(Arg::field(&mut counts)))?;
            let (cells, plans) = map_cell::plan(&classify_sig, &args)?;
            binding::run_region(classify, backend, &mut args, &plans, cells, Extras::default())?;
        }

        // Stage 2: offsets, then output cell -> source cell.
        let mut offsets = ArrayHandle::new(backend.clone());
        let total = primitives::inclusive_scan(&mut counts, &mut offsets)?;
        drop(counts);
        debug!("generate-topology: {input_cells} input cells classify to {total} output cells");

        let mut candidates = primitives::counting_sequence(backend, 1, total)?;
        let mut source = ArrayHandle::new(backend.clone());
        primitives::lower_bounds(&mut offsets, &mut candidates, &mut source)?;
        drop(candidates);

        let mut visit = ArrayHandle::<Id, B>::new(backend.clone());
        {
            let offsets = offsets.prepare_for_input()?;
            let src = source.prepare_for_input()?;
            let out = visit.prepare_for_output(total)?;
            backend.schedule(
                |k| {
                    let cell = src[k];
                    let first = if cell == 0 { 0 } else { offsets[cell - 1] };
                    // SAFETY: each unit writes only its own index.
                    unsafe { out.set(k, k - first) };
                },
                total,
            );
        }
        drop(offsets);

        // Stage 3: generate.
        let entries = total.checked_mul(per_cell).ok_or(MeshWorkletError::Overflow {
            what: "generated connectivity length",
        })?;
        let mut connectivity = ArrayHandle::<Id, B>::new(backend.clone());
        {
            let mut args = compose(&generate_sig, &mut *input, generate_args, None)?;
            let plans = generate::plan(&generate_sig, &args, total)?;
            let extras = Extras {
                scatter: Some(Scatter {
                    source: source.prepare_for_input()?,
                    visit: visit.prepare_for_input()?,
                }),
                cells_out: Some(CellsOut {
                    connectivity: connectivity.prepare_for_output(entries)?,
                    points_per_cell: per_cell,
                }),
                ..Extras::default()
            };
            binding::run_region(generate, backend, &mut args, &plans, total, extras)?;
        }
        drop(source);
        drop(visit);
        debug!("generate-topology: generated {} connectivity entries", connectivity.len());

        // Stage 4: points.
        let mut coordinates = input.point_coordinates(backend)?;
        let (mut point_map, out_coordinates) = if self.config.remove_duplicate_points {
            let mut mask = point_mask(backend, &mut connectivity, input_points)?;
            let out_coordinates = primitives::stream_compact(&mut coordinates, &mut mask)?;
            let mut used = ArrayHandle::new(backend.clone());
            primitives::copy(&mut connectivity, &mut used)?;
            primitives::sort(&mut used)?;
            primitives::unique(&mut used)?;
            primitives::lower_bounds_in_place(&mut used, &mut connectivity)?;
            let map = PointMap {
                input_points,
                mapping: Mapping::Compact(mask),
            };
            (map, out_coordinates)
        } else {
            let out_coordinates = primitives::gather(&mut coordinates, &mut connectivity)?;
            let sequence = primitives::counting_sequence(backend, 0, connectivity.len())?;
            let ids = std::mem::replace(&mut connectivity, sequence);
            let map = PointMap {
                input_points,
                mapping: Mapping::Gather(ids),
            };
            (map, out_coordinates)
        };

        let summary = GenerateSummary {
            input_cells,
            output_cells: total,
            output_points: out_coordinates.len(),
        };
        output.set_point_coordinates(out_coordinates);
        output.set_cell_connectivity(connectivity)?;
        on_points(&mut point_map)?;
        info!(
            "generate-topology: {} input cells -> {} cells, {} points",
            summary.input_cells, summary.output_cells, summary.output_points
        );
        Ok(summary)
    }
}

fn check_count_param(sig: &Signature) -> Result<(), MeshWorkletError> {
    match sig.params().last() {
        Some(Param {
            role: Role::FieldOut,
            value_type: Some(t),
        }) if t.is::<Id>() => Ok(()),
        _ => Err(MeshWorkletError::mismatch(
            sig.len().saturating_sub(1),
            "the last classification parameter must be FieldOut of Id",
        )),
    }
}

/// Full argument list for `sig`: the grid at its `TopologyIn` slot, `tail`
/// at the last slot, the caller's arguments everywhere else.
fn compose<'s, B: Backend>(
    sig: &Signature,
    grid: &'s mut dyn Grid<B>,
    user: &'s mut [Arg<'_, B>],
    tail: Option<Arg<'s, B>>,
) -> Result<Vec<Arg<'s, B>>, MeshWorkletError> {
    let reserved = sig.slots_with(Role::TopologyIn).count() + usize::from(tail.is_some());
    if user.len() + reserved != sig.len() {
        return Err(MeshWorkletError::mismatch(
            sig.len().min(user.len() + reserved),
            format!(
                "worklet declares {} parameters, {} supplied by the caller and {reserved} by the pipeline",
                sig.len(),
                user.len()
            ),
        ));
    }
    let last = sig.len().saturating_sub(1);
    let mut grid = Some(grid);
    let mut tail = tail;
    let mut user = user.iter_mut();
    let mut out = Vec::with_capacity(sig.len());
    for (slot, param) in sig.params().iter().enumerate() {
        if param.role == Role::TopologyIn {
            match grid.take() {
                Some(g) => out.push(Arg::Topology(g)),
                None => {
                    return Err(MeshWorkletError::mismatch(
                        slot,
                        "only one TopologyIn parameter is supported",
                    ));
                }
            }
        } else if slot == last && tail.is_some() {
            out.extend(tail.take());
        } else if let Some(arg) = user.next() {
            out.push(arg.reborrow());
        }
    }
    Ok(out)
}

/// One mask entry per input point, set where the connectivity references it.
fn point_mask<B: Backend>(
    backend: &B,
    connectivity: &mut ArrayHandle<Id, B>,
    input_points: Id,
) -> Result<ArrayHandle<Mask, B>, MeshWorkletError> {
    let marks = usage_marks(input_points)?;
    let conn = connectivity.prepare_for_input()?;
    primitives::schedule(backend, conn.len(), |i, errors| match marks.get(conn[i]) {
        Some(mark) => mark.store(1, Ordering::Relaxed),
        None => {
            errors.raise(&format!(
                "generated connectivity references point {} of {input_points}",
                conn[i]
            ));
        }
    })?;
    let mut mask = ArrayHandle::new(backend.clone());
    {
        let out = mask.prepare_for_output(input_points)?;
        backend.schedule(
            |p| {
                // SAFETY: each unit writes only its own index.
                unsafe { out.set(p, marks[p].load(Ordering::Relaxed)) };
            },
            input_points,
        );
    }
    Ok(mask)
}

/// Cleared per-point usage marks, reporting allocation failure.
fn usage_marks(len: usize) -> Result<Vec<AtomicU8>, MeshWorkletError> {
    let mut marks = Vec::new();
    marks
        .try_reserve_exact(len)
        .map_err(|_| MeshWorkletError::Transfer {
            what: "point usage marks",
            len,
        })?;
    marks.extend((0..len).map(|_| AtomicU8::new(0)));
    Ok(marks)
}
