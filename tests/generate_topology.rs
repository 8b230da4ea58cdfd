use mesh_worklet::prelude::*;

/// Emits the count stored for each input cell.
struct CountFromField;

impl Worklet for CountFromField {
    fn signature(&self) -> Signature {
        Signature::new().topology().field_in_cell::<Id>().field_out::<Id>()
    }

    fn execute(&self, inv: &Invocation<'_>) {
        inv.set(2, inv.field::<Id>(1));
    }
}

/// Output cell `v` of a quad is the segment between its corners `v` and
/// `v + 1`. Records where each output cell came from and carries a cell
/// value over.
struct EdgeSegments;

impl Worklet for EdgeSegments {
    fn signature(&self) -> Signature {
        Signature::new()
            .topology()
            .field_in_cell::<f32>()
            .field_out::<Id>()
            .field_out::<Id>()
            .field_out::<f32>()
    }

    fn execute(&self, inv: &Invocation<'_>) {
        let corners = inv.cell_points();
        let v = inv.visit_index();
        inv.set_cell_points(&[corners[v], corners[v + 1]]);
        inv.set(2, inv.source_cell());
        inv.set(3, v);
        inv.set(4, inv.field::<f32>(1));
    }
}

/// Writes a point id past the end of the input grid.
struct Dangling;

impl Worklet for Dangling {
    fn signature(&self) -> Signature {
        Signature::new().topology()
    }

    fn execute(&self, inv: &Invocation<'_>) {
        inv.set_cell_points(&[0, 1_000]);
    }
}

struct Generated<B: Backend> {
    summary: GenerateSummary,
    output: UnstructuredGrid<B>,
    source: Vec<Id>,
    visit: Vec<Id>,
    carried: Vec<f32>,
}

/// Four quads in a row (5 x 2 points); cell `c` has points
/// `[c, c + 1, c + 6, c + 5]`.
fn strip() -> UniformGrid {
    UniformGrid::new([5, 2, 1], [0.0; 3], [1.0; 3]).unwrap()
}

fn generate<B: Backend>(backend: B, counts: Vec<Id>, remove_duplicates: bool) -> Generated<B> {
    let mut grid = strip();
    let mut counts = ArrayHandle::from_host(counts, backend.clone());
    let mut cell_values = ArrayHandle::from_host(vec![0.5f32, 1.5, 2.5, 3.5], backend.clone());
    let mut source = ArrayHandle::<Id, _>::new(backend.clone());
    let mut visit = ArrayHandle::<Id, _>::new(backend.clone());
    let mut carried = ArrayHandle::<f32, _>::new(backend.clone());
    let mut output = UnstructuredGrid::new(CellShape::Line, backend.clone());

    let dispatcher = DispatcherGenerateTopology::new(CountFromField, EdgeSegments, backend)
        .with_config(GenerateConfig {
            remove_duplicate_points: remove_duplicates,
        });
    let summary = dispatcher
        .invoke(
            &mut grid,
            &mut [Arg::field(&mut counts)],
            &mut [
                Arg::field(&mut cell_values),
                Arg::field(&mut source),
                Arg::field(&mut visit),
                Arg::field(&mut carried),
            ],
            &mut output,
        )
        .unwrap();
    Generated {
        summary,
        output,
        source: source.into_vec().unwrap(),
        visit: visit.into_vec().unwrap(),
        carried: carried.into_vec().unwrap(),
    }
}

#[test]
fn outputs_map_back_to_their_source_cells() {
    let mut r = generate(SerialBackend, vec![0, 2, 0, 1], true);
    assert_eq!(
        r.summary,
        GenerateSummary {
            input_cells: 4,
            output_cells: 3,
            output_points: 5,
        }
    );
    assert_eq!(r.source, vec![1, 1, 3]);
    assert_eq!(r.visit, vec![0, 1, 0]);
    assert_eq!(r.carried, vec![1.5, 1.5, 3.5]);
    assert_eq!(r.output.number_of_cells(), 3);
    assert_eq!(r.output.cell_shape(), CellShape::Line);

    // Raw ids [1, 2, 2, 7, 3, 4]; used points [1, 2, 3, 4, 7].
    assert_eq!(r.output.connectivity().to_vec().unwrap(), vec![0, 1, 1, 4, 2, 3]);
    assert_eq!(
        r.output.coordinates().to_vec().unwrap(),
        vec![
            [1.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [3.0, 0.0, 0.0],
            [4.0, 0.0, 0.0],
            [2.0, 1.0, 0.0],
        ]
    );
}

#[test]
fn duplicate_removal_off_gives_every_entry_its_own_point() {
    let mut r = generate(SerialBackend, vec![0, 2, 0, 1], false);
    assert_eq!(r.summary.output_cells, 3);
    assert_eq!(r.summary.output_points, 6);
    assert_eq!(r.output.connectivity().to_vec().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    let xs: Vec<[f32; 2]> = r
        .output
        .coordinates()
        .to_vec()
        .unwrap()
        .into_iter()
        .map(|p| [p[0], p[1]])
        .collect();
    assert_eq!(xs, vec![[1.0, 0.0], [2.0, 0.0], [2.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 0.0]]);
}

#[test]
fn all_zero_counts_give_an_empty_grid() {
    for remove in [true, false] {
        let mut r = generate(SerialBackend, vec![0; 4], remove);
        assert_eq!(r.summary.output_cells, 0);
        assert_eq!(r.summary.output_points, 0);
        assert!(r.source.is_empty());
        assert_eq!(r.output.number_of_cells(), 0);
        assert!(r.output.coordinates().to_vec().unwrap().is_empty());
    }
}

#[cfg(feature = "rayon")]
#[test]
fn serial_and_rayon_generate_identical_grids() {
    let counts: Vec<Id> = vec![3, 0, 1, 2];
    let rayon = RayonBackend::with_threads(3).unwrap();
    for remove in [true, false] {
        let mut a = generate(SerialBackend, counts.clone(), remove);
        let mut b = generate(rayon.clone(), counts.clone(), remove);
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.source, b.source);
        assert_eq!(a.visit, b.visit);
        assert_eq!(
            a.output.connectivity().to_vec().unwrap(),
            b.output.connectivity().to_vec().unwrap()
        );
        assert_eq!(
            a.output.coordinates().to_vec().unwrap(),
            b.output.coordinates().to_vec().unwrap()
        );
    }
}

#[test]
fn point_map_carries_extra_point_fields() {
    for (remove, expected) in [
        (true, vec![10.0f32, 20.0, 30.0, 40.0, 70.0]),
        (false, vec![10.0, 20.0, 20.0, 70.0, 30.0, 40.0]),
    ] {
        let mut grid = strip();
        let mut counts = ArrayHandle::from_host(vec![0 as Id, 2, 0, 1], SerialBackend);
        let mut cell_values = ArrayHandle::from_host(vec![0.0f32; 4], SerialBackend);
        let (mut source, mut visit, mut carried) = (
            ArrayHandle::<Id, _>::new(SerialBackend),
            ArrayHandle::<Id, _>::new(SerialBackend),
            ArrayHandle::<f32, _>::new(SerialBackend),
        );
        let mut output = UnstructuredGrid::new(CellShape::Line, SerialBackend);
        let mut temperature =
            ArrayHandle::from_host((0..10).map(|p| p as f32 * 10.0).collect(), SerialBackend);
        let mut mapped = None;

        let mut dispatcher = DispatcherGenerateTopology::new(CountFromField, EdgeSegments, SerialBackend);
        dispatcher.set_remove_duplicate_points(remove);
        assert_eq!(dispatcher.remove_duplicate_points(), remove);
        dispatcher
            .invoke_with_point_map(
                &mut grid,
                &mut [Arg::field(&mut counts)],
                &mut [
                    Arg::field(&mut cell_values),
                    Arg::field(&mut source),
                    Arg::field(&mut visit),
                    Arg::field(&mut carried),
                ],
                &mut output,
                |map| {
                    assert_eq!(map.input_points(), 10);
                    assert_eq!(map.mask().is_some(), remove);
                    mapped = Some(map.apply(&mut temperature)?);
                    Ok(())
                },
            )
            .unwrap();
        assert_eq!(mapped.unwrap().into_vec().unwrap(), expected);
    }
}

#[test]
fn point_map_rejects_fields_of_the_wrong_length() {
    let mut grid = strip();
    let mut counts = ArrayHandle::from_host(vec![1 as Id; 4], SerialBackend);
    let mut cell_values = ArrayHandle::from_host(vec![0.0f32; 4], SerialBackend);
    let (mut source, mut visit, mut carried) = (
        ArrayHandle::<Id, _>::new(SerialBackend),
        ArrayHandle::<Id, _>::new(SerialBackend),
        ArrayHandle::<f32, _>::new(SerialBackend),
    );
    let mut output = UnstructuredGrid::new(CellShape::Line, SerialBackend);
    let mut short = ArrayHandle::from_host(vec![0u8; 3], SerialBackend);
    let err = DispatcherGenerateTopology::new(CountFromField, EdgeSegments, SerialBackend)
        .invoke_with_point_map(
            &mut grid,
            &mut [Arg::field(&mut counts)],
            &mut [
                Arg::field(&mut cell_values),
                Arg::field(&mut source),
                Arg::field(&mut visit),
                Arg::field(&mut carried),
            ],
            &mut output,
            |map| map.apply(&mut short).map(drop),
        )
        .unwrap_err();
    assert_eq!(err, MeshWorkletError::LengthMismatch { expected: 10, found: 3 });
}

#[test]
fn classify_without_trailing_count_output_is_a_mismatch() {
    struct NoCount;
    impl Worklet for NoCount {
        fn signature(&self) -> Signature {
            Signature::new().topology().field_out::<f32>()
        }
        fn execute(&self, _inv: &Invocation<'_>) {}
    }

    let mut grid = strip();
    let mut output = UnstructuredGrid::new(CellShape::Vertex, SerialBackend);
    let err = DispatcherGenerateTopology::new(NoCount, Dangling, SerialBackend)
        .invoke(&mut grid, &mut [], &mut [], &mut output)
        .unwrap_err();
    assert!(matches!(err, MeshWorkletError::SignatureMismatch { slot: 1, .. }), "{err}");
}

#[test]
fn bad_generate_arguments_fail_before_classification() {
    let mut grid = strip();
    let mut counts = ArrayHandle::from_host(vec![1 as Id; 4], SerialBackend);
    // Cell field with one value too few.
    let mut cell_values = ArrayHandle::from_host(vec![0.0f32; 3], SerialBackend);
    let (mut source, mut visit, mut carried) = (
        ArrayHandle::<Id, _>::new(SerialBackend),
        ArrayHandle::<Id, _>::new(SerialBackend),
        ArrayHandle::<f32, _>::new(SerialBackend),
    );
    let mut output = UnstructuredGrid::new(CellShape::Line, SerialBackend);
    let err = DispatcherGenerateTopology::new(CountFromField, EdgeSegments, SerialBackend)
        .invoke(
            &mut grid,
            &mut [Arg::field(&mut counts)],
            &mut [
                Arg::field(&mut cell_values),
                Arg::field(&mut source),
                Arg::field(&mut visit),
                Arg::field(&mut carried),
            ],
            &mut output,
        )
        .unwrap_err();
    assert!(matches!(err, MeshWorkletError::SignatureMismatch { slot: 1, .. }), "{err}");
    assert_eq!(counts.residency(), Residency::HostValid);
}

#[test]
fn out_of_range_generated_points_are_reported() {
    let mut grid = strip();
    let mut counts = ArrayHandle::from_host(vec![1 as Id, 0, 0, 0], SerialBackend);
    let mut output = UnstructuredGrid::new(CellShape::Line, SerialBackend);
    let err = DispatcherGenerateTopology::new(CountFromField, Dangling, SerialBackend)
        .invoke(&mut grid, &mut [Arg::field(&mut counts)], &mut [], &mut output)
        .unwrap_err();
    assert!(matches!(err, MeshWorkletError::WorkletRuntime(_)), "{err}");
    assert_eq!(output.number_of_cells(), 0);
}

#[test]
fn count_overflow_aborts_without_output() {
    for counts in [vec![Id::MAX, 1, 0, 0], vec![0, Id::MAX / 2 + 1, 0, Id::MAX / 2 + 1]] {
        let mut grid = strip();
        let mut counts = ArrayHandle::from_host(counts, SerialBackend);
        let mut output = UnstructuredGrid::new(CellShape::Line, SerialBackend);
        let err = DispatcherGenerateTopology::new(CountFromField, Dangling, SerialBackend)
            .invoke(&mut grid, &mut [Arg::field(&mut counts)], &mut [], &mut output)
            .unwrap_err();
        assert_eq!(err, MeshWorkletError::Overflow { what: "inclusive scan" });
        assert_eq!(output.number_of_cells(), 0);
    }
}
