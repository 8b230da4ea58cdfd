use mesh_worklet::prelude::*;

/// Sums every value sharing a key and counts the group.
struct SumPerKey;

impl Worklet for SumPerKey {
    fn signature(&self) -> Signature {
        Signature::new()
            .key::<u32>()
            .value::<f64>()
            .field_out::<f64>()
            .field_out::<Id>()
    }

    fn execute(&self, inv: &Invocation<'_>) {
        let values = inv.values::<f64>(1);
        inv.set(2, values.iter().sum::<f64>());
        inv.set(3, values.len());
    }
}

/// Keeps the largest value per key, offset by a per-group input.
struct MaxPlusOffset;

impl Worklet for MaxPlusOffset {
    fn signature(&self) -> Signature {
        Signature::new()
            .value::<i32>()
            .key::<i32>()
            .field_in::<i32>()
            .field_out::<i32>()
    }

    fn execute(&self, inv: &Invocation<'_>) {
        let max = inv.values::<i32>(0).iter().max().unwrap_or_default();
        inv.set(3, max + inv.field::<i32>(2) + inv.key::<i32>());
    }
}

/// Encodes each group's values as decimal digits, first value first.
struct Digits;

impl Worklet for Digits {
    fn signature(&self) -> Signature {
        Signature::new().key::<u8>().value::<u32>().field_out::<u32>()
    }

    fn execute(&self, inv: &Invocation<'_>) {
        inv.set(2, inv.values::<u32>(1).iter().fold(0, |acc, d| acc * 10 + d));
    }
}

#[test]
fn sums_values_per_unique_key() {
    let mut keys = ArrayHandle::from_host(vec![3u32, 1, 3, 2, 1, 3], SerialBackend);
    let mut values = ArrayHandle::from_host(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], SerialBackend);
    let mut sums = ArrayHandle::<f64, _>::new(SerialBackend);
    let mut counts = ArrayHandle::<Id, _>::new(SerialBackend);
    let unique = DispatcherReduceKeysValues::new(SumPerKey, SerialBackend)
        .invoke(
            &mut keys,
            &mut [Arg::field(&mut values), Arg::field(&mut sums), Arg::field(&mut counts)],
        )
        .unwrap();
    assert_eq!(unique.into_vec().unwrap(), vec![1, 2, 3]);
    assert_eq!(sums.into_vec().unwrap(), vec![7.0, 4.0, 10.0]);
    assert_eq!(counts.into_vec().unwrap(), vec![2, 1, 3]);
    assert_eq!(keys.to_vec().unwrap(), vec![3, 1, 3, 2, 1, 3]);
}

#[cfg(feature = "rayon")]
#[test]
fn rayon_groups_match_serial() {
    let keys: Vec<u32> = (0..5_000).map(|i| (i * 7919) % 97).collect();
    let values: Vec<f64> = (0..5_000).map(f64::from).collect();
    let run = |backend: AnyBackend| {
        let mut k = ArrayHandle::from_host(keys.clone(), backend.clone());
        let mut v = ArrayHandle::from_host(values.clone(), backend.clone());
        let mut sums = ArrayHandle::<f64, _>::new(backend.clone());
        let mut counts = ArrayHandle::<Id, _>::new(backend.clone());
        let unique = DispatcherReduceKeysValues::new(SumPerKey, backend)
            .invoke(&mut k, &mut [Arg::field(&mut v), Arg::field(&mut sums), Arg::field(&mut counts)])
            .unwrap();
        (
            unique.into_vec().unwrap(),
            sums.into_vec().unwrap(),
            counts.into_vec().unwrap(),
        )
    };
    let (serial_keys, serial_sums, serial_counts) = run(AnyBackend::Serial(SerialBackend));
    let (rayon_keys, rayon_sums, rayon_counts) =
        run(AnyBackend::Rayon(RayonBackend::with_threads(4).unwrap()));
    assert_eq!(serial_keys, rayon_keys);
    assert_eq!(serial_counts, rayon_counts);
    assert_eq!(serial_counts.iter().sum::<Id>(), 5_000);
    // Group members are visited in key-then-position order on both backends.
    assert_eq!(serial_sums, rayon_sums);
}

#[test]
fn key_slot_may_sit_anywhere_and_per_group_inputs_are_checked() {
    let dispatcher = DispatcherReduceKeysValues::new(MaxPlusOffset, SerialBackend);
    let mut keys = ArrayHandle::from_host(vec![10, 20, 10], SerialBackend);
    let mut values = ArrayHandle::from_host(vec![1, 5, 3], SerialBackend);
    let mut offsets = ArrayHandle::from_host(vec![100, 200], SerialBackend);
    let mut out = ArrayHandle::<i32, _>::new(SerialBackend);
    let unique = dispatcher
        .invoke(
            &mut keys,
            &mut [Arg::field(&mut values), Arg::field(&mut offsets), Arg::field(&mut out)],
        )
        .unwrap();
    assert_eq!(unique.into_vec().unwrap(), vec![10, 20]);
    assert_eq!(out.to_vec().unwrap(), vec![113, 225]);

    // One offset per unique key is required.
    let mut wrong = ArrayHandle::from_host(vec![0; 3], SerialBackend);
    let err = dispatcher
        .invoke(
            &mut keys,
            &mut [Arg::field(&mut values), Arg::field(&mut wrong), Arg::field(&mut out)],
        )
        .unwrap_err();
    assert!(matches!(err, MeshWorkletError::SignatureMismatch { slot: 2, .. }), "{err}");
}

#[test]
fn value_count_and_key_type_are_checked_up_front() {
    let dispatcher = DispatcherReduceKeysValues::new(SumPerKey, SerialBackend);
    let mut values = ArrayHandle::from_host(vec![1.0f64; 2], SerialBackend);
    let mut sums = ArrayHandle::<f64, _>::new(SerialBackend);
    let mut counts = ArrayHandle::<Id, _>::new(SerialBackend);

    let mut keys = ArrayHandle::from_host(vec![1u32, 2, 3], SerialBackend);
    let err = dispatcher
        .invoke(
            &mut keys,
            &mut [Arg::field(&mut values), Arg::field(&mut sums), Arg::field(&mut counts)],
        )
        .unwrap_err();
    assert!(matches!(err, MeshWorkletError::SignatureMismatch { slot: 1, .. }), "{err}");
    assert_eq!(keys.residency(), Residency::HostValid);

    let mut wide_keys = ArrayHandle::from_host(vec![1u64, 2], SerialBackend);
    let err = dispatcher
        .invoke(
            &mut wide_keys,
            &mut [Arg::field(&mut values), Arg::field(&mut sums), Arg::field(&mut counts)],
        )
        .unwrap_err();
    assert!(matches!(err, MeshWorkletError::SignatureMismatch { slot: 0, .. }), "{err}");
}

#[test]
fn empty_keys_produce_no_groups() {
    let mut keys = ArrayHandle::<u32, _>::new(SerialBackend);
    let mut values = ArrayHandle::<f64, _>::new(SerialBackend);
    let mut sums = ArrayHandle::<f64, _>::new(SerialBackend);
    let mut counts = ArrayHandle::<Id, _>::new(SerialBackend);
    let unique = DispatcherReduceKeysValues::new(SumPerKey, SerialBackend)
        .invoke(
            &mut keys,
            &mut [Arg::field(&mut values), Arg::field(&mut sums), Arg::field(&mut counts)],
        )
        .unwrap();
    assert!(unique.is_empty());
    assert!(sums.into_vec().unwrap().is_empty());
}

#[test]
fn group_members_keep_their_original_order() {
    let mut backends = vec![AnyBackend::Serial(SerialBackend)];
    #[cfg(feature = "rayon")]
    backends.push(AnyBackend::Rayon(RayonBackend::with_threads(4).unwrap()));
    for backend in backends {
        let mut keys = ArrayHandle::from_host(vec![2u8, 1, 2, 1, 2], backend.clone());
        let mut values = ArrayHandle::from_host(vec![3u32, 4, 5, 6, 7], backend.clone());
        let mut digits = ArrayHandle::<u32, _>::new(backend.clone());
        let unique = DispatcherReduceKeysValues::new(Digits, backend)
            .invoke(&mut keys, &mut [Arg::field(&mut values), Arg::field(&mut digits)])
            .unwrap();
        assert_eq!(unique.into_vec().unwrap(), vec![1, 2]);
        assert_eq!(digits.into_vec().unwrap(), vec![46, 357]);
    }
}
