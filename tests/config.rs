use mesh_worklet::config::{self, BACKEND_ENV, THREADS_ENV};
use mesh_worklet::prelude::*;
use serial_test::serial;

fn clear_env() {
    // SAFETY: every test touching the environment is `#[serial]`.
    unsafe {
        std::env::remove_var(BACKEND_ENV);
        std::env::remove_var(THREADS_ENV);
    }
}

#[test]
#[serial]
fn environment_overrides_defaults_and_bad_values_are_ignored() {
    clear_env();
    assert_eq!(RuntimeConfig::from_env(), RuntimeConfig::default());

    unsafe {
        std::env::set_var(BACKEND_ENV, "serial");
        std::env::set_var(THREADS_ENV, "3");
    }
    let cfg = RuntimeConfig::from_env();
    assert_eq!(cfg.backend, BackendKind::Serial);
    assert_eq!(cfg.num_threads, Some(3));

    unsafe {
        std::env::set_var(BACKEND_ENV, "gpu");
        std::env::set_var(THREADS_ENV, "0");
    }
    assert_eq!(RuntimeConfig::from_env(), RuntimeConfig::default());
    clear_env();
}

#[test]
#[serial]
fn default_can_only_be_set_once() {
    clear_env();
    config::set_default(RuntimeConfig::serial()).unwrap();
    assert_eq!(
        config::set_default(RuntimeConfig::default()),
        Err(MeshWorkletError::ConfigAlreadySet)
    );
    assert_eq!(config::default_config(), RuntimeConfig::serial());
    let backend = AnyBackend::from_default().unwrap();
    assert_eq!(backend.name(), SerialBackend.name());
}

#[test]
fn config_round_trips_through_json() {
    let cfg = RuntimeConfig {
        backend: BackendKind::Rayon,
        num_threads: Some(2),
    };
    let text = serde_json::to_string(&cfg).unwrap();
    assert_eq!(text, r#"{"backend":"rayon","num_threads":2}"#);
    assert_eq!(serde_json::from_str::<RuntimeConfig>(&text).unwrap(), cfg);

    let partial: RuntimeConfig = serde_json::from_str(r#"{"backend":"serial"}"#).unwrap();
    assert_eq!(partial, RuntimeConfig::serial());

    let generate: GenerateConfig = serde_json::from_str("{}").unwrap();
    assert!(generate.remove_duplicate_points);
}

#[test]
fn backend_is_built_from_config() {
    let serial = AnyBackend::from_config(&RuntimeConfig::serial()).unwrap();
    assert!(matches!(serial, AnyBackend::Serial(_)));

    let requested = RuntimeConfig {
        backend: BackendKind::Rayon,
        num_threads: Some(2),
    };
    let built = AnyBackend::from_config(&requested).unwrap();
    #[cfg(feature = "rayon")]
    match built {
        AnyBackend::Rayon(ref b) => assert_eq!(b.num_threads(), 2),
        _ => panic!("expected the rayon backend"),
    }
    #[cfg(not(feature = "rayon"))]
    assert!(matches!(built, AnyBackend::Serial(_)));
}
