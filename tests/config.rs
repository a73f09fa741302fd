//! Configuration persistence and parsing tests.

use stateful_metrics::*;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

fn sample_fbeta_config() -> FBetaConfig {
    FBetaConfigBuilder::new()
        .beta(0.5)
        .average(AverageMethod::Weighted)
        .mdmc_average(MdmcAverageMethod::Global)
        .num_classes(4)
        .ignore_index(2)
        .threshold(0.3)
        .top_k(2)
        .build()
        .unwrap()
}

#[test]
fn test_fbeta_config_json_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fbeta.json");

    let config = sample_fbeta_config();
    config.save_to_file(&path).unwrap();
    assert!(path.exists());

    let loaded = FBetaConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_fbeta_config_toml_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fbeta.toml");

    let config = sample_fbeta_config();
    config.save_to_file(&path).unwrap();
    let loaded = FBetaConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("partial.toml");
    fs::write(&path, "average = \"macro\"\nnum_classes = 3\n").unwrap();

    let loaded = FBetaConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.average, AverageMethod::Macro);
    assert_eq!(loaded.num_classes, Some(3));
    assert_eq!(loaded.beta, DEFAULT_BETA);
    assert_eq!(loaded.threshold, DEFAULT_THRESHOLD);
    assert!(loaded.compute_on_step);
}

#[test]
fn test_invalid_file_config_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.json");
    fs::write(&path, r#"{"average": "macro"}"#).unwrap();

    let err = FBetaConfig::load_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("number of classes"), "{}", err);
}

#[test]
fn test_retrieval_config_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    for name in ["retrieval.json", "retrieval.toml"] {
        let path = temp_dir.path().join(name);
        let config = RetrievalConfigBuilder::new()
            .empty_target_action(EmptyTargetAction::Neg)
            .exclude(-1)
            .k(5)
            .build()
            .unwrap();
        config.save_to_file(&path).unwrap();
        assert_eq!(RetrievalConfig::load_from_file(&path).unwrap(), config);
    }
}

#[test]
fn test_unknown_extension() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    let err = RetrievalConfig::default().save_to_file(&path).unwrap_err();
    assert_eq!(err.category(), "config");
}

#[test]
fn test_unreadable_and_malformed_files() {
    let temp_dir = TempDir::new().unwrap();

    let err = FBetaConfig::load_from_file(temp_dir.path().join("missing.json")).unwrap_err();
    assert_eq!(err.category(), "io");

    let path = temp_dir.path().join("broken.json");
    fs::write(&path, "{\"beta\": ").unwrap();
    let err = FBetaConfig::load_from_file(&path).unwrap_err();
    assert_eq!(err.category(), "json");

    let path = temp_dir.path().join("broken.toml");
    fs::write(&path, "beta = = 2").unwrap();
    let err = RetrievalConfig::load_from_file(&path).unwrap_err();
    assert_eq!(err.category(), "config");
    assert!(err.to_string().contains("TOML"));
}

#[test]
fn test_from_params_builds_working_metric() {
    let params: HashMap<String, String> = [
        ("beta", "2.0"),
        ("average", "micro"),
        ("num_classes", "3"),
        ("top_k", "2"),
        ("unknown_key", "ignored"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let config = FBetaConfigBuilder::from_params(&params).unwrap().build().unwrap();
    let mut f2 = FBeta::from_config(config).unwrap();
    f2.update((
        ndarray::array![[0.35, 0.4, 0.25], [0.1, 0.5, 0.4], [0.2, 0.1, 0.7]],
        ndarray::array![0i64, 1, 2],
    ))
    .unwrap();
    let score = f2.compute().unwrap().as_scalar().unwrap();
    assert!((score - 5.0 / 6.0).abs() < 1e-9);
}

#[test]
fn test_retrieval_from_params() {
    let params: HashMap<String, String> = [("empty_target_action", "pos"), ("k", "none")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let config = RetrievalConfigBuilder::from_params(&params).unwrap().build().unwrap();
    assert_eq!(config.empty_target_action, EmptyTargetAction::Pos);
    assert_eq!(config.k, None);
}
