//! Integration tests for ltvforge

use ltvforge::columns::normalize;
use ltvforge::model::{GammaGammaParams, MbgParams};
use ltvforge::persist::save_models;
use ltvforge::{
    load_models, run_scoring, run_training, score, ArtifactPaths, GammaGamma, LtvError,
    ModifiedBetaGeo, ParametricModel, PipelineConfig, ScoringConfig, ScoringOutcome,
    TrainingOutcome,
};
use std::io::Write;
use std::path::Path;
use tempfile::{tempdir, NamedTempFile};

/// Create a training CSV with spend uncorrelated with frequency among repeat buyers
fn create_training_csv(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("train_data.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "CustomerID,FREQUENCY_CAL,RECENCY_CAL,T_CAL,MONETARY_VALUE,MONETARY_HOLDOUT"
    )
    .unwrap();

    // Repeat buyers: every frequency level averages 50 in spend
    writeln!(file, "C01,1,12,60,20,22").unwrap();
    writeln!(file, "C02,1,30,55,80,75").unwrap();
    writeln!(file, "C03,2,40,58,40,45").unwrap();
    writeln!(file, "C04,2,25,50,60,58").unwrap();
    writeln!(file, "C05,3,45,60,35,30").unwrap();
    writeln!(file, "C06,3,52,57,65,70").unwrap();
    writeln!(file, "C07,4,50,59,25,27").unwrap();
    writeln!(file, "C08,4,44,48,75,71").unwrap();

    // One-time buyers
    writeln!(file, "C09,0,0,60,15,0").unwrap();
    writeln!(file, "C10,0,0,42,0,0").unwrap();
    writeln!(file, "C11,0,0,35,22,0").unwrap();
    writeln!(file, "C12,0,0,20,9,0").unwrap();

    path
}

fn known_models() -> (ModifiedBetaGeo, GammaGamma) {
    let mbg = ModifiedBetaGeo::from_parts(
        MbgParams {
            r: 0.5,
            alpha: 5.0,
            a: 1.5,
            b: 3.0,
        },
        0.1,
    )
    .unwrap();
    let ggf = GammaGamma::from_parts(
        GammaGammaParams {
            p: 6.25,
            q: 3.74,
            v: 15.44,
        },
        0.0,
    )
    .unwrap();
    (mbg, ggf)
}

#[test]
fn test_training_persists_loadable_models() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig {
        train_data: create_training_csv(dir.path()),
        artifacts: ArtifactPaths::in_dir(dir.path()),
        ..Default::default()
    };

    let outcome = run_training(&config).unwrap();
    let (frequency_model, monetary_model, report) = match outcome {
        TrainingOutcome::Persisted {
            frequency_model,
            monetary_model,
            report,
        } => (frequency_model, monetary_model, report),
        other => panic!("expected models to be persisted, got {other:?}"),
    };

    assert!(report.absolute_error.is_finite());
    assert!((report.holdout_average_profit - 49.75).abs() < 1e-9);

    let (loaded_mbg, loaded_ggf) = load_models(&config.artifacts).unwrap();
    assert_eq!(loaded_mbg, frequency_model);
    assert_eq!(loaded_ggf, monetary_model);
    assert_eq!(loaded_mbg.penalizer_coef(), 0.1);
    assert_eq!(loaded_ggf.penalizer_coef(), 0.0);
}

#[test]
fn test_three_repeat_customers_with_default_penalties() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("train_data.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "customer_id,frequency_cal,recency_cal,T_cal,monetary_value,monetary_holdout"
    )
    .unwrap();
    writeln!(file, "R1,1,20,60,5,6").unwrap();
    writeln!(file, "R2,4,50,58,10,12").unwrap();
    writeln!(file, "R3,2,35,52,30,25").unwrap();
    writeln!(file, "Z1,0,0,60,8,0").unwrap();
    writeln!(file, "Z2,0,0,40,0,0").unwrap();
    writeln!(file, "Z3,0,0,25,14,0").unwrap();
    drop(file);

    let config = PipelineConfig {
        train_data: path,
        artifacts: ArtifactPaths::in_dir(dir.path()),
        ..Default::default()
    };

    match run_training(&config).unwrap() {
        TrainingOutcome::Persisted { monetary_model, .. } => {
            assert_eq!(monetary_model.penalizer_coef(), 0.0);
            let params = monetary_model.params();
            assert!(params.p < 1e3 && params.q < 1e3 && params.v < 1e4, "{params:?}");
        }
        other => panic!("expected models to be persisted, got {other:?}"),
    }
    assert!(config.artifacts.frequency_model.exists());
    assert!(config.artifacts.monetary_model.exists());
    assert!(load_models(&config.artifacts).is_ok());
}

#[test]
fn test_correlated_spend_writes_no_artifacts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("train_data.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "customer_id,frequency_cal,recency_cal,T_cal,monetary_value,monetary_holdout"
    )
    .unwrap();
    writeln!(file, "A,1,10,40,10,10").unwrap();
    writeln!(file, "B,2,20,40,20,20").unwrap();
    writeln!(file, "C,3,30,40,30,30").unwrap();
    writeln!(file, "D,0,0,40,5,0").unwrap();
    drop(file);

    let config = PipelineConfig {
        train_data: path,
        artifacts: ArtifactPaths::in_dir(dir.path()),
        ..Default::default()
    };

    let outcome = run_training(&config).unwrap();
    assert!(matches!(
        outcome,
        TrainingOutcome::IndependenceViolated { correlation } if correlation > 0.99
    ));
    assert!(!config.artifacts.frequency_model.exists());
    assert!(!config.artifacts.monetary_model.exists());
}

#[test]
fn test_correlated_spend_keeps_existing_artifacts() {
    let dir = tempdir().unwrap();
    let artifacts = ArtifactPaths::in_dir(dir.path());
    let (mbg, ggf) = known_models();
    save_models(&mbg, &ggf, &artifacts).unwrap();
    let frequency_before = std::fs::read(&artifacts.frequency_model).unwrap();
    let monetary_before = std::fs::read(&artifacts.monetary_model).unwrap();

    let path = dir.path().join("train_data.csv");
    std::fs::write(
        &path,
        "customer_id,frequency_cal,recency_cal,T_cal,monetary_value,monetary_holdout\n\
         A,1,10,40,10,10\nB,2,20,40,20,20\nC,3,30,40,30,30\nD,0,0,40,5,0\n",
    )
    .unwrap();
    let config = PipelineConfig {
        train_data: path,
        artifacts,
        ..Default::default()
    };

    assert!(matches!(
        run_training(&config).unwrap(),
        TrainingOutcome::IndependenceViolated { .. }
    ));
    assert_eq!(
        std::fs::read(&config.artifacts.frequency_model).unwrap(),
        frequency_before
    );
    assert_eq!(
        std::fs::read(&config.artifacts.monetary_model).unwrap(),
        monetary_before
    );
}

#[test]
fn test_scoring_with_saved_parameters() {
    let dir = tempdir().unwrap();
    let artifacts = ArtifactPaths::in_dir(dir.path());
    let (mbg, ggf) = known_models();
    save_models(&mbg, &ggf, &artifacts).unwrap();

    let mut input = NamedTempFile::new().unwrap();
    writeln!(input, "CustomerID,FREQUENCY_CAL,RECENCY_CAL,T_CAL,MonetaryValue").unwrap();
    writeln!(input, "A123,3,20,30,50").unwrap();
    writeln!(input, "00042,0,0,45,12.5").unwrap();

    let output = dir.path().join("predictions.csv");
    let summary = score(&artifacts, input.path(), &output, &ScoringConfig::default()).unwrap();
    assert_eq!(summary.customers, 2);

    let written = std::fs::read_to_string(&output).unwrap();
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("customer_id,p_alive,prediction"));

    let rows: Vec<Vec<&str>> = lines.map(|line| line.split(',').collect()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "A123");
    assert_eq!(rows[1][0], "00042");

    for row in &rows {
        let p_alive: f64 = row[1].parse().unwrap();
        assert!((0.0..=1.0).contains(&p_alive));

        let prediction: f64 = row[2].parse().unwrap();
        assert!(prediction.is_finite() && prediction >= 0.0);
        let decimals = row[2].split('.').nth(1).map_or(0, str::len);
        assert!(decimals <= 2, "{}", row[2]);
    }
}

#[test]
fn test_scoring_without_artifacts_fails_cleanly() {
    let dir = tempdir().unwrap();
    let artifacts = ArtifactPaths::in_dir(dir.path());

    let mut input = NamedTempFile::new().unwrap();
    writeln!(input, "customer_id,frequency_cal,recency_cal,T_cal,monetary_value").unwrap();
    writeln!(input, "A123,3,20,30,50").unwrap();

    let output = dir.path().join("predictions.csv");
    let err = score(&artifacts, input.path(), &output, &ScoringConfig::default()).unwrap_err();
    assert!(matches!(err, LtvError::ModelLoad { .. }));
    assert!(!output.exists());
}

#[test]
fn test_triggers_without_inputs_do_nothing() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig {
        train_data: dir.path().join("train_data.csv"),
        score_data: dir.path().join("score_data.csv"),
        predictions: dir.path().join("predictions.csv"),
        artifacts: ArtifactPaths::in_dir(dir.path()),
        ..Default::default()
    };

    assert_eq!(run_training(&config).unwrap(), TrainingOutcome::InputMissing);
    assert!(matches!(
        run_scoring(&config).unwrap(),
        ScoringOutcome::PrerequisitesMissing(_)
    ));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_train_then_score() {
    let dir = tempdir().unwrap();
    let score_path = dir.path().join("score_data.csv");
    std::fs::write(
        &score_path,
        "customer_id,frequency_cal,recency_cal,T_cal,monetary_value\nX1,2,30,60,45\nX2,0,0,30,0\n",
    )
    .unwrap();

    let config = PipelineConfig {
        train_data: create_training_csv(dir.path()),
        score_data: score_path,
        predictions: dir.path().join("predictions.csv"),
        artifacts: ArtifactPaths::in_dir(dir.path()),
        ..Default::default()
    };

    assert!(matches!(
        run_training(&config).unwrap(),
        TrainingOutcome::Persisted { .. }
    ));
    match run_scoring(&config).unwrap() {
        ScoringOutcome::Scored(summary) => {
            assert_eq!(summary.customers, 2);
            assert_eq!(summary.output, config.predictions);
        }
        other => panic!("expected scoring to run, got {other:?}"),
    }
    assert!(config.predictions.exists());
}

#[test]
fn test_column_normalization() {
    assert_eq!(normalize("CustomerID"), "customer_id");
    assert_eq!(normalize("FREQUENCY_CAL"), "frequency_cal");
    assert_eq!(normalize("T_CAL"), "T_cal");
    assert_eq!(normalize("t_cal"), "T_cal");
    assert_eq!(normalize("MonetaryHoldout"), "monetary_holdout");

    for name in ["CustomerID", "recencyCal", "T_CAL", "monetary_value"] {
        let once = normalize(name);
        assert_eq!(normalize(&once), once);
    }
}
