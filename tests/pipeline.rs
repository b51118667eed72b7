//! End-to-end runs of the training pipeline on in-memory CSV uploads.

use fraud_batch_trainer::config::{AppConfig, ZeroVariancePolicy};
use fraud_batch_trainer::pipeline::PipelineSettings;
use fraud_batch_trainer::{ArtifactStore, FraudPipeline, PipelineError, PipelineState};

/// CSV with `n_features` columns `V1..Vn`, an `Amount` column and `Class`.
/// Fraud rows are shifted on the first two features.
fn transactions_csv(labels: &[u8], n_features: usize) -> String {
    let mut header: Vec<String> = (1..=n_features).map(|j| format!("V{}", j)).collect();
    header.push("Amount".to_string());
    header.push("Class".to_string());

    let mut csv = header.join(",");
    csv.push('\n');
    for (i, &label) in labels.iter().enumerate() {
        let mut fields: Vec<String> = (0..n_features)
            .map(|j| {
                let base = ((i * 7 + j * 3) % 11) as f64 / 5.0 - 1.0;
                let shift = if label == 1 && j < 2 { 2.5 } else { 0.0 };
                format!("{:.4}", base + shift)
            })
            .collect();
        fields.push(format!("{:.2}", 10.0 + ((i * 37) % 500) as f64));
        fields.push(label.to_string());
        csv.push_str(&fields.join(","));
        csv.push('\n');
    }
    csv
}

fn every_nth(n: usize, every: usize) -> Vec<u8> {
    (0..n).map(|i| u8::from(i % every == 0)).collect()
}

#[test]
fn ten_row_dataset_evaluates_two_rows() {
    let input = transactions_csv(&[0, 0, 0, 1, 0, 0, 1, 0, 0, 0], 7);

    let report = FraudPipeline::default().run(input.as_bytes()).unwrap();
    let summary = &report.summary;

    assert_eq!(report.bundle.scaling.len(), 8);
    assert_eq!(summary.total_transactions, 2);
    assert_eq!(summary.fraudulent_cases + summary.genuine_cases, 2);
    assert_eq!(
        summary.fraud_percentage,
        (100.0 * summary.fraudulent_cases as f64 / 2.0 * 100.0).round() / 100.0
    );
    // both held-out rows are genuine
    assert_eq!(report.evaluation.confusion.actual_positives(), 0);
}

#[test]
fn identical_input_gives_identical_summary() {
    let input = transactions_csv(&every_nth(120, 6), 5);
    let pipeline = FraudPipeline::default();

    let first = pipeline.run(input.as_bytes()).unwrap();
    let second = pipeline.run(input.as_bytes()).unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(
        serde_json::to_vec(&first.summary).unwrap(),
        serde_json::to_vec(&second.summary).unwrap()
    );
    assert_eq!(first.bundle.model, second.bundle.model);
    assert_eq!(first.bundle.scaling, second.bundle.scaling);
}

#[test]
fn summary_invariants_hold() {
    let input = transactions_csv(&every_nth(200, 9), 6);

    let report = FraudPipeline::default().run(input.as_bytes()).unwrap();
    let summary = &report.summary;

    assert_eq!(summary.total_transactions, 40);
    assert_eq!(
        summary.fraudulent_cases + summary.genuine_cases,
        summary.total_transactions
    );
    let expected =
        (100.0 * summary.fraudulent_cases as f64 / summary.total_transactions as f64 * 100.0)
            .round()
            / 100.0;
    assert_eq!(summary.fraud_percentage, expected);
    assert_eq!(report.evaluation.confusion.total(), 40);
}

#[test]
fn missing_label_column_stops_before_split() {
    let input = "V1,V2,Amount\n0.1,0.2,10.0\n0.3,0.4,12.5\n";

    let err = FraudPipeline::default().run(input.as_bytes()).unwrap_err();

    assert_eq!(err.stage, PipelineState::Idle);
    assert!(matches!(err.source, PipelineError::MissingLabelColumn { .. }));
}

#[test]
fn single_row_is_insufficient() {
    let input = "V1,Amount,Class\n0.5,10.0,1\n";

    let err = FraudPipeline::default().run(input.as_bytes()).unwrap_err();

    assert_eq!(err.stage, PipelineState::Loaded);
    assert_eq!(err.kind(), "InsufficientDataError");
}

#[test]
fn malformed_upload_is_rejected() {
    let input = "V1,Amount,Class\n0.5,10.0,1\n0.7,abc,0\n";

    let err = FraudPipeline::default().run(input.as_bytes()).unwrap_err();

    assert_eq!(err.kind(), "MalformedInputError");
}

#[test]
fn zero_variance_column_with_reject_policy() {
    let mut config = AppConfig::default();
    config.scaler.zero_variance = ZeroVariancePolicy::Reject;
    config.persistence.enabled = false;
    let pipeline = FraudPipeline::from_config(&config);

    let mut input = String::from("V1,Flat,Class\n");
    for i in 0..20 {
        input.push_str(&format!("{},3.0,{}\n", i, u8::from(i % 4 == 0)));
    }

    let err = pipeline.run(input.as_bytes()).unwrap_err();
    assert_eq!(err.stage, PipelineState::Split);
    assert_eq!(err.kind(), "ZeroVarianceError");

    // default policy scales the flat column by 1.0 and carries on
    let report = FraudPipeline::default().run(input.as_bytes()).unwrap();
    assert_eq!(report.bundle.scaling.std[1], 1.0);
}

#[test]
fn persisted_bundle_reproduces_summary() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let pipeline = FraudPipeline::default().with_store(store.clone());
    let input = transactions_csv(&every_nth(80, 5), 4);

    let trained = pipeline.run(input.as_bytes()).unwrap();
    assert_eq!(trained.bundle_path, Some(store.bundle_path()));

    let bundle = store.load().unwrap().unwrap();
    assert_eq!(bundle, trained.bundle);

    let reused = pipeline.run_with_bundle(input.as_bytes(), &bundle).unwrap();
    assert!(!reused.retrained);
    assert_eq!(reused.summary, trained.summary);
    assert_eq!(reused.evaluation, trained.evaluation);
}

#[test]
fn reused_bundle_with_other_schema_is_rejected() {
    let pipeline = FraudPipeline::default();
    let trained = pipeline
        .run(transactions_csv(&every_nth(50, 5), 4).as_bytes())
        .unwrap();

    let err = pipeline
        .run_with_bundle(transactions_csv(&every_nth(50, 5), 3).as_bytes(), &trained.bundle)
        .unwrap_err();

    assert_eq!(err.stage, PipelineState::Idle);
    assert!(matches!(err.source, PipelineError::SchemaMismatch { .. }));
}

#[test]
fn concurrent_runs_share_only_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let pipeline = FraudPipeline::new(PipelineSettings::default()).with_store(store.clone());
    let input = transactions_csv(&every_nth(100, 7), 5);

    let reports: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| pipeline.run(input.as_bytes()).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for report in &reports {
        assert_eq!(report.summary, reports[0].summary);
    }

    // whichever run renamed last, the stored pair is complete and consistent
    let stored = store.load().unwrap().unwrap();
    assert!(reports.iter().any(|r| r.run_id == stored.run_id));
    assert_eq!(stored.model, reports[0].bundle.model);
    assert_eq!(
        std::fs::read_dir(dir.path()).unwrap().count(),
        1,
        "temporary files left behind"
    );
}
