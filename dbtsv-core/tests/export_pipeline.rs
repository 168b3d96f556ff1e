//! Export pipeline tests against a scripted executor.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

mod common;

use common::{FakeTable, ScriptedExecutor};
use dbtsv_core::{
    Cell, ConnectionSettings, Dialect, ExportConfig, ExportCoordinator, ExportJob, LineCodec,
    TableCatalog, TableExporter, TableOutcome, catalog::InformationSchemaCatalog,
};
use std::sync::Arc;
use std::time::Duration;

fn patients() -> FakeTable {
    FakeTable::new(&["id", "naam", "opmerking"])
        .row(vec![
            Cell::Integer(1),
            Cell::Text("O'Brien".into()),
            Cell::Text("eerste regel\ntweede\tregel".into()),
        ])
        .row(vec![Cell::Integer(2), Cell::Text("Jansen".into()), Cell::Null])
}

fn exporter(executor: Arc<ScriptedExecutor>, flush_every: usize) -> TableExporter {
    TableExporter::new(
        executor,
        Arc::new(LineCodec::default()),
        &ExportConfig::default().with_flush_every(flush_every),
    )
}

#[tokio::test]
async fn test_export_writes_header_and_escaped_rows() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Arc::new(ScriptedExecutor::new(Dialect::MySql).with_table("patient", patients()));
    let job = ExportJob::new("patient", dir.path());

    let summary = exporter(executor, 1).export(&job).await.unwrap();
    assert_eq!(summary.rows_written, 2);
    assert_eq!(summary.outcome, TableOutcome::Completed);

    let content = tokio::fs::read_to_string(dir.path().join("patient.tsv"))
        .await
        .unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "id\tnaam\topmerking");
    assert_eq!(lines[1], "1\tO\\'Brien\teerste regel\\ntweede\\tregel");
    assert_eq!(lines[2], "2\tJansen\t-");
}

#[tokio::test]
async fn test_binary_cells_are_written_losslessly() {
    let dir = tempfile::tempdir().unwrap();
    let table = FakeTable::new(&["id", "foto"]).row(vec![
        Cell::Integer(1),
        Cell::Binary(vec![0x89, b'P', b'N', b'G', 0xff, 0x00]),
    ]);
    let executor = Arc::new(ScriptedExecutor::new(Dialect::MySql).with_table("scan", table));
    let job = ExportJob::new("scan", dir.path());

    let summary = exporter(executor, 1).export(&job).await.unwrap();
    assert_eq!(summary.rows_written, 1);
    assert_eq!(summary.rows_skipped, 0);

    let content = tokio::fs::read_to_string(dir.path().join("scan.tsv"))
        .await
        .unwrap();
    assert!(!content.contains('\u{fffd}'));
    assert_eq!(content.lines().nth(1).unwrap(), "1\t\\x89PNG\\xff\0");
}

#[tokio::test]
async fn test_empty_table_still_gets_a_header() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Arc::new(
        ScriptedExecutor::new(Dialect::MySql).with_table("leeg", FakeTable::new(&["id", "naam"])),
    );
    let job = ExportJob::new("leeg", dir.path());

    let summary = exporter(executor, 300).export(&job).await.unwrap();
    assert_eq!(summary.rows_written, 0);
    let content = tokio::fs::read_to_string(&job.destination).await.unwrap();
    assert_eq!(content, "id\tnaam\n");
}

#[tokio::test]
async fn test_unrecognized_cell_skips_row_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let table = FakeTable::new(&["id", "vorm"])
        .row(vec![Cell::Integer(1), Cell::Unrecognized("GEOMETRY".into())])
        .row(vec![Cell::Integer(2), Cell::Text("rond".into())]);
    let executor = Arc::new(ScriptedExecutor::new(Dialect::MySql).with_table("vormen", table));
    let job = ExportJob::new("vormen", dir.path());

    let summary = exporter(executor, 300).export(&job).await.unwrap();
    assert_eq!(summary.rows_written, 1);
    assert_eq!(summary.rows_skipped, 1);

    let content = tokio::fs::read_to_string(&job.destination).await.unwrap();
    assert_eq!(content, "id\tvorm\n2\trond\n");
}

#[tokio::test]
async fn test_unwritable_destination_fails_that_table_only() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Arc::new(ScriptedExecutor::new(Dialect::MySql).with_table("patient", patients()));
    let job = ExportJob::new("patient", &dir.path().join("missing-subdir"));

    let error = exporter(executor, 300).export(&job).await.unwrap_err();
    assert!(!error.is_fatal());
    assert!(error.to_string().contains("patient"));
}

#[tokio::test]
async fn test_coordinator_failure_does_not_cancel_other_tables() {
    let dir = tempfile::tempdir().unwrap();
    let executor = Arc::new(
        ScriptedExecutor::new(Dialect::MySql)
            .with_table("a", patients())
            .with_table("b", patients())
            .with_table("c", patients())
            .fail_on("FROM `b`"),
    );
    let coordinator = ExportCoordinator::new(
        executor,
        Arc::new(LineCodec::default()),
        &ExportConfig::default(),
        &ConnectionSettings::new(Dialect::MySql).with_max_connections(2),
    );

    let tables = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let summaries = coordinator.run(&tables, dir.path()).await;

    let names: Vec<&str> = summaries.iter().map(|s| s.table.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(summaries[0].outcome, TableOutcome::Completed);
    assert!(matches!(summaries[1].outcome, TableOutcome::Failed { .. }));
    assert_eq!(summaries[2].outcome, TableOutcome::Completed);
    assert!(dir.path().join("c.tsv").exists());
}

#[tokio::test]
async fn test_coordinator_fan_out_respects_connection_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let mut executor = ScriptedExecutor::new(Dialect::MySql)
        .with_ceiling(2)
        .with_scan_delay(Duration::from_millis(40));
    let tables: Vec<String> = (0..7).map(|i| format!("tabel_{}", i)).collect();
    for table in &tables {
        executor = executor.with_table(table, patients());
    }
    let executor = Arc::new(executor);

    // More workers than connections: the executor's ceiling must hold
    let coordinator = ExportCoordinator::new(
        executor.clone(),
        Arc::new(LineCodec::default()),
        &ExportConfig::default(),
        &ConnectionSettings::new(Dialect::MySql).with_max_connections(5),
    );
    let summaries = coordinator.run(&tables, dir.path()).await;

    assert_eq!(summaries.len(), 7);
    assert!(
        summaries
            .iter()
            .all(|s| s.outcome == TableOutcome::Completed && s.rows_written == 2)
    );
    assert!(executor.peak_open_scans() <= 2);
    assert!(executor.peak_open_scans() >= 1);
}

#[tokio::test]
async fn test_coordinator_worker_count_bounds_open_scans() {
    let dir = tempfile::tempdir().unwrap();
    let mut executor = ScriptedExecutor::new(Dialect::MySql).with_scan_delay(Duration::from_millis(20));
    let tables: Vec<String> = (0..6).map(|i| format!("t{}", i)).collect();
    for table in &tables {
        executor = executor.with_table(table, patients());
    }
    let executor = Arc::new(executor);

    let coordinator = ExportCoordinator::new(
        executor.clone(),
        Arc::new(LineCodec::default()),
        &ExportConfig::default(),
        &ConnectionSettings::new(Dialect::MySql).with_max_connections(3),
    );
    let summaries = coordinator.run(&tables, dir.path()).await;

    assert!(summaries.iter().all(|s| s.outcome == TableOutcome::Completed));
    assert!(executor.peak_open_scans() <= 3);
}

#[tokio::test]
async fn test_information_schema_catalog_lists_tables_in_order() {
    let executor = Arc::new(
        ScriptedExecutor::new(Dialect::MySql)
            .with_table("relaties", patients())
            .with_table("adressen", patients()),
    );
    let catalog = InformationSchemaCatalog::new(executor);
    assert_eq!(
        catalog.list_export_tables().await.unwrap(),
        vec!["adressen", "relaties"]
    );
}

#[tokio::test]
async fn test_catalog_failure_is_fatal() {
    let executor = Arc::new(ScriptedExecutor::new(Dialect::MySql).fail_on("INFORMATION_SCHEMA"));
    let catalog = InformationSchemaCatalog::new(executor);
    let error = catalog.list_export_tables().await.unwrap_err();
    assert!(error.is_fatal());
}
