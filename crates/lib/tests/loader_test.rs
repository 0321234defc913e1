//! # Loader Tests
//!
//! Covers the header convention, cell typing and the rejection paths of the
//! CSV loader, plus loading from disk and over HTTP.

mod common;

use anyhow::Result;
use common::setup_tracing;
use excelqa::{loader, CellValue, QaError};
use excelqa_test_utils::PEOPLE_CSV;
use httpmock::{Method, MockServer};

#[test]
fn test_second_row_is_the_header() -> Result<()> {
    let dataset = loader::parse_csv(PEOPLE_CSV.as_bytes())?;

    assert_eq!(dataset.schema(), ["Name", "Age", "City"]);
    assert_eq!(dataset.row_count(), 3);
    assert_eq!(
        dataset.row(0).unwrap(),
        [
            CellValue::Text("Alice".into()),
            CellValue::Integer(30),
            CellValue::Text("Paris".into())
        ]
    );
    Ok(())
}

#[test]
fn test_bom_blank_and_duplicate_headers_and_cell_types() -> Result<()> {
    let csv = "\u{feff}Report title\nId,,Id,Score\n1,x, 2 ,3.5\n2,,,\n";
    let dataset = loader::parse_csv(csv.as_bytes())?;

    assert_eq!(dataset.schema(), ["Id", "Unnamed: 1", "Id.1", "Score"]);
    assert_eq!(
        dataset.row(0).unwrap(),
        [
            CellValue::Integer(1),
            CellValue::Text("x".into()),
            CellValue::Integer(2),
            CellValue::Float(3.5)
        ]
    );
    assert!(dataset.row(1).unwrap()[1..].iter().all(CellValue::is_null));
    Ok(())
}

#[test]
fn test_malformed_files_are_rejected() {
    let cases = [
        ("", "empty"),
        ("Title only\n", "no header"),
        ("Title\nA,B\n", "no data rows"),
        ("Title\nA,B\n1,2\n3\n", "ragged row"),
    ];
    for (csv, case) in cases {
        let result = loader::parse_csv(csv.as_bytes());
        assert!(
            matches!(result, Err(QaError::DataFormat(_))),
            "{case}: expected DataFormat, got {result:?}"
        );
    }
}

#[tokio::test]
async fn test_load_path_returns_dataset_and_raw_bytes() -> Result<()> {
    setup_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("people.csv");
    tokio::fs::write(&path, PEOPLE_CSV).await?;

    let (dataset, bytes) = loader::load_path(&path).await?;

    assert_eq!(dataset.row_count(), 3);
    assert_eq!(bytes, PEOPLE_CSV.as_bytes());
    Ok(())
}

#[tokio::test]
async fn test_fetch_url_success_and_http_failure() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    server.mock_async(|when, then| {
        when.method(Method::GET).path("/people.csv");
        then.status(200).body(PEOPLE_CSV);
    })
    .await;
    server.mock_async(|when, then| {
        when.method(Method::GET).path("/missing.csv");
        then.status(404);
    })
    .await;

    let (dataset, _) = loader::fetch_url(&server.url("/people.csv")).await?;
    assert_eq!(dataset.column_count(), 3);

    let missing = loader::fetch_url(&server.url("/missing.csv")).await;
    match missing {
        Err(QaError::DataFormat(reason)) => assert!(reason.contains("404"), "{reason}"),
        other => panic!("expected DataFormat, got {other:?}"),
    }
    Ok(())
}
