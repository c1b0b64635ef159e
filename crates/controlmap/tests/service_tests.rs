//! Intake, validation and lookup behaviour of the service facade.

mod common;

use common::*;
use controlmap::catalog::CheckQuery;
use controlmap::error::{ControlMapError, ValidationError};
use controlmap::MapRequest;

fn harness() -> TestHarness {
    TestHarness::new(ScriptedAgent::new())
}

#[test]
fn test_upload_extracts_preview() {
    let harness = harness();
    let upload = harness.upload();

    assert_eq!(upload.filename, "framework.txt");
    assert!(upload.preview.starts_with("1.1 Ensure MFA"));
    assert!(upload.size_bytes > 0);
    assert_eq!(harness.service.health().uploads, 1);
}

#[test]
fn test_upload_rejects_unsupported_extension() {
    let harness = harness();

    match harness.service.upload("framework.docx", b"content") {
        Err(ControlMapError::Validation(ValidationError::UnsupportedFileType { extension, .. })) => {
            assert_eq!(extension, ".docx");
        }
        other => panic!("unexpected {:?}", other.map(|u| u.upload_id)),
    }
}

#[test]
fn test_upload_rejects_empty_file() {
    let harness = harness();

    assert!(matches!(
        harness.service.upload("framework.txt", b""),
        Err(ControlMapError::Validation(ValidationError::EmptyFile))
    ));
    assert_eq!(harness.service.health().uploads, 0);
}

#[test]
fn test_configure_unknown_upload() {
    let harness = harness();
    let request = ConfigureRequestBuilder::new("missing").build();

    assert!(matches!(
        harness.service.configure(request),
        Err(ControlMapError::NotFound { kind: "Upload", .. })
    ));
}

#[test]
fn test_configure_reports_check_counts() {
    let harness = harness();
    let upload = harness.upload();
    let response = harness.configure(&upload.upload_id, &["aws", "gcp"]);

    assert_eq!(response.providers.len(), 2);
    assert_eq!(response.providers[0].name, "aws");
    assert_eq!(response.providers[0].check_count, 2);
    assert_eq!(response.total_checks, 3);
}

#[test]
fn test_configure_unknown_provider() {
    let harness = harness();
    let upload = harness.upload();
    let request = ConfigureRequestBuilder::new(&upload.upload_id)
        .providers(&["aws", "oraclecloud"])
        .build();

    match harness.service.configure(request) {
        Err(ControlMapError::Validation(ValidationError::UnknownProvider { provider, available })) => {
            assert_eq!(provider, "oraclecloud");
            assert!(available.contains("aws"));
        }
        other => panic!("unexpected {:?}", other.map(|c| c.configuration_id)),
    }
}

#[test]
fn test_configure_rejects_empty_selection() {
    let harness = harness();
    let upload = harness.upload();
    let request = ConfigureRequestBuilder::new(&upload.upload_id)
        .providers(&[])
        .build();

    assert!(matches!(
        harness.service.configure(request),
        Err(ControlMapError::Validation(ValidationError::NoProviders))
    ));
}

#[test]
fn test_start_batch_with_mismatched_upload() {
    let harness = harness();
    let first = harness.upload();
    let second = harness.upload();
    let configuration = harness.configure(&first.upload_id, &["aws"]);

    let result = harness.service.start_batch(&MapRequest {
        upload_id: second.upload_id,
        configuration_id: configuration.configuration_id,
    });
    assert!(matches!(
        result,
        Err(ControlMapError::Validation(ValidationError::UploadMismatch))
    ));
    assert_eq!(harness.service.health().batches, 0);
}

#[test]
fn test_start_batch_unknown_configuration() {
    let harness = harness();
    let upload = harness.upload();

    assert!(matches!(
        harness.service.start_batch(&MapRequest {
            upload_id: upload.upload_id,
            configuration_id: "nope".to_string(),
        }),
        Err(ControlMapError::NotFound { kind: "Configuration", .. })
    ));
}

#[test]
fn test_lookups_of_unknown_ids() {
    let harness = harness();

    assert!(matches!(
        harness.service.batch_status("nope"),
        Err(ControlMapError::NotFound { kind: "Batch", .. })
    ));
    assert!(matches!(
        harness.service.job_status("nope"),
        Err(ControlMapError::NotFound { kind: "Job", .. })
    ));
    assert!(matches!(
        harness.service.archive("nope"),
        Err(ControlMapError::NotFound { kind: "Batch", .. })
    ));
    assert!(matches!(
        harness.service.cancel("nope"),
        Err(ControlMapError::NotFound { kind: "Batch", .. })
    ));
}

#[tokio::test]
async fn test_artifact_kind_and_availability() {
    let harness = TestHarness::new(ScriptedAgent::new().reply("aws", Reply::Hang));
    let response = harness.start(&["aws"]);
    let job_id = &response.job_ids[0];

    assert!(matches!(
        harness.service.artifact(job_id, "pdf"),
        Err(ControlMapError::Validation(ValidationError::InvalidArtifactKind(_)))
    ));
    assert!(matches!(
        harness.service.artifact(job_id, "json"),
        Err(ControlMapError::NotFound { kind: "Artifact", .. })
    ));
    assert!(matches!(
        harness.service.artifact("nope", "json"),
        Err(ControlMapError::NotFound { kind: "Job", .. })
    ));

    harness.service.shutdown().await;
}

#[tokio::test]
async fn test_cancel_before_run_fails_every_job() {
    let harness = harness();
    let upload = harness.upload();
    let configuration = harness.configure(&upload.upload_id, &["aws", "gcp"]);

    let batch = harness
        .service
        .orchestrator()
        .create_batch(&configuration.configuration_id)
        .unwrap();
    let status = harness.service.cancel(&batch.id).unwrap();

    assert!(status
        .jobs
        .iter()
        .all(|j| j.error_message.as_deref() == Some("cancelled before start")));
    assert!(harness.agent.calls().is_empty());
    assert!(matches!(
        harness.service.orchestrator().run(&batch.id),
        Err(ControlMapError::Conflict(_))
    ));
}

#[test]
fn test_list_providers_and_checks() {
    let harness = harness();

    let providers = harness.service.list_providers();
    let names: Vec<&str> = providers.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["aws", "azure", "gcp"]);

    let query = CheckQuery {
        service: Some("iam".to_string()),
        ..CheckQuery::all()
    };
    let page = harness.service.list_checks("aws", &query).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.checks[0].check_id, "iam_root_mfa_enabled");

    assert!(matches!(
        harness.service.list_checks("nhn", &CheckQuery::all()),
        Err(ControlMapError::NotFound { kind: "Provider", .. })
    ));
}

#[test]
fn test_health() {
    let harness = harness();
    let health = harness.service.health();

    assert_eq!(health.status, "healthy");
    assert_eq!(health.providers, 3);
    assert_eq!(health.batches, 0);
    assert_eq!(health.active_batches, 0);
}
