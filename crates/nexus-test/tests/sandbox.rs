//! Integration tests for headless execution through the sandbox.

use std::sync::Arc;

use nexus_common::{ErrorCode, StatementId};
use nexus_stmt::{CaptureSink, ExecuteFlags, ParamInput, SecurityContext, Session, StmtError};
use nexus_test::{column, session, MockBackend};
use nexus_wire::Value;

fn setup() -> (Arc<MockBackend>, Session) {
    let backend = Arc::new(MockBackend::with_sample_data());
    let session = session(&backend);
    (backend, session)
}

/// Records an error in the session's current diagnostics area.
fn fail_top_level(session: &mut Session) {
    let mut sink = CaptureSink::new();
    let err = session
        .execute(StatementId::new(99), &[], ExecuteFlags::empty(), &mut sink)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnknownStatement);
}

/// Test that results are captured and no statement is registered.
#[test]
fn test_execute_direct() {
    let (backend, mut session) = setup();
    let results = session
        .sandbox()
        .execute_direct("SELECT x FROM t WHERE id = 7")
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(column(&results[0], 0), vec![Value::text("seven")]);
    assert_eq!(session.statement_count(), 0);
    assert_eq!(session.diagnostics().depth(), 1);
    assert_eq!(backend.locks_held(), 0);
}

/// Test parameters, which must match the placeholder count exactly.
#[test]
fn test_execute_direct_with_params() {
    let (_backend, mut session) = setup();
    let results = session
        .sandbox()
        .execute_direct_with_params("SELECT x FROM t WHERE id = ?", &[ParamInput::int(1)])
        .unwrap();
    assert_eq!(column(&results[0], 0), vec![Value::text("one")]);

    let err = session
        .sandbox()
        .execute_direct_with_params(
            "SELECT x FROM t WHERE id = ?",
            &[ParamInput::int(1), ParamInput::int(2)],
        )
        .unwrap_err();
    assert_eq!(
        err,
        StmtError::ParamCountMismatch {
            expected: 1,
            actual: 2
        }
    );
}

/// Test DDL and DML through the sandbox.
#[test]
fn test_execute_direct_ddl() {
    let (backend, mut session) = setup();
    let results = session
        .sandbox()
        .execute_direct("CREATE TABLE u (a BIGINT NOT NULL)")
        .unwrap();
    assert!(!results[0].has_result_set());
    assert!(results[0].status.is_some());
    assert!(backend.catalog().contains("u"));

    session
        .sandbox()
        .execute_direct("INSERT INTO u VALUES (5)")
        .unwrap();
    let results = session.sandbox().execute_direct("SELECT a FROM u").unwrap();
    assert_eq!(column(&results[0], 0), vec![Value::Int(5)]);
}

/// Test that a successful sandboxed statement keeps the caller's error.
#[test]
fn test_success_keeps_outer_error() {
    let (_backend, mut session) = setup();
    fail_top_level(&mut session);

    session.sandbox().execute_direct("SHOW TABLES").unwrap();
    assert_eq!(
        session.diagnostics().error().unwrap().code,
        ErrorCode::UnknownStatement
    );
}

/// Test that a failed sandboxed statement replaces the caller's error.
#[test]
fn test_failure_replaces_outer_error() {
    let (_backend, mut session) = setup();
    fail_top_level(&mut session);

    let err = session
        .sandbox()
        .execute_direct("SELECT * FROM missing")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::CompileFailed);
    assert_eq!(
        session.diagnostics().error().unwrap().code,
        ErrorCode::CompileFailed
    );
    assert_eq!(session.diagnostics().depth(), 1);
}

/// Test that warnings of a successful nested run reach the caller.
#[test]
fn test_warnings_are_merged() {
    let (_backend, mut session) = setup();
    let results = session
        .sandbox()
        .execute_direct_with_params("SELECT x FROM t WHERE id = ?", &[ParamInput::text("7abc")])
        .unwrap();
    assert_eq!(column(&results[0], 0), vec![Value::text("seven")]);

    let area = session.diagnostics().current();
    assert_eq!(area.warning_count(), 1);
    assert_eq!(area.conditions()[0].code, ErrorCode::TruncatedValue);
}

/// Test that the caller's query display survives nested runs.
#[test]
fn test_query_display_restored() {
    let (_backend, mut session) = setup();
    session.set_query_display(Some("CALL outer()".to_string()));

    session.sandbox().execute_direct("SHOW TABLES").unwrap();
    assert_eq!(session.query_display(), Some("CALL outer()"));

    session
        .sandbox()
        .execute_direct("SELECT * FROM missing")
        .unwrap_err();
    assert_eq!(session.query_display(), Some("CALL outer()"));
}

/// Test that the sandbox runs under the session's policy.
#[test]
fn test_policy_applies() {
    let (_backend, mut session) = setup();
    session.set_security(SecurityContext {
        password_expired: true,
        ..SecurityContext::new("app", "localhost")
    });
    let err = session.sandbox().execute_direct("SHOW TABLES").unwrap_err();
    assert!(matches!(err, StmtError::PolicyRejected(_)));
}
