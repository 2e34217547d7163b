//! Integration tests for reprepare: stale metadata, failed recompiles,
//! engine fallback and the refresh and sink-change triggers.

use std::sync::Arc;

use nexus_common::{ErrorCode, StatementConfig, StatementId, MAX_REPREPARE_ATTEMPTS};
use nexus_stmt::{
    CaptureSink, ColumnMeta, CompileError, Engine, ExecuteFlags, InvokeError, InvokeErrorKind,
    LifecycleState, NetworkSink, ParamInput, Session, SqlType, StmtError,
};
use nexus_test::{session, session_with_config, MockBackend};
use nexus_wire::Value;

fn setup(text: &str) -> (Arc<MockBackend>, Session, StatementId) {
    let backend = Arc::new(MockBackend::with_sample_data());
    let mut session = session(&backend);
    let id = session.prepare(text).expect("prepare").statement_id;
    (backend, session, id)
}

fn execute(
    session: &mut Session,
    id: StatementId,
    params: &[ParamInput],
) -> (Result<nexus_stmt::ExecuteOutcome, StmtError>, CaptureSink) {
    let mut sink = CaptureSink::new();
    let result = session.execute(id, params, ExecuteFlags::empty(), &mut sink);
    (result, sink)
}

/// Test that metadata changing on every attempt exhausts the budget.
#[test]
fn test_stale_metadata_budget() {
    let (backend, mut session, id) = setup("SELECT x FROM t WHERE id = ?");
    backend.faults().always_stale = true;

    let (result, sink) = execute(&mut session, id, &[ParamInput::long(7)]);
    assert_eq!(
        result.unwrap_err(),
        StmtError::ReprepareExhausted {
            attempts: MAX_REPREPARE_ATTEMPTS
        }
    );
    assert!(sink.results().is_empty());
    assert_eq!(sink.error().unwrap().code, ErrorCode::ReprepareExhausted);

    let budget = MAX_REPREPARE_ATTEMPTS as usize;
    assert_eq!(backend.compile_count(), 1 + budget);
    assert_eq!(backend.invoke_count(), 1 + budget);

    let area = session.diagnostics().current();
    assert_eq!(area.error().unwrap().code, ErrorCode::ReprepareExhausted);
    assert!(area
        .conditions()
        .iter()
        .any(|c| c.code == ErrorCode::StaleMetadata));
    assert_eq!(backend.locks_held(), 0);
    assert_eq!(session.held_metadata_locks(), 0);
}

/// Test that one metadata change costs exactly one reprepare.
#[test]
fn test_changed_table_reprepares_once() {
    let (backend, mut session, id) = setup("SELECT x FROM t WHERE id = ?");
    assert!(backend.touch("t"));

    let (result, sink) = execute(&mut session, id, &[ParamInput::long(7)]);
    let outcome = result.unwrap();
    assert_eq!(outcome.reprepares, 1);
    assert!(!outcome.metadata_changed);
    assert_eq!(sink.results()[0].rows, vec![vec![Value::text("seven")]]);

    let stats = session.statement(id).unwrap().stats();
    assert_eq!(stats.reprepares, 1);
    assert_eq!(stats.type_reprepares, 0);
    assert_eq!(backend.compile_count(), 2);

    // The fresh plan is current now.
    let (result, _) = execute(&mut session, id, &[ParamInput::long(7)]);
    assert_eq!(result.unwrap().reprepares, 0);
}

/// Test that a retry after stale metadata re-checks parameter types.
#[test]
fn test_type_checked_after_stale_reprepare() {
    let (backend, mut session, id) = setup("SELECT x FROM t WHERE id = ?");
    assert_eq!(session.statement(id).unwrap().param_types(), vec![SqlType::BIGINT]);

    backend.create_table(
        "t",
        vec![
            ColumnMeta::new("id", SqlType::String),
            ColumnMeta::new("x", SqlType::String),
        ],
    );
    backend.insert_row("t", vec![Value::text("7"), Value::text("seven")]);

    let (result, sink) = execute(&mut session, id, &[ParamInput::long(7)]);
    assert_eq!(result.unwrap().reprepares, 2);
    assert_eq!(sink.results()[0].rows, vec![vec![Value::text("seven")]]);

    let stmt = session.statement(id).unwrap();
    assert_eq!(stmt.param_types(), vec![SqlType::BIGINT]);
    assert_eq!(stmt.stats().reprepares, 2);
    assert_eq!(stmt.stats().type_reprepares, 1);
    assert_eq!(backend.compile_count(), 3);
    assert_eq!(backend.invoke_count(), 2);
}

/// Test that a few stale invocations within the budget still succeed.
#[test]
fn test_stale_within_budget_succeeds() {
    let (backend, mut session, id) = setup("SELECT x FROM t WHERE id = ?");
    backend.faults().stale_invocations = MAX_REPREPARE_ATTEMPTS;

    let (result, sink) = execute(&mut session, id, &[ParamInput::long(1)]);
    assert_eq!(result.unwrap().reprepares, u64::from(MAX_REPREPARE_ATTEMPTS));
    assert_eq!(sink.results()[0].rows, vec![vec![Value::text("one")]]);
}

/// Test that statements which may not be retried report stale metadata.
#[test]
fn test_ddl_is_not_retried() {
    let (backend, mut session, id) = setup("DROP TABLE t");
    assert!(backend.touch("t"));

    let (result, _) = execute(&mut session, id, &[]);
    let err = result.unwrap_err();
    assert_eq!(err, StmtError::StaleMetadata);
    assert!(err.is_retryable());
    assert_eq!(backend.compile_count(), 1);
    assert!(backend.catalog().contains("t"));
}

/// Test that a failed reprepare leaves the statement as it was.
#[test]
fn test_failed_reprepare_restores_statement() {
    let (backend, mut session, id) = setup("SELECT x FROM t WHERE id = ?");
    {
        let mut faults = backend.faults();
        faults.stale_invocations = 1;
        faults.compile_error = Some(CompileError::Syntax("injected".into()));
    }

    let (result, _) = execute(&mut session, id, &[ParamInput::long(7)]);
    assert!(matches!(
        result,
        Err(StmtError::Compile(CompileError::Syntax(_)))
    ));
    let stmt = session.statement(id).unwrap();
    assert_eq!(stmt.state(), LifecycleState::Prepared);
    assert_eq!(stmt.param_count(), 1);
    assert_eq!(stmt.columns().len(), 1);
    assert_eq!(stmt.stats().reprepares, 0);
    assert_eq!(backend.locks_held(), 0);

    let (result, sink) = execute(&mut session, id, &[ParamInput::long(7)]);
    result.unwrap();
    assert_eq!(sink.results()[0].rows.len(), 1);
}

/// Test that a recompile may not change the placeholder count.
#[test]
fn test_param_count_change_is_rejected() {
    let (backend, mut session, id) = setup("SELECT x FROM t WHERE id = ?");
    {
        let mut faults = backend.faults();
        faults.stale_invocations = 1;
        faults.extra_params = 1;
    }

    let (result, _) = execute(&mut session, id, &[ParamInput::long(7)]);
    assert_eq!(
        result.unwrap_err(),
        StmtError::Compile(CompileError::ParamCountChanged {
            before: 1,
            after: 2
        })
    );
    assert_eq!(session.statement(id).unwrap().param_count(), 1);
    assert_eq!(backend.locks_held(), 0);
}

/// Test the metadata-changed signal when the result shape changes.
#[test]
fn test_column_count_change_is_flagged() {
    let (backend, mut session, id) = setup("SELECT * FROM t WHERE id = ?");
    assert_eq!(session.statement(id).unwrap().columns().len(), 2);
    assert!(backend.add_column("t", ColumnMeta::new("y", SqlType::BIGINT)));

    let (result, sink) = execute(&mut session, id, &[ParamInput::long(7)]);
    let outcome = result.unwrap();
    assert!(outcome.metadata_changed);
    assert_eq!(outcome.reprepares, 1);

    let result = &sink.results()[0];
    assert_eq!(result.columns.len(), 3);
    assert_eq!(result.value(0, 2), Some(&Value::Null));

    let stmt = session.statement(id).unwrap();
    assert!(stmt.metadata_changed());
    assert_eq!(stmt.columns().len(), 3);
    assert!(session
        .diagnostics()
        .current()
        .conditions()
        .iter()
        .any(|c| c.code == ErrorCode::MetadataChanged));

    // Nothing changes on the next run.
    let (result, _) = execute(&mut session, id, &[ParamInput::long(7)]);
    assert!(!result.unwrap().metadata_changed);
}

fn secondary_session(backend: &Arc<MockBackend>) -> Session {
    session_with_config(
        backend,
        StatementConfig::builder().secondary_engine(true).build(),
    )
}

/// Test that a plan rejected by the secondary engine moves to the primary.
#[test]
fn test_engine_switch() {
    let backend = Arc::new(MockBackend::with_sample_data());
    let mut session = secondary_session(&backend);
    let id = session.prepare("SELECT x FROM t WHERE id = ?").unwrap().statement_id;
    assert_eq!(session.statement(id).unwrap().engine(), Engine::Secondary);
    backend.faults().rejected_engines = vec![Engine::Secondary];

    let (result, sink) = execute(&mut session, id, &[ParamInput::long(7)]);
    assert_eq!(result.unwrap().reprepares, 1);
    assert_eq!(sink.results()[0].rows.len(), 1);

    let stmt = session.statement(id).unwrap();
    assert_eq!(stmt.engine(), Engine::Primary);
    assert!(!stmt.is_primary_forced());
    assert_eq!(stmt.stats().engine_switches, 1);
}

/// Test that a plan rejected everywhere fails after forcing the primary.
#[test]
fn test_engine_fallback_gives_up() {
    let backend = Arc::new(MockBackend::with_sample_data());
    let mut session = secondary_session(&backend);
    let id = session.prepare("SELECT x FROM t WHERE id = ?").unwrap().statement_id;
    backend.faults().rejected_engines = vec![Engine::Secondary, Engine::Primary];

    let (result, _) = execute(&mut session, id, &[ParamInput::long(7)]);
    let Err(StmtError::Execution(err)) = result else {
        panic!("expected an execution error");
    };
    assert_eq!(err.kind, InvokeErrorKind::AlternateEngine);

    let stmt = session.statement(id).unwrap();
    assert!(stmt.is_primary_forced());
    assert_eq!(stmt.engine(), Engine::Primary);
    assert_eq!(stmt.stats().engine_switches, 2);
    assert_eq!(backend.compile_count(), 3);
}

/// Test that plans asking for a refresh are rebuilt before each run.
#[test]
fn test_refresh_required() {
    let backend = Arc::new(MockBackend::with_sample_data());
    backend.faults().refresh_plans = true;
    let mut session = session(&backend);
    let id = session.prepare("SELECT x FROM t WHERE id = ?").unwrap().statement_id;

    for _ in 0..2 {
        let (result, _) = execute(&mut session, id, &[ParamInput::long(7)]);
        assert_eq!(result.unwrap().reprepares, 1);
    }
    assert_eq!(backend.compile_count(), 3);
    assert_eq!(session.statement(id).unwrap().stats().reprepares, 2);
}

/// Test that switching the result sink kind rebuilds the plan once.
#[test]
fn test_sink_change() {
    let (backend, mut session, id) = setup("SELECT x FROM t WHERE id = ?");
    let (result, _) = execute(&mut session, id, &[ParamInput::long(7)]);
    assert_eq!(result.unwrap().reprepares, 0);

    let mut network = NetworkSink::new();
    let outcome = session
        .execute(id, &[ParamInput::long(7)], ExecuteFlags::empty(), &mut network)
        .unwrap();
    assert_eq!(outcome.reprepares, 1);
    let outcome = session
        .execute(id, &[ParamInput::long(7)], ExecuteFlags::empty(), &mut network)
        .unwrap();
    assert_eq!(outcome.reprepares, 0);
    assert_eq!(backend.compile_count(), 2);
}

/// Test that retryable executor errors are returned, not retried.
#[test]
fn test_retryable_error_is_returned() {
    let (backend, mut session, id) = setup("SELECT x FROM t WHERE id = ?");
    backend.faults().invoke_error = Some(InvokeError::new(InvokeErrorKind::Deadlock, "deadlock"));

    let (result, _) = execute(&mut session, id, &[ParamInput::long(7)]);
    let err = result.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.code(), ErrorCode::Deadlock);
    assert_eq!(backend.compile_count(), 1);
    assert_eq!(backend.invoke_count(), 1);
}

/// Test that allocation failure is fatal and never retried.
#[test]
fn test_out_of_memory() {
    let (backend, mut session, id) = setup("SELECT x FROM t WHERE id = ?");
    backend.faults().invoke_error = Some(InvokeError::out_of_memory("result buffer"));

    let (result, _) = execute(&mut session, id, &[ParamInput::long(7)]);
    let err = result.unwrap_err();
    assert!(matches!(err, StmtError::OutOfMemory(_)));
    assert!(err.is_fatal());
}

/// Test that metadata locks taken during execution are released.
#[test]
fn test_locks_released_after_execute() {
    let (backend, mut session, id) = setup("SELECT x FROM t WHERE id = ?");
    let before = backend.lock_acquisitions();
    let (result, _) = execute(&mut session, id, &[ParamInput::long(7)]);
    result.unwrap();
    assert!(backend.lock_acquisitions() > before);
    assert_eq!(backend.locks_held(), 0);
    assert_eq!(session.held_metadata_locks(), 0);
}
