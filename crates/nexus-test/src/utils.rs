use std::sync::{Arc, Once};

use nexus_common::{SessionId, StatementConfig};
use nexus_stmt::{Backend, CapturedResultSet, Session};
use nexus_wire::Value;
use tracing_subscriber::EnvFilter;

use crate::mock::MockBackend;

static TRACING: Once = Once::new();

/// Installs a test-friendly subscriber once per process. The filter comes
/// from `NEXUS_LOG` and defaults to `warn`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = std::env::var("NEXUS_LOG")
            .ok()
            .and_then(|spec| EnvFilter::try_new(spec).ok())
            .unwrap_or_else(|| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Opens a session on `backend` with the default configuration.
pub fn session(backend: &Arc<MockBackend>) -> Session {
    session_with_config(backend, StatementConfig::default())
}

/// Opens a session on `backend`.
pub fn session_with_config(backend: &Arc<MockBackend>, config: StatementConfig) -> Session {
    init_tracing();
    let backend: Arc<dyn Backend> = backend.clone();
    Session::new(SessionId::new(1), backend, config)
}

/// Values of one column across a captured result.
pub fn column(result: &CapturedResultSet, index: usize) -> Vec<Value> {
    result
        .rows
        .iter()
        .filter_map(|row| row.get(index).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_helper() {
        let backend = Arc::new(MockBackend::with_sample_data());
        let session = session(&backend);
        assert_eq!(session.statement_count(), 0);
        assert_eq!(session.diagnostics().depth(), 1);
    }

    #[test]
    fn test_column_helper() {
        let result = CapturedResultSet {
            rows: vec![vec![Value::Int(1), Value::text("a")], vec![Value::Int(2)]],
            ..CapturedResultSet::default()
        };
        assert_eq!(column(&result, 1), vec![Value::text("a")]);
    }
}
