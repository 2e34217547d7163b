//! Swap-based reprepare.

use std::fmt;
use std::mem;

use tracing::{debug, warn};

use super::{Statement, StatementBody};
use crate::backend::Backend;
use crate::error::{CompileError, StmtResult};
use crate::mdl::MdlContext;

/// Why a statement is being recompiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReprepareReason {
    /// A bound value is incompatible with its declared type.
    TypeMismatch,
    /// The executor reported stale metadata.
    StaleMetadata,
    /// The result sink kind changed since the last execution.
    SinkChanged,
    /// The plan depends on something that must be refreshed every run.
    RefreshRequired,
    /// The plan is moving to another engine.
    EngineSwitch,
}

impl fmt::Display for ReprepareReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::TypeMismatch => "type mismatch",
            Self::StaleMetadata => "stale metadata",
            Self::SinkChanged => "sink change",
            Self::RefreshRequired => "refresh dependency",
            Self::EngineSwitch => "engine switch",
        };
        f.write_str(reason)
    }
}

impl Statement {
    /// Recompiles the statement text in place.
    ///
    /// The current body moves into a shadow and a fresh one is compiled
    /// using type hints from the shadow's slots. On failure the shadow is
    /// moved back and locks taken by the attempt are released, leaving the
    /// statement exactly as before. On success the new slots inherit the
    /// shadow's bindings.
    pub(crate) fn reprepare(
        &mut self,
        backend: &dyn Backend,
        mdl: &mut MdlContext,
        reason: ReprepareReason,
    ) -> StmtResult<()> {
        let mut shadow = StatementBody::shell_of(&self.body);
        mem::swap(&mut self.body, &mut shadow);
        let hints = shadow.params.hints();
        let savepoint = mdl.savepoint();

        let compiled = self.compile_body(backend, mdl, &hints).and_then(|()| {
            let (before, after) = (shadow.params.len(), self.body.params.len());
            if before == after {
                Ok(())
            } else {
                Err(CompileError::ParamCountChanged { before, after }.into())
            }
        });
        if let Err(err) = compiled {
            mdl.rollback_to(savepoint, backend);
            mem::swap(&mut self.body, &mut shadow);
            debug!(statement = %self.id, %reason, error = %err, "reprepare failed, statement restored");
            return Err(err);
        }

        self.body.params.take_bindings_from(&mut shadow.params);
        if !shadow.columns.is_empty() && shadow.columns.len() != self.body.columns.len() {
            self.metadata_changed = true;
            warn!(
                statement = %self.id,
                before = shadow.columns.len(),
                after = self.body.columns.len(),
                "result column count changed after reprepare"
            );
        }
        self.stats.reprepares += 1;
        if reason == ReprepareReason::TypeMismatch {
            self.stats.type_reprepares += 1;
        }
        debug!(statement = %self.id, %reason, engine = %self.engine(), "statement reprepared");
        Ok(())
    }
}
