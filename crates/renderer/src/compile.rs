use thiserror::Error;

use crate::backend::GraphicsBackend;
use crate::diagnostics::Diagnostics;
use crate::types::{StageId, StageKind};

/// A successfully compiled shader stage, ready to be attached to a program.
///
/// Only [`compile_stage`] hands these out; the linker consumes and releases
/// them.
#[derive(Debug, PartialEq, Eq)]
pub struct ShaderStage {
    id: StageId,
    kind: StageKind,
}

impl ShaderStage {
    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Deletes the backend object behind the stage.
    pub(crate) fn release<B>(self, backend: &mut B, diagnostics: &Diagnostics)
    where
        B: GraphicsBackend + ?Sized,
    {
        backend.delete_stage(self.id);
        diagnostics.check_backend(backend, "delete_stage");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("backend could not allocate a {0} stage")]
    Allocation(StageKind),

    #[error("{kind} stage failed to compile")]
    Rejected { kind: StageKind, log: Option<String> },
}

impl CompileError {
    pub fn kind(&self) -> StageKind {
        match self {
            CompileError::Allocation(kind) => *kind,
            CompileError::Rejected { kind, .. } => *kind,
        }
    }
}

/// Compiles `source` as a single stage of the given kind.
///
/// Every backend call is followed by an error check. On failure the compiler
/// log (when there is one) is reported, the stage object is deleted, and no
/// handle escapes.
pub fn compile_stage<B>(
    backend: &mut B,
    diagnostics: &Diagnostics,
    kind: StageKind,
    source: &str,
) -> Result<ShaderStage, CompileError>
where
    B: GraphicsBackend + ?Sized,
{
    let id = backend.create_stage(kind);
    diagnostics.check_backend(backend, "create_stage");
    let Some(id) = id else {
        diagnostics.report(format!("Could not create {kind} shader"));
        return Err(CompileError::Allocation(kind));
    };

    backend.stage_source(id, source);
    diagnostics.check_backend(backend, "stage_source");
    backend.compile_stage(id);
    diagnostics.check_backend(backend, "compile_stage");

    let compiled = backend.stage_compiled(id);
    diagnostics.check_backend(backend, "stage_compiled");
    if compiled {
        tracing::debug!(%id, %kind, "compiled shader stage");
        return Ok(ShaderStage { id, kind });
    }

    let log = backend.stage_log(id).filter(|log| !log.trim().is_empty());
    diagnostics.check_backend(backend, "stage_log");
    if let Some(log) = &log {
        diagnostics.report(format!("Could not compile {kind} shader:\n{log}"));
    }
    backend.delete_stage(id);
    diagnostics.check_backend(backend, "delete_stage");

    Err(CompileError::Rejected { kind, log })
}
