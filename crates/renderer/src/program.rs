use std::collections::HashMap;

use thiserror::Error;

use crate::backend::{GraphicsBackend, ATTRIBUTE_BINDINGS};
use crate::compile::{compile_stage, CompileError, ShaderStage};
use crate::diagnostics::Diagnostics;
use crate::resources::{load_text, ResourceNamespace};
use crate::types::{ProgramId, ProgramSources, StageKind, UniformLocation};

/// A linked program. Attribute slots follow [`ATTRIBUTE_BINDINGS`].
#[derive(Debug)]
pub struct Program {
    id: ProgramId,
    uniforms: HashMap<String, Option<UniformLocation>>,
}

impl Program {
    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn attribute_bindings(&self) -> &'static [(u32, &'static str)] {
        &ATTRIBUTE_BINDINGS
    }

    /// Looks up a uniform once and remembers the answer, including absence.
    pub fn uniform_location<B>(&mut self, backend: &B, name: &str) -> Option<UniformLocation>
    where
        B: GraphicsBackend + ?Sized,
    {
        if let Some(location) = self.uniforms.get(name) {
            return *location;
        }
        let location = backend.uniform_location(self.id, name);
        if location.is_none() {
            tracing::debug!(program = %self.id, name, "uniform not declared by program");
        }
        self.uniforms.insert(name.to_string(), location);
        location
    }

    /// Deletes the program object.
    pub fn release<B>(self, backend: &mut B, diagnostics: &Diagnostics)
    where
        B: GraphicsBackend + ?Sized,
    {
        backend.delete_program(self.id);
        diagnostics.check_backend(backend, "delete_program");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("backend could not allocate a program")]
    Allocation,

    #[error("program failed to link")]
    Rejected { log: Option<String> },
}

/// Compiles both stages and links them into a program.
///
/// Stage objects never outlive this call: they are deleted once the link
/// outcome is known, whether it succeeded or not. A failed link also deletes
/// the program.
pub fn link_program<B>(
    backend: &mut B,
    diagnostics: &Diagnostics,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<Program, LinkError>
where
    B: GraphicsBackend + ?Sized,
{
    let vertex = compile_stage(backend, diagnostics, StageKind::Vertex, vertex_source)?;
    let fragment = match compile_stage(backend, diagnostics, StageKind::Fragment, fragment_source)
    {
        Ok(fragment) => fragment,
        Err(err) => {
            vertex.release(backend, diagnostics);
            return Err(err.into());
        }
    };

    let id = backend.create_program();
    diagnostics.check_backend(backend, "create_program");
    let Some(id) = id else {
        diagnostics.report("Could not create program");
        release_stages(backend, diagnostics, vertex, fragment);
        return Err(LinkError::Allocation);
    };

    backend.attach_stage(id, vertex.id());
    diagnostics.check_backend(backend, "attach_stage");
    backend.attach_stage(id, fragment.id());
    diagnostics.check_backend(backend, "attach_stage");
    for (slot, name) in ATTRIBUTE_BINDINGS {
        backend.bind_attribute(id, slot, name);
        diagnostics.check_backend(backend, "bind_attribute");
    }
    backend.link_program(id);
    diagnostics.check_backend(backend, "link_program");

    let linked = backend.program_linked(id);
    diagnostics.check_backend(backend, "program_linked");
    if !linked {
        let log = backend.program_log(id).filter(|log| !log.trim().is_empty());
        diagnostics.check_backend(backend, "program_log");
        if let Some(log) = &log {
            diagnostics.report(format!("Could not link program:\n{log}"));
        }
        backend.delete_program(id);
        diagnostics.check_backend(backend, "delete_program");
        release_stages(backend, diagnostics, vertex, fragment);
        return Err(LinkError::Rejected { log });
    }

    release_stages(backend, diagnostics, vertex, fragment);
    tracing::debug!(program = %id, "linked program");
    Ok(Program {
        id,
        uniforms: HashMap::new(),
    })
}

fn release_stages<B>(
    backend: &mut B,
    diagnostics: &Diagnostics,
    vertex: ShaderStage,
    fragment: ShaderStage,
) where
    B: GraphicsBackend + ?Sized,
{
    vertex.release(backend, diagnostics);
    fragment.release(backend, diagnostics);
}

/// Loads both stage sources by name and links them.
///
/// A missing resource reads as empty text, which then fails to compile.
pub fn load_program<B, R>(
    backend: &mut B,
    resources: &R,
    diagnostics: &Diagnostics,
    sources: &ProgramSources,
) -> Result<Program, LinkError>
where
    B: GraphicsBackend + ?Sized,
    R: ResourceNamespace + ?Sized,
{
    let vertex = load_text(resources, &sources.vertex, diagnostics);
    let fragment = load_text(resources, &sources.fragment, diagnostics);
    link_program(backend, diagnostics, &vertex, &fragment)
}
