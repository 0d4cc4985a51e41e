//! GLSL front-end shared by the wgpu backend and the test mock.
//!
//! Stage compilation parses and validates GLSL 450 with naga so the compile
//! status and log are known before any device object exists. Linking then
//! checks the interface between the two modules: which attribute slots the
//! vertex stage consumes and where each uniform lives inside the shared
//! `std140` block.

use naga::front::glsl::{Frontend, Options};
use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::types::StageKind;

use super::uniforms::{UniformLayout, UniformSlot};

/// Bind group and binding the uniform block must be declared at.
pub(crate) const UNIFORM_GROUP: u32 = 0;
pub(crate) const UNIFORM_BINDING: u32 = 0;

/// Parses and validates one stage; the error string is the compiler log.
pub(crate) fn parse_stage(kind: StageKind, source: &str) -> Result<naga::Module, String> {
    let stage = kind.naga_stage();
    let mut frontend = Frontend::default();
    let module = frontend
        .parse(&Options::from(stage), source)
        .map_err(|errors| errors.emit_to_string(source))?;

    if !module.entry_points.iter().any(|entry| entry.stage == stage) {
        return Err(format!("error: {kind} stage declares no `main` entry point"));
    }

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| err.emit_to_string(source))?;

    Ok(module)
}

/// A vertex-stage input and the location it reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VertexInput {
    pub location: u32,
    pub name: Option<String>,
}

/// Everything a linked program exposes to the host.
#[derive(Debug, Clone)]
pub(crate) struct ProgramInterface {
    pub uniforms: Option<UniformLayout>,
    pub vertex_inputs: Vec<VertexInput>,
}

pub(crate) fn vertex_inputs(module: &naga::Module) -> Vec<VertexInput> {
    let Some(entry) = module
        .entry_points
        .iter()
        .find(|entry| entry.stage == naga::ShaderStage::Vertex)
    else {
        return Vec::new();
    };

    let mut inputs = Vec::new();
    for argument in &entry.function.arguments {
        match &argument.binding {
            Some(naga::Binding::Location { location, .. }) => inputs.push(VertexInput {
                location: *location,
                name: argument.name.clone(),
            }),
            Some(naga::Binding::BuiltIn(_)) => {}
            None => {
                if let naga::TypeInner::Struct { members, .. } = &module.types[argument.ty].inner {
                    for member in members {
                        if let Some(naga::Binding::Location { location, .. }) = &member.binding {
                            inputs.push(VertexInput {
                                location: *location,
                                name: member.name.clone(),
                            });
                        }
                    }
                }
            }
        }
    }
    inputs.sort_by_key(|input| input.location);
    inputs
}

/// Describes the module's uniform block, if it declares one.
pub(crate) fn uniform_block(module: &naga::Module) -> Result<Option<UniformLayout>, String> {
    let mut layout = None;
    for (_, variable) in module.global_variables.iter() {
        if !matches!(variable.space, naga::AddressSpace::Uniform) {
            continue;
        }
        let label = variable.name.as_deref().unwrap_or("<anonymous>");
        if layout.is_some() {
            return Err(format!(
                "uniform block `{label}`: only one uniform block is supported"
            ));
        }
        match &variable.binding {
            Some(binding)
                if binding.group == UNIFORM_GROUP && binding.binding == UNIFORM_BINDING => {}
            _ => {
                return Err(format!(
                    "uniform block `{label}` must be declared with \
                     set = {UNIFORM_GROUP}, binding = {UNIFORM_BINDING}"
                ))
            }
        }

        let naga::TypeInner::Struct { members, span } = &module.types[variable.ty].inner else {
            return Err(format!("uniform `{label}` must be declared inside a block"));
        };
        let mut block = UniformLayout::with_span(*span);
        for member in members {
            let Some(name) = member.name.as_ref() else {
                continue;
            };
            let size = module.types[member.ty].inner.size(module.to_ctx());
            block.insert(
                name.clone(),
                UniformSlot {
                    offset: member.offset,
                    size,
                },
            )?;
        }
        layout = Some(block);
    }
    Ok(layout)
}

/// Checks the vertex/fragment interface against the bound attribute slots.
pub(crate) fn link_interface(
    vertex: &naga::Module,
    fragment: &naga::Module,
    bindings: &[(u32, String)],
) -> Result<ProgramInterface, String> {
    let inputs = vertex_inputs(vertex);

    for (slot, name) in bindings {
        if let Some(input) = inputs
            .iter()
            .find(|input| input.name.as_deref() == Some(name.as_str()))
        {
            if input.location != *slot {
                return Err(format!(
                    "error: attribute `{name}` is declared at location {} but bound to slot {slot}",
                    input.location
                ));
            }
        }
    }
    for input in &inputs {
        if !bindings.iter().any(|(slot, _)| *slot == input.location) {
            let label = input.name.as_deref().unwrap_or("<unnamed>");
            return Err(format!(
                "error: vertex input `{label}` at location {} is not fed by any bound attribute",
                input.location
            ));
        }
    }

    let uniforms = match (uniform_block(vertex)?, uniform_block(fragment)?) {
        (Some(mut vertex_block), Some(fragment_block)) => {
            vertex_block.merge(&fragment_block)?;
            Some(vertex_block)
        }
        (vertex_block, fragment_block) => vertex_block.or(fragment_block),
    };

    Ok(ProgramInterface {
        uniforms,
        vertex_inputs: inputs,
    })
}
