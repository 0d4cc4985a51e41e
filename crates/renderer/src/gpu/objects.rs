//! GL-style object tables shared by every backend.
//!
//! Stage and program handles, the current program, enabled attribute slots
//! and the pending error queue follow the same rules whatever draws the
//! pixels. A backend only supplies the payload a successful link produces
//! (a wgpu pipeline, or a bare uniform block in tests).

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::backend::{BackendError, QUAD_VERTEX_COUNT};
use crate::types::{ProgramId, StageId, StageKind, UniformLocation, UniformValue};

use super::pipeline::StageSources;
use super::reflect::{self, ProgramInterface};
use super::uniforms::UniformBlock;

/// Error codes waiting to be drained; shared with device callbacks.
pub(crate) type ErrorQueue = Arc<Mutex<VecDeque<BackendError>>>;

/// What a backend keeps for a linked program.
pub(crate) trait LinkedProgram {
    fn interface(&self) -> &ProgramInterface;
    fn uniforms_mut(&mut self) -> Option<&mut UniformBlock>;
}

struct StageObject {
    kind: StageKind,
    source: String,
    module: Option<naga::Module>,
    log: Option<String>,
}

struct ProgramObject<L> {
    attached: Vec<StageId>,
    bindings: Vec<(u32, String)>,
    log: Option<String>,
    linked: Option<L>,
}

impl<L> Default for ProgramObject<L> {
    fn default() -> Self {
        Self {
            attached: Vec::new(),
            bindings: Vec::new(),
            log: None,
            linked: None,
        }
    }
}

pub(crate) struct ObjectTables<L> {
    next_id: u32,
    stages: HashMap<StageId, StageObject>,
    programs: HashMap<ProgramId, ProgramObject<L>>,
    current: Option<ProgramId>,
    enabled: BTreeSet<u32>,
    errors: ErrorQueue,
}

impl<L> Default for ObjectTables<L> {
    fn default() -> Self {
        Self {
            next_id: 0,
            stages: HashMap::new(),
            programs: HashMap::new(),
            current: None,
            enabled: BTreeSet::new(),
            errors: ErrorQueue::default(),
        }
    }
}

impl<L: LinkedProgram> ObjectTables<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the error queue for callbacks that outlive a borrow.
    pub fn error_queue(&self) -> ErrorQueue {
        Arc::clone(&self.errors)
    }

    pub fn raise(&self, error: BackendError) {
        if let Ok(mut queue) = self.errors.lock() {
            queue.push_back(error);
        }
    }

    pub fn take_error(&self) -> Option<BackendError> {
        self.errors.lock().ok()?.pop_front()
    }

    fn allocate(&mut self) -> Option<NonZeroU32> {
        let Some(next) = self.next_id.checked_add(1) else {
            self.raise(BackendError::OutOfMemory);
            return None;
        };
        self.next_id = next;
        NonZeroU32::new(next)
    }

    pub fn create_stage(&mut self, kind: StageKind) -> Option<StageId> {
        let id = StageId(self.allocate()?);
        self.stages.insert(
            id,
            StageObject {
                kind,
                source: String::new(),
                module: None,
                log: None,
            },
        );
        Some(id)
    }

    pub fn stage_source(&mut self, stage: StageId, source: &str) {
        match self.stages.get_mut(&stage) {
            Some(entry) => entry.source = source.to_string(),
            None => self.raise(BackendError::InvalidValue),
        }
    }

    pub fn compile_stage(&mut self, stage: StageId) {
        let Some(entry) = self.stages.get_mut(&stage) else {
            self.raise(BackendError::InvalidValue);
            return;
        };
        match reflect::parse_stage(entry.kind, &entry.source) {
            Ok(module) => {
                entry.module = Some(module);
                entry.log = None;
            }
            Err(log) => {
                debug!(%stage, kind = %entry.kind, "stage failed to compile");
                entry.module = None;
                entry.log = Some(log);
            }
        }
    }

    pub fn stage_compiled(&self, stage: StageId) -> bool {
        self.stages
            .get(&stage)
            .is_some_and(|entry| entry.module.is_some())
    }

    pub fn stage_log(&self, stage: StageId) -> Option<String> {
        self.stages.get(&stage).and_then(|entry| entry.log.clone())
    }

    pub fn delete_stage(&mut self, stage: StageId) {
        if self.stages.remove(&stage).is_none() {
            self.raise(BackendError::InvalidValue);
        }
    }

    pub fn live_stages(&self) -> usize {
        self.stages.len()
    }

    pub fn create_program(&mut self) -> Option<ProgramId> {
        let id = ProgramId(self.allocate()?);
        self.programs.insert(id, ProgramObject::default());
        Some(id)
    }

    pub fn attach_stage(&mut self, program: ProgramId, stage: StageId) {
        if !self.stages.contains_key(&stage) {
            self.raise(BackendError::InvalidValue);
            return;
        }
        match self.programs.get_mut(&program) {
            Some(entry) if !entry.attached.contains(&stage) => entry.attached.push(stage),
            Some(_) => self.raise(BackendError::InvalidOperation),
            None => self.raise(BackendError::InvalidValue),
        }
    }

    pub fn bind_attribute(&mut self, program: ProgramId, slot: u32, name: &str) {
        match self.programs.get_mut(&program) {
            Some(entry) => {
                entry.bindings.retain(|(bound, _)| *bound != slot);
                entry.bindings.push((slot, name.to_string()));
            }
            None => self.raise(BackendError::InvalidValue),
        }
    }

    pub fn bindings(&self, program: ProgramId) -> Vec<(u32, String)> {
        self.programs
            .get(&program)
            .map(|entry| entry.bindings.clone())
            .unwrap_or_default()
    }

    /// Checks the attached stages and their interface, then lets `finish`
    /// turn the result into the backend's payload. Either outcome replaces
    /// the previous link; relinking the current program unbinds it.
    pub fn link_program<F>(&mut self, program: ProgramId, finish: F)
    where
        F: FnOnce(ProgramInterface, StageSources<'_>) -> Result<L, String>,
    {
        let Some(entry) = self.programs.get(&program) else {
            self.raise(BackendError::InvalidValue);
            return;
        };
        let outcome = self.link_interface(entry).and_then(|(interface, vertex, fragment)| {
            finish(
                interface,
                StageSources {
                    vertex: &vertex,
                    fragment: &fragment,
                },
            )
        });
        if self.current == Some(program) {
            self.current = None;
        }
        let Some(entry) = self.programs.get_mut(&program) else {
            return;
        };
        match outcome {
            Ok(linked) => {
                entry.linked = Some(linked);
                entry.log = None;
            }
            Err(log) => {
                debug!(%program, "program failed to link");
                entry.linked = None;
                entry.log = Some(log);
            }
        }
    }

    fn link_interface(
        &self,
        program: &ProgramObject<L>,
    ) -> Result<(ProgramInterface, String, String), String> {
        let mut vertex = None;
        let mut fragment = None;
        for id in &program.attached {
            let stage = self
                .stages
                .get(id)
                .ok_or_else(|| format!("error: attached {id} no longer exists"))?;
            let module = stage
                .module
                .as_ref()
                .ok_or_else(|| format!("error: attached {} stage is not compiled", stage.kind))?;
            let slot = match stage.kind {
                StageKind::Vertex => &mut vertex,
                StageKind::Fragment => &mut fragment,
            };
            if slot.replace((module, stage.source.clone())).is_some() {
                return Err(format!("error: more than one {} stage attached", stage.kind));
            }
        }
        let (vertex, vertex_source) = vertex.ok_or("error: no vertex stage attached")?;
        let (fragment, fragment_source) = fragment.ok_or("error: no fragment stage attached")?;
        let interface = reflect::link_interface(vertex, fragment, &program.bindings)?;
        Ok((interface, vertex_source, fragment_source))
    }

    pub fn program_linked(&self, program: ProgramId) -> bool {
        self.programs
            .get(&program)
            .is_some_and(|entry| entry.linked.is_some())
    }

    pub fn program_log(&self, program: ProgramId) -> Option<String> {
        self.programs.get(&program).and_then(|entry| entry.log.clone())
    }

    pub fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_none() {
            self.raise(BackendError::InvalidValue);
        }
        if self.current == Some(program) {
            self.current = None;
        }
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn use_program(&mut self, program: ProgramId) {
        if self.program_linked(program) {
            self.current = Some(program);
        } else {
            self.raise(BackendError::InvalidOperation);
        }
    }

    pub fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs
            .get(&program)
            .and_then(|entry| entry.linked.as_ref())
            .and_then(|linked| linked.interface().uniforms.as_ref())
            .and_then(|layout| layout.location(name))
    }

    pub fn set_uniform(&mut self, location: Option<UniformLocation>, value: UniformValue) {
        let Some(location) = location else {
            return;
        };
        let result = self
            .current_mut()
            .and_then(|linked| linked.uniforms_mut())
            .ok_or(BackendError::InvalidOperation)
            .and_then(|block| block.write(location, value));
        if let Err(error) = result {
            self.raise(error);
        }
    }

    pub fn enable_attribute(&mut self, slot: u32) {
        self.enabled.insert(slot);
    }

    /// Validates a draw against the current program and the enabled slots,
    /// raising the matching error when it cannot go ahead.
    pub fn check_draw(&self, positions: &[[f32; 4]], texcoords: &[[f32; 2]]) -> bool {
        if positions.len() != texcoords.len() || positions.len() > QUAD_VERTEX_COUNT {
            self.raise(BackendError::InvalidValue);
            return false;
        }
        let Some(linked) = self
            .current
            .and_then(|id| self.programs.get(&id))
            .and_then(|entry| entry.linked.as_ref())
        else {
            self.raise(BackendError::InvalidOperation);
            return false;
        };
        let fed = linked
            .interface()
            .vertex_inputs
            .iter()
            .all(|input| self.enabled.contains(&input.location));
        if !fed {
            self.raise(BackendError::InvalidOperation);
        }
        fed
    }

    /// Payload of the current program, if it is linked.
    pub fn current_mut(&mut self) -> Option<&mut L> {
        let id = self.current?;
        self.programs
            .get_mut(&id)
            .and_then(|entry| entry.linked.as_mut())
    }
}
