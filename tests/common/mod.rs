//! Assembling small SPIR-V modules for tests, section by section.

#![allow(dead_code)]

use spvmod::spv::spec::{self, Opcode};
use spvmod::spv::write::ModuleEmitter;
use spvmod::spv::Id;

pub const VERSION_1_0: u32 = 0x0001_0000;

/// Logical layout of a module, each section emitted separately so that
/// instructions can be added in any order.
pub struct ShaderBuilder {
    version: u32,
    next_id: Id,

    /// `OpCapability` and `OpExtInstImport` instructions.
    capabilities: ModuleEmitter,
    debug: ModuleEmitter,
    annotations: ModuleEmitter,
    globals: ModuleEmitter,
    body: ModuleEmitter,

    interface: Vec<Id>,
    float: Option<Id>,
    uint: Option<Id>,
}

fn section() -> ModuleEmitter {
    ModuleEmitter { words: vec![] }
}

impl ShaderBuilder {
    pub fn new() -> Self {
        Self::with_version(VERSION_1_0)
    }

    pub fn with_version(version: u32) -> Self {
        Self {
            version,
            next_id: 1,
            capabilities: section(),
            debug: section(),
            annotations: section(),
            globals: section(),
            body: section(),
            interface: vec![],
            float: None,
            uint: None,
        }
    }

    pub fn id(&mut self) -> Id {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn capability(&mut self, capability: spec::Capability) {
        self.capabilities.push_inst(Opcode::OpCapability, &[capability.0]).unwrap();
    }

    pub fn ext_inst_import(&mut self, name: &str) -> Id {
        let id = self.id();
        self.capabilities.push_inst_with_str(Opcode::OpExtInstImport, &[id], name, &[]).unwrap();
        id
    }

    pub fn name(&mut self, id: Id, name: &str) {
        self.debug.push_inst_with_str(Opcode::OpName, &[id], name, &[]).unwrap();
    }

    pub fn member_name(&mut self, id: Id, member: u32, name: &str) {
        self.debug.push_inst_with_str(Opcode::OpMemberName, &[id, member], name, &[]).unwrap();
    }

    pub fn decorate(&mut self, id: Id, decoration: spec::Decoration, operands: &[u32]) {
        let mut words = vec![id, decoration.0];
        words.extend_from_slice(operands);
        self.annotations.push_inst(Opcode::OpDecorate, &words).unwrap();
    }

    pub fn location(&mut self, id: Id, location: u32) {
        self.decorate(id, spec::Decoration::Location, &[location]);
    }

    /// Adds an instruction to the globals section (types, constants, variables).
    pub fn global(&mut self, opcode: Opcode, operands: &[u32]) {
        self.globals.push_inst(opcode, operands).unwrap();
    }

    /// Adds an instruction to the body of the entry point.
    pub fn inst(&mut self, opcode: Opcode, operands: &[u32]) {
        self.body.push_inst(opcode, operands).unwrap();
    }

    pub fn type_float(&mut self) -> Id {
        if let Some(id) = self.float {
            return id;
        }
        let id = self.id();
        self.global(Opcode::OpTypeFloat, &[id, 32]);
        self.float = Some(id);
        id
    }

    pub fn type_double(&mut self) -> Id {
        let id = self.id();
        self.global(Opcode::OpTypeFloat, &[id, 64]);
        id
    }

    pub fn type_uint(&mut self) -> Id {
        if let Some(id) = self.uint {
            return id;
        }
        let id = self.id();
        self.global(Opcode::OpTypeInt, &[id, 32, 0]);
        self.uint = Some(id);
        id
    }

    pub fn type_int(&mut self) -> Id {
        let id = self.id();
        self.global(Opcode::OpTypeInt, &[id, 32, 1]);
        id
    }

    pub fn type_vector(&mut self, component: Id, count: u32) -> Id {
        let id = self.id();
        self.global(Opcode::OpTypeVector, &[id, component, count]);
        id
    }

    pub fn type_vec(&mut self, count: u32) -> Id {
        let float = self.type_float();
        self.type_vector(float, count)
    }

    pub fn type_matrix(&mut self, column: Id, count: u32) -> Id {
        let id = self.id();
        self.global(Opcode::OpTypeMatrix, &[id, column, count]);
        id
    }

    pub fn type_struct(&mut self, members: &[Id]) -> Id {
        let id = self.id();
        let mut words = vec![id];
        words.extend_from_slice(members);
        self.global(Opcode::OpTypeStruct, &words);
        id
    }

    pub fn type_pointer(&mut self, storage_class: spec::StorageClass, pointee: Id) -> Id {
        let id = self.id();
        self.global(Opcode::OpTypePointer, &[id, storage_class.0, pointee]);
        id
    }

    pub fn constant(&mut self, value: u32) -> Id {
        let uint = self.type_uint();
        let id = self.id();
        self.global(Opcode::OpConstant, &[uint, id, value]);
        id
    }

    pub fn variable(&mut self, pointer_type: Id, storage_class: spec::StorageClass) -> Id {
        let id = self.id();
        self.global(Opcode::OpVariable, &[pointer_type, id, storage_class.0]);
        if matches!(storage_class, spec::StorageClass::Input | spec::StorageClass::Output) {
            self.interface.push(id);
        }
        id
    }

    /// Lists `id` in the entry point interface (in addition to inputs and outputs).
    pub fn interface(&mut self, id: Id) {
        self.interface.push(id);
    }

    /// Declares a named variable of type `ty` (along with its pointer type).
    pub fn named_var(&mut self, name: &str, storage_class: spec::StorageClass, ty: Id) -> Id {
        let pointer_type = self.type_pointer(storage_class, ty);
        let id = self.variable(pointer_type, storage_class);
        self.name(id, name);
        id
    }

    /// Loads from `pointer` (a value of type `ty`) in the entry point body.
    pub fn load(&mut self, ty: Id, pointer: Id) -> Id {
        let id = self.id();
        self.inst(Opcode::OpLoad, &[ty, id, pointer]);
        id
    }

    pub fn access_chain(&mut self, pointer_type: Id, base: Id, indices: &[Id]) -> Id {
        let id = self.id();
        let mut words = vec![pointer_type, id, base];
        words.extend_from_slice(indices);
        self.inst(Opcode::OpAccessChain, &words);
        id
    }

    /// Assembles the module, with a `main` entry point of execution model
    /// `execution_model` wrapping all the instructions added with [`inst`](Self::inst).
    pub fn finish(mut self, execution_model: u32) -> Vec<u32> {
        let void = self.id();
        let fn_type = self.id();
        let main = self.id();
        let label = self.id();
        self.global(Opcode::OpTypeVoid, &[void]);
        self.global(Opcode::OpTypeFunction, &[fn_type, void]);

        let mut e = ModuleEmitter::with_header(ModuleEmitter::header(self.version, self.next_id));
        e.push_inst(Opcode::OpCapability, &[spec::Capability::Shader.0]).unwrap();
        e.words.extend_from_slice(&self.capabilities.words);
        e.push_inst(Opcode::OpMemoryModel, &[0, 1]).unwrap();
        let entry_point = [execution_model, main];
        e.push_inst_with_str(Opcode::OpEntryPoint, &entry_point, "main", &self.interface).unwrap();
        e.words.extend_from_slice(&self.debug.words);
        e.words.extend_from_slice(&self.annotations.words);
        e.words.extend_from_slice(&self.globals.words);
        e.push_inst(Opcode::OpFunction, &[void, main, 0, fn_type]).unwrap();
        e.push_inst(Opcode::OpLabel, &[label]).unwrap();
        e.words.extend_from_slice(&self.body.words);
        e.push_inst(Opcode::OpReturn, &[]).unwrap();
        e.push_inst(Opcode::OpFunctionEnd, &[]).unwrap();
        e.words
    }
}

pub const VERTEX: u32 = 0;
pub const FRAGMENT: u32 = 4;

/// All `(id, location)` pairs of `Location` decorations in `words`.
pub fn location_decorations(words: &[u32]) -> Vec<(Id, u32)> {
    let stream = spvmod::spv::stream::InstStream::from_words(words.to_vec());
    stream
        .iter()
        .filter(|(_, inst)| {
            inst.opcode == Opcode::OpDecorate && inst.operands[1] == spec::Decoration::Location.0
        })
        .map(|(_, inst)| (inst.operands[0], inst.operands[2]))
        .collect()
}
