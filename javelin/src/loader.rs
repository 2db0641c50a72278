use std::collections::HashMap;

use parking_lot::Mutex;

use crate::bytecode::Instr;
use crate::class::{ClassKind, HandlerRange, INITIALIZER, MethodSig};
use crate::errors::ROOT_CLASS;
use crate::value::{Ty, Value};

/// Unlinked field descriptor. Static fields may carry a constant initial
/// value, applied when the class is prepared (before any initializer runs).
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: Ty,
    pub is_static: bool,
    pub constant: Option<Value>,
}

#[derive(Debug)]
pub enum MethodKind {
    Bytecode {
        max_stack: usize,
        max_locals: usize,
        instrs: Vec<Instr>,
        handlers: Vec<HandlerRange>,
        lines: Vec<(usize, u32)>,
    },
    Native,
    Abstract,
}

/// Unlinked method descriptor, builder-style.
#[derive(Debug)]
pub struct MethodDef {
    pub sig: MethodSig,
    pub is_static: bool,
    pub kind: MethodKind,
}

impl MethodDef {
    #[must_use]
    pub fn new(name: impl Into<String>, params: Vec<Ty>, ret: Option<Ty>) -> Self {
        Self {
            sig: MethodSig::new(name, params, ret),
            is_static: false,
            kind: MethodKind::Bytecode {
                max_stack: 8,
                max_locals: 8,
                instrs: Vec::new(),
                handlers: Vec::new(),
                lines: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn new_static(name: impl Into<String>, params: Vec<Ty>, ret: Option<Ty>) -> Self {
        let mut def = Self::new(name, params, ret);
        def.is_static = true;
        def
    }

    #[must_use]
    pub fn native(name: impl Into<String>, params: Vec<Ty>, ret: Option<Ty>, is_static: bool) -> Self {
        Self {
            sig: MethodSig::new(name, params, ret),
            is_static,
            kind: MethodKind::Native,
        }
    }

    #[must_use]
    pub fn abstract_method(name: impl Into<String>, params: Vec<Ty>, ret: Option<Ty>) -> Self {
        Self {
            sig: MethodSig::new(name, params, ret),
            is_static: false,
            kind: MethodKind::Abstract,
        }
    }

    #[must_use]
    pub fn max_stack(mut self, n: usize) -> Self {
        if let MethodKind::Bytecode { max_stack, .. } = &mut self.kind {
            *max_stack = n;
        }
        self
    }

    #[must_use]
    pub fn max_locals(mut self, n: usize) -> Self {
        if let MethodKind::Bytecode { max_locals, .. } = &mut self.kind {
            *max_locals = n;
        }
        self
    }

    #[must_use]
    pub fn instrs(mut self, code: Vec<Instr>) -> Self {
        if let MethodKind::Bytecode { instrs, .. } = &mut self.kind {
            *instrs = code;
        }
        self
    }

    /// Adds an exception handler covering `start..end` (half-open pc
    /// range), branching to `target`. `catch = None` catches everything.
    #[must_use]
    pub fn handler(
        mut self,
        start: usize,
        end: usize,
        target: usize,
        catch: Option<&str>,
    ) -> Self {
        if let MethodKind::Bytecode { handlers, .. } = &mut self.kind {
            handlers.push(HandlerRange {
                start,
                end,
                target,
                catch: catch.map(str::to_string),
            });
        }
        self
    }

    /// Marks the source line for all pcs from `pc` until the next mark.
    #[must_use]
    pub fn line(mut self, pc: usize, line: u32) -> Self {
        if let MethodKind::Bytecode { lines, .. } = &mut self.kind {
            lines.push((pc, line));
        }
        self
    }
}

/// An unlinked class descriptor, the unit a `ClassProvider` hands to the
/// registry. This is what an external class-file parser would produce.
#[derive(Debug)]
pub struct ClassDef {
    pub name: String,
    pub kind: ClassKind,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
}

/// Fluent construction of `ClassDef`s; the stand-in for a parsed binary
/// class file in the driver and the test suites.
#[derive(Debug)]
pub struct ClassBuilder {
    def: ClassDef,
}

impl ClassBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            def: ClassDef {
                name: name.into(),
                kind: ClassKind::Class,
                super_name: Some(ROOT_CLASS.to_string()),
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn interface(name: impl Into<String>) -> Self {
        let mut builder = Self::new(name);
        builder.def.kind = ClassKind::Interface;
        builder.def.super_name = None;
        builder
    }

    #[must_use]
    pub fn super_class(mut self, name: impl Into<String>) -> Self {
        self.def.super_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn implements(mut self, name: impl Into<String>) -> Self {
        self.def.interfaces.push(name.into());
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, ty: Ty) -> Self {
        self.def.fields.push(FieldDef {
            name: name.into(),
            ty,
            is_static: false,
            constant: None,
        });
        self
    }

    #[must_use]
    pub fn static_field(mut self, name: impl Into<String>, ty: Ty) -> Self {
        self.def.fields.push(FieldDef {
            name: name.into(),
            ty,
            is_static: true,
            constant: None,
        });
        self
    }

    #[must_use]
    pub fn static_field_const(mut self, name: impl Into<String>, ty: Ty, value: Value) -> Self {
        self.def.fields.push(FieldDef {
            name: name.into(),
            ty,
            is_static: true,
            constant: Some(value),
        });
        self
    }

    #[must_use]
    pub fn method(mut self, def: MethodDef) -> Self {
        self.def.methods.push(def);
        self
    }

    /// Installs the class's static initializer body.
    #[must_use]
    pub fn static_initializer(self, def: MethodDef) -> Self {
        let mut def = def;
        def.sig.name = INITIALIZER.to_string();
        def.is_static = true;
        self.method(def)
    }

    #[must_use]
    pub fn build(self) -> ClassDef {
        self.def
    }
}

/// Source of unlinked class descriptors, the boundary to the out-of-scope
/// class-file parsing collaborator.
pub trait ClassProvider: Send + Sync {
    /// Hands over the descriptor for `name`. Each descriptor is consumed
    /// by linking, so a provider yields a given class at most once.
    fn load(&self, name: &str) -> Option<ClassDef>;
}

/// Provider over a fixed set of pre-built descriptors.
pub struct InMemoryProvider {
    defs: Mutex<HashMap<String, ClassDef>>,
}

impl InMemoryProvider {
    #[must_use]
    pub fn new(defs: Vec<ClassDef>) -> Self {
        Self {
            defs: Mutex::new(defs.into_iter().map(|d| (d.name.clone(), d)).collect()),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            defs: Mutex::new(HashMap::new()),
        }
    }

    pub fn add(&self, def: ClassDef) {
        self.defs.lock().insert(def.name.clone(), def);
    }
}

impl ClassProvider for InMemoryProvider {
    fn load(&self, name: &str) -> Option<ClassDef> {
        self.defs.lock().remove(name)
    }
}
