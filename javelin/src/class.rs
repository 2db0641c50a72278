use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;

use parking_lot::{Condvar, Mutex, RwLock};

use crate::bytecode::Instr;
use crate::value::{Ty, Value};

/// Name of the per-class static initializer method, if the class declares
/// one. Runs at most once, driven by the initialization coordinator.
pub const INITIALIZER: &str = "<clinit>";

/// Conventional name for constructors invoked through `InvokeSpecial`.
pub const CONSTRUCTOR: &str = "<init>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
}

/// Method signature: the dispatch and linking key. Two methods override
/// one another iff their signatures are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<Ty>,
    pub ret: Option<Ty>,
}

impl MethodSig {
    pub fn new(name: impl Into<String>, params: Vec<Ty>, ret: Option<Ty>) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
        }
    }

    /// Descriptor string, used for native-hook keys and diagnostics.
    #[must_use]
    pub fn descriptor(&self) -> String {
        use std::fmt::Write;
        let mut out = String::from("(");
        for p in &self.params {
            let _ = write!(out, "{p}");
        }
        out.push(')');
        match &self.ret {
            Some(ty) => {
                let _ = write!(out, "{ty}");
            }
            None => out.push('V'),
        }
        out
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor())
    }
}

/// One resolved field in a class layout. `slot` indexes either the
/// instance field storage (flattened across the supertype chain) or the
/// declaring class's static storage.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub ty: Ty,
    pub is_static: bool,
    pub slot: usize,
}

/// An exception handler range. `start..end` is the covered pc interval,
/// half-open. `catch` names the caught class; `None` catches everything.
#[derive(Debug, Clone)]
pub struct HandlerRange {
    pub start: usize,
    pub end: usize,
    pub target: usize,
    pub catch: Option<String>,
}

/// Bytecode body of a method.
#[derive(Debug)]
pub struct Code {
    pub max_stack: usize,
    pub max_locals: usize,
    pub instrs: Vec<Instr>,
    pub handlers: Vec<HandlerRange>,
    /// Sorted (pc, source line) pairs; a pc maps to the last entry at or
    /// before it.
    pub lines: Vec<(usize, u32)>,
}

impl Code {
    #[must_use]
    pub fn line_for(&self, pc: usize) -> Option<u32> {
        self.lines
            .iter()
            .take_while(|(start, _)| *start <= pc)
            .last()
            .map(|(_, line)| *line)
    }
}

#[derive(Debug)]
pub enum MethodBody {
    Bytecode(Code),
    /// Implemented by an externally registered hook, looked up at first
    /// invocation.
    Native,
    /// Declared but bodyless (interface methods without a default body).
    Abstract,
}

#[derive(Debug)]
pub struct Method {
    pub sig: MethodSig,
    pub is_static: bool,
    pub body: MethodBody,
}

impl Method {
    #[must_use]
    pub fn code(&self) -> Option<&Code> {
        match &self.body {
            MethodBody::Bytecode(code) => Some(code),
            _ => None,
        }
    }
}

/// Entry in a class's flattened dispatch table: the most specific
/// implementation of a signature, plus the class that declared it (for
/// trace reporting and initialization triggering).
#[derive(Clone)]
pub struct DispatchEntry {
    pub declarer: Arc<Class>,
    pub method: Arc<Method>,
}

/// Per-class initialization state. Moves strictly
/// Uninitialized -> InProgress -> {Initialized, Failed}.
#[derive(Debug, Clone)]
pub enum InitState {
    Uninitialized,
    InProgress(ThreadId),
    Initialized,
    /// Message of the original initializer failure; replayed verbatim on
    /// every later attempt.
    Failed(String),
}

pub struct InitControl {
    pub state: Mutex<InitState>,
    pub changed: Condvar,
    /// Set on the transition to `Initialized`; the lock-free fast path for
    /// the overwhelmingly common already-initialized case.
    pub done: AtomicBool,
}

impl Default for InitControl {
    fn default() -> Self {
        Self {
            state: Mutex::new(InitState::Uninitialized),
            changed: Condvar::new(),
            done: AtomicBool::new(false),
        }
    }
}

/// A linked type descriptor. Immutable after linking except for static
/// field storage and the initialization state.
pub struct Class {
    pub name: String,
    pub kind: ClassKind,
    pub super_class: Option<Arc<Class>>,
    pub interfaces: Vec<Arc<Class>>,
    /// Flattened instance layout: supertype fields first, slot = index.
    pub instance_fields: Vec<FieldInfo>,
    /// Declared static fields; slots index `statics`.
    pub static_fields: Vec<FieldInfo>,
    pub statics: RwLock<Vec<Value>>,
    /// Declared methods only.
    pub methods: HashMap<MethodSig, Arc<Method>>,
    /// Flattened dispatch table; set once right after registration.
    dispatch: OnceLock<HashMap<MethodSig, DispatchEntry>>,
    pub init: InitControl,
}

impl Class {
    pub fn new(
        name: String,
        kind: ClassKind,
        super_class: Option<Arc<Class>>,
        interfaces: Vec<Arc<Class>>,
        instance_fields: Vec<FieldInfo>,
        static_fields: Vec<FieldInfo>,
        statics: Vec<Value>,
        methods: HashMap<MethodSig, Arc<Method>>,
    ) -> Self {
        Self {
            name,
            kind,
            super_class,
            interfaces,
            instance_fields,
            static_fields,
            statics: RwLock::new(statics),
            methods,
            dispatch: OnceLock::new(),
            init: InitControl::default(),
        }
    }

    /// Installs the flattened dispatch table. Called exactly once by the
    /// registry while linking.
    pub(crate) fn set_dispatch(&self, table: HashMap<MethodSig, DispatchEntry>) {
        if self.dispatch.set(table).is_err() {
            panic!("dispatch table for {} set twice", self.name);
        }
    }

    #[must_use]
    pub fn dispatch(&self) -> &HashMap<MethodSig, DispatchEntry> {
        self.dispatch.get().expect("class not linked")
    }

    #[must_use]
    pub fn find_dispatch(&self, sig: &MethodSig) -> Option<&DispatchEntry> {
        self.dispatch().get(sig)
    }

    #[must_use]
    pub fn declared_method(&self, sig: &MethodSig) -> Option<&Arc<Method>> {
        self.methods.get(sig)
    }

    #[must_use]
    pub fn initializer(&self) -> Option<&Arc<Method>> {
        let sig = MethodSig::new(INITIALIZER, Vec::new(), None);
        self.methods.get(&sig)
    }

    #[must_use]
    pub fn instance_field(&self, name: &str) -> Option<&FieldInfo> {
        // Shadowing: the most derived declaration wins, and flattening
        // appends subtype fields after supertype fields.
        self.instance_fields.iter().rev().find(|f| f.name == name)
    }

    #[must_use]
    pub fn static_field(&self, name: &str) -> Option<&FieldInfo> {
        self.static_fields.iter().find(|f| f.name == name)
    }

    /// Walks this class and its supertypes, most derived first.
    pub fn super_chain(self: &Arc<Self>) -> impl Iterator<Item = Arc<Class>> {
        let mut next = Some(Arc::clone(self));
        std::iter::from_fn(move || {
            let current = next.take()?;
            next = current.super_class.clone();
            Some(current)
        })
    }

    /// Subtype test covering the superclass chain and all transitively
    /// implemented interfaces.
    #[must_use]
    pub fn is_assignable_to(&self, target: &Class) -> bool {
        if self.name == target.name {
            return true;
        }
        if self
            .interfaces
            .iter()
            .any(|iface| iface.is_assignable_to(target))
        {
            return true;
        }
        match &self.super_class {
            Some(sup) => sup.is_assignable_to(target),
            None => false,
        }
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_class(name: &str, super_class: Option<Arc<Class>>) -> Arc<Class> {
        Arc::new(Class::new(
            name.to_string(),
            ClassKind::Class,
            super_class,
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            HashMap::new(),
        ))
    }

    #[test]
    fn signature_descriptor_format() {
        let sig = MethodSig::new(
            "blend",
            vec![Ty::Int, Ty::Long, Ty::object("Point")],
            Some(Ty::Double),
        );
        assert_eq!(sig.descriptor(), "(IJLPoint;)D");
        assert_eq!(sig.to_string(), "blend(IJLPoint;)D");

        let void = MethodSig::new("run", Vec::new(), None);
        assert_eq!(void.descriptor(), "()V");
    }

    #[test]
    fn assignability_walks_super_chain() {
        let root = bare_class("Object", None);
        let mid = bare_class("A", Some(Arc::clone(&root)));
        let leaf = bare_class("B", Some(Arc::clone(&mid)));

        assert!(leaf.is_assignable_to(&mid));
        assert!(leaf.is_assignable_to(&root));
        assert!(!root.is_assignable_to(&leaf));
        assert!(mid.is_assignable_to(&mid));
    }

    #[test]
    fn assignability_covers_transitive_interfaces() {
        let root = bare_class("Object", None);
        let narrow = Arc::new(Class::new(
            "Narrow".to_string(),
            ClassKind::Interface,
            None,
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            HashMap::new(),
        ));
        let wide = Arc::new(Class::new(
            "Wide".to_string(),
            ClassKind::Interface,
            None,
            vec![Arc::clone(&narrow)],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            HashMap::new(),
        ));
        let impl_class = Arc::new(Class::new(
            "Impl".to_string(),
            ClassKind::Class,
            Some(Arc::clone(&root)),
            vec![Arc::clone(&wide)],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            HashMap::new(),
        ));

        assert!(impl_class.is_assignable_to(&wide));
        assert!(impl_class.is_assignable_to(&narrow));
        assert!(!wide.is_assignable_to(&impl_class));
    }

    #[test]
    fn line_table_lookup_is_last_at_or_before() {
        let code = Code {
            max_stack: 0,
            max_locals: 0,
            instrs: Vec::new(),
            handlers: Vec::new(),
            lines: vec![(0, 10), (3, 11), (7, 14)],
        };
        assert_eq!(code.line_for(0), Some(10));
        assert_eq!(code.line_for(2), Some(10));
        assert_eq!(code.line_for(3), Some(11));
        assert_eq!(code.line_for(100), Some(14));

        let empty = Code {
            max_stack: 0,
            max_locals: 0,
            instrs: Vec::new(),
            handlers: Vec::new(),
            lines: Vec::new(),
        };
        assert_eq!(empty.line_for(0), None);
    }
}
