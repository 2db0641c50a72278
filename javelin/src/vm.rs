use std::sync::Arc;

use log::info;

use crate::class::{Class, Method, MethodBody, MethodSig};
use crate::errors::{ERROR_CLASS, ErrorKind, ROOT_CLASS, VmError};
use crate::heap::{CollectionStats, Gc, Heap, HeapCell, HeapCreateInfo, cell_instance_of};
use crate::init;
use crate::interp;
use crate::loader::{ClassDef, ClassProvider, InMemoryProvider};
use crate::native::{NativeFn, NativeRegistry};
use crate::registry::{LoadError, TypeRegistry};
use crate::thread::VmThread;
use crate::value::Value;

/// Default bound on interpreter invocation depth.
pub const MAX_CALL_DEPTH: usize = 1024;

pub struct VmCreateInfo {
    pub provider: Box<dyn ClassProvider>,
    pub heap: HeapCreateInfo,
    pub max_call_depth: usize,
}

impl VmCreateInfo {
    #[must_use]
    pub fn new(provider: Box<dyn ClassProvider>) -> Self {
        Self {
            provider,
            heap: HeapCreateInfo::default(),
            max_call_depth: MAX_CALL_DEPTH,
        }
    }

    /// Shorthand for a VM over a fixed set of pre-built class descriptors.
    #[must_use]
    pub fn with_classes(defs: Vec<ClassDef>) -> Self {
        Self::new(Box::new(InMemoryProvider::new(defs)))
    }

    #[must_use]
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

/// The execution core: type registry, heap, native hooks, and the entry
/// points for invoking interpreted code.
pub struct Vm {
    pub registry: TypeRegistry,
    pub heap: Heap,
    pub natives: NativeRegistry,
    pub max_call_depth: usize,
    root: Arc<Class>,
    error_root: Arc<Class>,
}

impl Vm {
    #[must_use]
    pub fn new(info: VmCreateInfo) -> Arc<Self> {
        let registry = TypeRegistry::bootstrap(info.provider);
        let root = registry.get(ROOT_CLASS).expect("bootstrap registers root");
        let error_root = registry
            .get(ERROR_CLASS)
            .expect("bootstrap registers error root");
        Arc::new(Self {
            registry,
            heap: Heap::new(info.heap),
            natives: NativeRegistry::new(),
            max_call_depth: info.max_call_depth,
            root,
            error_root,
        })
    }

    #[must_use]
    pub fn root_class(&self) -> Arc<Class> {
        Arc::clone(&self.root)
    }

    /// Allocates a built-in error instance and wraps it as an in-flight
    /// error with an empty trace.
    pub fn raise(&self, kind: ErrorKind, message: impl Into<String>) -> VmError {
        let class = self
            .registry
            .get(kind.class_name())
            .expect("built-in error class registered at bootstrap");
        let exception = self.heap.alloc_object(Arc::clone(&class));
        let message = message.into();
        if !message.is_empty() {
            if let HeapCell::Object(obj) = &*exception {
                obj.set_detail(&message);
            }
        }
        VmError {
            kind,
            class,
            exception,
            message,
            trace: Vec::new(),
        }
    }

    /// Puts an already-allocated object back in flight (`Throw`). The value
    /// must be an instance of the error root; anything else is a cast
    /// failure at the throw site.
    pub fn rethrow(&self, exception: Gc) -> VmError {
        if !cell_instance_of(&exception, &self.error_root) {
            return self.raise(
                ErrorKind::CastMismatch,
                format!("thrown {} is not an {ERROR_CLASS}", exception.type_name()),
            );
        }
        let (class, message) = match &*exception {
            HeapCell::Object(obj) => (
                Arc::clone(&obj.class),
                obj.detail().unwrap_or_default().to_string(),
            ),
            HeapCell::Array(_) => unreachable!("arrays are never error instances"),
        };
        VmError {
            kind: ErrorKind::User,
            class,
            exception,
            message,
            trace: Vec::new(),
        }
    }

    pub fn lookup_class(&self, name: &str) -> Result<Arc<Class>, VmError> {
        self.registry.lookup(name).map_err(|err| match err {
            LoadError::NotFound(_) => self.raise(ErrorKind::ClassNotFound, err.message()),
            LoadError::Linkage(_) => self.raise(ErrorKind::Linkage, err.message()),
        })
    }

    /// Forces a class through initialization, as its first active use would.
    pub fn ensure_initialized(self: &Arc<Self>, name: &str) -> Result<(), VmError> {
        let class = self.lookup_class(name)?;
        let mut thread = VmThread::new(Arc::clone(self));
        init::ensure_initialized(&mut thread, &class)
    }

    /// Invokes a method by qualified name on a fresh thread. Instance
    /// methods take the receiver as the first argument value and dispatch
    /// on its runtime class.
    pub fn invoke_entry(
        self: &Arc<Self>,
        class_name: &str,
        method_name: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, VmError> {
        let class = self.lookup_class(class_name)?;
        let (declarer, method) = self.find_entry(&class, method_name, args.len())?;
        let mut thread = VmThread::new(Arc::clone(self));

        if method.is_static {
            init::ensure_initialized(&mut thread, &declarer)?;
            return interp::invoke_method(&mut thread, &declarer, &method, args);
        }

        let Some(Value::Ref(receiver)) = args.first() else {
            return Err(self.raise(
                ErrorKind::NullDereference,
                format!("invocation of {class_name}.{method_name} on null"),
            ));
        };
        let runtime = match &**receiver {
            HeapCell::Object(obj) => Arc::clone(&obj.class),
            HeapCell::Array(_) => self.root_class(),
        };
        let entry = runtime.find_dispatch(&method.sig).ok_or_else(|| {
            self.raise(
                ErrorKind::Linkage,
                format!("{} has no implementation of {}", runtime.name, method.sig),
            )
        })?;
        if matches!(entry.method.body, MethodBody::Abstract) {
            return Err(self.raise(
                ErrorKind::Linkage,
                format!("{} leaves {} abstract", runtime.name, method.sig),
            ));
        }
        let declarer = Arc::clone(&entry.declarer);
        let target = Arc::clone(&entry.method);
        interp::invoke_method(&mut thread, &declarer, &target, args)
    }

    /// Finds the most derived declaration matching the name and argument
    /// count (receiver included for instance methods).
    fn find_entry(
        &self,
        class: &Arc<Class>,
        method_name: &str,
        argc: usize,
    ) -> Result<(Arc<Class>, Arc<Method>), VmError> {
        class
            .super_chain()
            .find_map(|c| {
                let method = c.methods.values().find(|m| {
                    m.sig.name == method_name
                        && m.sig.params.len() + usize::from(!m.is_static) == argc
                })?;
                let method = Arc::clone(method);
                Some((c, method))
            })
            .ok_or_else(|| {
                self.raise(
                    ErrorKind::Linkage,
                    format!(
                        "no method {}.{method_name} taking {argc} argument(s)",
                        class.name
                    ),
                )
            })
    }

    pub fn register_native(&self, owner: &str, sig: &MethodSig, hook: NativeFn) {
        info!("registered native hook {owner}.{sig}");
        self.natives.register(owner, sig, hook);
    }

    /// Identity hash of a heap value, assigned on first request and stable
    /// for the object's lifetime.
    pub fn identity_hash(&self, gc: &Gc) -> i32 {
        self.heap.identity_hash(gc)
    }

    pub fn collect(&self) -> CollectionStats {
        self.heap.collect()
    }
}
