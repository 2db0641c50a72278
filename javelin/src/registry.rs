use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;
use parking_lot::{Condvar, Mutex, RwLock};

use crate::class::{
    Class, ClassKind, DispatchEntry, FieldInfo, INITIALIZER, Method, MethodBody, MethodSig,
};
use crate::errors::{ERROR_CLASS, ErrorKind, ROOT_CLASS};
use crate::loader::{ClassDef, ClassProvider, MethodKind};

/// Failure modes of class loading and linking, converted into thrown
/// `ClassNotFound` / `LinkageError` values at the resolving instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    NotFound(String),
    Linkage(String),
}

impl LoadError {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            LoadError::NotFound(name) => format!("class {name} not found"),
            LoadError::Linkage(msg) => msg.clone(),
        }
    }
}

/// Holds every linked type descriptor, keyed by fully qualified name.
/// Classes are immortal once registered; the registry map and each class's
/// init state are the only shared-for-write resources in the core.
pub struct TypeRegistry {
    classes: RwLock<HashMap<String, Arc<Class>>>,
    provider: Box<dyn ClassProvider>,
    /// Names claimed by an in-flight load+link. The provider yields each
    /// descriptor at most once, so a concurrent second lookup must wait for
    /// the claimant's publication instead of re-querying the provider.
    loading: Mutex<HashSet<String>>,
    loading_changed: Condvar,
}

impl TypeRegistry {
    /// Creates a registry seeded with the built-in hierarchy: the root
    /// class, the error root, and one class per built-in error kind.
    #[must_use]
    pub fn bootstrap(provider: Box<dyn ClassProvider>) -> Self {
        let registry = Self {
            classes: RwLock::new(HashMap::new()),
            provider,
            loading: Mutex::new(HashSet::new()),
            loading_changed: Condvar::new(),
        };

        let root = registry.register_builtin(ROOT_CLASS, None);
        let error = registry.register_builtin(ERROR_CLASS, Some(Arc::clone(&root)));
        for kind in ErrorKind::BUILTIN {
            registry.register_builtin(kind.class_name(), Some(Arc::clone(&error)));
        }
        registry
    }

    fn register_builtin(&self, name: &str, super_class: Option<Arc<Class>>) -> Arc<Class> {
        let dispatch = super_class
            .as_ref()
            .map(|sup| sup.dispatch().clone())
            .unwrap_or_default();
        let class = Arc::new(Class::new(
            name.to_string(),
            ClassKind::Class,
            super_class,
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            HashMap::new(),
        ));
        class.set_dispatch(dispatch);
        self.classes
            .write()
            .insert(name.to_string(), Arc::clone(&class));
        class
    }

    /// Looks up a linked class, loading and linking it (and its supertype
    /// closure) on a miss.
    pub fn lookup(&self, name: &str) -> Result<Arc<Class>, LoadError> {
        let mut chain = Vec::new();
        self.lookup_inner(name, &mut chain)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Class>> {
        self.classes.read().get(name).cloned()
    }

    fn lookup_inner(&self, name: &str, chain: &mut Vec<String>) -> Result<Arc<Class>, LoadError> {
        if let Some(class) = self.classes.read().get(name) {
            return Ok(Arc::clone(class));
        }
        if chain.iter().any(|n| n == name) {
            return Err(LoadError::Linkage(format!(
                "circular supertype chain involving {name}"
            )));
        }

        // Claim the name, or wait for the claimant's publication. The wait
        // re-checks the map on every wake; a failed claimant removes its
        // claim without publishing and the next waiter retries the provider.
        {
            let mut loading = self.loading.lock();
            loop {
                if let Some(class) = self.classes.read().get(name) {
                    return Ok(Arc::clone(class));
                }
                if loading.insert(name.to_string()) {
                    break;
                }
                debug!("waiting for concurrent load of {name}");
                self.loading_changed.wait(&mut loading);
            }
        }

        let result = match self.provider.load(name) {
            None => Err(LoadError::NotFound(name.to_string())),
            Some(def) => {
                chain.push(name.to_string());
                let linked = self.link(def, chain);
                chain.pop();
                linked
            }
        };

        let mut loading = self.loading.lock();
        loading.remove(name);
        self.loading_changed.notify_all();
        drop(loading);
        result
    }

    /// Links an unlinked descriptor: resolves the supertype closure,
    /// flattens field layout and the dispatch table, prepares statics.
    fn link(&self, def: ClassDef, chain: &mut Vec<String>) -> Result<Arc<Class>, LoadError> {
        let super_class = match &def.super_name {
            Some(name) => Some(self.lookup_inner(name, chain)?),
            None => None,
        };
        if let Some(sup) = &super_class {
            if sup.kind == ClassKind::Interface {
                return Err(LoadError::Linkage(format!(
                    "{} extends interface {}",
                    def.name, sup.name
                )));
            }
        }
        if def.kind == ClassKind::Class && super_class.is_none() {
            return Err(LoadError::Linkage(format!("{} has no superclass", def.name)));
        }

        let mut interfaces = Vec::new();
        for iface_name in &def.interfaces {
            let iface = self.lookup_inner(iface_name, chain)?;
            if iface.kind != ClassKind::Interface {
                return Err(LoadError::Linkage(format!(
                    "{} implements non-interface {}",
                    def.name, iface.name
                )));
            }
            interfaces.push(iface);
        }

        // Flatten instance layout: supertype fields first, declared fields
        // appended. Preparation gives statics their constant or zero value.
        let mut instance_fields: Vec<FieldInfo> = super_class
            .as_ref()
            .map(|sup| sup.instance_fields.clone())
            .unwrap_or_default();
        let mut static_fields = Vec::new();
        let mut statics = Vec::new();
        for field in &def.fields {
            if field.is_static {
                let slot = static_fields.len();
                static_fields.push(FieldInfo {
                    name: field.name.clone(),
                    ty: field.ty.clone(),
                    is_static: true,
                    slot,
                });
                statics.push(
                    field
                        .constant
                        .clone()
                        .unwrap_or_else(|| field.ty.zero()),
                );
            } else {
                let slot = instance_fields.len();
                instance_fields.push(FieldInfo {
                    name: field.name.clone(),
                    ty: field.ty.clone(),
                    is_static: false,
                    slot,
                });
            }
        }

        let mut methods = HashMap::new();
        for mdef in def.methods {
            let body = match mdef.kind {
                MethodKind::Bytecode {
                    max_stack,
                    max_locals,
                    instrs,
                    handlers,
                    lines,
                } => MethodBody::Bytecode(crate::class::Code {
                    max_stack,
                    max_locals,
                    instrs,
                    handlers,
                    lines,
                }),
                MethodKind::Native => MethodBody::Native,
                MethodKind::Abstract => MethodBody::Abstract,
            };
            let method = Arc::new(Method {
                sig: mdef.sig.clone(),
                is_static: mdef.is_static,
                body,
            });
            if methods.insert(mdef.sig.clone(), method).is_some() {
                return Err(LoadError::Linkage(format!(
                    "{} declares {} twice",
                    def.name, mdef.sig
                )));
            }
        }

        let class = Arc::new(Class::new(
            def.name,
            def.kind,
            super_class,
            interfaces,
            instance_fields,
            static_fields,
            statics,
            methods,
        ));
        class.set_dispatch(build_dispatch(&class));

        // First publication wins if two threads linked concurrently.
        let mut map = self.classes.write();
        let entry = map
            .entry(class.name.clone())
            .or_insert_with(|| Arc::clone(&class));
        let published = Arc::clone(entry);
        drop(map);

        debug!("linked class {}", published.name);
        Ok(published)
    }
}

/// Flattens the dispatch table for a freshly linked class: inherited
/// entries, overridden by declared instance methods, supplemented by
/// interface default bodies where no class implementation exists.
fn build_dispatch(class: &Arc<Class>) -> HashMap<MethodSig, DispatchEntry> {
    let mut table = class
        .super_class
        .as_ref()
        .map(|sup| sup.dispatch().clone())
        .unwrap_or_default();

    for (sig, method) in &class.methods {
        if method.is_static || sig.name == INITIALIZER {
            continue;
        }
        table.insert(
            sig.clone(),
            DispatchEntry {
                declarer: Arc::clone(class),
                method: Arc::clone(method),
            },
        );
    }

    // Interface defaults fill gaps in declaration order; a concrete body
    // replaces an abstract placeholder but never a class-provided one.
    for iface in &class.interfaces {
        for (sig, entry) in iface.dispatch() {
            let replace = match table.get(sig) {
                None => true,
                Some(existing) => {
                    matches!(existing.method.body, MethodBody::Abstract)
                        && !matches!(entry.method.body, MethodBody::Abstract)
                }
            };
            if replace {
                table.insert(sig.clone(), entry.clone());
            }
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Const, Instr};
    use crate::loader::{ClassBuilder, InMemoryProvider, MethodDef};
    use crate::value::{Ty, Value};

    fn registry_with(defs: Vec<ClassDef>) -> TypeRegistry {
        TypeRegistry::bootstrap(Box::new(InMemoryProvider::new(defs)))
    }

    #[test]
    fn bootstrap_registers_builtin_hierarchy() {
        let registry = registry_with(Vec::new());
        let root = registry.lookup(ROOT_CLASS).unwrap();
        let error = registry.lookup(ERROR_CLASS).unwrap();
        let arith = registry.lookup("ArithmeticError").unwrap();

        assert!(error.is_assignable_to(&root));
        assert!(arith.is_assignable_to(&error));
        assert!(!root.is_assignable_to(&error));
    }

    #[test]
    fn missing_class_reports_not_found() {
        let registry = registry_with(Vec::new());
        assert!(matches!(
            registry.lookup("Ghost"),
            Err(LoadError::NotFound(name)) if name == "Ghost"
        ));
    }

    #[test]
    fn instance_layout_flattens_super_fields_first() {
        let registry = registry_with(vec![
            ClassBuilder::new("Base").field("a", Ty::Int).build(),
            ClassBuilder::new("Derived")
                .super_class("Base")
                .field("b", Ty::Long)
                .build(),
        ]);

        let derived = registry.lookup("Derived").unwrap();
        let names: Vec<&str> = derived
            .instance_fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(derived.instance_field("b").unwrap().slot, 1);
    }

    #[test]
    fn static_constants_are_applied_at_preparation() {
        let registry = registry_with(vec![
            ClassBuilder::new("Config")
                .static_field_const("limit", Ty::Int, Value::Int(42))
                .static_field("mode", Ty::Long)
                .build(),
        ]);

        let config = registry.lookup("Config").unwrap();
        let statics = config.statics.read();
        assert_eq!(statics[0], Value::Int(42));
        assert_eq!(statics[1], Value::Long(0));
    }

    #[test]
    fn declared_method_overrides_inherited_entry() {
        let base_speak = MethodDef::new("speak", Vec::new(), Some(Ty::Int))
            .instrs(vec![Instr::Push(Const::Int(1)), Instr::ReturnValue]);
        let derived_speak = MethodDef::new("speak", Vec::new(), Some(Ty::Int))
            .instrs(vec![Instr::Push(Const::Int(2)), Instr::ReturnValue]);

        let registry = registry_with(vec![
            ClassBuilder::new("Base").method(base_speak).build(),
            ClassBuilder::new("Derived")
                .super_class("Base")
                .method(derived_speak)
                .build(),
        ]);

        let derived = registry.lookup("Derived").unwrap();
        let sig = MethodSig::new("speak", Vec::new(), Some(Ty::Int));
        let entry = derived.find_dispatch(&sig).unwrap();
        assert_eq!(entry.declarer.name, "Derived");

        let base = registry.lookup("Base").unwrap();
        let entry = base.find_dispatch(&sig).unwrap();
        assert_eq!(entry.declarer.name, "Base");
    }

    #[test]
    fn interface_default_fills_gap_but_never_replaces_class_body() {
        let default_size = MethodDef::new("size", Vec::new(), Some(Ty::Int))
            .instrs(vec![Instr::Push(Const::Int(7)), Instr::ReturnValue]);
        let own_size = MethodDef::new("size", Vec::new(), Some(Ty::Int))
            .instrs(vec![Instr::Push(Const::Int(3)), Instr::ReturnValue]);

        let registry = registry_with(vec![
            ClassBuilder::interface("Sized").method(default_size).build(),
            ClassBuilder::new("UsesDefault").implements("Sized").build(),
            ClassBuilder::new("Overrides")
                .implements("Sized")
                .method(own_size)
                .build(),
        ]);

        let sig = MethodSig::new("size", Vec::new(), Some(Ty::Int));
        let uses_default = registry.lookup("UsesDefault").unwrap();
        assert_eq!(
            uses_default.find_dispatch(&sig).unwrap().declarer.name,
            "Sized"
        );
        let overrides = registry.lookup("Overrides").unwrap();
        assert_eq!(
            overrides.find_dispatch(&sig).unwrap().declarer.name,
            "Overrides"
        );
    }

    #[test]
    fn concurrent_lookups_share_one_provider_load() {
        use crate::loader::{ClassDef, ClassProvider};
        use std::thread;
        use std::time::Duration;

        struct SlowProvider(InMemoryProvider);

        impl ClassProvider for SlowProvider {
            fn load(&self, name: &str) -> Option<ClassDef> {
                thread::sleep(Duration::from_millis(100));
                self.0.load(name)
            }
        }

        let provider = SlowProvider(InMemoryProvider::new(vec![
            ClassBuilder::new("Late").field("x", Ty::Int).build(),
        ]));
        let registry = Arc::new(TypeRegistry::bootstrap(Box::new(provider)));

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.lookup("Late"))
            })
            .collect();

        for worker in workers {
            let class = worker.join().unwrap().unwrap();
            assert_eq!(class.name, "Late");
        }
    }

    #[test]
    fn circular_supertypes_are_a_linkage_error() {
        let registry = registry_with(vec![
            ClassBuilder::new("A").super_class("B").build(),
            ClassBuilder::new("B").super_class("A").build(),
        ]);
        match registry.lookup("A") {
            Err(LoadError::Linkage(msg)) => assert!(msg.contains("circular")),
            other => panic!("expected linkage error, got {other:?}"),
        }
    }
}
