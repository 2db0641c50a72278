use std::sync::Arc;

use log::trace;

use crate::bytecode::{CallSite, FieldSite, TypeSite};
use crate::class::{Class, Method};
use crate::errors::{ErrorKind, VmError};
use crate::registry::LoadError;
use crate::vm::Vm;

/// A resolved field reference: the class owning the storage and the slot
/// inside it (instance slots index the flattened object layout, static
/// slots index the declarer's static storage).
#[derive(Debug, Clone)]
pub struct ResolvedField {
    pub declarer: Arc<Class>,
    pub slot: usize,
    pub is_static: bool,
}

/// A resolved method reference. For virtual and interface calls this is
/// the statically resolved base method; the receiver's dispatch table
/// picks the actual override at invocation time.
#[derive(Debug, Clone)]
pub struct ResolvedMethod {
    pub declarer: Arc<Class>,
    pub method: Arc<Method>,
}

pub type ResolvedType = Arc<Class>;

/// How a call site resolves its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Static methods, searched along the declared-owner chain.
    Static,
    /// Instance methods through the owner's dispatch table (virtual and
    /// interface call sites).
    Virtual,
    /// Exact declared instance method (constructors, super calls).
    Special,
}

fn load_failure(vm: &Vm, err: LoadError) -> VmError {
    match err {
        LoadError::NotFound(_) => vm.raise(ErrorKind::ClassNotFound, err.message()),
        LoadError::Linkage(_) => vm.raise(ErrorKind::Linkage, err.message()),
    }
}

/// Resolves a type reference, caching the result at the site. Duplicate
/// work under a concurrent first resolution is fine; the first fill wins
/// and every reader observes it.
pub fn resolve_type<'a>(vm: &Vm, site: &'a TypeSite) -> Result<&'a ResolvedType, VmError> {
    if let Some(resolved) = site.cached() {
        return Ok(resolved);
    }
    let class = vm
        .registry
        .lookup(&site.name)
        .map_err(|err| load_failure(vm, err))?;
    trace!("resolved type ref {}", site.name);
    Ok(site.fill(class))
}

pub fn resolve_field<'a>(
    vm: &Vm,
    site: &'a FieldSite,
    want_static: bool,
) -> Result<&'a ResolvedField, VmError> {
    if let Some(resolved) = site.cached() {
        return Ok(resolved);
    }

    let owner = vm
        .registry
        .lookup(&site.owner)
        .map_err(|err| load_failure(vm, err))?;

    let resolved = if want_static {
        find_static_field(&owner, &site.name).ok_or_else(|| {
            vm.raise(
                ErrorKind::Linkage,
                format!("no static field {}.{}", site.owner, site.name),
            )
        })?
    } else {
        let info = owner.instance_field(&site.name).ok_or_else(|| {
            vm.raise(
                ErrorKind::Linkage,
                format!("no field {}.{}", site.owner, site.name),
            )
        })?;
        if let Some(expect) = &site.expect {
            if *expect != info.ty {
                return Err(field_type_mismatch(vm, site, &info.ty));
            }
        }
        ResolvedField {
            declarer: Arc::clone(&owner),
            slot: info.slot,
            is_static: false,
        }
    };

    if want_static {
        if let Some(expect) = &site.expect {
            let declared = &resolved.declarer.static_fields[resolved.slot].ty;
            if expect != declared {
                return Err(field_type_mismatch(vm, site, declared));
            }
        }
    }

    trace!("resolved field ref {}.{}", site.owner, site.name);
    Ok(site.fill(resolved))
}

fn field_type_mismatch(vm: &Vm, site: &FieldSite, declared: &crate::value::Ty) -> VmError {
    vm.raise(
        ErrorKind::Linkage,
        format!(
            "field {}.{} has type {declared}, reference expects {}",
            site.owner,
            site.name,
            site.expect.as_ref().expect("checked by caller"),
        ),
    )
}

/// Static fields resolve through the owner, its interfaces, then the
/// superclass chain, returning the class that declared the storage.
fn find_static_field(class: &Arc<Class>, name: &str) -> Option<ResolvedField> {
    if let Some(info) = class.static_field(name) {
        return Some(ResolvedField {
            declarer: Arc::clone(class),
            slot: info.slot,
            is_static: true,
        });
    }
    for iface in &class.interfaces {
        if let Some(found) = find_static_field(iface, name) {
            return Some(found);
        }
    }
    class
        .super_class
        .as_ref()
        .and_then(|sup| find_static_field(sup, name))
}

pub fn resolve_method<'a>(
    vm: &Vm,
    site: &'a CallSite,
    mode: ResolveMode,
) -> Result<&'a ResolvedMethod, VmError> {
    if let Some(resolved) = site.cached() {
        return Ok(resolved);
    }

    let owner = vm
        .registry
        .lookup(&site.owner)
        .map_err(|err| load_failure(vm, err))?;

    let resolved = match mode {
        ResolveMode::Static => owner
            .super_chain()
            .find_map(|class| {
                let method = class.declared_method(&site.sig)?;
                method.is_static.then(|| ResolvedMethod {
                    method: Arc::clone(method),
                    declarer: class.clone(),
                })
            })
            .ok_or_else(|| missing_method(vm, site, "static method"))?,
        ResolveMode::Virtual => {
            let entry = owner
                .find_dispatch(&site.sig)
                .ok_or_else(|| missing_method(vm, site, "method"))?;
            ResolvedMethod {
                declarer: Arc::clone(&entry.declarer),
                method: Arc::clone(&entry.method),
            }
        }
        ResolveMode::Special => owner
            .super_chain()
            .find_map(|class| {
                let method = class.declared_method(&site.sig)?;
                (!method.is_static).then(|| ResolvedMethod {
                    method: Arc::clone(method),
                    declarer: class.clone(),
                })
            })
            .ok_or_else(|| missing_method(vm, site, "method"))?,
    };

    trace!("resolved call ref {}.{}", site.owner, site.sig);
    Ok(site.fill(resolved))
}

fn missing_method(vm: &Vm, site: &CallSite, what: &str) -> VmError {
    vm.raise(
        ErrorKind::Linkage,
        format!("no {what} {}.{}", site.owner, site.sig),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Const, Instr};
    use crate::class::MethodSig;
    use crate::loader::{ClassBuilder, MethodDef};
    use crate::value::Ty;
    use crate::vm::{Vm, VmCreateInfo};

    fn test_vm() -> Arc<Vm> {
        Vm::new(VmCreateInfo::with_classes(vec![
            ClassBuilder::new("Holder")
                .static_field("count", Ty::Int)
                .field("value", Ty::Long)
                .method(
                    MethodDef::new_static("get", Vec::new(), Some(Ty::Int))
                        .instrs(vec![Instr::Push(Const::Int(5)), Instr::ReturnValue]),
                )
                .build(),
            ClassBuilder::new("Child").super_class("Holder").build(),
        ]))
    }

    #[test]
    fn field_resolution_is_cached_at_the_site() {
        let vm = test_vm();
        let site = FieldSite::new("Holder", "count");
        assert!(site.cached().is_none());

        let resolved = resolve_field(&vm, &site, true).unwrap().clone();
        assert_eq!(resolved.declarer.name, "Holder");
        assert_eq!(resolved.slot, 0);
        assert!(resolved.is_static);
        assert!(site.cached().is_some());

        // Second resolution is a cache hit yielding the same entry.
        let again = resolve_field(&vm, &site, true).unwrap();
        assert_eq!(again.slot, resolved.slot);
    }

    #[test]
    fn static_field_resolves_through_the_super_chain() {
        let vm = test_vm();
        let site = FieldSite::new("Child", "count");
        let resolved = resolve_field(&vm, &site, true).unwrap();
        assert_eq!(resolved.declarer.name, "Holder");
    }

    #[test]
    fn unknown_owner_is_class_not_found_at_the_site() {
        let vm = test_vm();
        let site = FieldSite::new("Nowhere", "x");
        let err = resolve_field(&vm, &site, true).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ClassNotFound);
        assert!(site.cached().is_none());
    }

    #[test]
    fn missing_member_is_a_linkage_error() {
        let vm = test_vm();
        let site = FieldSite::new("Holder", "ghost");
        let err = resolve_field(&vm, &site, true).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Linkage);

        let call = CallSite::new("Holder", MethodSig::new("ghost", Vec::new(), None));
        let err = resolve_method(&vm, &call, ResolveMode::Static).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Linkage);
    }

    #[test]
    fn declared_type_mismatch_is_a_linkage_error() {
        let vm = test_vm();
        let site = FieldSite::typed("Holder", "count", Ty::Long);
        let err = resolve_field(&vm, &site, true).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Linkage);

        let ok = FieldSite::typed("Holder", "count", Ty::Int);
        assert!(resolve_field(&vm, &ok, true).is_ok());
    }

    #[test]
    fn static_method_resolution_finds_inherited_declarations() {
        let vm = test_vm();
        let site = CallSite::new("Child", MethodSig::new("get", Vec::new(), Some(Ty::Int)));
        let resolved = resolve_method(&vm, &site, ResolveMode::Static).unwrap();
        assert_eq!(resolved.declarer.name, "Holder");
        assert!(resolved.method.is_static);
    }
}
