use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::class::MethodSig;
use crate::errors::VmError;
use crate::thread::VmThread;
use crate::value::Value;

/// An externally implemented method body. Receives the argument values
/// (receiver first for instance methods) and returns the result value, if
/// the signature declares one.
pub type NativeFn =
    Arc<dyn Fn(&mut VmThread, Vec<Value>) -> Result<Option<Value>, VmError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HookKey {
    owner: String,
    name: String,
    descriptor: String,
}

/// Named hooks for native methods, keyed by (owner type, name,
/// descriptor). Lookup happens at first invocation, never at load time.
#[derive(Default)]
pub struct NativeRegistry {
    hooks: RwLock<HashMap<HookKey, NativeFn>>,
}

impl NativeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, owner: &str, sig: &MethodSig, hook: NativeFn) {
        let key = HookKey {
            owner: owner.to_string(),
            name: sig.name.clone(),
            descriptor: sig.descriptor(),
        };
        self.hooks.write().insert(key, hook);
    }

    #[must_use]
    pub fn find(&self, owner: &str, sig: &MethodSig) -> Option<NativeFn> {
        let key = HookKey {
            owner: owner.to_string(),
            name: sig.name.clone(),
            descriptor: sig.descriptor(),
        };
        self.hooks.read().get(&key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Ty;

    #[test]
    fn hooks_are_keyed_by_owner_name_and_descriptor() {
        let registry = NativeRegistry::new();
        let sig = MethodSig::new("abs", vec![Ty::Int], Some(Ty::Int));
        registry.register(
            "Math",
            &sig,
            Arc::new(|_, args| match args[0] {
                Value::Int(v) => Ok(Some(Value::Int(v.wrapping_abs()))),
                ref other => panic!("expected int, found {}", other.type_name()),
            }),
        );

        assert!(registry.find("Math", &sig).is_some());
        assert!(registry.find("Other", &sig).is_none());

        let wider = MethodSig::new("abs", vec![Ty::Long], Some(Ty::Long));
        assert!(registry.find("Math", &wider).is_none());
    }
}
