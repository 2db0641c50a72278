use std::sync::Arc;

use crate::vm::Vm;

/// One logical thread of control. Frames live on the Rust call stack of
/// the interpreter; the thread tracks the invocation depth so runaway
/// recursion raises `StackOverflow` instead of exhausting the host stack.
///
/// All frame state is exclusively owned by the executing thread; the only
/// shared-for-write resources are the registry and per-class init state.
pub struct VmThread {
    pub vm: Arc<Vm>,
    pub depth: usize,
}

impl VmThread {
    #[must_use]
    pub fn new(vm: Arc<Vm>) -> Self {
        Self { vm, depth: 0 }
    }
}
