use std::sync::Arc;
use std::sync::atomic::Ordering;

use log::debug;

use crate::class::{Class, InitState};
use crate::errors::{ErrorKind, VmError};
use crate::interp;
use crate::thread::VmThread;

/// Brings `class` to the Initialized state before its first active use
/// (instantiation, static field access, static method invocation).
///
/// The state machine per descriptor:
/// Uninitialized -> InProgress(owner) -> {Initialized, Failed}, never
/// backward. A thread re-entering its own in-progress initialization
/// returns immediately instead of deadlocking; other threads block on the
/// descriptor's condvar until the owner transitions out. A recorded
/// failure replays as `InitializationFailure` forever; the initializer is
/// never run twice.
///
/// The superclass chain initializes recursively first. Superinterfaces do
/// not: an interface initializes only when one of its own declared static
/// members is touched.
pub fn ensure_initialized(thread: &mut VmThread, class: &Arc<Class>) -> Result<(), VmError> {
    if class.init.done.load(Ordering::Acquire) {
        return Ok(());
    }

    let me = std::thread::current().id();
    {
        let mut state = class.init.state.lock();
        loop {
            match &*state {
                InitState::Initialized => return Ok(()),
                InitState::Failed(message) => {
                    let message = message.clone();
                    drop(state);
                    return Err(thread
                        .vm
                        .raise(ErrorKind::InitializationFailure, message));
                }
                InitState::InProgress(owner) if *owner == me => {
                    // Recursive initialization triggered by the running
                    // initializer itself.
                    return Ok(());
                }
                InitState::InProgress(_) => {
                    debug!("waiting for initialization of {}", class.name);
                    class.init.changed.wait(&mut state);
                }
                InitState::Uninitialized => {
                    *state = InitState::InProgress(me);
                    break;
                }
            }
        }
    }

    debug!("initializing {}", class.name);
    let result = run_initializer(thread, class);

    let mut state = class.init.state.lock();
    match &result {
        Ok(()) => {
            *state = InitState::Initialized;
            class.init.done.store(true, Ordering::Release);
            debug!("initialized {}", class.name);
        }
        Err(err) => {
            *state = InitState::Failed(err.message.clone());
            debug!("initialization of {} failed: {err}", class.name);
        }
    }
    class.init.changed.notify_all();
    drop(state);

    result
}

/// Runs the superclass chain and then this class's own initializer body
/// with the descriptor unlocked, so the initializer can freely touch other
/// classes (including, recursively, this one).
fn run_initializer(thread: &mut VmThread, class: &Arc<Class>) -> Result<(), VmError> {
    if let Some(sup) = &class.super_class {
        ensure_initialized(thread, sup)?;
    }

    let Some(init) = class.initializer() else {
        return Ok(());
    };
    let init = Arc::clone(init);

    match interp::invoke_method(thread, class, &init, Vec::new()) {
        Ok(_) => Ok(()),
        Err(cause) if cause.kind == ErrorKind::InitializationFailure => Err(cause),
        Err(cause) => Err(thread.vm.raise(
            ErrorKind::InitializationFailure,
            format!(
                "initializer of {} raised {}",
                class.name,
                if cause.message.is_empty() {
                    cause.class.name.clone()
                } else {
                    format!("{}: {}", cause.class.name, cause.message)
                }
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Const, FieldSite, Instr};
    use crate::loader::{ClassBuilder, MethodDef};
    use crate::value::{Ty, Value};
    use crate::vm::{Vm, VmCreateInfo};

    // Each initializer bumps Journal.order and records its slot, so tests
    // can observe side-effect ordering.
    fn journal_class() -> crate::loader::ClassDef {
        ClassBuilder::new("Journal")
            .static_field("a", Ty::Int)
            .static_field("b", Ty::Int)
            .static_field("next", Ty::Int)
            .build()
    }

    fn recording_initializer(own_field: &str) -> MethodDef {
        // next += 1; <own_field> = next
        MethodDef::new("init", Vec::new(), None)
            .max_stack(4)
            .instrs(vec![
                Instr::GetStatic(FieldSite::new("Journal", "next")),
                Instr::Push(Const::Int(1)),
                Instr::IAdd,
                Instr::PutStatic(FieldSite::new("Journal", "next")),
                Instr::GetStatic(FieldSite::new("Journal", "next")),
                Instr::PutStatic(FieldSite::new("Journal", own_field)),
                Instr::Return,
            ])
    }

    fn journal_value(vm: &Arc<Vm>, field: &str) -> Value {
        let journal = vm.registry.lookup("Journal").unwrap();
        let info = journal.static_field(field).unwrap();
        journal.statics.read()[info.slot].clone()
    }

    #[test]
    fn superclass_initializer_runs_before_subclass() {
        let vm = Vm::new(VmCreateInfo::with_classes(vec![
            journal_class(),
            ClassBuilder::new("A")
                .static_field("x", Ty::Int)
                .static_initializer(recording_initializer("a"))
                .build(),
            ClassBuilder::new("B")
                .super_class("A")
                .static_field("y", Ty::Int)
                .static_initializer(recording_initializer("b"))
                .build(),
        ]));

        // First active use of B alone.
        vm.ensure_initialized("B").unwrap();

        assert_eq!(journal_value(&vm, "a"), Value::Int(1));
        assert_eq!(journal_value(&vm, "b"), Value::Int(2));
    }

    #[test]
    fn interface_initializers_are_not_transitive() {
        let vm = Vm::new(VmCreateInfo::with_classes(vec![
            journal_class(),
            ClassBuilder::interface("I")
                .static_field("base", Ty::Int)
                .static_initializer(recording_initializer("a"))
                .build(),
            ClassBuilder::interface("J")
                .implements("I")
                .static_field("extra", Ty::Int)
                .static_initializer(recording_initializer("b"))
                .build(),
        ]));

        vm.ensure_initialized("J").unwrap();
        // J ran; I did not.
        assert_eq!(journal_value(&vm, "b"), Value::Int(1));
        assert_eq!(journal_value(&vm, "a"), Value::Int(0));

        // Touching I's own member initializes I independently.
        vm.ensure_initialized("I").unwrap();
        assert_eq!(journal_value(&vm, "a"), Value::Int(2));
    }

    #[test]
    fn initialization_happens_once() {
        let vm = Vm::new(VmCreateInfo::with_classes(vec![
            journal_class(),
            ClassBuilder::new("Once")
                .static_field("x", Ty::Int)
                .static_initializer(recording_initializer("a"))
                .build(),
        ]));

        vm.ensure_initialized("Once").unwrap();
        vm.ensure_initialized("Once").unwrap();
        assert_eq!(journal_value(&vm, "next"), Value::Int(1));
    }

    #[test]
    fn failed_initializer_replays_without_rerunning() {
        let vm = Vm::new(VmCreateInfo::with_classes(vec![
            journal_class(),
            ClassBuilder::new("Broken")
                .static_field("x", Ty::Int)
                .static_initializer(
                    MethodDef::new("init", Vec::new(), None)
                        .max_stack(4)
                        .instrs(vec![
                            // Record the attempt, then divide by zero.
                            Instr::GetStatic(FieldSite::new("Journal", "next")),
                            Instr::Push(Const::Int(1)),
                            Instr::IAdd,
                            Instr::PutStatic(FieldSite::new("Journal", "next")),
                            Instr::Push(Const::Int(1)),
                            Instr::Push(Const::Int(0)),
                            Instr::IDiv,
                            Instr::Pop,
                            Instr::Return,
                        ]),
                )
                .build(),
        ]));

        let first = vm.ensure_initialized("Broken").unwrap_err();
        assert_eq!(first.kind, ErrorKind::InitializationFailure);
        assert!(first.message.contains("Broken"));

        let second = vm.ensure_initialized("Broken").unwrap_err();
        assert_eq!(second.kind, ErrorKind::InitializationFailure);
        assert_eq!(second.message, first.message);

        // Only the first attempt ran the initializer.
        assert_eq!(journal_value(&vm, "next"), Value::Int(1));
    }

    #[test]
    fn concurrent_use_blocks_until_the_owner_finishes() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let vm = Vm::new(VmCreateInfo::with_classes(vec![
            journal_class(),
            ClassBuilder::new("Slow")
                .static_field("x", Ty::Int)
                .static_initializer(recording_initializer("a"))
                .build(),
        ]));

        let ran = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let vm = Arc::clone(&vm);
            let ran = Arc::clone(&ran);
            handles.push(std::thread::spawn(move || {
                vm.ensure_initialized("Slow").unwrap();
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ran.load(Ordering::SeqCst), 4);
        // The initializer itself ran exactly once.
        assert_eq!(journal_value(&vm, "next"), Value::Int(1));
    }
}
