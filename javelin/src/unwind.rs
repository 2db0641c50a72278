use log::{debug, warn};

use crate::class::{Class, Code, Method};
use crate::errors::{TraceEntry, VmError};
use crate::heap::{Gc, cell_instance_of};
use crate::vm::Vm;

/// Finds the handler pc for an error raised at `pc`, or `None` if the
/// frame does not catch it and must be popped.
///
/// Handler ranges are walked in declaration order, innermost first. A
/// range matches when it covers the faulting pc and its catch type is an
/// ancestor of (or equal to) the thrown value's runtime class; a range
/// without a catch type matches everything.
pub fn find_handler(vm: &Vm, code: &Code, pc: usize, thrown: &Gc) -> Option<usize> {
    for handler in &code.handlers {
        if pc < handler.start || pc >= handler.end {
            continue;
        }
        let caught = match &handler.catch {
            None => true,
            Some(catch_name) => match vm.registry.lookup(catch_name) {
                Ok(catch_class) => cell_instance_of(thrown, &catch_class),
                Err(err) => {
                    // A handler naming an unloadable class cannot catch
                    // anything; keep unwinding past it.
                    warn!("cannot resolve catch type {catch_name}: {}", err.message());
                    false
                }
            },
        };
        if caught {
            debug!(
                "caught {} at pc {pc}, resuming at {}",
                thrown.type_name(),
                handler.target
            );
            return Some(handler.target);
        }
    }
    None
}

/// Trace line for the frame being popped: declaring class, method, and the
/// source line of the faulting pc when the method carries a line table.
#[must_use]
pub fn trace_entry(class: &Class, method: &Method, pc: usize) -> TraceEntry {
    TraceEntry {
        class: class.name.clone(),
        method: method.sig.name.clone(),
        line: method.code().and_then(|code| code.line_for(pc)),
    }
}

/// Terminal report for an error that emptied the call stack. The only
/// path that terminates the invoking thread.
#[must_use]
pub fn terminal_report(err: &VmError) -> String {
    format!("unhandled error: {err}")
}
