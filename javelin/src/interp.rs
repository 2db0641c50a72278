use std::sync::Arc;

use log::trace;

use crate::bytecode::{ElemTy, Instr};
use crate::class::{Class, ClassKind, Code, Method, MethodBody};
use crate::errors::{ErrorKind, VmError};
use crate::heap::{ElemKind, Gc, HeapCell, cell_instance_of};
use crate::init;
use crate::link::{self, ResolveMode};
use crate::thread::VmThread;
use crate::unwind;
use crate::value::{self, Value};

/// One activation: operand stack, local slots, and the pc of the next
/// instruction. Frames live on the interpreter's Rust call stack.
struct Frame {
    stack: Vec<Value>,
    max_stack: usize,
    locals: Vec<Value>,
    pc: usize,
}

impl Frame {
    fn new(code: &Code, args: Vec<Value>) -> Self {
        let mut locals = args;
        if locals.len() < code.max_locals {
            locals.resize(code.max_locals, Value::Null);
        }
        Self {
            stack: Vec::with_capacity(code.max_stack),
            max_stack: code.max_stack,
            locals,
            pc: 0,
        }
    }

    fn push(&mut self, value: Value) {
        debug_assert!(self.stack.len() < self.max_stack, "operand stack overflow");
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("operand stack underflow")
    }

    fn pop_int(&mut self) -> i32 {
        match self.pop() {
            Value::Int(v) => v,
            other => panic!("expected int, found {}", other.type_name()),
        }
    }

    fn pop_long(&mut self) -> i64 {
        match self.pop() {
            Value::Long(v) => v,
            other => panic!("expected long, found {}", other.type_name()),
        }
    }

    fn pop_float(&mut self) -> f32 {
        match self.pop() {
            Value::Float(v) => v,
            other => panic!("expected float, found {}", other.type_name()),
        }
    }

    fn pop_double(&mut self) -> f64 {
        match self.pop() {
            Value::Double(v) => v,
            other => panic!("expected double, found {}", other.type_name()),
        }
    }

    fn pop_ref(&mut self) -> Option<Gc> {
        match self.pop() {
            Value::Null => None,
            Value::Ref(gc) => Some(gc),
            other => panic!("expected reference, found {}", other.type_name()),
        }
    }

    /// Detaches the top `count` stack values in push order, for use as an
    /// argument vector.
    fn pop_args(&mut self, count: usize) -> Vec<Value> {
        let split = self.stack.len() - count;
        self.stack.split_off(split)
    }
}

enum Flow {
    Next,
    Return(Option<Value>),
}

/// Invokes a method on the current thread and runs it to completion.
///
/// Exceeding the configured call depth raises `StackOverflow` before the
/// callee frame exists. An error the method does not catch propagates to
/// the caller with this method's trace line appended.
pub fn invoke_method(
    thread: &mut VmThread,
    declarer: &Arc<Class>,
    method: &Arc<Method>,
    args: Vec<Value>,
) -> Result<Option<Value>, VmError> {
    if thread.depth >= thread.vm.max_call_depth {
        return Err(thread.vm.raise(
            ErrorKind::StackOverflow,
            format!("call depth limit {} exceeded", thread.vm.max_call_depth),
        ));
    }
    trace!("invoke {}.{}", declarer.name, method.sig);

    thread.depth += 1;
    let result = match &method.body {
        MethodBody::Bytecode(code) => run_bytecode(thread, declarer, method, code, args),
        MethodBody::Native => run_native(thread, declarer, method, args),
        MethodBody::Abstract => Err(thread.vm.raise(
            ErrorKind::Linkage,
            format!(
                "invocation of abstract method {}.{}",
                declarer.name, method.sig
            ),
        )),
    };
    thread.depth -= 1;
    result
}

fn run_native(
    thread: &mut VmThread,
    declarer: &Arc<Class>,
    method: &Arc<Method>,
    args: Vec<Value>,
) -> Result<Option<Value>, VmError> {
    let Some(hook) = thread.vm.natives.find(&declarer.name, &method.sig) else {
        return Err(thread.vm.raise(
            ErrorKind::UnresolvedNativeMethod,
            format!("no native hook for {}.{}", declarer.name, method.sig),
        ));
    };
    hook(thread, args)
}

/// The frame loop. Each error raised while executing an instruction is
/// offered to this frame's handlers at the faulting pc; a catch clears the
/// operand stack, pushes the thrown value, and resumes at the handler.
fn run_bytecode(
    thread: &mut VmThread,
    class: &Arc<Class>,
    method: &Arc<Method>,
    code: &Code,
    args: Vec<Value>,
) -> Result<Option<Value>, VmError> {
    let mut frame = Frame::new(code, args);
    loop {
        let pc = frame.pc;
        match step(thread, code, &mut frame) {
            Ok(Flow::Next) => {}
            Ok(Flow::Return(value)) => return Ok(value),
            Err(mut err) => match unwind::find_handler(&thread.vm, code, pc, &err.exception) {
                Some(target) => {
                    frame.stack.clear();
                    frame.push(Value::Ref(err.exception.clone()));
                    frame.pc = target;
                }
                None => {
                    err.trace.push(unwind::trace_entry(class, method, pc));
                    return Err(err);
                }
            },
        }
    }
}

fn ref_opt_eq(a: &Option<Gc>, b: &Option<Gc>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => Gc::ptr_eq(x, y),
        _ => false,
    }
}

fn receiver_class(thread: &VmThread, gc: &Gc) -> Arc<Class> {
    match &**gc {
        HeapCell::Object(obj) => Arc::clone(&obj.class),
        HeapCell::Array(_) => thread.vm.root_class(),
    }
}

#[allow(clippy::too_many_lines)]
fn step(thread: &mut VmThread, code: &Code, frame: &mut Frame) -> Result<Flow, VmError> {
    let instr = &code.instrs[frame.pc];
    frame.pc += 1;

    match instr {
        Instr::Push(c) => {
            let value = match *c {
                crate::bytecode::Const::Null => Value::Null,
                crate::bytecode::Const::Int(v) => Value::Int(v),
                crate::bytecode::Const::Long(v) => Value::Long(v),
                crate::bytecode::Const::Float(v) => Value::Float(v),
                crate::bytecode::Const::Double(v) => Value::Double(v),
            };
            frame.push(value);
        }

        Instr::Load(i) => {
            let value = frame.locals[*i as usize].clone();
            frame.push(value);
        }
        Instr::Store(i) => {
            let value = frame.pop();
            frame.locals[*i as usize] = value;
        }
        Instr::IInc(i, delta) => match &mut frame.locals[*i as usize] {
            Value::Int(v) => *v = v.wrapping_add(*delta),
            other => panic!("increment of {}", other.type_name()),
        },

        Instr::Pop => {
            frame.pop();
        }
        Instr::Dup => {
            let top = frame.stack.last().expect("operand stack underflow").clone();
            frame.push(top);
        }
        Instr::DupX1 => {
            let v1 = frame.pop();
            let v2 = frame.pop();
            frame.push(v1.clone());
            frame.push(v2);
            frame.push(v1);
        }
        Instr::Swap => {
            let v1 = frame.pop();
            let v2 = frame.pop();
            frame.push(v1);
            frame.push(v2);
        }

        Instr::IAdd => int_binop(frame, i32::wrapping_add),
        Instr::ISub => int_binop(frame, i32::wrapping_sub),
        Instr::IMul => int_binop(frame, i32::wrapping_mul),
        Instr::IDiv => {
            let b = frame.pop_int();
            let a = frame.pop_int();
            if b == 0 {
                return Err(thread.vm.raise(ErrorKind::Arithmetic, "division by zero"));
            }
            frame.push(Value::Int(a.wrapping_div(b)));
        }
        Instr::IRem => {
            let b = frame.pop_int();
            let a = frame.pop_int();
            if b == 0 {
                return Err(thread.vm.raise(ErrorKind::Arithmetic, "remainder by zero"));
            }
            frame.push(Value::Int(a.wrapping_rem(b)));
        }
        Instr::INeg => {
            let a = frame.pop_int();
            frame.push(Value::Int(a.wrapping_neg()));
        }
        // Shift distances use the low five (int) or six (long) bits.
        Instr::IShl => int_binop(frame, |a, b| a << (b & 0x1f)),
        Instr::IShr => int_binop(frame, |a, b| a >> (b & 0x1f)),
        Instr::IUshr => int_binop(frame, |a, b| ((a as u32) >> (b & 0x1f)) as i32),
        Instr::IAnd => int_binop(frame, |a, b| a & b),
        Instr::IOr => int_binop(frame, |a, b| a | b),
        Instr::IXor => int_binop(frame, |a, b| a ^ b),

        Instr::LAdd => long_binop(frame, i64::wrapping_add),
        Instr::LSub => long_binop(frame, i64::wrapping_sub),
        Instr::LMul => long_binop(frame, i64::wrapping_mul),
        Instr::LDiv => {
            let b = frame.pop_long();
            let a = frame.pop_long();
            if b == 0 {
                return Err(thread.vm.raise(ErrorKind::Arithmetic, "division by zero"));
            }
            frame.push(Value::Long(a.wrapping_div(b)));
        }
        Instr::LRem => {
            let b = frame.pop_long();
            let a = frame.pop_long();
            if b == 0 {
                return Err(thread.vm.raise(ErrorKind::Arithmetic, "remainder by zero"));
            }
            frame.push(Value::Long(a.wrapping_rem(b)));
        }
        Instr::LNeg => {
            let a = frame.pop_long();
            frame.push(Value::Long(a.wrapping_neg()));
        }
        Instr::LShl => {
            let b = frame.pop_int();
            let a = frame.pop_long();
            frame.push(Value::Long(a << (b & 0x3f)));
        }
        Instr::LShr => {
            let b = frame.pop_int();
            let a = frame.pop_long();
            frame.push(Value::Long(a >> (b & 0x3f)));
        }
        Instr::LUshr => {
            let b = frame.pop_int();
            let a = frame.pop_long();
            frame.push(Value::Long(((a as u64) >> (b & 0x3f)) as i64));
        }
        Instr::LAnd => long_binop(frame, |a, b| a & b),
        Instr::LOr => long_binop(frame, |a, b| a | b),
        Instr::LXor => long_binop(frame, |a, b| a ^ b),

        Instr::FAdd => float_binop(frame, |a, b| a + b),
        Instr::FSub => float_binop(frame, |a, b| a - b),
        Instr::FMul => float_binop(frame, |a, b| a * b),
        Instr::FDiv => float_binop(frame, |a, b| a / b),
        Instr::FRem => float_binop(frame, |a, b| a % b),
        Instr::FNeg => {
            let a = frame.pop_float();
            frame.push(Value::Float(-a));
        }

        Instr::DAdd => double_binop(frame, |a, b| a + b),
        Instr::DSub => double_binop(frame, |a, b| a - b),
        Instr::DMul => double_binop(frame, |a, b| a * b),
        Instr::DDiv => double_binop(frame, |a, b| a / b),
        Instr::DRem => double_binop(frame, |a, b| a % b),
        Instr::DNeg => {
            let a = frame.pop_double();
            frame.push(Value::Double(-a));
        }

        Instr::I2L => {
            let v = frame.pop_int();
            frame.push(Value::Long(i64::from(v)));
        }
        Instr::I2F => {
            let v = frame.pop_int();
            frame.push(Value::Float(v as f32));
        }
        Instr::I2D => {
            let v = frame.pop_int();
            frame.push(Value::Double(f64::from(v)));
        }
        Instr::L2I => {
            let v = frame.pop_long();
            frame.push(Value::Int(v as i32));
        }
        Instr::L2F => {
            let v = frame.pop_long();
            frame.push(Value::Float(v as f32));
        }
        Instr::L2D => {
            let v = frame.pop_long();
            frame.push(Value::Double(v as f64));
        }
        Instr::F2I => {
            let v = frame.pop_float();
            frame.push(Value::Int(value::f32_to_i32(v)));
        }
        Instr::F2L => {
            let v = frame.pop_float();
            frame.push(Value::Long(value::f32_to_i64(v)));
        }
        Instr::F2D => {
            let v = frame.pop_float();
            frame.push(Value::Double(f64::from(v)));
        }
        Instr::D2I => {
            let v = frame.pop_double();
            frame.push(Value::Int(value::f64_to_i32(v)));
        }
        Instr::D2L => {
            let v = frame.pop_double();
            frame.push(Value::Long(value::f64_to_i64(v)));
        }
        Instr::D2F => {
            let v = frame.pop_double();
            frame.push(Value::Float(v as f32));
        }
        Instr::I2B => {
            let v = frame.pop_int();
            frame.push(Value::Int(i32::from(v as i8)));
        }
        Instr::I2S => {
            let v = frame.pop_int();
            frame.push(Value::Int(i32::from(v as i16)));
        }

        Instr::LCmp => {
            let b = frame.pop_long();
            let a = frame.pop_long();
            frame.push(Value::Int(three_way(a, b)));
        }
        Instr::FCmpL => {
            let b = frame.pop_float();
            let a = frame.pop_float();
            frame.push(Value::Int(float_cmp(f64::from(a), f64::from(b), -1)));
        }
        Instr::FCmpG => {
            let b = frame.pop_float();
            let a = frame.pop_float();
            frame.push(Value::Int(float_cmp(f64::from(a), f64::from(b), 1)));
        }
        Instr::DCmpL => {
            let b = frame.pop_double();
            let a = frame.pop_double();
            frame.push(Value::Int(float_cmp(a, b, -1)));
        }
        Instr::DCmpG => {
            let b = frame.pop_double();
            let a = frame.pop_double();
            frame.push(Value::Int(float_cmp(a, b, 1)));
        }

        Instr::IfEq(t) => branch_if(frame, *t, |v| v == 0),
        Instr::IfNe(t) => branch_if(frame, *t, |v| v != 0),
        Instr::IfLt(t) => branch_if(frame, *t, |v| v < 0),
        Instr::IfGe(t) => branch_if(frame, *t, |v| v >= 0),
        Instr::IfGt(t) => branch_if(frame, *t, |v| v > 0),
        Instr::IfLe(t) => branch_if(frame, *t, |v| v <= 0),

        Instr::IfICmpEq(t) => branch_cmp(frame, *t, |a, b| a == b),
        Instr::IfICmpNe(t) => branch_cmp(frame, *t, |a, b| a != b),
        Instr::IfICmpLt(t) => branch_cmp(frame, *t, |a, b| a < b),
        Instr::IfICmpGe(t) => branch_cmp(frame, *t, |a, b| a >= b),
        Instr::IfICmpGt(t) => branch_cmp(frame, *t, |a, b| a > b),
        Instr::IfICmpLe(t) => branch_cmp(frame, *t, |a, b| a <= b),

        Instr::IfRefEq(t) => {
            let b = frame.pop_ref();
            let a = frame.pop_ref();
            if ref_opt_eq(&a, &b) {
                frame.pc = *t;
            }
        }
        Instr::IfRefNe(t) => {
            let b = frame.pop_ref();
            let a = frame.pop_ref();
            if !ref_opt_eq(&a, &b) {
                frame.pc = *t;
            }
        }
        Instr::IfNull(t) => {
            if frame.pop_ref().is_none() {
                frame.pc = *t;
            }
        }
        Instr::IfNonNull(t) => {
            if frame.pop_ref().is_some() {
                frame.pc = *t;
            }
        }

        Instr::Goto(t) => frame.pc = *t,
        Instr::Switch(table) => {
            let key = frame.pop_int();
            frame.pc = table.target(key);
        }

        Instr::GetStatic(site) => {
            let resolved = link::resolve_field(&thread.vm, site, true)?;
            let declarer = Arc::clone(&resolved.declarer);
            let slot = resolved.slot;
            init::ensure_initialized(thread, &declarer)?;
            let value = declarer.statics.read()[slot].clone();
            frame.push(value);
        }
        Instr::PutStatic(site) => {
            let resolved = link::resolve_field(&thread.vm, site, true)?;
            let declarer = Arc::clone(&resolved.declarer);
            let slot = resolved.slot;
            init::ensure_initialized(thread, &declarer)?;
            let value = frame.pop();
            declarer.statics.write()[slot] = value;
        }
        Instr::GetField(site) => {
            let slot = link::resolve_field(&thread.vm, site, false)?.slot;
            let gc = frame.pop_ref().ok_or_else(|| {
                thread.vm.raise(
                    ErrorKind::NullDereference,
                    format!("read of field {}.{} on null", site.owner, site.name),
                )
            })?;
            let obj = gc.as_object().expect("field access on non-object");
            let value = obj.fields.read()[slot].clone();
            frame.push(value);
        }
        Instr::PutField(site) => {
            let slot = link::resolve_field(&thread.vm, site, false)?.slot;
            let value = frame.pop();
            let gc = frame.pop_ref().ok_or_else(|| {
                thread.vm.raise(
                    ErrorKind::NullDereference,
                    format!("write of field {}.{} on null", site.owner, site.name),
                )
            })?;
            let obj = gc.as_object().expect("field access on non-object");
            obj.fields.write()[slot] = value;
        }

        Instr::InvokeStatic(site) => {
            let resolved = link::resolve_method(&thread.vm, site, ResolveMode::Static)?;
            let declarer = Arc::clone(&resolved.declarer);
            let target = Arc::clone(&resolved.method);
            init::ensure_initialized(thread, &declarer)?;
            let args = frame.pop_args(target.sig.params.len());
            if let Some(value) = invoke_method(thread, &declarer, &target, args)? {
                frame.push(value);
            }
        }
        Instr::InvokeVirtual(site) | Instr::InvokeInterface(site) => {
            link::resolve_method(&thread.vm, site, ResolveMode::Virtual)?;
            let mut args = frame.pop_args(site.sig.params.len());
            let receiver = frame.pop_ref().ok_or_else(|| {
                thread.vm.raise(
                    ErrorKind::NullDereference,
                    format!("invocation of {}.{} on null", site.owner, site.sig),
                )
            })?;
            let runtime = receiver_class(thread, &receiver);
            let entry = runtime.find_dispatch(&site.sig).ok_or_else(|| {
                thread.vm.raise(
                    ErrorKind::Linkage,
                    format!("{} has no implementation of {}", runtime.name, site.sig),
                )
            })?;
            if matches!(entry.method.body, MethodBody::Abstract) {
                return Err(thread.vm.raise(
                    ErrorKind::Linkage,
                    format!("{} leaves {} abstract", runtime.name, site.sig),
                ));
            }
            let declarer = Arc::clone(&entry.declarer);
            let target = Arc::clone(&entry.method);
            args.insert(0, Value::Ref(receiver));
            if let Some(value) = invoke_method(thread, &declarer, &target, args)? {
                frame.push(value);
            }
        }
        Instr::InvokeSpecial(site) => {
            let resolved = link::resolve_method(&thread.vm, site, ResolveMode::Special)?;
            let declarer = Arc::clone(&resolved.declarer);
            let target = Arc::clone(&resolved.method);
            let mut args = frame.pop_args(target.sig.params.len());
            let receiver = frame.pop_ref().ok_or_else(|| {
                thread.vm.raise(
                    ErrorKind::NullDereference,
                    format!("invocation of {}.{} on null", site.owner, site.sig),
                )
            })?;
            args.insert(0, Value::Ref(receiver));
            if let Some(value) = invoke_method(thread, &declarer, &target, args)? {
                frame.push(value);
            }
        }

        Instr::New(site) => {
            let class = Arc::clone(link::resolve_type(&thread.vm, site)?);
            if class.kind == ClassKind::Interface {
                return Err(thread.vm.raise(
                    ErrorKind::Linkage,
                    format!("cannot instantiate interface {}", class.name),
                ));
            }
            init::ensure_initialized(thread, &class)?;
            let obj = thread.vm.heap.alloc_object(class);
            frame.push(Value::Ref(obj));
        }
        Instr::NewArray(elem) => {
            let kind = match elem {
                ElemTy::Int => ElemKind::Int,
                ElemTy::Long => ElemKind::Long,
                ElemTy::Float => ElemKind::Float,
                ElemTy::Double => ElemKind::Double,
                ElemTy::Ref(site) => {
                    ElemKind::Ref(Arc::clone(link::resolve_type(&thread.vm, site)?))
                }
            };
            let len = frame.pop_int();
            let arr = thread.vm.heap.alloc_array(kind, len).map_err(|len| {
                thread
                    .vm
                    .raise(ErrorKind::NegativeSize, format!("array length {len}"))
            })?;
            frame.push(Value::Ref(arr));
        }
        Instr::ArrayLength => {
            let gc = frame.pop_ref().ok_or_else(|| {
                thread
                    .vm
                    .raise(ErrorKind::NullDereference, "length of null array")
            })?;
            let arr = gc.as_array().expect("length of non-array");
            frame.push(Value::Int(arr.len() as i32));
        }
        Instr::ArrayLoad => {
            let index = frame.pop_int();
            let gc = frame.pop_ref().ok_or_else(|| {
                thread
                    .vm
                    .raise(ErrorKind::NullDereference, "load from null array")
            })?;
            let arr = gc.as_array().expect("element load from non-array");
            if index < 0 || index as usize >= arr.len() {
                return Err(thread.vm.raise(
                    ErrorKind::IndexOutOfBounds,
                    format!("index {index} out of bounds for length {}", arr.len()),
                ));
            }
            let value = arr.storage.read()[index as usize].clone();
            frame.push(value);
        }
        Instr::ArrayStore => {
            let value = frame.pop();
            let index = frame.pop_int();
            let gc = frame.pop_ref().ok_or_else(|| {
                thread
                    .vm
                    .raise(ErrorKind::NullDereference, "store into null array")
            })?;
            let arr = gc.as_array().expect("element store into non-array");
            if index < 0 || index as usize >= arr.len() {
                return Err(thread.vm.raise(
                    ErrorKind::IndexOutOfBounds,
                    format!("index {index} out of bounds for length {}", arr.len()),
                ));
            }
            // Covariant stores check against the runtime element class;
            // null stores always pass.
            if let ElemKind::Ref(elem_class) = &arr.elem {
                match &value {
                    Value::Null => {}
                    Value::Ref(stored) => {
                        if !cell_instance_of(stored, elem_class) {
                            return Err(thread.vm.raise(
                                ErrorKind::ArrayStoreTypeMismatch,
                                format!(
                                    "cannot store {} into {}[]",
                                    stored.type_name(),
                                    elem_class.name
                                ),
                            ));
                        }
                    }
                    other => panic!("reference array store of {}", other.type_name()),
                }
            }
            arr.storage.write()[index as usize] = value;
        }

        Instr::CheckCast(site) => {
            let target = Arc::clone(link::resolve_type(&thread.vm, site)?);
            let value = frame.pop();
            match &value {
                Value::Null => {}
                Value::Ref(gc) => {
                    if !cell_instance_of(gc, &target) {
                        return Err(thread.vm.raise(
                            ErrorKind::CastMismatch,
                            format!("{} cannot be cast to {}", gc.type_name(), target.name),
                        ));
                    }
                }
                other => panic!("cast of {}", other.type_name()),
            }
            frame.push(value);
        }
        Instr::InstanceOf(site) => {
            let target = Arc::clone(link::resolve_type(&thread.vm, site)?);
            let result = match frame.pop_ref() {
                Some(gc) => cell_instance_of(&gc, &target),
                None => false,
            };
            frame.push(Value::Int(i32::from(result)));
        }

        Instr::Throw => {
            let gc = frame.pop_ref().ok_or_else(|| {
                thread.vm.raise(ErrorKind::NullDereference, "throw of null")
            })?;
            return Err(thread.vm.rethrow(gc));
        }
        Instr::Return => return Ok(Flow::Return(None)),
        Instr::ReturnValue => {
            let value = frame.pop();
            return Ok(Flow::Return(Some(value)));
        }
    }

    Ok(Flow::Next)
}

fn int_binop(frame: &mut Frame, f: impl FnOnce(i32, i32) -> i32) {
    let b = frame.pop_int();
    let a = frame.pop_int();
    frame.push(Value::Int(f(a, b)));
}

fn long_binop(frame: &mut Frame, f: impl FnOnce(i64, i64) -> i64) {
    let b = frame.pop_long();
    let a = frame.pop_long();
    frame.push(Value::Long(f(a, b)));
}

fn float_binop(frame: &mut Frame, f: impl FnOnce(f32, f32) -> f32) {
    let b = frame.pop_float();
    let a = frame.pop_float();
    frame.push(Value::Float(f(a, b)));
}

fn double_binop(frame: &mut Frame, f: impl FnOnce(f64, f64) -> f64) {
    let b = frame.pop_double();
    let a = frame.pop_double();
    frame.push(Value::Double(f(a, b)));
}

fn three_way<T: Ord>(a: T, b: T) -> i32 {
    match a.cmp(&b) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

/// Three-valued float comparison; `unordered` is the result when either
/// operand is NaN. Signed zeros compare equal.
fn float_cmp(a: f64, b: f64, unordered: i32) -> i32 {
    if a.is_nan() || b.is_nan() {
        unordered
    } else if a < b {
        -1
    } else if a > b {
        1
    } else {
        0
    }
}

fn branch_if(frame: &mut Frame, target: usize, cond: impl FnOnce(i32) -> bool) {
    let v = frame.pop_int();
    if cond(v) {
        frame.pc = target;
    }
}

fn branch_cmp(frame: &mut Frame, target: usize, cond: impl FnOnce(i32, i32) -> bool) {
    let b = frame.pop_int();
    let a = frame.pop_int();
    if cond(a, b) {
        frame.pc = target;
    }
}
