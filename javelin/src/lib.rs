mod bytecode;
mod class;
mod errors;
mod heap;
mod init;
mod interp;
mod link;
mod loader;
mod native;
mod registry;
mod thread;
mod unwind;
mod value;
mod vm;

pub use bytecode::{CallSite, Const, ElemTy, FieldSite, Instr, SwitchTable, TypeSite};
pub use class::{
    CONSTRUCTOR, Class, ClassKind, Code, DispatchEntry, FieldInfo, HandlerRange, INITIALIZER,
    Method, MethodBody, MethodSig,
};
pub use errors::{ERROR_CLASS, ErrorKind, ROOT_CLASS, TraceEntry, VmError};
pub use heap::{
    CollectHook, CollectionStats, ElemKind, Gc, Heap, HeapCell, HeapCreateInfo, cell_instance_of,
};
pub use init::ensure_initialized;
pub use interp::invoke_method;
pub use link::{ResolveMode, ResolvedField, ResolvedMethod, ResolvedType, resolve_field,
    resolve_method, resolve_type};
pub use loader::{
    ClassBuilder, ClassDef, ClassProvider, FieldDef, InMemoryProvider, MethodDef, MethodKind,
};
pub use native::{NativeFn, NativeRegistry};
pub use registry::{LoadError, TypeRegistry};
pub use thread::VmThread;
pub use unwind::{find_handler, terminal_report, trace_entry};
pub use value::{Ty, Value};
pub use vm::{MAX_CALL_DEPTH, Vm, VmCreateInfo};
