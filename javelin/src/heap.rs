use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::class::Class;
use crate::value::Value;

/// Runtime element type of an array. Tracked for reference arrays so
/// covariant stores can be checked against the actual element class.
#[derive(Debug, Clone)]
pub enum ElemKind {
    Int,
    Long,
    Float,
    Double,
    Ref(Arc<Class>),
}

impl ElemKind {
    #[must_use]
    pub fn zero(&self) -> Value {
        match self {
            ElemKind::Int => Value::Int(0),
            ElemKind::Long => Value::Long(0),
            ElemKind::Float => Value::Float(0.0),
            ElemKind::Double => Value::Double(0.0),
            ElemKind::Ref(_) => Value::Null,
        }
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            ElemKind::Int => "int".to_string(),
            ElemKind::Long => "long".to_string(),
            ElemKind::Float => "float".to_string(),
            ElemKind::Double => "double".to_string(),
            ElemKind::Ref(class) => class.name.clone(),
        }
    }
}

/// Object header + inline field storage. Fields follow the flattened
/// layout of the class and all supertypes.
pub struct ObjectData {
    pub class: Arc<Class>,
    hash: AtomicI32,
    pub fields: RwLock<Vec<Value>>,
    detail: OnceLock<String>,
}

impl ObjectData {
    /// Records the diagnostic message carried by an error object. The first
    /// write sticks; later writes are ignored.
    pub fn set_detail(&self, message: &str) {
        let _ = self.detail.set(message.to_string());
    }

    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.get().map(String::as_str)
    }
}

/// Array header + contiguous element storage. Length and element kind are
/// fixed at creation.
pub struct ArrayData {
    pub elem: ElemKind,
    hash: AtomicI32,
    len: usize,
    pub storage: RwLock<Vec<Value>>,
}

impl ArrayData {
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

pub enum HeapCell {
    Object(ObjectData),
    Array(ArrayData),
}

impl HeapCell {
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            HeapCell::Object(obj) => obj.class.name.clone(),
            HeapCell::Array(arr) => format!("{}[]", arr.elem.describe()),
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectData> {
        match self {
            HeapCell::Object(obj) => Some(obj),
            HeapCell::Array(_) => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayData> {
        match self {
            HeapCell::Array(arr) => Some(arr),
            HeapCell::Object(_) => None,
        }
    }

    fn hash_slot(&self) -> &AtomicI32 {
        match self {
            HeapCell::Object(obj) => &obj.hash,
            HeapCell::Array(arr) => &arr.hash,
        }
    }
}

/// Is the referenced cell an instance of `target`? Arrays are instances of
/// the root class only.
#[must_use]
pub fn cell_instance_of(cell: &HeapCell, target: &Class) -> bool {
    match cell {
        HeapCell::Object(obj) => obj.class.is_assignable_to(target),
        HeapCell::Array(_) => target.super_class.is_none(),
    }
}

/// Managed reference to a heap cell. Cloning is cheap; identity is pointer
/// identity, independent of field contents.
#[derive(Clone)]
pub struct Gc(Arc<HeapCell>);

impl Gc {
    #[must_use]
    pub fn ptr_eq(a: &Gc, b: &Gc) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    #[must_use]
    pub fn address(gc: &Gc) -> usize {
        Arc::as_ptr(&gc.0) as usize
    }
}

impl std::ops::Deref for Gc {
    type Target = HeapCell;

    fn deref(&self) -> &HeapCell {
        &self.0
    }
}

impl fmt::Debug for Gc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:x}", self.type_name(), Gc::address(self))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeapCreateInfo {
    /// Allocated-byte volume that triggers an automatic collection cycle.
    pub collect_threshold: usize,
}

impl Default for HeapCreateInfo {
    fn default() -> Self {
        Self {
            collect_threshold: 8 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CollectionStats {
    pub live: usize,
    pub reclaimed: usize,
    pub cycles: u64,
}

pub type CollectHook = Box<dyn Fn(&CollectionStats) + Send + Sync>;

/// Allocator and identity-hash service. Reclamation policy itself belongs
/// to the collaborating collector; this side tracks live cells, fires the
/// trigger hook, and guarantees assigned hashes survive collection.
pub struct Heap {
    live: Mutex<Vec<Weak<HeapCell>>>,
    bytes_allocated: AtomicUsize,
    collect_threshold: usize,
    cycles: AtomicU64,
    hash_counter: AtomicI32,
    on_collect: RwLock<Option<CollectHook>>,
}

// Rough per-cell header cost used for the collection trigger accounting.
const HEADER_BYTES: usize = 48;
const SLOT_BYTES: usize = std::mem::size_of::<Value>();

impl Heap {
    #[must_use]
    pub fn new(info: HeapCreateInfo) -> Self {
        Self {
            live: Mutex::new(Vec::new()),
            bytes_allocated: AtomicUsize::new(0),
            collect_threshold: info.collect_threshold,
            cycles: AtomicU64::new(0),
            hash_counter: AtomicI32::new(1),
            on_collect: RwLock::new(None),
        }
    }

    pub fn set_collect_hook(&self, hook: CollectHook) {
        *self.on_collect.write() = Some(hook);
    }

    /// Allocates an object with every field zeroed for its type.
    pub fn alloc_object(&self, class: Arc<Class>) -> Gc {
        let fields: Vec<Value> = class.instance_fields.iter().map(|f| f.ty.zero()).collect();
        let size = HEADER_BYTES + fields.len() * SLOT_BYTES;
        let cell = Arc::new(HeapCell::Object(ObjectData {
            class,
            hash: AtomicI32::new(0),
            fields: RwLock::new(fields),
            detail: OnceLock::new(),
        }));
        self.track(&cell, size);
        Gc(cell)
    }

    /// Allocates a zeroed array. A negative requested length is rejected
    /// before any storage is reserved.
    pub fn alloc_array(&self, elem: ElemKind, len: i32) -> Result<Gc, i32> {
        if len < 0 {
            return Err(len);
        }
        let len = len as usize;
        let size = HEADER_BYTES + len * SLOT_BYTES;
        let cell = Arc::new(HeapCell::Array(ArrayData {
            hash: AtomicI32::new(0),
            len,
            storage: RwLock::new(vec![elem.zero(); len]),
            elem,
        }));
        self.track(&cell, size);
        Ok(Gc(cell))
    }

    fn track(&self, cell: &Arc<HeapCell>, size: usize) {
        self.live.lock().push(Arc::downgrade(cell));
        let total = self.bytes_allocated.fetch_add(size, Ordering::Relaxed) + size;
        if total > self.collect_threshold {
            self.collect();
        }
    }

    /// Identity hash of a cell, assigned lazily on first request. The value
    /// lives in the cell header, so a relocating collector carries it along
    /// rather than recomputing it; once observed it never changes.
    pub fn identity_hash(&self, gc: &Gc) -> i32 {
        let slot = gc.hash_slot();
        let current = slot.load(Ordering::Acquire);
        if current != 0 {
            return current;
        }

        let mut fresh = self
            .hash_counter
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_mul(0x9E37_79B9_u32 as i32);
        if fresh == 0 {
            fresh = 1;
        }

        // Exactly one assignment wins under concurrent first requests.
        match slot.compare_exchange(0, fresh, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => fresh,
            Err(existing) => existing,
        }
    }

    /// Runs a collection cycle: sweeps unreachable cells from the live
    /// table (compacting it, which models relocation) and fires the
    /// trigger hook. Assigned identity hashes are untouched.
    pub fn collect(&self) -> CollectionStats {
        let mut live = self.live.lock();
        let before = live.len();
        live.retain(|weak| weak.strong_count() > 0);
        let stats = CollectionStats {
            live: live.len(),
            reclaimed: before - live.len(),
            cycles: self.cycles.fetch_add(1, Ordering::Relaxed) + 1,
        };
        let remaining = HEADER_BYTES * live.len();
        drop(live);

        self.bytes_allocated.store(remaining, Ordering::Relaxed);
        debug!(
            "collection cycle {}: {} live, {} reclaimed",
            stats.cycles, stats.live, stats.reclaimed
        );
        if let Some(hook) = self.on_collect.read().as_ref() {
            hook(&stats);
        }
        stats
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.lock().iter().filter(|w| w.strong_count() > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassKind;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;

    fn root_class() -> Arc<Class> {
        Arc::new(Class::new(
            "Object".to_string(),
            ClassKind::Class,
            None,
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            HashMap::new(),
        ))
    }

    #[test]
    fn object_fields_are_zeroed() {
        use crate::class::FieldInfo;
        use crate::value::Ty;

        let root = root_class();
        let class = Arc::new(Class::new(
            "Pair".to_string(),
            ClassKind::Class,
            Some(root),
            Vec::new(),
            vec![
                FieldInfo {
                    name: "a".to_string(),
                    ty: Ty::Int,
                    is_static: false,
                    slot: 0,
                },
                FieldInfo {
                    name: "b".to_string(),
                    ty: Ty::object("Object"),
                    is_static: false,
                    slot: 1,
                },
            ],
            Vec::new(),
            Vec::new(),
            HashMap::new(),
        ));

        let heap = Heap::new(HeapCreateInfo::default());
        let obj = heap.alloc_object(class);
        let obj = obj.as_object().unwrap();
        let fields = obj.fields.read();
        assert_eq!(fields[0], Value::Int(0));
        assert_eq!(fields[1], Value::Null);
    }

    #[test]
    fn negative_array_length_is_rejected_before_allocation() {
        let heap = Heap::new(HeapCreateInfo::default());
        assert_eq!(heap.alloc_array(ElemKind::Int, -1).unwrap_err(), -1);
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn identity_hash_is_stable_across_collection() {
        let heap = Heap::new(HeapCreateInfo::default());
        let obj = heap.alloc_object(root_class());
        let hash = heap.identity_hash(&obj);
        assert_ne!(hash, 0);

        heap.collect();
        heap.collect();
        assert_eq!(heap.identity_hash(&obj), hash);
    }

    #[test]
    fn identity_hashes_differ_between_objects() {
        let heap = Heap::new(HeapCreateInfo::default());
        let a = heap.alloc_object(root_class());
        let b = heap.alloc_object(root_class());
        assert_ne!(heap.identity_hash(&a), heap.identity_hash(&b));
    }

    #[test]
    fn concurrent_first_hash_requests_agree() {
        let heap = Arc::new(Heap::new(HeapCreateInfo::default()));
        let obj = heap.alloc_object(root_class());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let heap = Arc::clone(&heap);
            let obj = obj.clone();
            handles.push(std::thread::spawn(move || heap.identity_hash(&obj)));
        }
        let hashes: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(hashes.windows(2).all(|w| w[0] == w[1]), "{hashes:?}");
    }

    #[test]
    fn collection_sweeps_dead_cells_and_fires_hook(){
        let heap = Heap::new(HeapCreateInfo::default());
        let fired = Arc::new(AtomicBool::new(false));
        {
            let fired = Arc::clone(&fired);
            heap.set_collect_hook(Box::new(move |_| {
                fired.store(true, Ordering::SeqCst);
            }));
        }

        let keep = heap.alloc_object(root_class());
        {
            let _dead = heap.alloc_object(root_class());
        }

        let stats = heap.collect();
        assert_eq!(stats.live, 1);
        assert_eq!(stats.reclaimed, 1);
        assert!(fired.load(Ordering::SeqCst));
        drop(keep);
    }

    #[test]
    fn arrays_are_instances_of_the_root_only() {
        let heap = Heap::new(HeapCreateInfo::default());
        let root = root_class();
        let sub = Arc::new(Class::new(
            "Sub".to_string(),
            ClassKind::Class,
            Some(Arc::clone(&root)),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            HashMap::new(),
        ));
        let arr = heap.alloc_array(ElemKind::Int, 3).unwrap();
        assert!(cell_instance_of(&arr, &root));
        assert!(!cell_instance_of(&arr, &sub));
    }
}
