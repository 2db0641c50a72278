use std::sync::OnceLock;

use crate::class::MethodSig;
use crate::link::{ResolvedField, ResolvedMethod, ResolvedType};
use crate::value::Ty;

/// Literal operand pushed by `Instr::Push`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Const {
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

/// Symbolic field reference attached to a field-access instruction.
///
/// Resolution happens on first execution of the instruction and the result
/// is cached here; concurrent first resolutions may race but observe one
/// consistent cached value.
#[derive(Debug)]
pub struct FieldSite {
    pub owner: String,
    pub name: String,
    /// Expected field type; checked against the resolved declaration when
    /// present, yielding a `LinkageError` on mismatch.
    pub expect: Option<Ty>,
    cache: OnceLock<ResolvedField>,
}

impl FieldSite {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            expect: None,
            cache: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn typed(owner: impl Into<String>, name: impl Into<String>, ty: Ty) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            expect: Some(ty),
            cache: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn cached(&self) -> Option<&ResolvedField> {
        self.cache.get()
    }

    pub fn fill(&self, resolved: ResolvedField) -> &ResolvedField {
        self.cache.get_or_init(|| resolved)
    }
}

/// Symbolic method reference attached to an invocation instruction.
#[derive(Debug)]
pub struct CallSite {
    pub owner: String,
    pub sig: MethodSig,
    cache: OnceLock<ResolvedMethod>,
}

impl CallSite {
    pub fn new(owner: impl Into<String>, sig: MethodSig) -> Self {
        Self {
            owner: owner.into(),
            sig,
            cache: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn cached(&self) -> Option<&ResolvedMethod> {
        self.cache.get()
    }

    pub fn fill(&self, resolved: ResolvedMethod) -> &ResolvedMethod {
        self.cache.get_or_init(|| resolved)
    }
}

/// Symbolic type reference (`New`, `CheckCast`, `InstanceOf`, reference
/// array allocation, handler catch types).
#[derive(Debug)]
pub struct TypeSite {
    pub name: String,
    cache: OnceLock<ResolvedType>,
}

impl TypeSite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cache: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn cached(&self) -> Option<&ResolvedType> {
        self.cache.get()
    }

    pub fn fill(&self, resolved: ResolvedType) -> &ResolvedType {
        self.cache.get_or_init(|| resolved)
    }
}

/// Element type operand of `NewArray`.
#[derive(Debug)]
pub enum ElemTy {
    Int,
    Long,
    Float,
    Double,
    Ref(TypeSite),
}

/// Multi-way branch table. The compiler picks the representation: `Table`
/// for dense label sets (direct-indexed), `Lookup` for sparse ones
/// (binary search over sorted keys). Routing is identical either way.
#[derive(Debug)]
pub enum SwitchTable {
    Table {
        low: i32,
        targets: Vec<usize>,
        default: usize,
    },
    Lookup {
        /// Sorted by key.
        pairs: Vec<(i32, usize)>,
        default: usize,
    },
}

impl SwitchTable {
    /// Builds a lookup table, sorting the pairs by key.
    #[must_use]
    pub fn lookup(mut pairs: Vec<(i32, usize)>, default: usize) -> Self {
        pairs.sort_by_key(|(key, _)| *key);
        SwitchTable::Lookup { pairs, default }
    }

    #[must_use]
    pub fn table(low: i32, targets: Vec<usize>, default: usize) -> Self {
        SwitchTable::Table {
            low,
            targets,
            default,
        }
    }

    /// Branch target for `key`, falling through to the default.
    #[must_use]
    pub fn target(&self, key: i32) -> usize {
        match self {
            SwitchTable::Table {
                low,
                targets,
                default,
            } => {
                let offset = i64::from(key) - i64::from(*low);
                if offset < 0 || offset >= targets.len() as i64 {
                    *default
                } else {
                    targets[offset as usize]
                }
            }
            SwitchTable::Lookup { pairs, default } => {
                match pairs.binary_search_by_key(&key, |(k, _)| *k) {
                    Ok(idx) => pairs[idx].1,
                    Err(_) => *default,
                }
            }
        }
    }
}

/// One interpreter instruction. Branch operands are absolute instruction
/// indices into the owning method's `instrs`.
#[derive(Debug)]
pub enum Instr {
    Push(Const),

    // Locals
    Load(u16),
    Store(u16),
    IInc(u16, i32),

    // Operand stack shuffling
    Pop,
    Dup,
    DupX1,
    Swap,

    // 32-bit integer arithmetic, wrapping two's complement
    IAdd,
    ISub,
    IMul,
    IDiv,
    IRem,
    INeg,
    IShl,
    IShr,
    IUshr,
    IAnd,
    IOr,
    IXor,

    // 64-bit integer arithmetic
    LAdd,
    LSub,
    LMul,
    LDiv,
    LRem,
    LNeg,
    LShl,
    LShr,
    LUshr,
    LAnd,
    LOr,
    LXor,

    // IEEE-754 binary32
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    FNeg,

    // IEEE-754 binary64
    DAdd,
    DSub,
    DMul,
    DDiv,
    DRem,
    DNeg,

    // Numeric conversions
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2S,

    // Three-valued comparisons; the L/G suffix picks the NaN result
    LCmp,
    FCmpL,
    FCmpG,
    DCmpL,
    DCmpG,

    // Int-vs-zero conditional branches
    IfEq(usize),
    IfNe(usize),
    IfLt(usize),
    IfGe(usize),
    IfGt(usize),
    IfLe(usize),

    // Int-vs-int conditional branches
    IfICmpEq(usize),
    IfICmpNe(usize),
    IfICmpLt(usize),
    IfICmpGe(usize),
    IfICmpGt(usize),
    IfICmpLe(usize),

    // Reference branches
    IfRefEq(usize),
    IfRefNe(usize),
    IfNull(usize),
    IfNonNull(usize),

    Goto(usize),
    Switch(SwitchTable),

    // Field access
    GetStatic(FieldSite),
    PutStatic(FieldSite),
    GetField(FieldSite),
    PutField(FieldSite),

    // Invocation
    InvokeStatic(CallSite),
    InvokeVirtual(CallSite),
    InvokeSpecial(CallSite),
    InvokeInterface(CallSite),

    // Allocation and arrays
    New(TypeSite),
    NewArray(ElemTy),
    ArrayLength,
    ArrayLoad,
    ArrayStore,

    // Type tests
    CheckCast(TypeSite),
    InstanceOf(TypeSite),

    Throw,
    Return,
    ReturnValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_and_sparse_tables_route_identically() {
        // Dense labels 1..=7 mapping label k to target 100 + k.
        let dense = SwitchTable::table(1, (1..=7).map(|k| 100 + k as usize).collect(), 999);
        let sparse = SwitchTable::lookup(
            (1..=7).map(|k| (k, 100 + k as usize)).collect(),
            999,
        );

        for key in -3..12 {
            assert_eq!(dense.target(key), sparse.target(key), "key {key}");
        }
    }

    #[test]
    fn sparse_labels_hit_and_miss() {
        let labels = [10, 55, 111, 200, 310, 980, 1000];
        let sparse = SwitchTable::lookup(
            labels.iter().enumerate().map(|(i, &k)| (k, i)).collect(),
            usize::MAX,
        );

        for (i, &label) in labels.iter().enumerate() {
            assert_eq!(sparse.target(label), i);
        }
        for miss in [0, 11, 54, 56, 999, 1001, -10] {
            assert_eq!(sparse.target(miss), usize::MAX);
        }
    }

    #[test]
    fn table_handles_extreme_keys_without_overflow() {
        let dense = SwitchTable::table(i32::MIN, vec![1, 2, 3], 0);
        assert_eq!(dense.target(i32::MIN), 1);
        assert_eq!(dense.target(i32::MIN + 2), 3);
        assert_eq!(dense.target(i32::MAX), 0);
    }

    #[test]
    fn lookup_constructor_sorts_pairs() {
        let sparse = SwitchTable::lookup(vec![(300, 3), (-5, 1), (40, 2)], 0);
        assert_eq!(sparse.target(-5), 1);
        assert_eq!(sparse.target(40), 2);
        assert_eq!(sparse.target(300), 3);
        assert_eq!(sparse.target(0), 0);
    }
}
