//! SM4/SM5 mnemonic classification.
//!
//! The disassembler spells modifiers into the mnemonic (`mul_sat`, `sample_l_aoffimmi`,
//! `resinfo_indexable`); [`classify`] strips those into flags and maps the remaining base name
//! onto an [`Opcode`], trying the SM5 extension table before the SM4 core table.

use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Float,
    Int,
    Uint,
}

impl NumericKind {
    /// Spelling of "true"/"false" results in comparisons.
    pub fn bool_values(self) -> (&'static str, &'static str) {
        match self {
            Self::Float => ("1.0", "0.0"),
            Self::Int | Self::Uint => ("1", "0"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
    Xor,
}

impl LogicOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    FloatToInt,
    FloatToUint,
    IntToFloat,
    UintToFloat,
}

/// The `sample*` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOp {
    Sample,
    Level,
    Bias,
    Compare,
    CompareLevelZero,
    Gradient,
}

impl SampleOp {
    pub fn method(self) -> &'static str {
        match self {
            Self::Sample => "Sample",
            Self::Level => "SampleLevel",
            Self::Bias => "SampleBias",
            Self::Compare => "SampleCmp",
            Self::CompareLevelZero => "SampleCmpLevelZero",
            Self::Gradient => "SampleGrad",
        }
    }

    /// Operands after `dst, coord, texture, sampler`.
    pub fn extra_operands(self) -> usize {
        match self {
            Self::Sample => 0,
            Self::Level | Self::Bias | Self::Compare | Self::CompareLevelZero => 1,
            Self::Gradient => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicOp {
    Add,
    And,
    Or,
    Xor,
    Max,
    Min,
    Exchange,
    CompareStore,
    CompareExchange,
    /// `imm_atomic_alloc`: append-buffer counter increment.
    Alloc,
    /// `imm_atomic_consume`: consume-buffer counter decrement.
    Consume,
}

impl AtomicOp {
    pub fn intrinsic(self) -> &'static str {
        match self {
            Self::Add => "InterlockedAdd",
            Self::And => "InterlockedAnd",
            Self::Or => "InterlockedOr",
            Self::Xor => "InterlockedXor",
            Self::Max => "InterlockedMax",
            Self::Min => "InterlockedMin",
            Self::Exchange => "InterlockedExchange",
            Self::CompareStore => "InterlockedCompareStore",
            Self::CompareExchange => "InterlockedCompareExchange",
            Self::Alloc => "IncrementCounter",
            Self::Consume => "DecrementCounter",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        let op = match suffix {
            "iadd" => Self::Add,
            "and" => Self::And,
            "or" => Self::Or,
            "xor" => Self::Xor,
            "imax" | "umax" => Self::Max,
            "imin" | "umin" => Self::Min,
            "exch" => Self::Exchange,
            "cmp_store" => Self::CompareStore,
            "cmp_exch" => Self::CompareExchange,
            "alloc" => Self::Alloc,
            "consume" => Self::Consume,
            _ => return None,
        };
        Some(op)
    }
}

bitflags! {
    /// Scope letters of `sync_*`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SyncFlags: u8 {
        /// `_t`: thread-group execution barrier.
        const THREAD_GROUP = 1 << 0;
        /// `_g`: group shared memory.
        const SHARED_MEMORY = 1 << 1;
        /// `_ugroup`: UAV memory, group scope.
        const UAV_GROUP = 1 << 2;
        /// `_uglobal`: UAV memory, device scope.
        const UAV_GLOBAL = 1 << 3;
    }
}

impl SyncFlags {
    pub fn intrinsic(self) -> &'static str {
        let device = self.contains(Self::UAV_GLOBAL);
        let group = self.intersects(Self::SHARED_MEMORY | Self::UAV_GROUP);
        let sync = self.contains(Self::THREAD_GROUP);
        match (device && group, device, sync) {
            (true, _, true) => "AllMemoryBarrierWithGroupSync",
            (true, _, false) => "AllMemoryBarrier",
            (false, true, true) => "DeviceMemoryBarrierWithGroupSync",
            (false, true, false) => "DeviceMemoryBarrier",
            (false, false, true) => "GroupMemoryBarrierWithGroupSync",
            (false, false, false) => "GroupMemoryBarrier",
        }
    }

    fn parse(name: &str) -> Self {
        let mut flags = Self::empty();
        for part in name.split('_').skip(1) {
            match part {
                "t" => flags |= Self::THREAD_GROUP,
                "g" => flags |= Self::SHARED_MEMORY,
                "ugroup" => flags |= Self::UAV_GROUP,
                "uglobal" => flags |= Self::UAV_GLOBAL,
                _ => {}
            }
        }
        flags
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Mov,
    /// `movc dst, cond, a, b`.
    Movc,
    Binary {
        op: BinaryOp,
        kind: NumericKind,
    },
    Mad {
        kind: NumericKind,
    },
    /// `imul`/`umul dst_hi, dst_lo, a, b`.
    WideMul {
        kind: NumericKind,
    },
    /// `udiv dst_quot, dst_rem, a, b`.
    UDiv,
    Negate,
    Dot {
        components: u8,
    },
    /// One-to-one mapping onto an HLSL intrinsic taking `args` sources.
    Intrinsic {
        name: &'static str,
        args: u8,
    },
    Compare {
        op: CompareOp,
        kind: NumericKind,
    },
    Logic(LogicOp),
    Not,
    Shift {
        op: ShiftOp,
        kind: NumericKind,
    },
    Convert(Conversion),
    /// `sincos dst_sin, dst_cos, src`.
    SinCos,

    If {
        nonzero: bool,
    },
    Else,
    EndIf,
    Loop,
    EndLoop,
    Switch,
    Case,
    Default,
    EndSwitch,
    Break,
    BreakC {
        nonzero: bool,
    },
    Continue,
    ContinueC {
        nonzero: bool,
    },
    Ret,
    RetC {
        nonzero: bool,
    },
    Discard {
        nonzero: bool,
    },

    Sample(SampleOp),
    Gather {
        compare: bool,
        programmable_offset: bool,
    },
    Load {
        multisample: bool,
    },
    ResInfo,
    Lod,
    LoadRaw,
    LoadStructured,
    LoadUavTyped,
    StoreRaw,
    StoreStructured,
    StoreUavTyped,
    Atomic {
        op: AtomicOp,
        /// `imm_atomic_*` forms return the previous value.
        immediate: bool,
    },
    Sync(SyncFlags),

    DclTemps,
    DclIndexableTemp,
    DclThreadGroup,
    DclImmediateConstantBuffer,
    DclInput,
    /// Any other `dcl_*`; carries nothing the output needs.
    Declaration,
    /// Known instructions with no HLSL counterpart (`nop`, `label`, `emit`, phase markers...).
    Skip,
}

impl Opcode {
    /// Operand count as printed in the listing.
    pub fn operand_count(&self) -> usize {
        match *self {
            Self::Mov | Self::Negate | Self::Not | Self::Convert(_) => 2,
            Self::Binary { .. }
            | Self::Dot { .. }
            | Self::Compare { .. }
            | Self::Logic(_)
            | Self::Shift { .. }
            | Self::SinCos => 3,
            Self::Movc | Self::Mad { .. } | Self::WideMul { .. } | Self::UDiv => 4,
            Self::Intrinsic { args, .. } => args as usize + 1,
            Self::If { .. }
            | Self::Switch
            | Self::Case
            | Self::BreakC { .. }
            | Self::ContinueC { .. }
            | Self::RetC { .. }
            | Self::Discard { .. } => 1,
            Self::Else
            | Self::EndIf
            | Self::Loop
            | Self::EndLoop
            | Self::Default
            | Self::EndSwitch
            | Self::Break
            | Self::Continue
            | Self::Ret
            | Self::Sync(_) => 0,
            Self::Sample(op) => 4 + op.extra_operands(),
            Self::Gather {
                compare,
                programmable_offset,
            } => 4 + usize::from(compare) + usize::from(programmable_offset),
            Self::Load { multisample } => 3 + usize::from(multisample),
            Self::ResInfo | Self::LoadRaw | Self::LoadUavTyped | Self::StoreRaw => 3,
            Self::StoreUavTyped => 3,
            Self::Lod | Self::LoadStructured | Self::StoreStructured => 4,
            Self::Atomic { op, immediate } => {
                let base = match op {
                    AtomicOp::Alloc | AtomicOp::Consume => 1,
                    AtomicOp::CompareStore | AtomicOp::CompareExchange => 4,
                    _ => 3,
                };
                base + usize::from(immediate)
            }
            Self::DclTemps => 1,
            Self::DclIndexableTemp => 2,
            Self::DclThreadGroup => 3,
            Self::DclInput => 1,
            Self::DclImmediateConstantBuffer | Self::Declaration | Self::Skip => 0,
        }
    }
}

/// A classified mnemonic plus the modifiers stripped off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mnemonic {
    pub opcode: Opcode,
    pub saturate: bool,
    /// `_aoffimmi(u,v,w)` immediate texel offset follows.
    pub offset: bool,
}

const MODIFIER_SUFFIXES: [&str; 5] = ["_indexable", "_uint", "_rcpFloat", "_opc", "_aoffimmi"];

/// Splits trailing modifiers off a mnemonic: `(base, saturate, offset)`.
pub fn strip_modifiers(token: &str) -> (&str, bool, bool) {
    let mut base = token;
    let mut saturate = false;
    let mut offset = false;
    'strip: loop {
        if let Some(rest) = base.strip_suffix("_sat") {
            saturate = true;
            base = rest;
            continue;
        }
        for suffix in MODIFIER_SUFFIXES {
            if let Some(rest) = base.strip_suffix(suffix) {
                offset |= suffix == "_aoffimmi";
                base = rest;
                continue 'strip;
            }
        }
        break;
    }
    (base, saturate, offset)
}

pub fn classify(token: &str) -> Option<Mnemonic> {
    let (base, saturate, offset) = strip_modifiers(token);
    let opcode = classify_sm5(base).or_else(|| classify_sm4(base))?;
    Some(Mnemonic {
        opcode,
        saturate,
        offset,
    })
}

fn classify_sm5(base: &str) -> Option<Opcode> {
    let intrinsic = |name, args| Some(Opcode::Intrinsic { name, args });
    match base {
        "rcp" => intrinsic("rcp", 1),
        "countbits" => intrinsic("countbits", 1),
        "bfrev" => intrinsic("reversebits", 1),
        "firstbit_hi" | "firstbit_shi" => intrinsic("firstbithigh", 1),
        "firstbit_lo" => intrinsic("firstbitlow", 1),
        "f32tof16" => intrinsic("f32tof16", 1),
        "f16tof32" => intrinsic("f16tof32", 1),
        "deriv_rtx_coarse" => intrinsic("ddx_coarse", 1),
        "deriv_rtx_fine" => intrinsic("ddx_fine", 1),
        "deriv_rty_coarse" => intrinsic("ddy_coarse", 1),
        "deriv_rty_fine" => intrinsic("ddy_fine", 1),
        "gather4_c" => Some(Opcode::Gather {
            compare: true,
            programmable_offset: false,
        }),
        "gather4_po" => Some(Opcode::Gather {
            compare: false,
            programmable_offset: true,
        }),
        "gather4_po_c" => Some(Opcode::Gather {
            compare: true,
            programmable_offset: true,
        }),
        "ld_raw" => Some(Opcode::LoadRaw),
        "ld_structured" => Some(Opcode::LoadStructured),
        "ld_uav_typed" => Some(Opcode::LoadUavTyped),
        "store_raw" => Some(Opcode::StoreRaw),
        "store_structured" => Some(Opcode::StoreStructured),
        "store_uav_typed" => Some(Opcode::StoreUavTyped),
        "dcl_thread_group" => Some(Opcode::DclThreadGroup),
        "emit_stream" | "cut_stream" | "emitthencut_stream" => Some(Opcode::Skip),
        "hs_decls" | "hs_control_point_phase" | "hs_fork_phase" | "hs_join_phase" => {
            Some(Opcode::Skip)
        }
        _ => {
            if let Some(suffix) = base.strip_prefix("imm_atomic_") {
                return AtomicOp::from_suffix(suffix).map(|op| Opcode::Atomic {
                    op,
                    immediate: true,
                });
            }
            if let Some(suffix) = base.strip_prefix("atomic_") {
                return AtomicOp::from_suffix(suffix).map(|op| Opcode::Atomic {
                    op,
                    immediate: false,
                });
            }
            if base == "sync" || base.starts_with("sync_") {
                return Some(Opcode::Sync(SyncFlags::parse(base)));
            }
            None
        }
    }
}

fn classify_sm4(base: &str) -> Option<Opcode> {
    use NumericKind::*;

    let binary = |op, kind| Some(Opcode::Binary { op, kind });
    let compare = |op, kind| Some(Opcode::Compare { op, kind });
    let intrinsic = |name, args| Some(Opcode::Intrinsic { name, args });
    match base {
        "mov" => Some(Opcode::Mov),
        "movc" => Some(Opcode::Movc),
        "add" => binary(BinaryOp::Add, Float),
        "iadd" => binary(BinaryOp::Add, Int),
        "mul" => binary(BinaryOp::Mul, Float),
        "div" => binary(BinaryOp::Div, Float),
        "mad" => Some(Opcode::Mad { kind: Float }),
        "imad" => Some(Opcode::Mad { kind: Int }),
        "umad" => Some(Opcode::Mad { kind: Uint }),
        "imul" => Some(Opcode::WideMul { kind: Int }),
        "umul" => Some(Opcode::WideMul { kind: Uint }),
        "udiv" => Some(Opcode::UDiv),
        "ineg" => Some(Opcode::Negate),
        "dp2" => Some(Opcode::Dot { components: 2 }),
        "dp3" => Some(Opcode::Dot { components: 3 }),
        "dp4" => Some(Opcode::Dot { components: 4 }),
        "exp" => intrinsic("exp2", 1),
        "log" => intrinsic("log2", 1),
        "sqrt" => intrinsic("sqrt", 1),
        "rsq" => intrinsic("rsqrt", 1),
        "frc" => intrinsic("frac", 1),
        "round_ne" => intrinsic("round", 1),
        "round_ni" => intrinsic("floor", 1),
        "round_pi" => intrinsic("ceil", 1),
        "round_z" => intrinsic("trunc", 1),
        "deriv_rtx" => intrinsic("ddx", 1),
        "deriv_rty" => intrinsic("ddy", 1),
        "min" | "imin" | "umin" => intrinsic("min", 2),
        "max" | "imax" | "umax" => intrinsic("max", 2),
        "eq" => compare(CompareOp::Eq, Float),
        "ne" => compare(CompareOp::Ne, Float),
        "lt" => compare(CompareOp::Lt, Float),
        "ge" => compare(CompareOp::Ge, Float),
        "ieq" => compare(CompareOp::Eq, Int),
        "ine" => compare(CompareOp::Ne, Int),
        "ilt" => compare(CompareOp::Lt, Int),
        "ige" => compare(CompareOp::Ge, Int),
        "ult" => compare(CompareOp::Lt, Uint),
        "uge" => compare(CompareOp::Ge, Uint),
        "and" => Some(Opcode::Logic(LogicOp::And)),
        "or" => Some(Opcode::Logic(LogicOp::Or)),
        "xor" => Some(Opcode::Logic(LogicOp::Xor)),
        "not" => Some(Opcode::Not),
        "ishl" => Some(Opcode::Shift {
            op: ShiftOp::Left,
            kind: Int,
        }),
        "ishr" => Some(Opcode::Shift {
            op: ShiftOp::Right,
            kind: Int,
        }),
        "ushr" => Some(Opcode::Shift {
            op: ShiftOp::Right,
            kind: Uint,
        }),
        "ftoi" => Some(Opcode::Convert(Conversion::FloatToInt)),
        "ftou" => Some(Opcode::Convert(Conversion::FloatToUint)),
        "itof" => Some(Opcode::Convert(Conversion::IntToFloat)),
        "utof" => Some(Opcode::Convert(Conversion::UintToFloat)),
        "sincos" => Some(Opcode::SinCos),

        "if_nz" => Some(Opcode::If { nonzero: true }),
        "if_z" => Some(Opcode::If { nonzero: false }),
        "else" => Some(Opcode::Else),
        "endif" => Some(Opcode::EndIf),
        "loop" => Some(Opcode::Loop),
        "endloop" => Some(Opcode::EndLoop),
        "switch" => Some(Opcode::Switch),
        "case" => Some(Opcode::Case),
        "default" => Some(Opcode::Default),
        "endswitch" => Some(Opcode::EndSwitch),
        "break" => Some(Opcode::Break),
        "breakc_nz" => Some(Opcode::BreakC { nonzero: true }),
        "breakc_z" => Some(Opcode::BreakC { nonzero: false }),
        "continue" => Some(Opcode::Continue),
        "continuec_nz" => Some(Opcode::ContinueC { nonzero: true }),
        "continuec_z" => Some(Opcode::ContinueC { nonzero: false }),
        "ret" => Some(Opcode::Ret),
        "retc_nz" => Some(Opcode::RetC { nonzero: true }),
        "retc_z" => Some(Opcode::RetC { nonzero: false }),
        "discard_nz" => Some(Opcode::Discard { nonzero: true }),
        "discard_z" => Some(Opcode::Discard { nonzero: false }),

        "sample" => Some(Opcode::Sample(SampleOp::Sample)),
        "sample_l" => Some(Opcode::Sample(SampleOp::Level)),
        "sample_b" => Some(Opcode::Sample(SampleOp::Bias)),
        "sample_c" => Some(Opcode::Sample(SampleOp::Compare)),
        "sample_c_lz" => Some(Opcode::Sample(SampleOp::CompareLevelZero)),
        "sample_d" => Some(Opcode::Sample(SampleOp::Gradient)),
        "gather4" => Some(Opcode::Gather {
            compare: false,
            programmable_offset: false,
        }),
        "ld" => Some(Opcode::Load { multisample: false }),
        "ld_ms" => Some(Opcode::Load { multisample: true }),
        "resinfo" => Some(Opcode::ResInfo),
        "lod" => Some(Opcode::Lod),

        "dcl_temps" => Some(Opcode::DclTemps),
        "dcl_indexableTemp" => Some(Opcode::DclIndexableTemp),
        "dcl_immediateConstantBuffer" => Some(Opcode::DclImmediateConstantBuffer),
        "dcl_input" => Some(Opcode::DclInput),
        "nop" | "label" | "call" | "callc_nz" | "callc_z" | "emit" | "cut" | "emitthencut"
        | "customdata" => Some(Opcode::Skip),
        other if other.starts_with("dcl_") => Some(Opcode::Declaration),
        _ => None,
    }
}
