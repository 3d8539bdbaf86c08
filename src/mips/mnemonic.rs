// SPDX-License-Identifier: GPL-3.0-or-later
//! Instruction identities and where each one lives in the decode tree.
//!
//! The decode tree mirrors the hardware: the primary opcode selects a row of
//! [`Table::Main`]; `SPECIAL`, `REGIMM`, `COP0` and `COP1` open secondary
//! tables, and `COP1` further splits by branch condition and by float format.

use std::fmt;

/// One of the fixed-size decode tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Indexed by `opcode`.
    Main,
    /// `opcode == 0`, indexed by `function`.
    Special,
    /// `opcode == 1`, indexed by `rt`.
    Regimm,
    /// `opcode == 16`, indexed by `rs`.
    Cop0,
    /// `COP0` with `rs == 16`, indexed by `function`.
    Cop0Tlb,
    /// `opcode == 17`, indexed by `rs`.
    Cop1,
    /// `COP1` with `rs == 8`, indexed by the `nd`/`tf` bits.
    Cop1Bc,
    Cop1S,
    Cop1D,
    Cop1W,
    Cop1L,
}

impl Table {
    pub const ALL: [Table; 11] = [
        Table::Main,
        Table::Special,
        Table::Regimm,
        Table::Cop0,
        Table::Cop0Tlb,
        Table::Cop1,
        Table::Cop1Bc,
        Table::Cop1S,
        Table::Cop1D,
        Table::Cop1W,
        Table::Cop1L,
    ];

    pub const fn len(self) -> usize {
        match self {
            Table::Main | Table::Special | Table::Cop0Tlb => 64,
            Table::Cop1S | Table::Cop1D | Table::Cop1W | Table::Cop1L => 64,
            Table::Regimm | Table::Cop0 | Table::Cop1 => 32,
            Table::Cop1Bc => 4,
        }
    }
}

/// Coordinates of a single decode-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub table: Table,
    pub index: u8,
}

impl Slot {
    pub const fn new(table: Table, index: u8) -> Self {
        Slot { table, index }
    }
}

macro_rules! mnemonics {
    ($($id:ident => $table:ident[$index:literal] $name:literal,)*) => {
        /// Every decodable instruction form, plus [`MnemonicId::Invalid`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum MnemonicId {
            $($id,)*
            Invalid,
        }

        impl MnemonicId {
            /// All valid identities, in decode-table order.
            pub const ALL: &'static [MnemonicId] = &[$(MnemonicId::$id,)*];

            /// Table entry this identity occupies. `Invalid` has none.
            pub const fn slot(self) -> Option<Slot> {
                match self {
                    $(MnemonicId::$id => Some(Slot::new(Table::$table, $index)),)*
                    MnemonicId::Invalid => None,
                }
            }

            /// Assembler spelling, e.g. `"addiu"` or `"c.eq.s"`.
            pub const fn name(self) -> &'static str {
                match self {
                    $(MnemonicId::$id => $name,)*
                    MnemonicId::Invalid => "invalid",
                }
            }
        }
    };
}

mnemonics! {
    J => Main[2] "j",
    Jal => Main[3] "jal",
    Beq => Main[4] "beq",
    Bne => Main[5] "bne",
    Blez => Main[6] "blez",
    Bgtz => Main[7] "bgtz",
    Addi => Main[8] "addi",
    Addiu => Main[9] "addiu",
    Slti => Main[10] "slti",
    Sltiu => Main[11] "sltiu",
    Andi => Main[12] "andi",
    Ori => Main[13] "ori",
    Xori => Main[14] "xori",
    Lui => Main[15] "lui",
    Beql => Main[20] "beql",
    Bnel => Main[21] "bnel",
    Blezl => Main[22] "blezl",
    Bgtzl => Main[23] "bgtzl",
    Daddi => Main[24] "daddi",
    Daddiu => Main[25] "daddiu",
    Ldl => Main[26] "ldl",
    Ldr => Main[27] "ldr",
    Lb => Main[32] "lb",
    Lh => Main[33] "lh",
    Lwl => Main[34] "lwl",
    Lw => Main[35] "lw",
    Lbu => Main[36] "lbu",
    Lhu => Main[37] "lhu",
    Lwr => Main[38] "lwr",
    Lwu => Main[39] "lwu",
    Sb => Main[40] "sb",
    Sh => Main[41] "sh",
    Swl => Main[42] "swl",
    Sw => Main[43] "sw",
    Sdl => Main[44] "sdl",
    Sdr => Main[45] "sdr",
    Swr => Main[46] "swr",
    Cache => Main[47] "cache",
    Ll => Main[48] "ll",
    Lwc1 => Main[49] "lwc1",
    Lld => Main[52] "lld",
    Ldc1 => Main[53] "ldc1",
    Ld => Main[55] "ld",
    Sc => Main[56] "sc",
    Swc1 => Main[57] "swc1",
    Scd => Main[60] "scd",
    Sdc1 => Main[61] "sdc1",
    Sd => Main[63] "sd",

    Sll => Special[0] "sll",
    Srl => Special[2] "srl",
    Sra => Special[3] "sra",
    Sllv => Special[4] "sllv",
    Srlv => Special[6] "srlv",
    Srav => Special[7] "srav",
    Jr => Special[8] "jr",
    Jalr => Special[9] "jalr",
    Syscall => Special[12] "syscall",
    Break => Special[13] "break",
    Sync => Special[15] "sync",
    Mfhi => Special[16] "mfhi",
    Mthi => Special[17] "mthi",
    Mflo => Special[18] "mflo",
    Mtlo => Special[19] "mtlo",
    Dsllv => Special[20] "dsllv",
    Dsrlv => Special[22] "dsrlv",
    Dsrav => Special[23] "dsrav",
    Mult => Special[24] "mult",
    Multu => Special[25] "multu",
    Div => Special[26] "div",
    Divu => Special[27] "divu",
    Dmult => Special[28] "dmult",
    Dmultu => Special[29] "dmultu",
    Ddiv => Special[30] "ddiv",
    Ddivu => Special[31] "ddivu",
    Add => Special[32] "add",
    Addu => Special[33] "addu",
    Sub => Special[34] "sub",
    Subu => Special[35] "subu",
    And => Special[36] "and",
    Or => Special[37] "or",
    Xor => Special[38] "xor",
    Nor => Special[39] "nor",
    Slt => Special[42] "slt",
    Sltu => Special[43] "sltu",
    Dadd => Special[44] "dadd",
    Daddu => Special[45] "daddu",
    Dsub => Special[46] "dsub",
    Dsubu => Special[47] "dsubu",
    Tge => Special[48] "tge",
    Tgeu => Special[49] "tgeu",
    Tlt => Special[50] "tlt",
    Tltu => Special[51] "tltu",
    Teq => Special[52] "teq",
    Tne => Special[54] "tne",
    Dsll => Special[56] "dsll",
    Dsrl => Special[58] "dsrl",
    Dsra => Special[59] "dsra",
    Dsll32 => Special[60] "dsll32",
    Dsrl32 => Special[62] "dsrl32",
    Dsra32 => Special[63] "dsra32",

    Bltz => Regimm[0] "bltz",
    Bgez => Regimm[1] "bgez",
    Bltzl => Regimm[2] "bltzl",
    Bgezl => Regimm[3] "bgezl",
    Tgei => Regimm[8] "tgei",
    Tgeiu => Regimm[9] "tgeiu",
    Tlti => Regimm[10] "tlti",
    Tltiu => Regimm[11] "tltiu",
    Teqi => Regimm[12] "teqi",
    Tnei => Regimm[14] "tnei",
    Bltzal => Regimm[16] "bltzal",
    Bgezal => Regimm[17] "bgezal",
    Bltzall => Regimm[18] "bltzall",
    Bgezall => Regimm[19] "bgezall",

    Mfc0 => Cop0[0] "mfc0",
    Dmfc0 => Cop0[1] "dmfc0",
    Mtc0 => Cop0[4] "mtc0",
    Dmtc0 => Cop0[5] "dmtc0",

    Tlbr => Cop0Tlb[1] "tlbr",
    Tlbwi => Cop0Tlb[2] "tlbwi",
    Tlbwr => Cop0Tlb[6] "tlbwr",
    Tlbp => Cop0Tlb[8] "tlbp",
    Eret => Cop0Tlb[24] "eret",

    Mfc1 => Cop1[0] "mfc1",
    Dmfc1 => Cop1[1] "dmfc1",
    Cfc1 => Cop1[2] "cfc1",
    Mtc1 => Cop1[4] "mtc1",
    Dmtc1 => Cop1[5] "dmtc1",
    Ctc1 => Cop1[6] "ctc1",

    Bc1f => Cop1Bc[0] "bc1f",
    Bc1t => Cop1Bc[1] "bc1t",
    Bc1fl => Cop1Bc[2] "bc1fl",
    Bc1tl => Cop1Bc[3] "bc1tl",

    AddS => Cop1S[0] "add.s",
    SubS => Cop1S[1] "sub.s",
    MulS => Cop1S[2] "mul.s",
    DivS => Cop1S[3] "div.s",
    SqrtS => Cop1S[4] "sqrt.s",
    AbsS => Cop1S[5] "abs.s",
    MovS => Cop1S[6] "mov.s",
    NegS => Cop1S[7] "neg.s",
    RoundLS => Cop1S[8] "round.l.s",
    TruncLS => Cop1S[9] "trunc.l.s",
    CeilLS => Cop1S[10] "ceil.l.s",
    FloorLS => Cop1S[11] "floor.l.s",
    RoundWS => Cop1S[12] "round.w.s",
    TruncWS => Cop1S[13] "trunc.w.s",
    CeilWS => Cop1S[14] "ceil.w.s",
    FloorWS => Cop1S[15] "floor.w.s",
    CvtDS => Cop1S[33] "cvt.d.s",
    CvtWS => Cop1S[36] "cvt.w.s",
    CvtLS => Cop1S[37] "cvt.l.s",
    CFS => Cop1S[48] "c.f.s",
    CUnS => Cop1S[49] "c.un.s",
    CEqS => Cop1S[50] "c.eq.s",
    CUeqS => Cop1S[51] "c.ueq.s",
    COltS => Cop1S[52] "c.olt.s",
    CUltS => Cop1S[53] "c.ult.s",
    COleS => Cop1S[54] "c.ole.s",
    CUleS => Cop1S[55] "c.ule.s",
    CSfS => Cop1S[56] "c.sf.s",
    CNgleS => Cop1S[57] "c.ngle.s",
    CSeqS => Cop1S[58] "c.seq.s",
    CNglS => Cop1S[59] "c.ngl.s",
    CLtS => Cop1S[60] "c.lt.s",
    CNgeS => Cop1S[61] "c.nge.s",
    CLeS => Cop1S[62] "c.le.s",
    CNgtS => Cop1S[63] "c.ngt.s",

    AddD => Cop1D[0] "add.d",
    SubD => Cop1D[1] "sub.d",
    MulD => Cop1D[2] "mul.d",
    DivD => Cop1D[3] "div.d",
    SqrtD => Cop1D[4] "sqrt.d",
    AbsD => Cop1D[5] "abs.d",
    MovD => Cop1D[6] "mov.d",
    NegD => Cop1D[7] "neg.d",
    RoundLD => Cop1D[8] "round.l.d",
    TruncLD => Cop1D[9] "trunc.l.d",
    CeilLD => Cop1D[10] "ceil.l.d",
    FloorLD => Cop1D[11] "floor.l.d",
    RoundWD => Cop1D[12] "round.w.d",
    TruncWD => Cop1D[13] "trunc.w.d",
    CeilWD => Cop1D[14] "ceil.w.d",
    FloorWD => Cop1D[15] "floor.w.d",
    CvtSD => Cop1D[32] "cvt.s.d",
    CvtWD => Cop1D[36] "cvt.w.d",
    CvtLD => Cop1D[37] "cvt.l.d",
    CFD => Cop1D[48] "c.f.d",
    CUnD => Cop1D[49] "c.un.d",
    CEqD => Cop1D[50] "c.eq.d",
    CUeqD => Cop1D[51] "c.ueq.d",
    COltD => Cop1D[52] "c.olt.d",
    CUltD => Cop1D[53] "c.ult.d",
    COleD => Cop1D[54] "c.ole.d",
    CUleD => Cop1D[55] "c.ule.d",
    CSfD => Cop1D[56] "c.sf.d",
    CNgleD => Cop1D[57] "c.ngle.d",
    CSeqD => Cop1D[58] "c.seq.d",
    CNglD => Cop1D[59] "c.ngl.d",
    CLtD => Cop1D[60] "c.lt.d",
    CNgeD => Cop1D[61] "c.nge.d",
    CLeD => Cop1D[62] "c.le.d",
    CNgtD => Cop1D[63] "c.ngt.d",

    CvtSW => Cop1W[32] "cvt.s.w",
    CvtDW => Cop1W[33] "cvt.d.w",

    CvtSL => Cop1L[32] "cvt.s.l",
    CvtDL => Cop1L[33] "cvt.d.l",
}

impl fmt::Display for MnemonicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Conditional branches and branch-likely forms with a 16-bit displacement.
/// The linking `*al` forms are deliberately not members.
pub const BRANCH_MNEMONICS: &[MnemonicId] = &[
    MnemonicId::Bc1f,
    MnemonicId::Bc1fl,
    MnemonicId::Bc1t,
    MnemonicId::Bc1tl,
    MnemonicId::Beq,
    MnemonicId::Beql,
    MnemonicId::Bgez,
    MnemonicId::Bgezl,
    MnemonicId::Bgtz,
    MnemonicId::Bgtzl,
    MnemonicId::Blez,
    MnemonicId::Blezl,
    MnemonicId::Bltz,
    MnemonicId::Bltzl,
    MnemonicId::Bne,
    MnemonicId::Bnel,
];

/// Load instructions
pub const LOAD_MNEMONICS: &[MnemonicId] = &[
    MnemonicId::Lb,
    MnemonicId::Lbu,
    MnemonicId::Ld,
    MnemonicId::Ldc1,
    MnemonicId::Ldl,
    MnemonicId::Ldr,
    MnemonicId::Lh,
    MnemonicId::Lhu,
    MnemonicId::Ll,
    MnemonicId::Lld,
    MnemonicId::Lw,
    MnemonicId::Lwc1,
    MnemonicId::Lwl,
    MnemonicId::Lwr,
    MnemonicId::Lwu,
];

/// Store instructions
pub const STORE_MNEMONICS: &[MnemonicId] = &[
    MnemonicId::Sb,
    MnemonicId::Sc,
    MnemonicId::Scd,
    MnemonicId::Sd,
    MnemonicId::Sdc1,
    MnemonicId::Sdl,
    MnemonicId::Sdr,
    MnemonicId::Sh,
    MnemonicId::Sw,
    MnemonicId::Swc1,
    MnemonicId::Swl,
    MnemonicId::Swr,
];

/// Named groups accepted by `register_category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Branch,
    Load,
    Store,
    LoadStore,
    AllValid,
}

impl Category {
    pub fn members(self) -> Vec<MnemonicId> {
        match self {
            Category::Branch => BRANCH_MNEMONICS.to_vec(),
            Category::Load => LOAD_MNEMONICS.to_vec(),
            Category::Store => STORE_MNEMONICS.to_vec(),
            Category::LoadStore => [LOAD_MNEMONICS, STORE_MNEMONICS].concat(),
            Category::AllValid => MnemonicId::ALL.to_vec(),
        }
    }

    pub fn contains(self, id: MnemonicId) -> bool {
        match self {
            Category::Branch => BRANCH_MNEMONICS.contains(&id),
            Category::Load => LOAD_MNEMONICS.contains(&id),
            Category::Store => STORE_MNEMONICS.contains(&id),
            Category::LoadStore => LOAD_MNEMONICS.contains(&id) || STORE_MNEMONICS.contains(&id),
            Category::AllValid => id != MnemonicId::Invalid,
        }
    }
}
