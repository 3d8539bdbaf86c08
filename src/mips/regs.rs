// SPDX-License-Identifier: GPL-3.0-or-later
//! MIPS register numbering and ABI names.

pub const REG_ZERO: u32 = 0;
/// Return address, written by `jal` and the `*al` branches.
pub const REG_RA: u32 = 31;

/// GPR names indexed by register number, o32 ABI spelling.
pub const GPR_NAMES: [&str; 32] = [
    "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3", // 0-7
    "$t0", "$t1", "$t2", "$t3", "$t4", "$t5", "$t6", "$t7", // 8-15
    "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7", // 16-23
    "$t8", "$t9", "$k0", "$k1", "$gp", "$sp", "$fp", "$ra", // 24-31
];

/// ABI name of a GPR. Only the low 5 bits of `reg` are used.
pub fn gpr_name(reg: u32) -> &'static str {
    GPR_NAMES[(reg & 0x1f) as usize]
}
