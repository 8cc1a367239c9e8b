//! Exact lookup by decoder instruction id, with a mnemonic table behind it.

use capstone::arch::riscv::RiscVInsn;
use capstone::arch::riscv::RiscVInsn::*;

use crate::instruction::Operation;

/// Instruction ids whose operation does not depend on how the decoder
/// prints them. Ids that double as aliases (`addi` as `li`/`mv`/`nop`,
/// `jalr` as `ret`/`jr`, `jal` as `j`, `sub` as `neg`, `xori` as `not`)
/// are left to the mnemonic table.
const BY_ID: &[(&[RiscVInsn], Operation)] = &[
    (
        &[
            RISCV_INS_LB, RISCV_INS_LH, RISCV_INS_LW, RISCV_INS_LD, RISCV_INS_LBU, RISCV_INS_LHU,
            RISCV_INS_LWU, RISCV_INS_C_LW, RISCV_INS_C_LD, RISCV_INS_C_LWSP, RISCV_INS_C_LDSP,
        ],
        Operation::Load,
    ),
    (
        &[
            RISCV_INS_SB, RISCV_INS_SH, RISCV_INS_SW, RISCV_INS_SD, RISCV_INS_C_SW, RISCV_INS_C_SD,
            RISCV_INS_C_SWSP, RISCV_INS_C_SDSP,
        ],
        Operation::Store,
    ),
    (
        &[
            RISCV_INS_BEQ, RISCV_INS_BNE, RISCV_INS_BLT, RISCV_INS_BGE, RISCV_INS_BLTU,
            RISCV_INS_BGEU, RISCV_INS_C_BEQZ, RISCV_INS_C_BNEZ,
        ],
        Operation::Compare,
    ),
    (&[RISCV_INS_ECALL], Operation::Syscall),
    (&[RISCV_INS_EBREAK, RISCV_INS_C_EBREAK], Operation::Break),
    (
        &[
            RISCV_INS_ADD, RISCV_INS_ADDW, RISCV_INS_AUIPC, RISCV_INS_C_ADD, RISCV_INS_C_ADDW,
            RISCV_INS_C_ADDI, RISCV_INS_C_ADDI16SP, RISCV_INS_C_ADDI4SPN,
        ],
        Operation::Add,
    ),
    (&[RISCV_INS_C_SUB, RISCV_INS_C_SUBW], Operation::Sub),
    (&[RISCV_INS_AND, RISCV_INS_ANDI, RISCV_INS_C_AND, RISCV_INS_C_ANDI], Operation::And),
    (&[RISCV_INS_OR, RISCV_INS_ORI, RISCV_INS_XOR, RISCV_INS_C_OR, RISCV_INS_C_XOR], Operation::Or),
    (
        &[
            RISCV_INS_SLL, RISCV_INS_SLLI, RISCV_INS_SRL, RISCV_INS_SRLI, RISCV_INS_SRA,
            RISCV_INS_SRAI, RISCV_INS_SLLW, RISCV_INS_SLLIW, RISCV_INS_SRLW, RISCV_INS_SRLIW,
            RISCV_INS_SRAW, RISCV_INS_SRAIW, RISCV_INS_C_SLLI, RISCV_INS_C_SRLI, RISCV_INS_C_SRAI,
        ],
        Operation::Shift,
    ),
    (&[RISCV_INS_SLT, RISCV_INS_SLTI, RISCV_INS_SLTU, RISCV_INS_SLTIU], Operation::Set),
    (&[RISCV_INS_LUI, RISCV_INS_C_LUI, RISCV_INS_C_LI, RISCV_INS_C_MV], Operation::Move),
    (&[RISCV_INS_C_NOP], Operation::Nop),
    (
        &[RISCV_INS_MUL, RISCV_INS_MULH, RISCV_INS_MULHSU, RISCV_INS_MULHU, RISCV_INS_MULW],
        Operation::Multiply,
    ),
    (
        &[
            RISCV_INS_DIV, RISCV_INS_DIVU, RISCV_INS_DIVW, RISCV_INS_DIVUW, RISCV_INS_REM,
            RISCV_INS_REMU, RISCV_INS_REMW, RISCV_INS_REMUW,
        ],
        Operation::Divide,
    ),
    (
        &[
            RISCV_INS_CSRRW, RISCV_INS_CSRRS, RISCV_INS_CSRRC, RISCV_INS_CSRRWI, RISCV_INS_CSRRSI,
            RISCV_INS_CSRRCI,
        ],
        Operation::Io,
    ),
];

/// Id ranges of the enum that form one family: atomics, and the floating
/// point extension together with the fences.
const RANGES: &[(RiscVInsn, RiscVInsn, Operation)] = &[
    (RISCV_INS_AMOADD_D, RISCV_INS_AMOXOR_W_RL, Operation::Atomic),
    (RISCV_INS_LR_D, RISCV_INS_LR_W_RL, Operation::Atomic),
    (RISCV_INS_SC_D, RISCV_INS_SC_W_RL, Operation::Atomic),
    (RISCV_INS_C_FLD, RISCV_INS_C_FSWSP, Operation::Io),
    (RISCV_INS_FADD_D, RISCV_INS_FSW, Operation::Io),
];

/// Map a decoder instruction id onto its operation.
///
/// Returns `None` for ids the mnemonic table has to settle.
pub fn operation_by_id(id: u32) -> Option<Operation> {
    BY_ID
        .iter()
        .find(|(ids, _)| ids.iter().any(|insn| *insn as u32 == id))
        .map(|(_, operation)| *operation)
        .or_else(|| {
            RANGES
                .iter()
                .find(|(first, last, _)| (*first as u32..=*last as u32).contains(&id))
                .map(|(_, _, operation)| *operation)
        })
}

/// Map a canonical mnemonic onto its operation.
pub fn operation(mnemonic: &str) -> Operation {
    match mnemonic {
        "lb" | "lh" | "lw" | "ld" | "lbu" | "lhu" | "lwu" | "lwsp" | "ldsp" => Operation::Load,
        "sb" | "sh" | "sw" | "sd" | "swsp" | "sdsp" => Operation::Store,

        "beq" | "bne" | "blt" | "bge" | "bltu" | "bgeu" | "beqz" | "bnez" | "blez" | "bgez"
        | "bltz" | "bgtz" | "bgt" | "ble" | "bgtu" | "bleu" => Operation::Compare,

        "j" | "jr" | "tail" => Operation::Jump,
        "jal" | "jalr" | "call" => Operation::Call,
        "ret" => Operation::Return,
        "ecall" => Operation::Syscall,
        "ebreak" => Operation::Break,

        "add" | "addi" | "addw" | "addiw" | "addi16sp" | "addi4spn" | "auipc" => Operation::Add,
        "sub" | "subw" => Operation::Sub,
        "and" | "andi" => Operation::And,
        "or" | "ori" | "xor" | "xori" => Operation::Or,

        "sll" | "slli" | "srl" | "srli" | "sra" | "srai" | "sllw" | "slliw" | "srlw" | "srliw"
        | "sraw" | "sraiw" => Operation::Shift,

        "slt" | "slti" | "sltu" | "sltiu" | "seqz" | "snez" | "sltz" | "sgtz" => Operation::Set,

        "mv" | "li" | "lui" | "sext.w" => Operation::Move,
        "not" => Operation::Not,
        "neg" | "negw" => Operation::Negate,
        "nop" => Operation::Nop,

        "mul" | "mulh" | "mulhsu" | "mulhu" | "mulw" => Operation::Multiply,
        "div" | "divu" | "divw" | "divuw" | "rem" | "remu" | "remw" | "remuw" => Operation::Divide,

        "lr.w" | "lr.d" | "sc.w" | "sc.d" => Operation::Atomic,
        m if m.starts_with("amo") => Operation::Atomic,

        "csrr" | "csrw" | "csrs" | "csrc" | "csrrw" | "csrrs" | "csrrc" | "csrrwi" | "csrrsi"
        | "csrrci" | "csrwi" | "csrsi" | "csrci" => Operation::Io,
        "rdcycle" | "rdtime" | "rdinstret" | "rdcycleh" | "rdtimeh" | "rdinstreth" => Operation::Io,
        // fences and the whole floating point extension
        m if m.starts_with('f') => Operation::Io,

        _ => Operation::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstone::arch::riscv::RiscVInsn::*;
    use rstest::rstest;

    #[rstest]
    #[case("ld", Operation::Load)]
    #[case("sd", Operation::Store)]
    #[case("bgeu", Operation::Compare)]
    #[case("jr", Operation::Jump)]
    #[case("jalr", Operation::Call)]
    #[case("ret", Operation::Return)]
    #[case("ecall", Operation::Syscall)]
    #[case("auipc", Operation::Add)]
    #[case("xori", Operation::Or)]
    #[case("sraiw", Operation::Shift)]
    #[case("sltiu", Operation::Set)]
    #[case("li", Operation::Move)]
    #[case("negw", Operation::Negate)]
    #[case("remu", Operation::Divide)]
    #[case("amoor.w", Operation::Atomic)]
    #[case("fsd", Operation::Io)]
    #[case("csrrw", Operation::Io)]
    #[case("wfi", Operation::Unsupported)]
    #[case("", Operation::Unsupported)]
    fn test_table_lookup(#[case] mnemonic: &str, #[case] expected: Operation) {
        assert_eq!(operation(mnemonic), expected);
    }

    #[rstest]
    #[case(RISCV_INS_LD, Some(Operation::Load))]
    #[case(RISCV_INS_C_SDSP, Some(Operation::Store))]
    #[case(RISCV_INS_C_BNEZ, Some(Operation::Compare))]
    #[case(RISCV_INS_C_ADDI16SP, Some(Operation::Add))]
    #[case(RISCV_INS_SRAIW, Some(Operation::Shift))]
    #[case(RISCV_INS_REMUW, Some(Operation::Divide))]
    #[case(RISCV_INS_AMOSWAP_W_AQ, Some(Operation::Atomic))]
    #[case(RISCV_INS_SC_D_RL, Some(Operation::Atomic))]
    #[case(RISCV_INS_FENCE, Some(Operation::Io))]
    #[case(RISCV_INS_C_FSDSP, Some(Operation::Io))]
    #[case(RISCV_INS_ECALL, Some(Operation::Syscall))]
    #[case(RISCV_INS_JALR, None)]
    #[case(RISCV_INS_C_JR, None)]
    #[case(RISCV_INS_ADDI, None)]
    #[case(RISCV_INS_WFI, None)]
    fn test_id_lookup(#[case] insn: RiscVInsn, #[case] expected: Option<Operation>) {
        assert_eq!(operation_by_id(insn as u32), expected);
    }

    #[test]
    fn test_id_lookup_agrees_with_mnemonics() {
        let pairs = [
            (RISCV_INS_LW, "lw"),
            (RISCV_INS_C_SWSP, "swsp"),
            (RISCV_INS_BGEU, "bgeu"),
            (RISCV_INS_C_ADDI4SPN, "addi4spn"),
            (RISCV_INS_ORI, "ori"),
            (RISCV_INS_SLTIU, "sltiu"),
            (RISCV_INS_LUI, "lui"),
            (RISCV_INS_MULHU, "mulhu"),
            (RISCV_INS_AMOADD_D, "amoadd.d"),
            (RISCV_INS_FLD, "fld"),
            (RISCV_INS_CSRRS, "csrrs"),
        ];
        for (insn, mnemonic) in pairs {
            assert_eq!(operation_by_id(insn as u32), Some(operation(mnemonic)), "{}", mnemonic);
        }
    }
}
