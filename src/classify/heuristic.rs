//! Text heuristic: dispatch on the first character of the mnemonic, then on
//! substrings.
//!
//! Used when the upstream disassembler only hands over text. The result must
//! stay within the same taxonomy as the lookup table.

use crate::instruction::Operation;

/// Guess the operation of a canonical mnemonic.
pub fn operation(mnemonic: &str) -> Operation {
    let m = mnemonic;
    let Some(first) = m.chars().next() else {
        return Operation::Unsupported;
    };

    match first {
        'l' => {
            if m.starts_with("lr.") {
                Operation::Atomic
            } else if m == "li" || m == "lui" {
                Operation::Move
            } else {
                Operation::Load
            }
        }
        'b' => Operation::Compare,
        'j' | 't' => {
            if m.contains("jal") {
                Operation::Call
            } else {
                Operation::Jump
            }
        }
        'c' => {
            if m.contains("call") {
                Operation::Call
            } else if m.starts_with("csr") {
                Operation::Io
            } else {
                Operation::Unsupported
            }
        }
        'o' | 'x' => Operation::Or,
        'e' => {
            if m.contains("ecall") {
                Operation::Syscall
            } else {
                Operation::Break
            }
        }
        'r' => {
            if m == "ret" {
                Operation::Return
            } else if m.starts_with("rem") {
                Operation::Divide
            } else if m.starts_with("rd") {
                Operation::Io
            } else {
                Operation::Unsupported
            }
        }
        'n' => {
            if m.contains('t') {
                Operation::Not
            } else if m.contains('g') {
                Operation::Negate
            } else {
                Operation::Nop
            }
        }
        'm' => {
            if m.contains("mul") {
                Operation::Multiply
            } else if m == "mv" {
                Operation::Move
            } else {
                Operation::Unsupported
            }
        }
        'a' => {
            if m.starts_with("amo") {
                Operation::Atomic
            } else if m.contains("ad") || m.contains("au") {
                Operation::Add
            } else if m.contains("an") {
                Operation::And
            } else {
                Operation::Unsupported
            }
        }
        'f' => Operation::Io,
        's' => shift_store_or_set(m),
        'd' => Operation::Divide,
        _ => Operation::Unsupported,
    }
}

// Everything starting with 's' shares a first letter; sort it out by prefix.
fn shift_store_or_set(m: &str) -> Operation {
    if m.starts_with("sc.") {
        Operation::Atomic
    } else if m.contains("sub") {
        Operation::Sub
    } else if m.starts_with("sext") {
        Operation::Move
    } else if m.starts_with("se") || m.starts_with("slt") || m.starts_with("sn") || m.starts_with("sg") {
        Operation::Set
    } else if m == "sret" {
        Operation::Unsupported
    } else if m.starts_with("sr") || m.starts_with("sll") {
        Operation::Shift
    } else if m.len() == 2 || m.ends_with("sp") {
        Operation::Store
    } else {
        Operation::Unsupported
    }
}
