//! Textual disassembly input.
//!
//! Accepts objdump-style listings such as
//!
//! ```text
//!    10078:	1141                	addi	sp,sp,-16
//!    1007a:	e406                	sd	ra,8(sp)
//! ```
//!
//! as well as the bare `10078: addi sp,sp,-16` form. Lines that do not
//! describe an instruction (headers, symbol labels, blank lines, data
//! directives) are skipped.

use crate::{Address, Operand, RawInstruction};

/// Parse every instruction line of a listing, in order.
pub fn parse_listing(text: &str) -> Vec<RawInstruction> {
    text.lines().filter_map(parse_line).collect()
}

/// Parse one listing line.
///
/// The encoding column is optional. When present, a 4-digit encoding marks a
/// compressed instruction; without it the `c.` mnemonic prefix decides.
pub fn parse_line(line: &str) -> Option<RawInstruction> {
    let (address, rest) = line.trim().split_once(':')?;
    let address = Address::from_str_radix(address.trim(), 16).ok()?;

    let (first, mut rest) = split_token(rest)?;
    let mut size = None;
    let mut mnemonic = first;

    if is_encoding(first) {
        let (next, tail) = split_token(rest)?;
        size = Some((first.len() / 2) as u8);
        mnemonic = next;
        rest = tail;
    }

    if mnemonic.starts_with('.') || mnemonic.starts_with('(') {
        log::debug!("skipping non-instruction '{}' at {:#x}", mnemonic, address);
        return None;
    }

    let size = size.unwrap_or(if mnemonic.starts_with("c.") { 2 } else { 4 });
    let operands = strip_annotations(rest);

    Some(RawInstruction::from_text(address, size, mnemonic, operands))
}

/// Split a comma-separated operand string into typed operands.
///
/// Integers (decimal or `0x` hex, optionally negative) become immediates,
/// `disp(base)` and `(base)` become memory operands, and anything else is
/// taken as a register name.
pub fn parse_operands(text: &str) -> Vec<Operand> {
    strip_annotations(text)
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(parse_operand)
        .collect()
}

fn parse_operand(token: &str) -> Operand {
    if let Some(value) = parse_int(token) {
        return Operand::Imm(value);
    }

    if let Some((disp, rest)) = token.split_once('(') {
        let disp = disp.trim();
        let disp = if disp.is_empty() { Some(0) } else { parse_int(disp) };
        if let (Some(disp), Some(base)) = (disp, rest.strip_suffix(')')) {
            return Operand::Mem {
                base: base.trim().to_string(),
                disp,
            };
        }
    }

    Operand::Reg(token.to_string())
}

/// Parse a decimal or `0x`-prefixed hexadecimal integer.
pub fn parse_int(token: &str) -> Option<i64> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, token),
    };

    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.parse().ok()?
        }
        None => return None,
    };

    Some(if negative { -value } else { value })
}

fn split_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    match text.split_once(char::is_whitespace) {
        Some((token, rest)) => Some((token, rest)),
        None => Some((text, "")),
    }
}

fn is_encoding(token: &str) -> bool {
    matches!(token.len(), 4 | 8) && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Drop trailing `# comment` and `<symbol>` annotations.
fn strip_annotations(text: &str) -> &str {
    let end = text.find(['#', '<']).unwrap_or(text.len());
    text[..end].trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", Some(0))]
    #[case("16", Some(16))]
    #[case("-16", Some(-16))]
    #[case("0x12345", Some(0x12345))]
    #[case("-0x10", Some(-16))]
    #[case("sp", None)]
    #[case("12(sp)", None)]
    #[case("", None)]
    #[case("-", None)]
    fn test_parse_int(#[case] token: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_int(token), expected);
    }

    #[test]
    fn test_parse_operands() {
        assert_eq!(
            parse_operands("ra, 12(sp)"),
            vec![
                Operand::Reg("ra".to_string()),
                Operand::Mem {
                    base: "sp".to_string(),
                    disp: 12
                },
            ]
        );
        assert_eq!(
            parse_operands("a0,a1,(a2)"),
            vec![
                Operand::Reg("a0".to_string()),
                Operand::Reg("a1".to_string()),
                Operand::Mem {
                    base: "a2".to_string(),
                    disp: 0
                },
            ]
        );
        assert_eq!(
            parse_operands("gp,gp,-1704 # 11d58 <__global_pointer$>"),
            vec![
                Operand::Reg("gp".to_string()),
                Operand::Reg("gp".to_string()),
                Operand::Imm(-1704),
            ]
        );
        assert!(parse_operands("").is_empty());
        assert!(parse_operands("   ").is_empty());
    }

    #[test]
    fn test_objdump_line_with_compressed_encoding() {
        let insn = parse_line("   10078:\t1141                \taddi\tsp,sp,-16").unwrap();

        assert_eq!(insn.address, 0x10078);
        assert_eq!(insn.size, 2);
        assert!(insn.is_compressed());
        assert_eq!(insn.mnemonic, "addi");
        assert_eq!(insn.operands, "sp,sp,-16");
        assert_eq!(insn.operand_list.last(), Some(&Operand::Imm(-16)));
    }

    #[test]
    fn test_objdump_line_with_full_encoding() {
        let insn = parse_line("   1007c:\t00000513          \tli\ta0,0").unwrap();

        assert_eq!(insn.address, 0x1007c);
        assert_eq!(insn.size, 4);
        assert_eq!(insn.mnemonic, "li");
    }

    #[test]
    fn test_bare_line() {
        let insn = parse_line("10078: addi sp,sp,-16").unwrap();
        assert_eq!(insn.size, 4);
        assert_eq!(insn.mnemonic, "addi");

        let ret = parse_line("1008a: ret").unwrap();
        assert_eq!(ret.mnemonic, "ret");
        assert!(ret.operands.is_empty());

        let compressed = parse_line("1008c: c.jr a5").unwrap();
        assert!(compressed.is_compressed());
    }

    #[test]
    fn test_symbol_annotation_is_dropped() {
        let insn = parse_line("   100b0:\t0c8000ef          \tjal\tra,10178 <main>").unwrap();

        assert_eq!(insn.mnemonic, "jal");
        assert_eq!(insn.operands, "ra,10178");
    }

    #[rstest]
    #[case("")]
    #[case("Disassembly of section .text:")]
    #[case("0000000000010078 <_start>:")]
    #[case("a.out:     file format elf64-littleriscv")]
    #[case("   10100:\t0000                \t.2byte\t0x0")]
    #[case("   10102:\t0000                \t(bad)")]
    #[case("   10104:")]
    fn test_non_instruction_lines_are_skipped(#[case] line: &str) {
        assert!(parse_line(line).is_none());
    }

    #[test]
    fn test_parse_listing_keeps_order() {
        let listing = "\
0000000000010078 <_start>:
   10078:\t1141                \taddi\tsp,sp,-16
   1007a:\te406                \tsd\tra,8(sp)

   1007c:\t60a2                \tld\tra,8(sp)
   1007e:\t8082                \tret
";
        let insns = parse_listing(listing);
        let addresses: Vec<_> = insns.iter().map(|i| i.address).collect();

        assert_eq!(addresses, vec![0x10078, 0x1007a, 0x1007c, 0x1007e]);
        assert!(insns.iter().all(|i| i.is_compressed()));
    }
}
