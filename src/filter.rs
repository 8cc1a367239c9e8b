//! Post-build gadget filters.

use crate::gadget::Gadget;

/// Default register whose write marks the interesting end of a RET gadget:
/// the Linux syscall number register of the RISC-V calling convention.
pub const DEFAULT_KEEP_REGISTER: &str = "a6";

/// Reject JOP gadgets that spend too much of the chain on the jump register.
///
/// Counts the non-terminator instructions writing the register the
/// terminator jumps through; the gadget is dropped when that count reaches
/// half its length (rounded down). A lone `jr` is therefore always dropped.
pub fn jop_filter(gadget: Gadget) -> Option<Gadget> {
    let target = gadget.terminator().dest.as_str();
    let coincidences = gadget.instructions()[1..]
        .iter()
        .filter(|insn| insn.dest == target)
        .count();

    if coincidences >= gadget.len() / 2 {
        log::trace!(
            "jop gadget at {:#x}: {} of {} instructions write {}",
            gadget.address(),
            coincidences,
            gadget.len(),
            target
        );
        None
    } else {
        Some(gadget)
    }
}

/// Argument registers `a0`..`a7`
pub fn is_argument_register(register: &str) -> bool {
    register.starts_with('a')
}

/// Narrow a RET gadget down to the part that sets `keep_register`.
///
/// Scans outward from the terminator. At the first instruction that writes
/// `keep_register` the gadget is cut so that this write becomes its first
/// instruction; writes to other argument registers on the way are kept.
/// Without such a write the gadget is returned unchanged.
pub fn narrow(mut gadget: Gadget, keep_register: &str) -> Gadget {
    let keep_at = gadget
        .instructions()
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, insn)| is_argument_register(&insn.dest) && insn.dest == keep_register)
        .map(|(index, _)| index);

    if let Some(index) = keep_at {
        gadget.truncate(index + 1);
    }
    gadget
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassifyStrategy;
    use crate::gadget::GadgetKind;
    use crate::instruction::Instruction;
    use crate::RawInstruction;
    use rstest::rstest;

    fn insn(address: u64, mnemonic: &str, operands: &str) -> Instruction {
        ClassifyStrategy::Table.classify(&RawInstruction::from_text(address, 4, mnemonic, operands))
    }

    /// Build a gadget from program-order instructions; the last one terminates it.
    fn gadget(kind: GadgetKind, program: &[(&str, &str)]) -> Gadget {
        let mut insns: Vec<_> = program
            .iter()
            .enumerate()
            .map(|(i, (m, o))| insn(0x2000 + 4 * i as u64, m, o))
            .collect();
        let terminator = insns.pop().unwrap();
        let mut gadget = Gadget::new(kind, terminator);
        for insn in insns.into_iter().rev() {
            gadget.push(insn);
        }
        gadget
    }

    #[test]
    fn test_jop_coincidence_rejects() {
        let g = gadget(
            GadgetKind::Jop,
            &[("mv", "a5,a0"), ("addi", "a1,a1,8"), ("addi", "a5,a5,8"), ("jr", "a5")],
        );
        assert_eq!(g.len(), 4);

        assert!(jop_filter(g).is_none());
    }

    #[test]
    fn test_jop_coincidence_accepts() {
        let g = gadget(
            GadgetKind::Jop,
            &[("mv", "a0,s0"), ("addi", "a1,a1,8"), ("ld", "a5,0(a1)"), ("jr", "a5")],
        );

        let kept = jop_filter(g).unwrap();
        assert_eq!(kept.len(), 4);
    }

    #[rstest]
    #[case("a5", "a5", false)]
    #[case("8(a5)", "a5", false)]
    #[case("0(t1)", "t1", true)]
    fn test_jop_coincidence_with_offset_jumps(
        #[case] target: &str,
        #[case] register: &str,
        #[case] kept: bool,
    ) {
        let g = gadget(
            GadgetKind::Jop,
            &[("mv", "a5,a0"), ("addi", "a5,a5,8"), ("jr", target)],
        );
        assert_eq!(g.terminator().dest, register);

        assert_eq!(jop_filter(g).is_some(), kept);
    }

    #[test]
    fn test_lone_jump_is_rejected() {
        let g = gadget(GadgetKind::Jop, &[("jr", "a5")]);
        assert!(jop_filter(g).is_none());
    }

    #[test]
    fn test_narrow_cuts_at_keep_register() {
        let g = gadget(
            GadgetKind::Ret,
            &[
                ("ld", "ra,24(sp)"),
                ("li", "a6,64"),
                ("mv", "a0,s0"),
                ("addi", "sp,sp,32"),
                ("ret", ""),
            ],
        );

        let narrowed = narrow(g, DEFAULT_KEEP_REGISTER);
        assert_eq!(narrowed.len(), 4);
        assert_eq!(narrowed.address(), 0x2004);
        assert_eq!(narrowed.instructions()[3].dest, "a6");
    }

    #[test]
    fn test_narrow_without_keep_register_is_unchanged() {
        let g = gadget(
            GadgetKind::Ret,
            &[("ld", "ra,8(sp)"), ("mv", "a0,s0"), ("addi", "a1,a1,1"), ("ret", "")],
        );
        let before = g.clone();

        assert_eq!(narrow(g, DEFAULT_KEEP_REGISTER), before);
    }

    #[test]
    fn test_narrow_with_other_register_policy() {
        let g = gadget(
            GadgetKind::Ret,
            &[("ld", "ra,8(sp)"), ("li", "a7,93"), ("mv", "a0,s0"), ("ret", "")],
        );

        assert_eq!(narrow(g.clone(), "a7").len(), 3);
        assert_eq!(narrow(g, DEFAULT_KEEP_REGISTER).len(), 4);
    }

    #[test]
    fn test_argument_registers() {
        assert!(is_argument_register("a0"));
        assert!(is_argument_register("a7"));
        assert!(!is_argument_register("sp"));
        assert!(!is_argument_register("s1"));
    }
}
