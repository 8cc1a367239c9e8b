//! JSON and JSON Lines output formatters

use std::rc::Rc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{instruction_list, GadgetFormatter};
use crate::gadget::Gadget;
use crate::instruction::Instruction;
use crate::GadgetError;

/// Serializable instruction for JSON output
#[derive(Debug, Serialize, Deserialize)]
pub struct InstructionJson {
    /// Address of the instruction
    pub address: String,
    /// Normalised disassembly text
    pub text: String,
    /// Operation tag
    pub operation: String,
    /// Whether the instruction uses a 2-byte encoding
    pub compressed: bool,
}

/// Serializable gadget for JSON output
#[derive(Debug, Serialize, Deserialize)]
pub struct GadgetJson {
    /// Address of the first instruction
    pub address: String,
    /// Number of instructions
    pub length: usize,
    /// Terminator kind ("ret", "jop" or "syscall")
    pub kind: String,
    /// Instructions in program order
    pub instructions: Vec<InstructionJson>,
}

impl GadgetFormatter for super::JsonFormatter {
    fn format(&self, gadgets: &[Rc<Gadget>]) -> Result<String, GadgetError> {
        let result: Vec<GadgetJson> = gadgets.iter().map(|g| gadget_to_json(g)).collect();

        serde_json::to_string_pretty(&result)
            .map_err(|e| GadgetError::Generic(format!("JSON serialization error: {}", e)))
    }
}

impl GadgetFormatter for super::JsonLinesFormatter {
    fn format(&self, gadgets: &[Rc<Gadget>]) -> Result<String, GadgetError> {
        let mut output = String::new();

        for gadget in gadgets {
            let line = json!({
                "address": format!("0x{:x}", gadget.address()),
                "length": gadget.len(),
                "kind": gadget.kind().to_string(),
                "gadget": instruction_list(gadget),
            });

            output.push_str(&serde_json::to_string(&line)
                .map_err(|e| GadgetError::Generic(format!("JSON serialization error: {}", e)))?);
            output.push('\n');
        }

        Ok(output)
    }
}

/// Convert an instruction to JSON format
fn instruction_to_json(insn: &Instruction) -> InstructionJson {
    InstructionJson {
        address: format!("0x{:x}", insn.address),
        text: insn.text.clone(),
        operation: insn.operation.to_string(),
        compressed: insn.compressed,
    }
}

/// Convert a gadget to JSON format
fn gadget_to_json(gadget: &Gadget) -> GadgetJson {
    GadgetJson {
        address: format!("0x{:x}", gadget.address()),
        length: gadget.len(),
        kind: gadget.kind().to_string(),
        instructions: gadget.program_order().map(instruction_to_json).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::tests::sample_gadgets;
    use crate::format::{JsonFormatter, JsonLinesFormatter};
    use serde_json::Value;

    #[test]
    fn test_json_formatter() {
        let output = JsonFormatter.format(&sample_gadgets()).unwrap();
        let parsed: Vec<GadgetJson> = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].address, "0x1000");
        assert_eq!(parsed[0].length, 3);
        assert_eq!(parsed[0].kind, "ret");
        assert_eq!(parsed[0].instructions[1].text, "addi sp, sp, 16");
        assert_eq!(parsed[0].instructions[1].operation, "add");
        assert_eq!(parsed[1].kind, "syscall");
        assert_eq!(parsed[1].instructions.last().map(|i| i.text.as_str()), Some("ecall"));
    }

    #[test]
    fn test_json_lines_formatter() {
        let output = JsonLinesFormatter.format(&sample_gadgets()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["address"], "0x1000");
        assert_eq!(first["length"], 3);
        assert_eq!(first["gadget"], "ld ra, 8(sp); addi sp, sp, 16; ret;");

        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["kind"], "syscall");
    }
}
