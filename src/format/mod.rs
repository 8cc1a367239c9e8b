//! Output formats for gadget listings

mod csv;
mod json;

pub use self::json::*;

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use clap::ValueEnum;

use crate::gadget::Gadget;
use crate::GadgetError;

/// Supported output formats for gadget listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// One `0xADDRESS: ins1; ins2; ...; insN;` line per gadget (default)
    #[default]
    Text,
    /// JSON array of gadgets
    Json,
    /// JSON Lines format (one JSON object per gadget)
    JsonLines,
    /// CSV format (comma-separated values)
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonLines => write!(f, "jsonl"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "jsonlines" => Ok(OutputFormat::JsonLines),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl OutputFormat {
    /// Get all available output formats
    pub fn available_formats() -> &'static [Self] {
        &[
            OutputFormat::Text,
            OutputFormat::Json,
            OutputFormat::JsonLines,
            OutputFormat::Csv,
        ]
    }

    /// Get a formatter for this output format
    pub fn get_formatter(&self) -> Box<dyn GadgetFormatter> {
        match self {
            OutputFormat::Text => Box::new(TextFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
            OutputFormat::JsonLines => Box::new(JsonLinesFormatter),
            OutputFormat::Csv => Box::new(CsvFormatter),
        }
    }
}

/// Formatter trait for gadget output
pub trait GadgetFormatter {
    /// Render gadgets in catalogue order
    fn format(&self, gadgets: &[Rc<Gadget>]) -> Result<String, GadgetError>;
}

/// Format gadgets in plain text
pub struct TextFormatter;

/// Format gadgets in JSON
pub struct JsonFormatter;

/// Format gadgets in JSON Lines
pub struct JsonLinesFormatter;

/// Format gadgets in CSV
pub struct CsvFormatter;

impl GadgetFormatter for TextFormatter {
    fn format(&self, gadgets: &[Rc<Gadget>]) -> Result<String, GadgetError> {
        let mut output = String::new();
        for gadget in gadgets {
            output.push_str(&format!("{}\n", gadget));
        }
        Ok(output)
    }
}

/// Instructions of a gadget in program order, `; `-separated, without the
/// address prefix.
pub fn instruction_list(gadget: &Gadget) -> String {
    gadget
        .program_order()
        .map(|insn| format!("{};", insn.text))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::finder::{scan_listing, FinderConfig};

    pub(crate) fn sample_gadgets() -> Vec<Rc<Gadget>> {
        let listing = "\
1000: ld ra,8(sp)
1004: addi sp,sp,16
1008: ret
100c: li a7,93
1010: ecall
";
        scan_listing(listing, FinderConfig::default()).gadgets()
    }

    #[test]
    fn test_text_formatter() {
        let output = TextFormatter.format(&sample_gadgets()).unwrap();

        assert_eq!(
            output,
            "0x00001000: ld ra, 8(sp); addi sp, sp, 16; ret;\n0x0000100c: li a7, 93; ecall;\n"
        );
    }

    #[test]
    fn test_empty_output() {
        for format in OutputFormat::available_formats() {
            let output = format.get_formatter().format(&[]).unwrap();
            assert!(!output.contains("0x"), "{} rendered a gadget from nothing", format);
        }
    }

    #[test]
    fn test_instruction_list() {
        let gadgets = sample_gadgets();
        assert_eq!(instruction_list(&gadgets[1]), "li a7, 93; ecall;");
    }

    #[test]
    fn test_format_names_round_trip() {
        for format in OutputFormat::available_formats() {
            assert_eq!(format.to_string().parse::<OutputFormat>(), Ok(*format));
        }
        assert!("ngram".parse::<OutputFormat>().is_err());
    }
}
