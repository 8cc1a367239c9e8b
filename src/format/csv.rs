//! CSV output formatter

use std::rc::Rc;

use super::{instruction_list, GadgetFormatter};
use crate::gadget::Gadget;
use crate::GadgetError;

impl GadgetFormatter for super::CsvFormatter {
    fn format(&self, gadgets: &[Rc<Gadget>]) -> Result<String, GadgetError> {
        let mut writer = ::csv::Writer::from_writer(Vec::new());

        writer
            .write_record(["address", "length", "kind", "gadget"])
            .map_err(csv_error)?;

        for gadget in gadgets {
            writer
                .write_record([
                    format!("0x{:x}", gadget.address()),
                    gadget.len().to_string(),
                    gadget.kind().to_string(),
                    instruction_list(gadget),
                ])
                .map_err(csv_error)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| GadgetError::Generic(format!("CSV serialization error: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| GadgetError::Generic(format!("CSV output is not UTF-8: {}", e)))
    }
}

fn csv_error(e: ::csv::Error) -> GadgetError {
    GadgetError::Generic(format!("CSV serialization error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::tests::sample_gadgets;
    use crate::format::CsvFormatter;

    #[test]
    fn test_csv_formatter() {
        let output = CsvFormatter.format(&sample_gadgets()).unwrap();

        let mut reader = ::csv::Reader::from_reader(output.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["address", "length", "kind", "gadget"]);

        let rows: Vec<::csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "0x1000");
        assert_eq!(&rows[0][1], "3");
        // The gadget column holds commas and is quoted by the writer
        assert_eq!(&rows[0][3], "ld ra, 8(sp); addi sp, sp, 16; ret;");
        assert!(output.contains("\"ld ra, 8(sp); addi sp, sp, 16; ret;\""));
        assert_eq!(&rows[1][2], "syscall");
    }
}
