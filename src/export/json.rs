use std::io::Write;

use serde::Serialize;

use super::ExportError;

/// Writes any report as pretty-printed JSON.
pub fn write<W: Write, T: Serialize + ?Sized>(writer: W, report: &T) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, report).map_err(|e| ExportError::Format(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Totals;
    use rust_decimal_macros::dec;

    #[test]
    fn amounts_are_written_as_strings() {
        let totals = Totals {
            interest_paid: dec!(12.50),
            ..Totals::default()
        };
        let mut out = Vec::new();
        write(&mut out, &totals).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["interest_paid"], "12.50");
    }
}
