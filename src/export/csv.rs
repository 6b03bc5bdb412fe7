use std::collections::BTreeMap;
use std::io::Write;

use csv::Writer;

use super::ExportError;
use crate::core::{CustomerTotals, DebtorView, LedgerField, Totals, YearMonth};

fn csv_err(e: csv::Error) -> ExportError {
    ExportError::Format(e.to_string())
}

fn totals_cells(totals: &Totals) -> impl Iterator<Item = String> + '_ {
    LedgerField::ALL.into_iter().map(|f| totals.get(f).to_string())
}

fn header<'a>(leading: &[&'a str]) -> Vec<&'a str> {
    leading
        .iter()
        .copied()
        .chain(LedgerField::ALL.iter().map(|f| f.label()))
        .collect()
}

/// Writes one row per customer with lifetime column sums.
pub fn write_customer_report<W: Write>(
    writer: W,
    rows: &[CustomerTotals],
) -> Result<(), ExportError> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(header(&["customer_name", "loan_id"]))
        .map_err(csv_err)?;
    for row in rows {
        let mut cells = vec![row.customer_name.clone(), row.loan_id.clone()];
        cells.extend(totals_cells(&row.totals));
        wtr.write_record(cells).map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes one row per month of portfolio totals.
pub fn write_monthly_report<W: Write>(
    writer: W,
    rollup: &BTreeMap<YearMonth, Totals>,
) -> Result<(), ExportError> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(header(&["month"])).map_err(csv_err)?;
    for (month, totals) in rollup {
        let mut cells = vec![month.to_string()];
        cells.extend(totals_cells(totals));
        wtr.write_record(cells).map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the due-diligence list: balances and classification per debtor.
pub fn write_debtor_views<W: Write>(writer: W, views: &[DebtorView]) -> Result<(), ExportError> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record([
        "customer_name",
        "loan_id",
        "due_date",
        "status",
        "days_overdue",
        "bad_debt",
        "outstanding_principal",
        "outstanding_interest",
    ])
    .map_err(csv_err)?;
    for v in views {
        let balances = v.debtor.current_balances();
        let (status, days_overdue, bad_debt) = match &v.classification {
            Some(c) => (c.status.to_string(), c.days_overdue.to_string(), c.bad_debt.to_string()),
            None => (v.debtor.status.to_string(), String::new(), String::new()),
        };
        wtr.write_record([
            v.debtor.customer_name.clone(),
            v.debtor.loan_id.clone(),
            v.loan.as_ref().map(|l| l.due_date.to_string()).unwrap_or_default(),
            status,
            days_overdue,
            bad_debt,
            balances.principal.to_string(),
            balances.interest.to_string(),
        ])
        .map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}
