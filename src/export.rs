//! CSV export of audit logs

use std::io::Write;

use csv::{QuoteStyle, WriterBuilder};

use crate::Result;
use crate::models::AuditLog;

/// Column headers of the audit export
pub const AUDIT_CSV_HEADERS: [&str; 8] = [
    "Timestamp",
    "Username",
    "Action",
    "IP Address",
    "Role",
    "Status",
    "Resource",
    "User Agent",
];

/// Write `logs` as CSV with a header row; every field is quoted
pub fn write_audit_csv<W: Write>(logs: &[AuditLog], writer: W) -> Result<()> {
    let mut w = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(writer);

    w.write_record(AUDIT_CSV_HEADERS)?;
    for log in logs {
        w.write_record([
            log.created_at.as_str(),
            log.username.as_str(),
            log.action.as_str(),
            log.ip_address.as_str(),
            log.role.as_str(),
            log.status.as_str(),
            log.resource.as_deref().unwrap_or_default(),
            log.user_agent.as_deref().unwrap_or_default(),
        ])?;
    }
    w.flush()?;
    Ok(())
}
