//! HTML failure report

use crate::models::{FailureEntry, RunSummary};
use std::fmt::Write;

/// Default report heading
pub const DEFAULT_HEADER: &str = "EC2 Inventory Report";

/// Column names, in display order
pub const FAILURE_COLUMNS: [&str; 4] = ["resourceid", "message", "AZ", "accountid"];

const STYLE: &str = "<style>\n\
h3 { font-family: sans-serif; font-size: 12px; color: #1C6EA4; }\n\
table { width: 90%; font-family: sans-serif; font-size: 12px; color: #034575; \
border-bottom: 2px solid #1C6EA4; margin-left: auto; margin-right: auto; }\n\
th { padding: 10px; padding-bottom: 3px; text-align: left; background: #A2D2F9; \
color: #1C6EA4; border-bottom: 2px solid #1C6EA4; }\n\
td { text-align: center; padding: 3px; }\n\
.tfoot { font-size: 14px; font-weight: bold; color: #1C6EA4; background: #D0E4F5; }\n\
</style>\n";

/// Subject line for a failure notification
pub fn report_subject(table_name: &str, recorded_date: &str) -> String {
    format!("Insert Failed: {table_name}: {recorded_date}")
}

/// Render the failures of `summary` as an HTML document
pub fn render_failure_report(summary: &RunSummary, header: &str) -> String {
    let mut html = String::new();
    html.push_str("<html><head>\n");
    html.push_str(STYLE);
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<h3>{}</h3>\n<br>", escape(header));

    html.push_str("<div>\n\tIssues: <table>\n\t\t<thead>\n\t<tr>");
    for column in FAILURE_COLUMNS {
        let _ = writeln!(html, "\t\t<th>{column}</th>");
    }
    html.push_str("</tr>\n\t</thead>\n\t\t<tbody>\n");

    for failure in &summary.failures {
        html.push_str("\t<tr>\n");
        for cell in cells(failure) {
            let _ = writeln!(html, "\t\t<td>{}</td>", escape(cell));
        }
        html.push_str("\t</tr>\n");
    }
    let _ = writeln!(
        html,
        "\t<tr class=\"tfoot\"><td colspan=\"4\">Count: {}</td></tr>",
        summary.failures.len()
    );
    html.push_str("\t\t</tbody>\n\t</table>\n</div><br>\n");

    let _ = write!(
        html,
        "<div class=\"tfoot\">Total records inserted: {}<br>\nTotal errors: {}\n\t</div>\n\t</body></html>",
        summary.update_count, summary.error
    );
    html
}

fn cells(failure: &FailureEntry) -> [&str; 4] {
    [
        failure.resourceid.as_str(),
        failure.message.as_str(),
        failure.az.as_deref().unwrap_or(""),
        failure.accountid.as_deref().unwrap_or(""),
    ]
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
