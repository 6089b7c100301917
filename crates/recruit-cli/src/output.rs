//! Output formatting for the CLI.

use clap::ValueEnum;
use serde::Serialize;
use serde_json::{json, Value};

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a serializable value; text mode falls back to pretty JSON.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(err) => eprintln!("Error: could not render output: {}", err),
    }
}

/// Print a success message.
pub fn print_success(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => {
            println!("{}", json!({ "status": "success", "message": message }));
        }
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => {
            eprintln!("{}", json!({ "status": "error", "message": message }));
        }
    }
}

/// Print a label/value row.
pub fn print_row(label: &str, value: &str) {
    println!("  {:<16} {}", format!("{}:", label), value);
}

/// Print a divider line.
pub fn print_divider() {
    println!("{}", "-".repeat(80));
}

/// Print a listing as an `ID / NAME / DETAIL` table.
///
/// Accepts a bare array or one wrapped in `data` (optionally `data.items`).
/// Anything else is printed as JSON.
pub fn print_listing(body: &Value) {
    let Some(items) = listing_items(body) else {
        print_json(body);
        return;
    };

    if items.is_empty() {
        println!("Nothing found");
        return;
    }

    println!("{:<26} {:<30} {}", "ID", "NAME", "DETAIL");
    print_divider();
    for item in items {
        let id = field(item, &["_id", "id"]);
        let name = field(item, &["name", "title", "fullName"]);
        let detail = field(item, &["email", "status", "department", "role"]);
        println!("{:<26} {:<30} {}", id, name, detail);
    }
}

fn listing_items(body: &Value) -> Option<&Vec<Value>> {
    body.as_array()
        .or_else(|| body.get("data").and_then(Value::as_array))
        .or_else(|| {
            body.get("data")
                .and_then(|d| d.get("items"))
                .and_then(Value::as_array)
        })
}

fn field<'a>(item: &'a Value, keys: &[&str]) -> &'a str {
    keys.iter()
        .find_map(|key| item.get(*key).and_then(Value::as_str))
        .unwrap_or("-")
}
