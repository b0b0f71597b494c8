use std::path::Path;

use serde_json::{json, Value};
use tagedit_core::{BackendInfo, TagRow, TagRows};

pub fn row_line(row: &TagRow) -> String {
    let mark = if row.tagged { "[x]" } else { "[ ]" };
    if row.value.is_empty() {
        format!("{} {}", mark, row.name)
    } else {
        format!("{} {}={}", mark, row.name, row.value)
    }
}

pub fn rows_text(rows: &TagRows) -> String {
    if rows.is_empty() {
        return "(no tags)\n".to_string();
    }
    let mut out = String::new();
    for row in rows {
        out.push_str(&row_line(row));
        out.push('\n');
    }
    out
}

pub fn rows_json(path: &Path, rows: &TagRows) -> Value {
    json!({
        "ok": true,
        "file": path.to_string_lossy(),
        "rows": rows,
    })
}

pub fn info_text(info: &BackendInfo) -> String {
    format!(
        "Database: {}\nRoot path: {}\nSize: {}\n",
        info.database, info.root, info.size
    )
}

pub fn info_json(info: &BackendInfo) -> Value {
    json!({
        "ok": true,
        "database": info.database,
        "root": info.root,
        "size": info.size,
    })
}
