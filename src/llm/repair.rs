use crate::utils::error::{ExtractorError, Result};
use serde_json::{Map, Number, Value};

const WRAPPER_KEYS: [&str; 5] = ["invoice", "data", "arguments", "extraction", "result"];
const MONEY_FIELDS: [&str; 2] = ["total_amount", "gst_amount"];
const STRING_FIELDS: [&str; 7] = [
    "invoice_date",
    "supplier_name",
    "invoice_number",
    "currency",
    "gst_number",
    "due_date",
    "notes",
];

#[derive(Debug, Clone)]
pub struct Repaired {
    pub value: Value,
    pub repairs: Vec<String>,
}

/// Parses model-produced JSON, repairing the usual damage: code fences, prose
/// around the object, smart quotes, trailing commas and truncated output.
pub fn parse_tool_arguments(raw: &str) -> Result<Repaired> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ExtractorError::RepairError {
            message: "empty arguments".to_string(),
        });
    }

    let mut repairs = Vec::new();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(match value {
            // 有些模型會把 arguments 再 encode 一次
            Value::String(inner) => match serde_json::from_str::<Value>(&inner) {
                Ok(decoded) => {
                    repairs.push("decoded double-encoded JSON".to_string());
                    Repaired { value: decoded, repairs }
                }
                Err(_) => Repaired {
                    value: Value::String(inner),
                    repairs,
                },
            },
            other => Repaired { value: other, repairs },
        });
    }

    let mut text = trimmed.to_string();

    if text.contains("```") {
        text = strip_code_fences(&text);
        repairs.push("stripped markdown code fences".to_string());
    }

    match text.find('{') {
        Some(0) => {}
        Some(start) => {
            text = text[start..].to_string();
            repairs.push("dropped text before JSON object".to_string());
        }
        None => {
            return Err(ExtractorError::RepairError {
                message: format!("no JSON object found in: {}", preview(trimmed)),
            })
        }
    }

    if text.contains(['\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}']) {
        text = text
            .replace(['\u{201c}', '\u{201d}'], "\"")
            .replace(['\u{2018}', '\u{2019}'], "'");
        repairs.push("replaced smart quotes".to_string());
    }

    let without_commas = remove_trailing_commas(&text);
    if without_commas != text {
        repairs.push("removed trailing commas".to_string());
        text = without_commas;
    }

    // 先試著補齊結尾（輸出被截斷的情況），再試著切掉物件後面的雜訊
    let closed = close_unbalanced(&text);
    if let Ok(value) = serde_json::from_str::<Value>(&closed) {
        if closed != text {
            repairs.push("closed unbalanced brackets".to_string());
        }
        return Ok(Repaired { value, repairs });
    }

    if let Some(end) = text.rfind('}') {
        let sliced = &text[..=end];
        if let Ok(value) = serde_json::from_str::<Value>(sliced) {
            repairs.push("dropped text after JSON object".to_string());
            return Ok(Repaired { value, repairs });
        }
    }

    Err(ExtractorError::RepairError {
        message: format!("unparseable JSON: {}", preview(trimmed)),
    })
}

/// Normalises the shape of a submitted invoice before schema validation.
pub fn normalize_invoice_value(value: Value, repairs: &mut Vec<String>) -> Value {
    let mut value = unwrap_wrappers(value, repairs);

    let Some(obj) = value.as_object_mut() else {
        return value;
    };

    for field in MONEY_FIELDS {
        if let Some(v) = obj.get_mut(field) {
            coerce_money(v, field, repairs);
        }
    }

    for field in STRING_FIELDS {
        if let Some(v) = obj.get_mut(field) {
            match v {
                Value::String(s) if s.trim().is_empty() => *v = Value::Null,
                Value::Number(n) => *v = Value::String(n.to_string()),
                _ => {}
            }
        }
    }

    // 缺少 entries 時保持原樣，交給 schema 驗證回報
    let Some(entries) = obj.remove("entries") else {
        return value;
    };
    let entries = match entries {
        Value::Array(items) => items,
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Array(items)) => {
                repairs.push("decoded entries from a JSON string".to_string());
                items
            }
            _ => {
                repairs.push("discarded unparseable entries string".to_string());
                Vec::new()
            }
        },
        Value::Object(single) => {
            repairs.push("wrapped single entry in an array".to_string());
            vec![Value::Object(single)]
        }
        Value::Null => Vec::new(),
        other => vec![other],
    };

    let entries = entries
        .into_iter()
        .map(|entry| normalize_entry(entry, repairs))
        .collect();
    obj.insert("entries".to_string(), Value::Array(entries));

    value
}

fn unwrap_wrappers(mut value: Value, repairs: &mut Vec<String>) -> Value {
    loop {
        let inner = match &value {
            Value::Object(obj) if obj.len() == 1 => obj
                .iter()
                .next()
                .filter(|(k, _)| WRAPPER_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone())),
            _ => None,
        };
        match inner {
            Some((key, Value::Object(o))) => {
                repairs.push(format!("unwrapped '{}' wrapper", key));
                value = Value::Object(o);
            }
            Some((key, Value::String(s))) => match serde_json::from_str::<Value>(&s) {
                Ok(decoded @ Value::Object(_)) => {
                    repairs.push(format!("decoded '{}' wrapper string", key));
                    value = decoded;
                }
                _ => return value,
            },
            _ => return value,
        }
    }
}

fn normalize_entry(entry: Value, repairs: &mut Vec<String>) -> Value {
    let Value::Object(mut obj) = entry else {
        return entry;
    };

    let has_label = obj.get("label").and_then(Value::as_str).map_or(false, |l| !l.trim().is_empty());
    if !has_label {
        for alias in ["description", "name", "item"] {
            if let Some(Value::String(s)) = obj.get(alias) {
                if !s.trim().is_empty() {
                    let label = s.clone();
                    obj.remove(alias);
                    obj.insert("label".to_string(), Value::String(label));
                    repairs.push(format!("used entry '{}' as label", alias));
                    break;
                }
            }
        }
    }

    if let Some(v) = obj.get_mut("amount") {
        coerce_money(v, "entries[].amount", repairs);
    }

    if let Some(Value::String(s)) = obj.get("attrs") {
        let parsed = serde_json::from_str::<Map<String, Value>>(s).ok();
        match parsed {
            Some(map) => {
                obj.insert("attrs".to_string(), Value::Object(map));
            }
            None => {
                obj.remove("attrs");
            }
        }
        repairs.push("decoded entry attrs string".to_string());
    }

    if let Some(Value::Object(attrs)) = obj.get_mut("attrs") {
        attrs.remove("amount");
    }
    if matches!(obj.get("attrs"), Some(Value::Null)) {
        obj.remove("attrs");
    }

    Value::Object(obj)
}

fn coerce_money(v: &mut Value, field: &str, repairs: &mut Vec<String>) {
    if let Value::String(s) = v {
        if s.trim().is_empty() {
            *v = Value::Null;
        } else if let Some(n) = parse_money(s).and_then(Number::from_f64) {
            repairs.push(format!("converted {} '{}' to a number", field, s));
            *v = Value::Number(n);
        }
    }
}

/// `"$1,234.50"` -> 1234.5, `"(12.00)"` and `"12.00 CR"` -> -12.0
pub fn parse_money(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let upper = s.to_ascii_uppercase();
    let negative = s.starts_with('-')
        || (s.starts_with('(') && s.ends_with(')'))
        || upper.ends_with("CR");

    let digits: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() || digits.matches('.').count() > 1 {
        return None;
    }
    let n: f64 = digits.parse().ok()?;
    Some(if negative { -n } else { n })
}

fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn close_unbalanced(text: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = text.to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    if stack.is_empty() {
        return out;
    }

    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    } else if out.ends_with(':') {
        out.push_str(" null");
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

fn preview(text: &str) -> String {
    let cut: String = text.chars().take(120).collect();
    if cut.len() < text.len() {
        format!("{}...", cut)
    } else {
        cut
    }
}
