use crate::domain::model::Entry;
use serde_json::{Map, Number, Value};

const UNIT_AMOUNT_ALIASES: [&str; 5] = ["unit_amount", "quantity", "qty", "units", "usage"];
const UNIT_PRICE_ALIASES: [&str; 4] = ["unit_price", "rate", "price", "unit_rate"];
const UNIT_ALIASES: [&str; 3] = ["unit", "uom", "unit_of_measure"];

/// Rewrites an entry's attrs into the standard columns:
/// `unit`, `unit_amount`, `unit_price`, then `extraN` / `extraN_label` pairs.
pub fn normalize_entry_attrs(entry: &mut Entry) {
    let Some(attrs) = entry.attrs.take() else {
        return;
    };

    let mut out = Map::new();
    let mut leftovers: Vec<(String, Value)> = Vec::new();

    for (key, value) in attrs {
        if value.is_null() || key == "amount" {
            continue;
        }
        let lower = key.to_ascii_lowercase();
        if UNIT_AMOUNT_ALIASES.contains(&lower.as_str()) && !out.contains_key("unit_amount") {
            out.insert("unit_amount".to_string(), coerce_number(value));
        } else if UNIT_PRICE_ALIASES.contains(&lower.as_str()) && !out.contains_key("unit_price") {
            out.insert("unit_price".to_string(), coerce_number(value));
        } else if UNIT_ALIASES.contains(&lower.as_str()) && !out.contains_key("unit") {
            out.insert("unit".to_string(), value);
        } else if is_extra_key(&lower) {
            out.insert(lower, value);
        } else {
            leftovers.push((key, value));
        }
    }

    // 非標準欄位依序放進下一個空的 extra 欄
    let mut slot = 1;
    for (key, value) in leftovers {
        while out.contains_key(&format!("extra{}", slot))
            || out.contains_key(&format!("extra{}_label", slot))
        {
            slot += 1;
        }
        out.insert(format!("extra{}", slot), value);
        out.insert(format!("extra{}_label", slot), Value::String(title_case(&key)));
        slot += 1;
    }

    if !out.is_empty() {
        entry.attrs = Some(out);
    }
}

pub fn normalize_all_entry_attrs(entries: &mut [Entry]) {
    for entry in entries.iter_mut() {
        normalize_entry_attrs(entry);
    }
}

fn is_extra_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix("extra") else {
        return false;
    };
    let digits = rest.strip_suffix("_label").unwrap_or(rest);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn coerce_number(value: Value) -> Value {
    if let Value::String(s) = &value {
        let cleaned: String = s
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();
        if let Some(n) = cleaned.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    value
}

/// `billing_period` -> `Billing Period`
pub fn title_case(s: &str) -> String {
    s.replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
