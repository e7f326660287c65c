//! Normalises the encodings a history cell can arrive in into an ordered
//! numeric sequence, most recent value last.

use rust_decimal::Decimal;
use serde_json::Value;

use crate::domain::table::{parse_decimal, CellValue};
use crate::errors::HistoryParseError;

/// Parses one history cell.
///
/// Text is tried as a JSON array, then as a bracketed literal sequence
/// (`(1, 2,)`, `['1', '2']`), then as bare comma-separated numbers. Blank
/// input is an empty history, not an error.
pub fn parse_history(raw: &CellValue) -> Result<Vec<Decimal>, HistoryParseError> {
    match raw {
        CellValue::Empty => Ok(Vec::new()),
        CellValue::List(values) => Ok(values.clone()),
        CellValue::Number(value) => Ok(vec![*value]),
        CellValue::Text(text) => parse_history_text(text),
    }
}

/// Renders a sequence as JSON array text, the form [`parse_history`] tries first.
pub fn encode_history(values: &[Decimal]) -> String {
    let rendered: Vec<String> = values.iter().map(|value| value.normalize().to_string()).collect();
    format!("[{}]", rendered.join(","))
}

fn parse_history_text(text: &str) -> Result<Vec<Decimal>, HistoryParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    decode_json_array(trimmed)
        .or_else(|| decode_literal_sequence(trimmed))
        .or_else(|| split_on_commas(trimmed))
        .ok_or_else(|| HistoryParseError { raw: text.to_string() })
}

fn decode_json_array(text: &str) -> Option<Vec<Decimal>> {
    let values: Vec<Value> = serde_json::from_str(text).ok()?;
    values
        .iter()
        .map(|value| match value {
            Value::Number(number) => parse_decimal(&number.to_string()),
            Value::String(raw) => parse_decimal(raw),
            _ => None,
        })
        .collect()
}

fn decode_literal_sequence(text: &str) -> Option<Vec<Decimal>> {
    let inner = text
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .or_else(|| text.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')))?;

    let tokens: Vec<&str> = inner.split(',').map(str::trim).collect();
    let mut values = Vec::with_capacity(tokens.len());
    for (index, token) in tokens.iter().enumerate() {
        // a single trailing comma is valid literal syntax
        if token.is_empty() && index == tokens.len() - 1 {
            continue;
        }
        values.push(parse_decimal(strip_quotes(token))?);
    }
    Some(values)
}

fn split_on_commas(text: &str) -> Option<Vec<Decimal>> {
    text.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| parse_decimal(strip_quotes(token)))
        .collect()
}

fn strip_quotes(token: &str) -> &str {
    ['\'', '"']
        .iter()
        .find_map(|quote| token.strip_prefix(*quote).and_then(|rest| rest.strip_suffix(*quote)))
        .unwrap_or(token)
}
