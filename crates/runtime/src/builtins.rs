//! Built-in functions of the expression evaluator
//!
//! Every function is total: bad arguments degrade through the standard
//! coercions instead of failing. String positions are 1-based per
//! IEC 61131-3; lengths and positions clamp to non-negative. The
//! evaluator layers fault reporting (sqrt of a negative, log of a
//! non-positive) on top of these pure functions.

use rung_core::{Value, to_int};

fn num(args: &[Value], index: usize) -> f64 {
    args.get(index).map(Value::as_number).unwrap_or(0.0)
}

fn text(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::as_string).unwrap_or_default()
}

/// Length argument: clamped to >= 0
fn length(args: &[Value], index: usize) -> usize {
    to_int(num(args, index)).max(0) as usize
}

/// Position argument: 1-based, clamped to >= 1
fn position(args: &[Value], index: usize) -> usize {
    to_int(num(args, index)).max(1) as usize
}

/// Dispatch a built-in by upper-cased name.
/// Returns `None` for names this module does not provide.
pub fn call(name_upper: &str, args: &[Value]) -> Option<Value> {
    let result = match name_upper {
        // Numeric
        "ABS" => Value::Number(num(args, 0).abs()),
        "SQRT" => Value::Number(num(args, 0).sqrt()),
        "SIN" => Value::Number(num(args, 0).sin()),
        "COS" => Value::Number(num(args, 0).cos()),
        "TAN" => Value::Number(num(args, 0).tan()),
        "ASIN" => Value::Number(num(args, 0).asin()),
        "ACOS" => Value::Number(num(args, 0).acos()),
        "ATAN" => Value::Number(num(args, 0).atan()),
        "ATAN2" => Value::Number(num(args, 0).atan2(num(args, 1))),
        "LN" => Value::Number(num(args, 0).ln()),
        "LOG" => Value::Number(num(args, 0).log10()),
        "EXP" => Value::Number(num(args, 0).exp()),
        "EXPT" => Value::Number(num(args, 0).powf(num(args, 1))),
        "TRUNC" => Value::Number(num(args, 0).trunc()),
        "ROUND" => Value::Number(num(args, 0).round()),
        "MIN" => Value::Number(
            args.iter()
                .map(Value::as_number)
                .fold(f64::INFINITY, f64::min),
        ),
        "MAX" => Value::Number(
            args.iter()
                .map(Value::as_number)
                .fold(f64::NEG_INFINITY, f64::max),
        ),

        // Selection and limiting
        "SEL" => {
            let selector = args.first().map(Value::as_bool).unwrap_or(false);
            let index = if selector { 2 } else { 1 };
            args.get(index).cloned().unwrap_or(Value::Number(0.0))
        }
        "MUX" => {
            let k = to_int(num(args, 0));
            let inputs = args.len().saturating_sub(1);
            let index = if k >= 0 && (k as usize) < inputs {
                1 + k as usize
            } else {
                // Out-of-range selector falls back to IN0
                1
            };
            args.get(index).cloned().unwrap_or(Value::Number(0.0))
        }
        "LIMIT" => {
            let low = num(args, 0);
            let value = num(args, 1);
            let high = num(args, 2);
            Value::Number(value.max(low).min(high))
        }

        // Strings (1-based positions)
        "CONCAT" => {
            let mut out = String::new();
            for arg in args {
                out.push_str(&arg.as_string());
            }
            Value::Str(out)
        }
        "LEN" => Value::Number(text(args, 0).chars().count() as f64),
        "LEFT" => {
            let input = text(args, 0);
            Value::Str(input.chars().take(length(args, 1)).collect())
        }
        "RIGHT" => {
            let input = text(args, 0);
            let total = input.chars().count();
            let keep = length(args, 1).min(total);
            Value::Str(input.chars().skip(total - keep).collect())
        }
        "MID" => {
            let input = text(args, 0);
            let take = length(args, 1);
            let from = position(args, 2);
            Value::Str(input.chars().skip(from - 1).take(take).collect())
        }
        "FIND" => {
            let haystack = text(args, 0);
            let needle = text(args, 1);
            match haystack.find(&needle) {
                Some(byte_pos) => {
                    let char_pos = haystack[..byte_pos].chars().count();
                    Value::Number((char_pos + 1) as f64)
                }
                None => Value::Number(0.0),
            }
        }
        "INSERT" => {
            let input = text(args, 0);
            let insert = text(args, 1);
            let after = to_int(num(args, 2)).max(0) as usize;
            let mut out: String = input.chars().take(after).collect();
            out.push_str(&insert);
            out.extend(input.chars().skip(after));
            Value::Str(out)
        }
        "DELETE" => {
            let input = text(args, 0);
            let remove = length(args, 1);
            let from = position(args, 2);
            let mut out: String = input.chars().take(from - 1).collect();
            out.extend(input.chars().skip(from - 1 + remove));
            Value::Str(out)
        }
        "REPLACE" => {
            let input = text(args, 0);
            let replacement = text(args, 1);
            let remove = length(args, 2);
            let from = position(args, 3);
            let mut out: String = input.chars().take(from - 1).collect();
            out.push_str(&replacement);
            out.extend(input.chars().skip(from - 1 + remove));
            Value::Str(out)
        }

        _ => return None,
    };
    Some(result)
}
