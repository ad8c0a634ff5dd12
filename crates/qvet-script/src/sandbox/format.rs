//! Format specifications for f-string fields, e.g. `{theta:.3f}`.

use super::value::Value;
use crate::error::{ScriptError, ScriptResult};

#[derive(Debug, Default, PartialEq)]
struct Spec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    zero: bool,
    width: usize,
    grouping: bool,
    precision: Option<usize>,
    kind: Option<char>,
}

fn parse_spec(spec: &str) -> Option<Spec> {
    let chars: Vec<char> = spec.chars().collect();
    let mut out = Spec::default();
    let mut i = 0;

    let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');
    if chars.len() >= 2 && is_align(chars[1]) {
        out.fill = Some(chars[0]);
        out.align = Some(chars[1]);
        i = 2;
    } else if chars.first().copied().is_some_and(is_align) {
        out.align = Some(chars[0]);
        i = 1;
    }
    if let Some(&c @ ('+' | '-' | ' ')) = chars.get(i) {
        out.sign = Some(c);
        i += 1;
    }
    if chars.get(i) == Some(&'0') {
        out.zero = true;
        i += 1;
    }
    let start = i;
    while chars.get(i).is_some_and(char::is_ascii_digit) {
        i += 1;
    }
    if i > start {
        out.width = chars[start..i].iter().collect::<String>().parse().ok()?;
    }
    if chars.get(i) == Some(&',') {
        out.grouping = true;
        i += 1;
    }
    if chars.get(i) == Some(&'.') {
        i += 1;
        let start = i;
        while chars.get(i).is_some_and(char::is_ascii_digit) {
            i += 1;
        }
        if i == start {
            return None;
        }
        out.precision = Some(chars[start..i].iter().collect::<String>().parse().ok()?);
    }
    if let Some(&c) = chars.get(i) {
        if !"bdeEfFgGosxX%".contains(c) {
            return None;
        }
        out.kind = Some(c);
        i += 1;
    }
    (i == chars.len()).then_some(out)
}

fn group_thousands(digits: &str) -> String {
    let (int_part, rest) = match digits.find('.') {
        Some(pos) => digits.split_at(pos),
        None => (digits, ""),
    };
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped + rest
}

/// `1.5e+03` style exponent notation.
fn exponent(v: f64, precision: usize, upper: bool) -> String {
    let raw = format!("{v:.precision$e}");
    let (mantissa, exp) = raw.split_once('e').unwrap_or((&raw, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{mantissa}{e}{sign}{:02}", exp.abs())
}

/// General format: fixed or exponent depending on magnitude, trailing zeros
/// trimmed.
fn general(v: f64, precision: usize, upper: bool) -> String {
    if v == 0.0 || !v.is_finite() {
        return super::value::format_float(v);
    }
    let p = precision.max(1);
    #[allow(clippy::cast_possible_truncation)]
    let exp = v.abs().log10().floor() as i32;
    let p_i32 = i32::try_from(p).unwrap_or(i32::MAX);
    if exp < -4 || exp >= p_i32 {
        let s = exponent(v, p - 1, upper);
        let (mantissa, rest) = s.split_at(s.find(['e', 'E']).unwrap_or(s.len()));
        let mantissa = if mantissa.contains('.') {
            mantissa.trim_end_matches('0').trim_end_matches('.')
        } else {
            mantissa
        };
        format!("{mantissa}{rest}")
    } else {
        let decimals = usize::try_from(p_i32 - 1 - exp).unwrap_or(0);
        let s = format!("{v:.decimals$}");
        if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            s
        }
    }
}

fn invalid(spec: &str, value: &Value) -> ScriptError {
    ScriptError::value_error(format!(
        "Invalid format specifier '{spec}' for object of type '{}'",
        value.type_name()
    ))
}

fn too_wide(len: usize, max_len: usize) -> ScriptError {
    ScriptError::memory_error(format!(
        "formatted field of {len} characters exceeds the limit of {max_len}"
    ))
}

fn unknown_code(code: char, value: &Value) -> ScriptError {
    ScriptError::value_error(format!(
        "Unknown format code '{code}' for object of type '{}'",
        value.type_name()
    ))
}

/// Largest precision the float formatter accepts.
const MAX_PRECISION: usize = 65_535;

/// Render `value` according to a format specification. Output longer than
/// `max_len` characters is refused before anything is allocated.
pub(super) fn format_value(value: &Value, spec_text: &str, max_len: usize) -> ScriptResult<String> {
    let spec = parse_spec(spec_text).ok_or_else(|| invalid(spec_text, value))?;
    if spec.width > max_len {
        return Err(too_wide(spec.width, max_len));
    }
    let numeric = matches!(value, Value::Int(_) | Value::Float(_) | Value::Bool(_));

    let body = match (spec.kind, value) {
        (Some('s') | None, v) if !numeric || spec.kind.is_none() && spec.precision.is_none() => {
            let mut s = v.checked_str(max_len)?;
            if let (Some(p), false) = (spec.precision, numeric) {
                s = s.chars().take(p).collect();
            }
            s
        }
        (Some('s'), v) => return Err(unknown_code('s', v)),
        (Some(code @ ('d' | 'b' | 'o' | 'x' | 'X')), v) => {
            let i = match v {
                Value::Int(_) | Value::Bool(_) => v.as_int().unwrap_or(0),
                other => return Err(unknown_code(code, other)),
            };
            let magnitude = i.unsigned_abs();
            let digits = match code {
                'b' => format!("{magnitude:b}"),
                'o' => format!("{magnitude:o}"),
                'x' => format!("{magnitude:x}"),
                'X' => format!("{magnitude:X}"),
                _ => magnitude.to_string(),
            };
            if i < 0 { format!("-{digits}") } else { digits }
        }
        (code, v) => {
            let f = v
                .as_f64()
                .ok_or_else(|| unknown_code(code.unwrap_or('g'), v))?;
            let precision = spec.precision.unwrap_or(6);
            if precision > MAX_PRECISION {
                return Err(ScriptError::value_error(
                    "Too many decimal digits in format string",
                ));
            }
            // Fixed notation spells out every integer digit of the value.
            let integer_digits = if f.is_finite() && f.abs() >= 1.0 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let digits = f.abs().log10() as usize + 1;
                digits
            } else {
                1
            };
            if precision.saturating_add(integer_digits).saturating_add(4) > max_len {
                return Err(too_wide(precision + integer_digits, max_len));
            }
            match code {
                Some('f' | 'F') => format!("{f:.precision$}"),
                Some('e') => exponent(f, precision, false),
                Some('E') => exponent(f, precision, true),
                Some('%') => format!("{:.precision$}%", f * 100.0),
                Some('G') => general(f, precision, true),
                _ => general(f, precision, false),
            }
        }
    };

    let (negative, digits) = match body.strip_prefix('-') {
        Some(rest) if numeric => (true, rest.to_string()),
        _ => (false, body),
    };
    let digits = if spec.grouping && numeric {
        group_thousands(&digits)
    } else {
        digits
    };
    let sign = match (negative, spec.sign) {
        (true, _) => "-",
        (false, Some('+')) if numeric => "+",
        (false, Some(' ')) if numeric => " ",
        _ => "",
    };

    let len = sign.chars().count() + digits.chars().count();
    if len >= spec.width {
        return Ok(format!("{sign}{digits}"));
    }
    let pad = spec.width - len;
    let (fill, align) = if spec.zero && spec.align.is_none() && numeric {
        ('0', '=')
    } else {
        (
            spec.fill.unwrap_or(' '),
            spec.align.unwrap_or(if numeric { '>' } else { '<' }),
        )
    };
    let fill_str = |n: usize| std::iter::repeat_n(fill, n).collect::<String>();
    Ok(match align {
        '<' => format!("{sign}{digits}{}", fill_str(pad)),
        '^' => format!(
            "{}{sign}{digits}{}",
            fill_str(pad / 2),
            fill_str(pad - pad / 2)
        ),
        '=' => format!("{sign}{}{digits}", fill_str(pad)),
        _ => format!("{}{sign}{digits}", fill_str(pad)),
    })
}
