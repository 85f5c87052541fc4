//! Expansion of parameter specifications into value sequences.

use lab_core::errors::{ErrorInfo, LabError};

use crate::config::{ParamValue, ParameterSpec, RangeSpec};

/// Relative slack (in units of `step`) within which a float term still counts as `<= max`.
pub const BOUNDARY_TOLERANCE: f64 = 1e-9;
/// Largest number of values a single range may expand to.
pub const MAX_RANGE_VALUES: usize = 1_000_000;
/// Significant digits kept in float range terms.
pub const FLOAT_SIGNIFICANT_DIGITS: usize = 12;

fn range_error(param: &str, code: &str, message: impl Into<String>) -> LabError {
    LabError::Config(ErrorInfo::new(code, message).with_context("param", param))
}

/// Expands a parameter specification into its ordered sequence of values.
///
/// Scalars yield one value and explicit lists are returned unchanged. Ranges
/// whose bounds and step are all integers use exact integer arithmetic; any
/// float switches to float arithmetic where a term within
/// `|step| * BOUNDARY_TOLERANCE` of `max` is kept and every term is rounded
/// to [`FLOAT_SIGNIFICANT_DIGITS`], so `0.1 * 3` becomes `0.3`.
pub fn expand(param: &str, spec: &ParameterSpec) -> Result<Vec<ParamValue>, LabError> {
    match spec {
        ParameterSpec::Scalar(value) => Ok(vec![value.clone()]),
        ParameterSpec::List(values) if values.is_empty() => Err(range_error(
            param,
            "config.list_empty",
            "explicit value list is empty",
        )),
        ParameterSpec::List(values) => Ok(values.clone()),
        ParameterSpec::Range(range) => expand_range(param, range),
        ParameterSpec::File { .. } => Err(range_error(
            param,
            "config.file_param_expand",
            "file parameters are resolved per run and have no value range",
        )),
    }
}

fn expand_range(param: &str, range: &RangeSpec) -> Result<Vec<ParamValue>, LabError> {
    let Some(max) = &range.max else {
        return Err(LabError::Config(
            ErrorInfo::new("config.range_max", "numeric range is missing `max`")
                .with_context("param", param)
                .with_hint("add a `max` key to the range"),
        ));
    };
    let values = match (&range.min, max, &range.step) {
        (ParamValue::Int(min), ParamValue::Int(max), ParamValue::Int(step)) => {
            expand_int(param, *min, *max, *step)?
        }
        (min, max, step) => {
            let (Some(min), Some(max), Some(step)) = (min.as_f64(), max.as_f64(), step.as_f64())
            else {
                return Err(range_error(
                    param,
                    "config.range_numeric",
                    "range bounds and step must be numeric",
                ));
            };
            expand_float(param, min, max, step)?
        }
    };
    if values.is_empty() {
        return Err(LabError::Config(
            ErrorInfo::new("config.range_empty", "numeric range yields no values")
                .with_context("param", param)
                .with_hint("`min` must not exceed `max`"),
        ));
    }
    Ok(values)
}

fn expand_int(param: &str, min: i64, max: i64, step: i64) -> Result<Vec<ParamValue>, LabError> {
    if step <= 0 {
        return Err(range_error(
            param,
            "config.range_step",
            format!("range step must be positive, got {step}"),
        ));
    }
    let (min, max, step) = (i128::from(min), i128::from(max), i128::from(step));
    if max < min {
        return Ok(Vec::new());
    }
    let count = (max - min) / step + 1;
    if count > MAX_RANGE_VALUES as i128 {
        return Err(too_large(param, &count.to_string()));
    }
    // Every term lies in `min..=max`, so it fits back into i64.
    Ok((0..count)
        .map(|idx| ParamValue::Int((min + idx * step) as i64))
        .collect())
}

fn too_large(param: &str, count: &str) -> LabError {
    LabError::Config(
        ErrorInfo::new(
            "config.range_too_large",
            format!("range expands to {count} values, more than {MAX_RANGE_VALUES}"),
        )
        .with_context("param", param)
        .with_hint("raise `step` or narrow `min`/`max`"),
    )
}

fn expand_float(param: &str, min: f64, max: f64, step: f64) -> Result<Vec<ParamValue>, LabError> {
    if step.is_nan() || step <= 0.0 || step.is_infinite() {
        return Err(range_error(
            param,
            "config.range_step",
            format!("range step must be positive, got {step}"),
        ));
    }
    if !min.is_finite() || !max.is_finite() {
        return Err(range_error(
            param,
            "config.range_numeric",
            "range bounds must be finite",
        ));
    }
    let span = (max - min) / step;
    if span < -BOUNDARY_TOLERANCE {
        return Ok(Vec::new());
    }
    let last = (span + BOUNDARY_TOLERANCE).floor();
    if !last.is_finite() || last >= MAX_RANGE_VALUES as f64 {
        return Err(too_large(param, &format!("{}", last + 1.0)));
    }
    let count = last as usize + 1;
    let limit = max + step * BOUNDARY_TOLERANCE;
    Ok((0..count)
        .map(|idx| min + step * idx as f64)
        .filter(|term| *term <= limit)
        .map(|term| ParamValue::Float(round_significant(term)))
        .collect())
}

/// Drops the accumulated binary noise of `min + step * idx` past
/// [`FLOAT_SIGNIFICANT_DIGITS`] digits.
fn round_significant(value: f64) -> f64 {
    if value == 0.0 {
        return 0.0;
    }
    format!("{:.*e}", FLOAT_SIGNIFICANT_DIGITS - 1, value)
        .parse()
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<ParamValue> {
        values.iter().copied().map(ParamValue::Int).collect()
    }

    #[test]
    fn negative_integer_ranges() {
        let values = expand_int("x", -4, 1, 2).unwrap();
        assert_eq!(values, ints(&[-4, -2, 0]));
    }

    #[test]
    fn integer_range_near_i64_max_does_not_overflow() {
        let values = expand_int("x", i64::MAX - 1, i64::MAX, 5).unwrap();
        assert_eq!(values, ints(&[i64::MAX - 1]));
    }

    #[test]
    fn integer_range_over_the_cap_is_rejected() {
        let err = expand_int("x", 0, i64::MAX, 1).unwrap_err();
        assert_eq!(err.info().code, "config.range_too_large");
        assert!(expand_int("x", 0, MAX_RANGE_VALUES as i64 - 1, 1).is_ok());
    }

    #[test]
    fn float_range_over_the_cap_is_rejected() {
        let err = expand_float("x", 0.0, 1e300, 1e-10).unwrap_err();
        assert_eq!(err.info().code, "config.range_too_large");
    }

    #[test]
    fn rounding_keeps_twelve_significant_digits() {
        assert_eq!(round_significant(0.1 + 0.2), 0.3);
        assert_eq!(round_significant(-0.0), 0.0);
        assert_eq!(round_significant(1.234_567_890_123_4), 1.234_567_890_12);
    }

    #[test]
    fn nan_step_is_rejected() {
        assert!(expand_float("x", 0.0, 1.0, f64::NAN).is_err());
    }
}
