//! Cartesian product of expanded parameter axes.

use indexmap::IndexMap;
use lab_core::errors::LabError;
use serde::Serialize;

use crate::config::{Configuration, ParamValue};
use crate::range::expand;

/// One concrete value per non-file parameter, in declaration order.
pub type Assignment = IndexMap<String, ParamValue>;

/// Expanded value sequence of a single non-file parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterAxis {
    /// Parameter name.
    pub name: String,
    /// Expanded values, never empty for a validated configuration.
    pub values: Vec<ParamValue>,
}

/// Expands every non-file parameter of `config` in declaration order.
pub fn expand_axes(config: &Configuration) -> Result<Vec<ParameterAxis>, LabError> {
    config
        .params
        .iter()
        .filter(|(_, spec)| !spec.is_file())
        .map(|(name, spec)| {
            Ok(ParameterAxis {
                name: name.clone(),
                values: expand(name, spec)?,
            })
        })
        .collect()
}

/// Cartesian product of `axes`.
///
/// The first axis varies fastest and the last slowest, so the order depends
/// only on the axis order. Every assignment lists its values in axis order.
/// With no axes a single empty assignment is produced; an axis without
/// values yields no assignments at all.
pub fn combinations(axes: &[ParameterAxis]) -> Vec<Assignment> {
    let mut outputs: Vec<Assignment> = Vec::new();
    if axes.iter().any(|axis| axis.values.is_empty()) {
        return outputs;
    }
    let mut odometer = vec![0usize; axes.len()];
    loop {
        outputs.push(
            axes.iter()
                .zip(&odometer)
                .map(|(axis, &idx)| (axis.name.clone(), axis.values[idx].clone()))
                .collect(),
        );
        if !advance(axes, &mut odometer) {
            return outputs;
        }
    }
}

/// Steps the odometer with digit 0 turning fastest; false once every digit wrapped.
fn advance(axes: &[ParameterAxis], odometer: &mut [usize]) -> bool {
    for (digit, axis) in odometer.iter_mut().zip(axes) {
        *digit += 1;
        if *digit < axis.values.len() {
            return true;
        }
        *digit = 0;
    }
    false
}
