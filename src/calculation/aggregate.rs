//! Batch aggregation of per-staff component values.
//!
//! Every addend is quantized to [`AGGREGATION_SCALE`] decimal places before
//! it is summed. Sums of fixed-scale decimals are exact, so the totals do not
//! depend on staff order or on how a parallel reduction splits the batch.

use std::collections::BTreeMap;

use rayon::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ComputationError;

/// Decimal places kept for each addend during aggregation.
pub const AGGREGATION_SCALE: u32 = 12;

/// Component id to batch total.
pub type ComponentTotals = BTreeMap<String, Decimal>;

fn quantize(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(AGGREGATION_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

fn add_into(
    totals: &mut ComponentTotals,
    id: &str,
    value: Decimal,
) -> Result<(), ComputationError> {
    let total = totals.entry(id.to_string()).or_insert(Decimal::ZERO);
    *total = total
        .checked_add(value)
        .ok_or_else(|| ComputationError::Overflow { id: id.to_string() })?;
    Ok(())
}

fn accumulate(
    mut totals: ComponentTotals,
    values: &ComponentTotals,
) -> Result<ComponentTotals, ComputationError> {
    for (id, value) in values {
        add_into(&mut totals, id, quantize(*value))?;
    }
    Ok(totals)
}

/// Merges two partial totals.
///
/// Ids present in only one side are carried over unchanged.
pub fn combine_totals(
    mut left: ComponentTotals,
    right: &ComponentTotals,
) -> Result<ComponentTotals, ComputationError> {
    for (id, value) in right {
        add_into(&mut left, id, *value)?;
    }
    Ok(left)
}

/// Sums per-staff component values sequentially.
///
/// The result holds every id present in any input; an empty batch yields
/// empty totals.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::{ComponentTotals, reduce_totals};
/// use rust_decimal::Decimal;
///
/// let a = ComponentTotals::from([("BASIC".to_string(), Decimal::new(80_000, 0))]);
/// let b = ComponentTotals::from([
///     ("BASIC".to_string(), Decimal::new(80_000, 0)),
///     ("BONUS".to_string(), Decimal::new(5_000, 0)),
/// ]);
///
/// let totals = reduce_totals(&[&a, &b]).unwrap();
/// assert_eq!(totals["BASIC"], Decimal::new(160_000, 0));
/// assert_eq!(totals["BONUS"], Decimal::new(5_000, 0));
/// ```
pub fn reduce_totals(per_staff: &[&ComponentTotals]) -> Result<ComponentTotals, ComputationError> {
    per_staff
        .iter()
        .try_fold(ComponentTotals::new(), |totals, values| accumulate(totals, values))
}

/// Sums per-staff component values as a rayon fold/reduce tree.
///
/// Produces exactly the same totals as [`reduce_totals`].
pub fn reduce_totals_parallel(
    per_staff: &[&ComponentTotals],
) -> Result<ComponentTotals, ComputationError> {
    per_staff
        .par_iter()
        .try_fold(ComponentTotals::new, |totals, values| accumulate(totals, values))
        .try_reduce(ComponentTotals::new, |left, right| combine_totals(left, &right))
}
