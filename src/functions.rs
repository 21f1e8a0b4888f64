use std::collections::BTreeMap;
use ordered_float::OrderedFloat;

// Ordered so that float sums and tie breaks come out the same on every run.
pub type Histogram = BTreeMap<OrderedFloat<f64>, usize>;

pub fn histogram(values: impl Iterator<Item = f64>) -> (Histogram, usize) {
	let mut histogram = BTreeMap::new();
	let mut len = 0;

	for value in values {
		*histogram.entry(OrderedFloat(value)).or_default() += 1;
		len += 1;
	}

	(histogram, len)
}

pub fn gini_val(histogram: &Histogram, len: usize) -> f64 {
	1.0 - histogram
		.iter()
		.map(|(_, &n)| (n as f64 / len as f64).powi(2))
		.sum::<f64>()
}

pub fn gini(values: impl Iterator<Item = f64>) -> f64 {
	let (histogram, len) = histogram(values);
	gini_val(&histogram, len)
}

/// Fraction of `values` falling in each class `0..classes`.
pub fn distribution(values: impl Iterator<Item = f64>, classes: usize) -> Vec<f64> {
	let mut counts = vec![0usize; classes];
	let mut len = 0;

	for value in values {
		if let Some(count) = counts.get_mut(value as usize) {
			*count += 1;
		}
		len += 1;
	}

	if len == 0 {
		return vec![0.0; classes];
	}

	counts
		.into_iter()
		.map(|n| n as f64 / len as f64)
		.collect()
}

/// Index of the first maximum.
pub fn argmax(values: &[f64]) -> usize {
	values
		.iter()
		.enumerate()
		.fold((0, f64::MIN), |(best, max), (i, &v)| if v > max { (i, v) } else { (best, max) })
		.0
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn gini_of_pure_set_is_zero() {
		assert_eq!(gini([1.0, 1.0, 1.0].iter().copied()), 0.0);
	}

	#[test]
	fn gini_of_even_two_class_set_is_half() {
		assert!((gini([0.0, 1.0, 0.0, 1.0].iter().copied()) - 0.5).abs() < 1e-12);
	}

	#[test]
	fn distribution_is_fraction_per_class() {
		let dist = distribution([0.0, 0.0, 2.0, 1.0].iter().copied(), 3);
		assert_eq!(dist, vec![0.5, 0.25, 0.25]);
	}

	#[test]
	fn argmax_prefers_first_on_ties() {
		assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
		assert_eq!(argmax(&[1.0, 0.0, 0.0]), 0);
	}
}
