use crate::classifier::Classifier;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::collections::BTreeMap;
use std::ops::Range;
use rand::seq::SliceRandom;
use rand::Rng;
use ordered_float::OrderedFloat;

#[derive(Clone, Debug)]
pub struct Dataset<'a> {
	columns: &'a [Vec<f64>],
	targets: &'a [f64],
	classes: usize,

	index: Vec<usize>,
	range: Range<usize>,
}

impl<'a, 'b> Dataset<'a> {
	pub fn evaluate<C: Classifier + Sync>(&self, classifier: &C) -> f64 {
		self.rows()
			.zip(self.targets())
			.collect::<Vec<_>>()
			.into_par_iter()
			.filter(|(x, y)| classifier.predict(&x) == *y)
			.count() as f64 / self.rows_len() as f64
	}

	pub fn sort(&mut self, column: usize) {
		(&mut self.index[self.range.start..self.range.end])
			.sort_by_key(|&x| OrderedFloat(self.columns[column][x]));
	}

	pub fn get_splits(&'b self, column: usize) -> impl 'b + Iterator<Item = (Range<usize>, f64)> {
		let column = &self.columns[column];

		self.indices()
			.map(|x| column[x])
			.enumerate()
			.scan(None, |prev, (i, x)| {
				match *prev {
					None => {
						*prev = Some(x);
						Some(None)
					},
					Some(y) if (y - x).abs() > std::f64::EPSILON => {
						*prev = Some(x);
						Some(Some((0..i, (x + y) / 2.0)))
					},
					Some(_) => Some(None),
				}
			})
			.filter_map(|t| t)
	}

	pub fn split<F, T>(&mut self, row: usize, mut f: F) -> (T, T)
	where
		F: FnMut(&mut Self) -> T,
	{
		let row = row + self.range.start;
		let original = self.range.clone();

		self.range.end = row;
		let left = f(self);
		self.range.end = original.end;

		self.range.start = row;
		let right = f(self);
		self.range.start = original.start;

		(left, right)
	}

	/// Splits into `(train, test)` keeping the class proportions of `self` in both.
	///
	/// The test side gets `ceil(rows * test_rate)` rows. Each class gives the
	/// floor of its share, and the leftover rows go to the classes with the
	/// largest fractional share, lowest class first on ties.
	pub fn stratified_split<R: Rng + ?Sized>(mut self, rng: &mut R, test_rate: f64) -> (Self, Self) {
		let mut by_class: BTreeMap<OrderedFloat<f64>, Vec<usize>> = BTreeMap::new();
		for i in self.indices() {
			by_class.entry(OrderedFloat(self.targets[i])).or_default().push(i);
		}

		let test_num = (self.rows_len() as f64 * test_rate).ceil() as usize;
		let mut allocation = by_class
			.values()
			.map(|rows| {
				let exact = rows.len() as f64 * test_rate;
				(exact.floor() as usize, exact - exact.floor())
			})
			.collect::<Vec<_>>();

		let mut order = (0..allocation.len()).collect::<Vec<_>>();
		order.sort_by(|&a, &b| {
			OrderedFloat(allocation[b].1)
				.cmp(&OrderedFloat(allocation[a].1))
				.then(a.cmp(&b))
		});

		let mut remainder = test_num.saturating_sub(allocation.iter().map(|(n, _)| n).sum());
		for class in order {
			if remainder == 0 {
				break;
			}
			allocation[class].0 += 1;
			remainder -= 1;
		}

		let mut test = Vec::with_capacity(test_num);
		let mut train = Vec::with_capacity(self.rows_len() - test_num.min(self.rows_len()));
		for (mut rows, (take, _)) in by_class.into_values().zip(allocation) {
			rows.shuffle(rng);
			let take = take.min(rows.len());
			test.extend_from_slice(&rows[..take]);
			train.extend_from_slice(&rows[take..]);
		}
		test.shuffle(rng);
		train.shuffle(rng);

		let test_len = test.len();
		test.extend(train);
		self.range = 0..test.len();
		self.index = test;

		let mut train = self.clone();
		let mut test = self;
		test.range.end = test_len;
		train.range.start = test_len;

		(train, test)
	}

	pub fn bootstrap<R: Rng + ?Sized>(&self, rng: &mut R, max_samples: usize) -> Self {
		let samples = std::cmp::min(max_samples, self.rows_len());

		let range = 0..samples;
		let index = range
			.clone()
			.map(|_| self.index[rng.gen_range(self.range.start, self.range.end)])
			.collect::<Vec<_>>();

		Self {
			index,
			range,
			columns: self.columns,
			targets: self.targets,
			classes: self.classes,
		}
	}

	fn indices(&'b self) -> impl 'b + Iterator<Item = usize> + Clone {
		self.index[self.range.start..self.range.end]
			.iter()
			.map(|&x| x)
	}

	pub fn targets(&'b self) -> impl 'b + Iterator<Item = f64> {
		self.indices()
			.map(|i| self.targets[i])
	}

	pub fn column(&'b self, column: usize) -> impl 'b + Iterator<Item = f64> {
		let column = &self.columns[column];

		self.indices()
			.map(|i| column[i])
	}

	pub fn features_len(&self) -> usize {
		self.columns.len()
	}

	pub fn classes_len(&self) -> usize {
		self.classes
	}

	pub fn rows_len(&self) -> usize {
		self.range.end - self.range.start
	}

	pub fn rows(&'b self) -> impl 'b + Iterator<Item = Vec<f64>> {
		self.indices().map(move |i| {
			(0..self.columns.len())
				.map(|j| self.columns[j][i])
				.collect()
		})
	}

	pub fn classify<C: Classifier + Sized>(&self, classifier: &C) -> Vec<f64> {
		self.rows()
			.map(|x| classifier.predict(&x))
			.collect()
	}
}

#[derive(Debug, Default)]
pub struct Builder {
	columns: Vec<Vec<f64>>,
	targets: Vec<f64>,
}

impl Builder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn build(&self) -> Dataset<'_> {
		let range = 0..self.targets.len();

		Dataset {
			columns: &self.columns,
			targets: &self.targets,
			classes: self.classes_len(),

			range: range.clone(),
			index: range.collect(),
		}
	}

	pub fn add(&mut self, x: &[f64], y: f64) {
		if self.columns.is_empty() {
			self.columns = vec![Vec::new(); x.len()];
		}

		for (column, value) in self.columns.iter_mut().zip(x) {
			column.push(*value);
		}

		self.targets.push(y);
	}

	/// Features of the `i`th row in insertion order.
	pub fn row(&self, i: usize) -> Option<Vec<f64>> {
		if i >= self.targets.len() {
			return None;
		}

		Some(self.columns.iter().map(|column| column[i]).collect())
	}

	pub fn rows_len(&self) -> usize {
		self.targets.len()
	}

	pub fn features_len(&self) -> usize {
		self.columns.len()
	}

	/// Labels are class indices, so this is one past the largest label.
	pub fn classes_len(&self) -> usize {
		self.targets
			.iter()
			.map(|&y| y as usize + 1)
			.max()
			.unwrap_or(0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::rngs::StdRng;
	use rand::SeedableRng;

	fn three_classes(per_class: usize) -> Builder {
		let mut builder = Builder::new();
		for class in 0..3 {
			for i in 0..per_class {
				builder.add(&[class as f64 * 10.0 + i as f64, i as f64], class as f64);
			}
		}
		builder
	}

	fn count_class(dataset: &Dataset, class: f64) -> usize {
		dataset.targets().filter(|&y| y == class).count()
	}

	#[test]
	fn stratified_split_keeps_class_proportions() {
		let builder = three_classes(50);
		let mut rng = StdRng::seed_from_u64(42);
		let (train, test) = builder.build().stratified_split(&mut rng, 0.2);

		assert_eq!(test.rows_len(), 30);
		assert_eq!(train.rows_len(), 120);
		for class in 0..3 {
			assert_eq!(count_class(&test, class as f64), 10);
			assert_eq!(count_class(&train, class as f64), 40);
		}
	}

	#[test]
	fn stratified_split_hands_remainder_to_largest_fraction() {
		let mut builder = Builder::new();
		for _ in 0..7 {
			builder.add(&[0.0], 0.0);
		}
		for _ in 0..3 {
			builder.add(&[1.0], 1.0);
		}

		let mut rng = StdRng::seed_from_u64(0);
		let (train, test) = builder.build().stratified_split(&mut rng, 0.25);

		// ceil(10 * 0.25) = 3; floors are 1 and 0, fractions 0.75 and 0.75.
		assert_eq!(test.rows_len(), 3);
		assert_eq!(count_class(&test, 0.0), 2);
		assert_eq!(count_class(&test, 1.0), 1);
		assert_eq!(train.rows_len(), 7);
	}

	#[test]
	fn stratified_split_is_deterministic_for_a_seed() {
		let builder = three_classes(20);
		let split = |seed| {
			let mut rng = StdRng::seed_from_u64(seed);
			let (train, test) = builder.build().stratified_split(&mut rng, 0.3);
			(train.column(0).collect::<Vec<_>>(), test.column(0).collect::<Vec<_>>())
		};

		assert_eq!(split(7), split(7));
	}

	#[test]
	fn split_partitions_are_disjoint() {
		let builder = three_classes(10);
		let mut rng = StdRng::seed_from_u64(1);
		let (train, test) = builder.build().stratified_split(&mut rng, 0.2);

		let mut all = train.column(0).chain(test.column(0)).collect::<Vec<_>>();
		all.sort_by_key(|&x| OrderedFloat(x));
		all.dedup();
		assert_eq!(all.len(), 30);
	}

	#[test]
	fn splits_lie_between_distinct_values() {
		let mut builder = Builder::new();
		for &(x, y) in &[(3.0, 1.0), (1.0, 0.0), (1.0, 0.0), (2.0, 1.0)] {
			builder.add(&[x], y);
		}

		let mut dataset = builder.build();
		dataset.sort(0);
		let splits = dataset.get_splits(0).collect::<Vec<_>>();
		assert_eq!(splits, vec![(0..2, 1.5), (0..3, 2.5)]);
	}

	#[test]
	fn bootstrap_draws_from_the_view() {
		let builder = three_classes(10);
		let mut rng = StdRng::seed_from_u64(3);
		let (train, _) = builder.build().stratified_split(&mut rng, 0.5);
		let bag = train.bootstrap(&mut rng, 100);

		assert_eq!(bag.rows_len(), train.rows_len());
		let allowed = train.column(0).map(OrderedFloat).collect::<Vec<_>>();
		assert!(bag.column(0).all(|x| allowed.contains(&OrderedFloat(x))));
	}

	#[test]
	fn builder_reports_shape() {
		let builder = three_classes(4);
		assert_eq!(builder.rows_len(), 12);
		assert_eq!(builder.features_len(), 2);
		assert_eq!(builder.classes_len(), 3);
		assert_eq!(builder.row(4), Some(vec![10.0, 0.0]));
		assert_eq!(builder.row(12), None);
	}
}
