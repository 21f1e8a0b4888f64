use std::io::{Read, Write};
use rand::Rng;
use rand::seq::SliceRandom as _;
use ordered_float::OrderedFloat;

use crate::dataset::Dataset;
use crate::node::{self, Node, Split};
use crate::classifier::Classifier;
use crate::functions::{self, gini, gini_val, distribution, Histogram};

// Sliding window of gini
// https://arxiv.org/pdf/1403.6348.pdf
struct SlidingGini {
	n: usize,
	ni: Histogram,
	g: f64
}

impl SlidingGini {
	pub fn new(targets: impl Iterator<Item = f64>) -> Self {
		let (histogram, len) = functions::histogram(targets);

		Self {
			n: len,
			g: gini_val(&histogram, len),
			ni: histogram,
		}
	}

	pub fn inc(&mut self, typ: OrderedFloat<f64>) {
		let entry = self.ni.entry(typ).or_insert(0);
		*entry += 1;
		self.n += 1;
		self.g = 1.0 - 1.0 / (self.n as f64).powi(2) * (((self.n - 1) as f64).powi(2) * (1.0 - self.g) + 2.0 * *entry as f64 - 1.0);
	}

	pub fn dec(&mut self, typ: OrderedFloat<f64>) {
		let entry = self.ni.entry(typ).or_insert(0);
		*entry -= 1;
		self.n -= 1;
		self.g = 1.0 - 1.0 / (self.n as f64).powi(2) * (((self.n + 1) as f64).powi(2) * (1.0 - self.g) - 2.0 * *entry as f64 - 1.0);
	}

	pub fn gini(&self) -> f64 {
		self.g
	}
}

struct NodeBuilder<R> {
	max_features: usize,
	max_depth: usize,
	classes: usize,
	// Impurity decrease per column, weighted by rows reaching the split.
	importances: Vec<f64>,
	rng: R
}

impl<R: Rng> NodeBuilder<R> {
	fn leaf(&self, dataset: &Dataset) -> Node {
		Node::Leaf(distribution(dataset.targets(), self.classes))
	}

	fn build(&mut self, dataset: &mut Dataset, depth: usize) -> Node {
		if depth > self.max_depth || dataset.rows_len() < 2 {
			return self.leaf(dataset);
		}

		let impurity = gini(dataset.targets());
		if impurity <= 0.0 {
			return self.leaf(dataset);
		}

		let mut best_split: Option<Split> = None;
		let mut best_gain = std::f64::MIN;
		let columns = (0..dataset.features_len()).collect::<Vec<usize>>();
		let max_features = std::cmp::min(columns.len(), self.max_features);

		for &column in columns.choose_multiple(&mut self.rng, max_features) {
			dataset.sort(column);

			let mut left_window: Option<SlidingGini> = None;
			let mut right_window: Option<SlidingGini> = None;

			let mut prev_range = 0..0;
			let mut targets = dataset.targets();

			for (left, value) in dataset.get_splits(column) {
				// The first split seeds both windows. The loop still has to drain
				// the rows it covers so `targets` stays aligned with the split.
				let mut do_inc = true;
				for _ in prev_range.end..left.end {
					let cls = match targets.next() {
						Some(y) => OrderedFloat(y),
						None => break,
					};

					if do_inc {
						if let Some(window) = &mut left_window {
							window.inc(cls);

							if let Some(window) = &mut right_window {
								window.dec(cls);
							}
						} else {
							left_window = Some(SlidingGini::new(dataset.targets().take(left.end).skip(left.start)));
							right_window = Some(SlidingGini::new(dataset.targets().skip(left.end)));
							do_inc = false;
						}
					}
				}

				let impurity_l = left_window.as_ref()
					.map(SlidingGini::gini)
					.unwrap_or_else(|| gini(dataset.targets()
						.take(left.end)
						.skip(left.start)));

				let impurity_r = right_window.as_ref()
					.map(SlidingGini::gini)
					.unwrap_or_else(|| gini(dataset.targets()
						.skip(left.end)));

				let ratio_l = (left.end - left.start) as f64 / dataset.rows_len() as f64;
				let ratio_r = 1.0 - ratio_l;

				let gain = impurity - (ratio_l * impurity_l + ratio_r * impurity_r);

				if best_gain < gain {
					best_split = Some(Split { column, value });
					best_gain = gain;
				}

				prev_range = left;
			}
		}

		match best_split {
			Some(split) => {
				self.importances[split.column] += dataset.rows_len() as f64 * best_gain.max(0.0);
				self.build_children(dataset, split, depth)
			},
			None => self.leaf(dataset),
		}
	}

	fn build_children(&mut self, dataset: &mut Dataset, split: Split, depth: usize) -> Node {
		dataset.sort(split.column);

		let split_row = dataset
			.column(split.column)
			.take_while(|&f| f <= split.value)
			.count();

		let (left, right) = dataset.split(split_row, |x| Box::new(self.build(x, depth + 1)));

		Node::Children {
			left, right, split
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
	root: Node,
	importances: Vec<f64>,
}

impl DecisionTree {
	/// Impurity-based importance of each feature, summing to 1 unless the tree never split.
	pub fn feature_importances(&self) -> &[f64] {
		&self.importances
	}

	pub fn depth(&self) -> usize {
		self.root.depth()
	}

	/// Checks a decoded tree against the shape of the forest holding it.
	pub fn validate(&self, features: usize, classes: usize) -> std::io::Result<()> {
		if self.importances.len() != features {
			return Err(node::invalid_data(format!(
				"tree has {} importances, expected {}",
				self.importances.len(),
				features,
			)));
		}

		self.root.validate(features, classes)
	}
}

impl Classifier for DecisionTree {
	fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
		self.root.predict_proba(x).to_vec()
	}

	fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
		node::write_values(writer, &self.importances)?;
		self.root.serialize(writer)
	}

	fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self> {
		let importances = node::read_values(reader)?;
		let root = Node::deserialize(reader)?;

		Ok(Self {
			root,
			importances,
		})
	}
}

pub struct DecisionTreeBuilder {
	pub max_features: Option<usize>,
	pub max_depth: usize,
}

impl Default for DecisionTreeBuilder {
	fn default() -> Self {
		Self {
			max_features: None,
			max_depth: 32,
		}
	}
}

impl DecisionTreeBuilder {
	pub fn fit<R: Rng + ?Sized>(&self, rng: &mut R, mut dataset: Dataset) -> DecisionTree {
		let max_features = self.max_features.unwrap_or(dataset.features_len());
		let mut builder = NodeBuilder {
			max_features,
			max_depth: self.max_depth,
			classes: dataset.classes_len(),
			importances: vec![0.0; dataset.features_len()],
			rng
		};
		let root = builder.build(&mut dataset, 1);

		let total = builder.importances.iter().sum::<f64>();
		let importances = if total > 0.0 {
			builder.importances.iter().map(|v| v / total).collect()
		} else {
			builder.importances
		};

		DecisionTree { root, importances }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dataset::Builder;
	use rand::rngs::StdRng;
	use rand::SeedableRng;

	// Class depends on feature 0 only; feature 1 is noise.
	fn separable() -> Builder {
		let mut builder = Builder::new();
		for i in 0..30 {
			let noise = ((i * 7) % 5) as f64;
			builder.add(&[i as f64, noise], if i < 15 { 0.0 } else { 1.0 });
		}
		builder
	}

	#[test]
	fn fits_separable_data() {
		let builder = separable();
		let mut rng = StdRng::seed_from_u64(0);
		let tree = DecisionTreeBuilder::default().fit(&mut rng, builder.build());

		assert_eq!(builder.build().evaluate(&tree), 1.0);
		assert_eq!(tree.predict_proba(&[3.0, 1.0]), vec![1.0, 0.0]);
		assert_eq!(tree.predict(&[20.0, 1.0]), 1.0);
	}

	#[test]
	fn importance_goes_to_informative_feature() {
		let builder = separable();
		let mut rng = StdRng::seed_from_u64(0);
		let tree = DecisionTreeBuilder::default().fit(&mut rng, builder.build());

		assert_eq!(tree.feature_importances(), &[1.0, 0.0]);
	}

	#[test]
	fn respects_max_depth() {
		let mut builder = Builder::new();
		for i in 0..64 {
			builder.add(&[i as f64], (i % 2) as f64);
		}

		let mut rng = StdRng::seed_from_u64(0);
		let tree = DecisionTreeBuilder {
			max_features: None,
			max_depth: 3,
		}.fit(&mut rng, builder.build());

		assert!(tree.depth() <= 3);
	}

	#[test]
	fn pure_dataset_is_a_single_leaf() {
		let mut builder = Builder::new();
		for i in 0..5 {
			builder.add(&[i as f64], 0.0);
		}

		let mut rng = StdRng::seed_from_u64(0);
		let tree = DecisionTreeBuilder::default().fit(&mut rng, builder.build());

		assert_eq!(tree.depth(), 0);
		assert_eq!(tree.feature_importances(), &[0.0]);
	}

	#[test]
	fn serialization_round_trips() -> std::io::Result<()> {
		let builder = separable();
		let mut rng = StdRng::seed_from_u64(5);
		let tree = DecisionTreeBuilder::default().fit(&mut rng, builder.build());

		let mut buffer = Vec::new();
		tree.serialize(&mut buffer)?;
		let restored = DecisionTree::deserialize(&mut buffer.as_slice())?;

		assert_eq!(restored, tree);
		Ok(())
	}
}
