//! Evaluation metrics for the fitted classifier.

use std::fmt;

use crate::classifier::Classifier;
use crate::dataset::Dataset;

#[derive(Debug, Clone, PartialEq)]
/// Confusion matrix for a `K`-class classifier.
pub struct ConfusionMatrix {
	pub n_classes: usize,
	/// Row-major `KxK` counts (`truth * K + predicted`).
	pub counts: Vec<u32>,
}

impl ConfusionMatrix {
	pub fn new(n_classes: usize) -> Self {
		Self {
			n_classes,
			counts: vec![0; n_classes * n_classes],
		}
	}

	/// Predicts every row of `dataset` and tallies it against its label.
	pub fn from_dataset<C: Classifier>(classifier: &C, dataset: &Dataset) -> Self {
		let mut cm = Self::new(dataset.classes_len());

		for (predicted, truth) in dataset.classify(classifier).into_iter().zip(dataset.targets()) {
			cm.add(truth as usize, predicted as usize);
		}

		cm
	}

	pub fn add(&mut self, truth: usize, predicted: usize) {
		if truth >= self.n_classes || predicted >= self.n_classes {
			return;
		}
		let idx = truth * self.n_classes + predicted;
		self.counts[idx] = self.counts[idx].saturating_add(1);
	}

	pub fn get(&self, truth: usize, predicted: usize) -> u32 {
		self.counts[truth * self.n_classes + predicted]
	}

	pub fn total(&self) -> u32 {
		self.counts.iter().sum()
	}

	pub fn accuracy(&self) -> f64 {
		let total = self.total();
		if total == 0 {
			return 0.0;
		}

		let correct = (0..self.n_classes).map(|i| self.get(i, i)).sum::<u32>();
		correct as f64 / total as f64
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
	pub name: String,
	pub precision: f64,
	pub recall: f64,
	pub f1: f64,
	pub support: u32,
}

/// Per-class precision, recall and F1, plus the usual averages.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
	pub classes: Vec<ClassMetrics>,
	pub accuracy: f64,
	pub support: u32,
}

impl ClassificationReport {
	/// `names[i]` labels class `i`; missing names fall back to the index.
	pub fn new(cm: &ConfusionMatrix, names: &[&str]) -> Self {
		let k = cm.n_classes;
		let classes = (0..k)
			.map(|class| {
				let tp = cm.get(class, class) as f64;
				let support = (0..k).map(|j| cm.get(class, j)).sum::<u32>();
				let predicted = (0..k).map(|i| cm.get(i, class)).sum::<u32>();

				let precision = ratio(tp, predicted as f64);
				let recall = ratio(tp, support as f64);
				let f1 = ratio(2.0 * precision * recall, precision + recall);

				ClassMetrics {
					name: names.get(class).map(|s| s.to_string()).unwrap_or_else(|| class.to_string()),
					precision,
					recall,
					f1,
					support,
				}
			})
			.collect();

		Self {
			classes,
			accuracy: cm.accuracy(),
			support: cm.total(),
		}
	}

	pub fn macro_avg(&self) -> (f64, f64, f64) {
		let n = self.classes.len() as f64;
		if n == 0.0 {
			return (0.0, 0.0, 0.0);
		}

		let (p, r, f) = self.sum_by(|_| 1.0);
		(p / n, r / n, f / n)
	}

	pub fn weighted_avg(&self) -> (f64, f64, f64) {
		if self.support == 0 {
			return (0.0, 0.0, 0.0);
		}

		let total = self.support as f64;
		let (p, r, f) = self.sum_by(|c| c.support as f64);
		(p / total, r / total, f / total)
	}

	fn sum_by(&self, weight: impl Fn(&ClassMetrics) -> f64) -> (f64, f64, f64) {
		self.classes.iter().fold((0.0, 0.0, 0.0), |(p, r, f), c| {
			let w = weight(c);
			(p + w * c.precision, r + w * c.recall, f + w * c.f1)
		})
	}
}

fn ratio(num: f64, den: f64) -> f64 {
	if den == 0.0 { 0.0 } else { num / den }
}

impl fmt::Display for ClassificationReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let width = self.classes
			.iter()
			.map(|c| c.name.len())
			.chain(std::iter::once("weighted avg".len()))
			.max()
			.unwrap_or(0);

		writeln!(f, "{:>width$} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
		writeln!(f)?;
		for c in &self.classes {
			writeln!(f, "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}", c.name, c.precision, c.recall, c.f1, c.support)?;
		}
		writeln!(f)?;
		writeln!(f, "{:>width$} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, self.support)?;

		let (p, r, f1) = self.macro_avg();
		writeln!(f, "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}", "macro avg", p, r, f1, self.support)?;
		let (p, r, f1) = self.weighted_avg();
		write!(f, "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}", "weighted avg", p, r, f1, self.support)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_matrix() -> ConfusionMatrix {
		let mut cm = ConfusionMatrix::new(2);
		// truth 0: 3 right, 1 wrong; truth 1: 2 right.
		for _ in 0..3 {
			cm.add(0, 0);
		}
		cm.add(0, 1);
		cm.add(1, 1);
		cm.add(1, 1);
		cm
	}

	#[test]
	fn ignores_out_of_range_labels() {
		let mut cm = ConfusionMatrix::new(2);
		cm.add(2, 0);
		cm.add(0, 5);
		assert_eq!(cm.total(), 0);
		assert_eq!(cm.accuracy(), 0.0);
	}

	#[test]
	fn per_class_scores() {
		let report = ClassificationReport::new(&sample_matrix(), &["a", "b"]);

		assert_eq!(report.classes.len(), 2);
		assert_eq!(report.support, 6);
		assert!((report.accuracy - 5.0 / 6.0).abs() < 1e-12);

		let a = &report.classes[0];
		assert_eq!(a.name, "a");
		assert_eq!(a.support, 4);
		assert!((a.precision - 1.0).abs() < 1e-12);
		assert!((a.recall - 0.75).abs() < 1e-12);
		assert!((a.f1 - 6.0 / 7.0).abs() < 1e-12);

		let b = &report.classes[1];
		assert!((b.precision - 2.0 / 3.0).abs() < 1e-12);
		assert!((b.recall - 1.0).abs() < 1e-12);
	}

	#[test]
	fn averages() {
		let report = ClassificationReport::new(&sample_matrix(), &["a", "b"]);

		let (p, r, _) = report.macro_avg();
		assert!((p - (1.0 + 2.0 / 3.0) / 2.0).abs() < 1e-12);
		assert!((r - 0.875).abs() < 1e-12);

		let (_, r, _) = report.weighted_avg();
		assert!((r - 5.0 / 6.0).abs() < 1e-12);
	}

	#[test]
	fn missing_names_fall_back_to_index() {
		let report = ClassificationReport::new(&sample_matrix(), &["only"]);
		assert_eq!(report.classes[1].name, "1");
	}

	#[test]
	fn renders_one_row_per_class() {
		let report = ClassificationReport::new(&sample_matrix(), &["a", "b"]);
		let text = report.to_string();

		assert!(text.contains("precision"));
		assert!(text.contains("macro avg"));
		assert!(text.lines().any(|l| l.trim_start().starts_with("b ")));
	}
}
