use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::dataset::Dataset;
use crate::classifier::Classifier;
use crate::decision_tree::{DecisionTreeBuilder, DecisionTree};
use crate::node;

#[derive(Debug, Clone)]
pub struct RandomForestBuilder {
    pub n_trees: usize,
    pub max_depth: usize,
    /// Bootstrap size as a fraction of the training rows.
    pub bag_amount: f64,
    pub seed: u64,
}

impl Default for RandomForestBuilder {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 3,
            bag_amount: 1.0,
            seed: 42,
        }
    }
}

impl RandomForestBuilder {
    /// Fits every tree in parallel. Each tree draws from its own generator
    /// derived from `seed`, so the forest does not depend on scheduling.
    pub fn fit(&self, dataset: Dataset) -> RandomForestClassifier {
        let feature_len = (dataset.features_len() as f64).sqrt().ceil() as usize;
        let whole = Instant::now();
        let done = AtomicUsize::new(0);

        let forest = self.get_rngs()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|mut rng| {
                let now = Instant::now();
                let tree = self.fit_tree(&mut rng, &dataset, feature_len);

                let i = done.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(
                    "[{:.1}%] tree {} fitted in {:.2?} (depth {})",
                    i as f64 / self.n_trees as f64 * 100.0,
                    i,
                    now.elapsed(),
                    tree.depth(),
                );

                tree
            })
            .collect::<Vec<_>>();

        tracing::debug!("Fitted {} trees in {:.2?}", forest.len(), whole.elapsed());

        let importances = average_importances(&forest, dataset.features_len());

        RandomForestClassifier {
            forest,
            classes: dataset.classes_len(),
            features: dataset.features_len(),
            importances,
        }
    }

    fn fit_tree<R: Rng + ?Sized>(&self, rng: &mut R, dataset: &Dataset, feature_len: usize) -> DecisionTree {
        let builder = DecisionTreeBuilder {
            max_features: Some(feature_len),
            max_depth: self.max_depth,
        };

        let max_samples = (dataset.rows_len() as f64 * self.bag_amount) as usize;
        let bootstrapped = dataset.bootstrap(rng, max_samples);

        builder.fit(rng, bootstrapped)
    }

    fn get_rngs(&self) -> impl Iterator<Item = StdRng> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..self.n_trees).map(move |_| {
            let mut seed = [0u8; 32];
            rng.fill(&mut seed);
            StdRng::from_seed(seed)
        })
    }
}

fn average_importances(forest: &[DecisionTree], features: usize) -> Vec<f64> {
    let mut total = vec![0.0; features];

    for tree in forest {
        for (sum, value) in total.iter_mut().zip(tree.feature_importances()) {
            *sum += value;
        }
    }

    let norm = total.iter().sum::<f64>();
    if norm > 0.0 {
        for value in &mut total {
            *value /= norm;
        }
    }

    total
}

#[derive(Debug, Clone, PartialEq)]
pub struct RandomForestClassifier {
    forest: Vec<DecisionTree>,
    classes: usize,
    features: usize,
    importances: Vec<f64>,
}

impl RandomForestClassifier {
    pub fn n_trees(&self) -> usize {
        self.forest.len()
    }

    pub fn classes_len(&self) -> usize {
        self.classes
    }

    pub fn features_len(&self) -> usize {
        self.features
    }

    /// Mean decrease in impurity per feature, normalized to sum to 1.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }
}

impl Classifier for RandomForestClassifier {
    fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.classes];

        for tree in &self.forest {
            for (sum, value) in proba.iter_mut().zip(tree.predict_proba(x)) {
                *sum += value;
            }
        }

        if !self.forest.is_empty() {
            let n = self.forest.len() as f64;
            for value in &mut proba {
                *value /= n;
            }
        }

        proba
    }

    fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u16::<BigEndian>(self.classes as u16)?;
        writer.write_u16::<BigEndian>(self.features as u16)?;
        node::write_values(writer, &self.importances)?;
        writer.write_u16::<BigEndian>(self.forest.len() as u16)?;

        for tree in &self.forest {
            tree.serialize(writer)?;
        }

        Ok(())
    }

    fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let classes = reader.read_u16::<BigEndian>()? as usize;
        let features = reader.read_u16::<BigEndian>()? as usize;
        let importances = node::read_values(reader)?;
        if importances.len() != features {
            return Err(node::invalid_data(format!(
                "forest has {} importances, expected {}",
                importances.len(),
                features,
            )));
        }
        let len = reader.read_u16::<BigEndian>()?;

        let forest = (0..len)
            .map(|_| {
                let tree = DecisionTree::deserialize(reader)?;
                tree.validate(features, classes)?;
                Ok(tree)
            })
            .collect::<std::io::Result<Vec<DecisionTree>>>()?;

        Ok(Self {
            forest,
            classes,
            features,
            importances,
        })
    }
}
