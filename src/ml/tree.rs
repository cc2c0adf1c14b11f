// ============================================================
// Layer 5 — CART Decision Tree
// ============================================================
// Binary decision trees grown greedily on axis-aligned splits.
//
// Classification and regression share one builder. Every sample
// carries a target vector:
//
//   classification  one-hot over the classes   → leaf = class shares
//   regression      the output values          → leaf = output means
//
// With per-node sums S_k and sums of squares Q_k over n samples,
// the node cost (n × impurity) is
//
//   Gini  n - Σ S_k² / n
//   MSE   Σ (Q_k - S_k² / n)
//
// and a split is scored by how much it lowers the summed cost of
// the children. That same decrease feeds feature importances.
//
// Nodes live in a flat Vec and refer to children by index, so a
// tree serialises as plain JSON and exports directly to ONNX's
// node-list representation.

use rand::{rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    Gini,
    Mse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    All,
    Sqrt,
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All  => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt().floor() as usize).max(1),
        }
        .min(n_features)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub criterion:         Criterion,
    pub max_depth:         Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
    pub max_features:      MaxFeatures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: Vec<f64>,
    },
    /// Samples with `x[feature] <= threshold` go left.
    Split {
        feature:   usize,
        threshold: f64,
        left:      usize,
        right:     usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes:      Vec<Node>,
    pub n_features: usize,
    pub n_outputs:  usize,
}

impl DecisionTree {
    /// Grow a tree on the rows named by `samples` (duplicates allowed,
    /// which is how bootstrap weights are expressed).
    ///
    /// Returns the tree and the raw (unnormalised) impurity decrease
    /// credited to each feature.
    pub fn fit(
        x:       &[Vec<f64>],
        targets: &[Vec<f64>],
        samples: Vec<usize>,
        params:  &TreeParams,
        rng:     &mut StdRng,
    ) -> (Self, Vec<f64>) {
        let n_features = x.first().map(Vec::len).unwrap_or(0);
        let n_outputs  = targets.first().map(Vec::len).unwrap_or(0);
        let mut builder = Builder {
            x,
            targets,
            params,
            n_features,
            n_outputs,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        builder.grow(samples, 0, rng);
        let tree = DecisionTree { nodes: builder.nodes, n_features, n_outputs };
        (tree, builder.importances)
    }

    /// The leaf value reached by `row`.
    pub fn leaf_value(&self, row: &[f64]) -> &[f64] {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                Node::Leaf { value } => return value,
                Node::Split { feature, threshold, left, right } => {
                    i = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], i: usize) -> usize {
            match &nodes[i] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }
}

// ─── Builder ──────────────────────────────────────────────────────────────────

struct Builder<'a> {
    x:           &'a [Vec<f64>],
    targets:     &'a [Vec<f64>],
    params:      &'a TreeParams,
    n_features:  usize,
    n_outputs:   usize,
    nodes:       Vec<Node>,
    importances: Vec<f64>,
}

struct Accum {
    n:   f64,
    sum: Vec<f64>,
    sq:  Vec<f64>,
}

impl Accum {
    fn new(k: usize) -> Self {
        Self { n: 0.0, sum: vec![0.0; k], sq: vec![0.0; k] }
    }

    fn add(&mut self, t: &[f64], sign: f64) {
        self.n += sign;
        for (k, v) in t.iter().enumerate() {
            self.sum[k] += sign * v;
            self.sq[k]  += sign * v * v;
        }
    }

    fn cost(&self, criterion: Criterion) -> f64 {
        if self.n <= 0.0 {
            return 0.0;
        }
        match criterion {
            Criterion::Gini => self.n - self.sum.iter().map(|s| s * s).sum::<f64>() / self.n,
            Criterion::Mse  => self
                .sum
                .iter()
                .zip(&self.sq)
                .map(|(s, q)| q - s * s / self.n)
                .sum(),
        }
    }

    fn mean(&self) -> Vec<f64> {
        self.sum.iter().map(|s| s / self.n.max(1.0)).collect()
    }
}

struct BestSplit {
    feature:   usize,
    threshold: f64,
    decrease:  f64,
}

impl<'a> Builder<'a> {
    fn grow(&mut self, samples: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let mut node = Accum::new(self.n_outputs);
        for &i in &samples {
            node.add(&self.targets[i], 1.0);
        }
        let cost = node.cost(self.params.criterion);

        let stop = self.params.max_depth.is_some_and(|m| depth >= m)
            || samples.len() < self.params.min_samples_split.max(2)
            || samples.len() < 2 * self.params.min_samples_leaf.max(1)
            || cost <= 1e-12;

        let split = if stop { None } else { self.best_split(&samples, &node, cost, rng) };

        let id = self.nodes.len();
        match split {
            None => {
                self.nodes.push(Node::Leaf { value: node.mean() });
            }
            Some(best) => {
                self.importances[best.feature] += best.decrease;
                let (left, right): (Vec<usize>, Vec<usize>) = samples
                    .into_iter()
                    .partition(|&i| self.x[i][best.feature] <= best.threshold);
                // reserve the slot, children are appended after it
                self.nodes.push(Node::Leaf { value: Vec::new() });
                let l = self.grow(left,  depth + 1, rng);
                let r = self.grow(right, depth + 1, rng);
                self.nodes[id] = Node::Split {
                    feature:   best.feature,
                    threshold: best.threshold,
                    left:      l,
                    right:     r,
                };
            }
        }
        id
    }

    fn best_split(
        &self,
        samples: &[usize],
        node:    &Accum,
        cost:    f64,
        rng:     &mut StdRng,
    ) -> Option<BestSplit> {
        // Visit features in random order. After the first `k` keep
        // going only while no valid split has been found.
        let k = self.params.max_features.resolve(self.n_features);
        let mut features: Vec<usize> = (0..self.n_features).collect();
        if k < self.n_features {
            features.shuffle(rng);
        }

        let min_leaf = self.params.min_samples_leaf.max(1);
        let criterion = self.params.criterion;
        let mut best: Option<BestSplit> = None;
        let mut order = samples.to_vec();

        for (visited, &f) in features.iter().enumerate() {
            if visited >= k && best.is_some() {
                break;
            }
            order.sort_by(|&a, &b| self.x[a][f].total_cmp(&self.x[b][f]));

            let mut left  = Accum::new(self.n_outputs);
            let mut right = Accum {
                n:   node.n,
                sum: node.sum.clone(),
                sq:  node.sq.clone(),
            };

            for pos in 0..order.len() - 1 {
                let i = order[pos];
                left.add(&self.targets[i], 1.0);
                right.add(&self.targets[i], -1.0);

                let here = self.x[i][f];
                let next = self.x[order[pos + 1]][f];
                if next <= here {
                    continue;
                }
                let n_left = pos + 1;
                if n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }
                let decrease = cost - left.cost(criterion) - right.cost(criterion);
                if decrease > best.as_ref().map_or(1e-12, |b| b.decrease) {
                    best = Some(BestSplit { feature: f, threshold: (here + next) / 2.0, decrease });
                }
            }
        }
        best
    }
}
