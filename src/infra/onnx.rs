// ============================================================
// Layer 6 — ONNX Export
// ============================================================
// Writes trained models as ONNX graphs through a small protobuf
// field writer.
//
// ONNX protobuf layout (the subset written here):
//
//   ModelProto
//     ir_version        1  varint         (always 9)
//     producer_name     2  string
//     graph             7  GraphProto
//     opset_import      8  OperatorSetIdProto (ai.onnx 15, ai.onnx.ml 1)
//   GraphProto
//     node 1, name 2, initializer 5, input 11, output 12
//   NodeProto
//     input 1, output 2, name 3, op_type 4, attribute 5, domain 7
//   AttributeProto
//     name 1, i 3, s 4, floats 7, ints 8, strings 9, type 20
//   TensorProto
//     dims 1, data_type 2, name 8, raw_data 9
//
// Graphs:
//   classifier   float_input → TreeEnsembleClassifier → label, probabilities
//   regressor    float_input → TreeEnsembleRegressor  → variable [N, targets]
//   encoder      float_input → Sub → Div → (Gemm → Relu)* → Gemm → variable
//   pca          float_input → Sub → Div → Sub → MatMul → variable
//
// The encoder and PCA graphs start from raw indicators: the
// standardisation step is folded in front of the projection.

use crate::ml::{
    autoencoder::DenseEncoder,
    forest::{Ensemble, RandomForestClassifier, RandomForestRegressor},
    pca::Pca,
    scaler::StandardScaler,
    tree::Node,
};

pub const IR_VERSION: u64 = 9;
pub const OPSET_ONNX: u64 = 15;
pub const OPSET_ML: u64 = 1;
pub const INPUT_NAME: &str = "float_input";

const ML_DOMAIN: &str = "ai.onnx.ml";
const ELEM_FLOAT: u64 = 1;
const ELEM_INT64: u64 = 7;

// ─── Protobuf Writer ──────────────────────────────────────────────────────────
#[derive(Debug, Default, Clone)]
struct Proto {
    buf: Vec<u8>,
}

impl Proto {
    fn new() -> Self {
        Self::default()
    }

    fn raw_varint(&mut self, mut v: u64) {
        while v >= 0x80 {
            self.buf.push((v as u8 & 0x7F) | 0x80);
            v >>= 7;
        }
        self.buf.push(v as u8);
    }

    fn tag(&mut self, field: u32, wire: u8) {
        self.raw_varint(((field as u64) << 3) | wire as u64);
    }

    fn varint(&mut self, field: u32, v: u64) -> &mut Self {
        self.tag(field, 0);
        self.raw_varint(v);
        self
    }

    fn int64(&mut self, field: u32, v: i64) -> &mut Self {
        // two's complement, as protobuf encodes int64
        self.varint(field, v as u64)
    }

    fn bytes(&mut self, field: u32, b: &[u8]) -> &mut Self {
        self.tag(field, 2);
        self.raw_varint(b.len() as u64);
        self.buf.extend_from_slice(b);
        self
    }

    fn string(&mut self, field: u32, s: &str) -> &mut Self {
        self.bytes(field, s.as_bytes())
    }

    fn message(&mut self, field: u32, m: &Proto) -> &mut Self {
        self.bytes(field, &m.buf)
    }

    fn packed_int64s(&mut self, field: u32, v: &[i64]) -> &mut Self {
        let mut inner = Proto::new();
        for x in v {
            inner.raw_varint(*x as u64);
        }
        self.bytes(field, &inner.buf)
    }

    fn packed_floats(&mut self, field: u32, v: &[f32]) -> &mut Self {
        let raw: Vec<u8> = v.iter().flat_map(|f| f.to_le_bytes()).collect();
        self.bytes(field, &raw)
    }
}

// ─── Graph Building Blocks ────────────────────────────────────────────────────

mod attr_type {
    pub const INT: u64 = 2;
    pub const STRING: u64 = 3;
    pub const FLOATS: u64 = 6;
    pub const INTS: u64 = 7;
    pub const STRINGS: u64 = 8;
}

fn attr_int(name: &str, v: i64) -> Proto {
    let mut a = Proto::new();
    a.string(1, name).int64(3, v).varint(20, attr_type::INT);
    a
}

fn attr_string(name: &str, v: &str) -> Proto {
    let mut a = Proto::new();
    a.string(1, name).string(4, v).varint(20, attr_type::STRING);
    a
}

fn attr_ints(name: &str, v: &[i64]) -> Proto {
    let mut a = Proto::new();
    a.string(1, name).packed_int64s(8, v).varint(20, attr_type::INTS);
    a
}

fn attr_floats(name: &str, v: &[f32]) -> Proto {
    let mut a = Proto::new();
    a.string(1, name).packed_floats(7, v).varint(20, attr_type::FLOATS);
    a
}

fn attr_strings(name: &str, v: &[&str]) -> Proto {
    let mut a = Proto::new();
    a.string(1, name);
    for s in v {
        a.string(9, s);
    }
    a.varint(20, attr_type::STRINGS);
    a
}

fn node(op: &str, domain: &str, name: &str, inputs: &[&str], outputs: &[&str], attrs: Vec<Proto>) -> Proto {
    let mut n = Proto::new();
    for i in inputs {
        n.string(1, i);
    }
    for o in outputs {
        n.string(2, o);
    }
    n.string(3, name).string(4, op);
    for a in &attrs {
        n.message(5, a);
    }
    if !domain.is_empty() {
        n.string(7, domain);
    }
    n
}

fn float_tensor(name: &str, dims: &[i64], values: &[f32]) -> Proto {
    let mut t = Proto::new();
    for d in dims {
        t.int64(1, *d);
    }
    t.varint(2, ELEM_FLOAT).string(8, name);
    let raw: Vec<u8> = values.iter().flat_map(|f| f.to_le_bytes()).collect();
    t.bytes(9, &raw);
    t
}

/// A dimension is either fixed or the symbolic batch size `N`.
enum Dim {
    Batch,
    Fixed(usize),
}

fn value_info(name: &str, elem_type: u64, dims: &[Dim]) -> Proto {
    let mut shape = Proto::new();
    for d in dims {
        let mut dim = Proto::new();
        match d {
            Dim::Batch    => dim.string(2, "N"),
            Dim::Fixed(n) => dim.int64(1, *n as i64),
        };
        shape.message(1, &dim);
    }
    let mut tensor = Proto::new();
    tensor.varint(1, elem_type).message(2, &shape);
    let mut ty = Proto::new();
    ty.message(1, &tensor);
    let mut vi = Proto::new();
    vi.string(1, name).message(2, &ty);
    vi
}

struct Graph {
    name:         String,
    nodes:        Vec<Proto>,
    initializers: Vec<Proto>,
    inputs:       Vec<Proto>,
    outputs:      Vec<Proto>,
}

impl Graph {
    fn new(name: &str, n_features: usize) -> Self {
        Self {
            name: name.to_string(),
            nodes: Vec::new(),
            initializers: Vec::new(),
            inputs: vec![value_info(INPUT_NAME, ELEM_FLOAT, &[Dim::Batch, Dim::Fixed(n_features)])],
            outputs: Vec::new(),
        }
    }

    fn into_model(self) -> Vec<u8> {
        let mut g = Proto::new();
        for n in &self.nodes {
            g.message(1, n);
        }
        g.string(2, &self.name);
        for t in &self.initializers {
            g.message(5, t);
        }
        for i in &self.inputs {
            g.message(11, i);
        }
        for o in &self.outputs {
            g.message(12, o);
        }

        let mut model = Proto::new();
        model
            .varint(1, IR_VERSION)
            .string(2, env!("CARGO_PKG_NAME"))
            .string(3, env!("CARGO_PKG_VERSION"))
            .message(7, &g);
        for (domain, version) in [("", OPSET_ONNX), (ML_DOMAIN, OPSET_ML)] {
            let mut opset = Proto::new();
            opset.string(1, domain).int64(2, version as i64);
            model.message(8, &opset);
        }
        model.buf
    }

    /// Prepend `(x - mean) / scale`; returns the name of the scaled tensor
    fn standardise(&mut self, scaler: &StandardScaler) -> String {
        let d = scaler.dim() as i64;
        self.initializers.push(float_tensor("scaler_mean",  &[d], &to_f32(&scaler.mean)));
        self.initializers.push(float_tensor("scaler_scale", &[d], &to_f32(&scaler.scale)));
        self.nodes.push(node("Sub", "", "scale_sub", &[INPUT_NAME, "scaler_mean"], &["centered_input"], vec![]));
        self.nodes.push(node("Div", "", "scale_div", &["centered_input", "scaler_scale"], &["scaled_input"], vec![]));
        "scaled_input".to_string()
    }
}

fn to_f32(v: &[f64]) -> Vec<f32> {
    v.iter().map(|x| *x as f32).collect()
}

// ─── Tree Ensembles ───────────────────────────────────────────────────────────

/// Node attribute arrays shared by both tree ensemble operators
#[derive(Default)]
struct TreeNodes {
    tree_ids:  Vec<i64>,
    node_ids:  Vec<i64>,
    features:  Vec<i64>,
    modes:     Vec<&'static str>,
    values:    Vec<f32>,
    true_ids:  Vec<i64>,
    false_ids: Vec<i64>,
    /// (tree, node, leaf value) for every leaf
    leaves:    Vec<(i64, i64, Vec<f64>)>,
}

impl TreeNodes {
    fn collect(ensemble: &Ensemble) -> Self {
        let mut out = TreeNodes::default();
        for (t, tree) in ensemble.trees.iter().enumerate() {
            for (i, n) in tree.nodes.iter().enumerate() {
                out.tree_ids.push(t as i64);
                out.node_ids.push(i as i64);
                match n {
                    Node::Split { feature, threshold, left, right } => {
                        out.features.push(*feature as i64);
                        out.modes.push("BRANCH_LEQ");
                        out.values.push(*threshold as f32);
                        out.true_ids.push(*left as i64);
                        out.false_ids.push(*right as i64);
                    }
                    Node::Leaf { value } => {
                        out.features.push(0);
                        out.modes.push("LEAF");
                        out.values.push(0.0);
                        out.true_ids.push(0);
                        out.false_ids.push(0);
                        out.leaves.push((t as i64, i as i64, value.clone()));
                    }
                }
            }
        }
        out
    }

    fn attributes(&self) -> Vec<Proto> {
        vec![
            attr_ints("nodes_treeids", &self.tree_ids),
            attr_ints("nodes_nodeids", &self.node_ids),
            attr_ints("nodes_featureids", &self.features),
            attr_strings("nodes_modes", &self.modes),
            attr_floats("nodes_values", &self.values),
            attr_ints("nodes_truenodeids", &self.true_ids),
            attr_ints("nodes_falsenodeids", &self.false_ids),
            attr_string("post_transform", "NONE"),
        ]
    }
}

/// Classifier → TreeEnsembleClassifier. Leaf class shares are divided
/// by the tree count so the operator's sum is the forest average.
pub fn classifier_to_onnx(model: &RandomForestClassifier) -> Vec<u8> {
    let ensemble = &model.ensemble;
    let nodes = TreeNodes::collect(ensemble);
    let n_trees = ensemble.trees.len().max(1) as f64;

    let (mut c_trees, mut c_nodes, mut c_ids, mut c_weights) = (vec![], vec![], vec![], vec![]);
    for (t, n, value) in &nodes.leaves {
        for (class, share) in value.iter().enumerate() {
            c_trees.push(*t);
            c_nodes.push(*n);
            c_ids.push(class as i64);
            c_weights.push((share / n_trees) as f32);
        }
    }
    let labels: Vec<i64> = model.classes.iter().map(|c| i64::from(*c)).collect();

    let mut attrs = nodes.attributes();
    attrs.extend([
        attr_ints("class_treeids", &c_trees),
        attr_ints("class_nodeids", &c_nodes),
        attr_ints("class_ids", &c_ids),
        attr_floats("class_weights", &c_weights),
        attr_ints("classlabels_int64s", &labels),
    ]);

    let mut g = Graph::new("random_forest_classifier", ensemble.n_features);
    g.nodes.push(node(
        "TreeEnsembleClassifier",
        ML_DOMAIN,
        "forest",
        &[INPUT_NAME],
        &["label", "probabilities"],
        attrs,
    ));
    g.outputs.push(value_info("label", ELEM_INT64, &[Dim::Batch]));
    g.outputs.push(value_info("probabilities", ELEM_FLOAT, &[Dim::Batch, Dim::Fixed(labels.len())]));
    g.into_model()
}

/// Regressor (single or multi-output) → TreeEnsembleRegressor.
pub fn regressor_to_onnx(model: &RandomForestRegressor) -> Vec<u8> {
    let ensemble = &model.ensemble;
    let nodes = TreeNodes::collect(ensemble);

    let (mut t_trees, mut t_nodes, mut t_ids, mut t_weights) = (vec![], vec![], vec![], vec![]);
    for (t, n, value) in &nodes.leaves {
        for (target, v) in value.iter().enumerate() {
            t_trees.push(*t);
            t_nodes.push(*n);
            t_ids.push(target as i64);
            t_weights.push(*v as f32);
        }
    }

    let mut attrs = nodes.attributes();
    attrs.extend([
        attr_int("n_targets", ensemble.n_outputs as i64),
        attr_string("aggregate_function", "AVERAGE"),
        attr_ints("target_treeids", &t_trees),
        attr_ints("target_nodeids", &t_nodes),
        attr_ints("target_ids", &t_ids),
        attr_floats("target_weights", &t_weights),
    ]);

    let mut g = Graph::new("random_forest_regressor", ensemble.n_features);
    g.nodes.push(node("TreeEnsembleRegressor", ML_DOMAIN, "forest", &[INPUT_NAME], &["variable"], attrs));
    g.outputs.push(value_info("variable", ELEM_FLOAT, &[Dim::Batch, Dim::Fixed(ensemble.n_outputs)]));
    g.into_model()
}

// ─── Reducer Models ───────────────────────────────────────────────────────────

pub fn encoder_to_onnx(encoder: &DenseEncoder, scaler: &StandardScaler) -> Vec<u8> {
    let mut g = Graph::new("clothing_encoder", scaler.dim());
    let mut current = g.standardise(scaler);
    let last = encoder.layers.len().saturating_sub(1);

    for (i, layer) in encoder.layers.iter().enumerate() {
        let (w, b) = (format!("dense_{i}_weight"), format!("dense_{i}_bias"));
        let flat: Vec<f64> = layer.weight.iter().flatten().copied().collect();
        g.initializers.push(float_tensor(
            &w,
            &[layer.output_dim() as i64, layer.input_dim() as i64],
            &to_f32(&flat),
        ));
        g.initializers.push(float_tensor(&b, &[layer.output_dim() as i64], &to_f32(&layer.bias)));

        let gemm_out = if i == last { "variable".to_string() } else { format!("dense_{i}") };
        g.nodes.push(node(
            "Gemm",
            "",
            &format!("gemm_{i}"),
            &[current.as_str(), w.as_str(), b.as_str()],
            &[gemm_out.as_str()],
            vec![attr_int("transB", 1)],
        ));
        current = gemm_out;
        if layer.relu {
            let relu_out = format!("relu_{i}");
            g.nodes.push(node("Relu", "", &relu_out, &[current.as_str()], &[relu_out.as_str()], vec![]));
            current = relu_out;
        }
    }

    let out_dim = encoder.layers.last().map(|l| l.output_dim()).unwrap_or(1);
    g.outputs.push(value_info("variable", ELEM_FLOAT, &[Dim::Batch, Dim::Fixed(out_dim)]));
    g.into_model()
}

pub fn pca_to_onnx(pca: &Pca, scaler: &StandardScaler) -> Vec<u8> {
    let mut g = Graph::new("clothing_pca", scaler.dim());
    let scaled = g.standardise(scaler);
    let d = pca.mean.len() as i64;
    g.initializers.push(float_tensor("pca_mean", &[d], &to_f32(&pca.mean)));
    g.initializers.push(float_tensor("pca_component", &[d, 1], &to_f32(&pca.component)));
    g.nodes.push(node("Sub", "", "pca_center", &[scaled.as_str(), "pca_mean"], &["pca_centered"], vec![]));
    g.nodes.push(node("MatMul", "", "pca_project", &["pca_centered", "pca_component"], &["variable"], vec![]));
    g.outputs.push(value_info("variable", ELEM_FLOAT, &[Dim::Batch, Dim::Fixed(1)]));
    g.into_model()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::autoencoder::DenseLayer;
    use crate::ml::forest::ForestParams;
    use std::collections::{BTreeMap, BTreeSet};

    /// Minimal reader: top-level (field, wire type, payload) triples
    fn fields(mut b: &[u8]) -> Vec<(u64, u8, Vec<u8>)> {
        fn varint(b: &mut &[u8]) -> u64 {
            let (mut v, mut shift) = (0u64, 0);
            loop {
                let byte = b[0];
                *b = &b[1..];
                v |= u64::from(byte & 0x7F) << shift;
                if byte & 0x80 == 0 {
                    return v;
                }
                shift += 7;
            }
        }
        let mut out = Vec::new();
        while !b.is_empty() {
            let tag = varint(&mut b);
            let wire = (tag & 7) as u8;
            let payload = match wire {
                0 => varint(&mut b).to_le_bytes().to_vec(),
                2 => {
                    let len = varint(&mut b) as usize;
                    let p = b[..len].to_vec();
                    b = &b[len..];
                    p
                }
                other => panic!("unexpected wire type {other}"),
            };
            out.push((tag >> 3, wire, payload));
        }
        out
    }

    fn scalar(p: &[u8]) -> i64 {
        let mut b = [0u8; 8];
        b.copy_from_slice(&p[..8]);
        u64::from_le_bytes(b) as i64
    }

    fn packed_varints(mut b: &[u8]) -> Vec<i64> {
        let mut out = Vec::new();
        while !b.is_empty() {
            let (mut v, mut shift) = (0u64, 0);
            loop {
                let byte = b[0];
                b = &b[1..];
                v |= u64::from(byte & 0x7F) << shift;
                if byte & 0x80 == 0 {
                    break;
                }
                shift += 7;
            }
            out.push(v as i64);
        }
        out
    }

    fn packed_f32(b: &[u8]) -> Vec<f32> {
        b.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
    }

    fn text(b: &[u8]) -> String {
        String::from_utf8(b.to_vec()).unwrap()
    }

    // ─── Decoded graph ────────────────────────────────────────────────────

    #[derive(Debug, Default)]
    struct Attr {
        ints:    Vec<i64>,
        floats:  Vec<f32>,
        strings: Vec<String>,
        int:     i64,
        string:  String,
    }

    #[derive(Debug)]
    struct OpNode {
        op:      String,
        inputs:  Vec<String>,
        outputs: Vec<String>,
        attrs:   BTreeMap<String, Attr>,
    }

    #[derive(Debug, Default)]
    struct Decoded {
        nodes:        Vec<OpNode>,
        /// name → (dims, values)
        initializers: BTreeMap<String, (Vec<i64>, Vec<f32>)>,
    }

    fn decode(model: &[u8]) -> Decoded {
        let graph = fields(model).into_iter().find(|f| f.0 == 7).unwrap().2;
        let mut out = Decoded::default();
        for (field, _, p) in fields(&graph) {
            match field {
                1 => {
                    let mut node = OpNode { op: String::new(), inputs: vec![], outputs: vec![], attrs: BTreeMap::new() };
                    for (f, _, q) in fields(&p) {
                        match f {
                            1 => node.inputs.push(text(&q)),
                            2 => node.outputs.push(text(&q)),
                            4 => node.op = text(&q),
                            5 => {
                                let (mut name, mut attr) = (String::new(), Attr::default());
                                for (g, _, r) in fields(&q) {
                                    match g {
                                        1 => name = text(&r),
                                        3 => attr.int = scalar(&r),
                                        4 => attr.string = text(&r),
                                        7 => attr.floats = packed_f32(&r),
                                        8 => attr.ints = packed_varints(&r),
                                        9 => attr.strings.push(text(&r)),
                                        _ => {}
                                    }
                                }
                                node.attrs.insert(name, attr);
                            }
                            _ => {}
                        }
                    }
                    out.nodes.push(node);
                }
                5 => {
                    let (mut name, mut dims, mut values) = (String::new(), vec![], vec![]);
                    for (f, _, q) in fields(&p) {
                        match f {
                            1 => dims.push(scalar(&q)),
                            8 => name = text(&q),
                            9 => values = packed_f32(&q),
                            _ => {}
                        }
                    }
                    out.initializers.insert(name, (dims, values));
                }
                _ => {}
            }
        }
        out
    }

    /// Leaf (tree, node) reached in every tree of a TreeEnsemble node
    fn reached_leaves(a: &BTreeMap<String, Attr>, row: &[f32]) -> Vec<(i64, i64)> {
        let trees = &a["nodes_treeids"].ints;
        let nodes = &a["nodes_nodeids"].ints;
        let index: BTreeMap<(i64, i64), usize> =
            trees.iter().zip(nodes).enumerate().map(|(i, (t, n))| ((*t, *n), i)).collect();
        let tree_set: BTreeSet<i64> = trees.iter().copied().collect();

        tree_set
            .into_iter()
            .map(|t| {
                let mut n = 0;
                loop {
                    let i = index[&(t, n)];
                    if a["nodes_modes"].strings[i] == "LEAF" {
                        return (t, n);
                    }
                    assert_eq!(a["nodes_modes"].strings[i], "BRANCH_LEQ");
                    let f = a["nodes_featureids"].ints[i] as usize;
                    n = if row[f] <= a["nodes_values"].floats[i] {
                        a["nodes_truenodeids"].ints[i]
                    } else {
                        a["nodes_falsenodeids"].ints[i]
                    };
                }
            })
            .collect()
    }

    /// Sum the per-leaf weights of `prefix` ("class" / "target") by output id
    fn leaf_sums(a: &BTreeMap<String, Attr>, prefix: &str, leaves: &[(i64, i64)], n_out: usize) -> Vec<f64> {
        let mut out = vec![0.0; n_out];
        let ts = &a[&format!("{prefix}_treeids")].ints;
        let ns = &a[&format!("{prefix}_nodeids")].ints;
        let ids = &a[&format!("{prefix}_ids")].ints;
        let ws = &a[&format!("{prefix}_weights")].floats;
        for i in 0..ts.len() {
            if leaves.contains(&(ts[i], ns[i])) {
                out[ids[i] as usize] += f64::from(ws[i]);
            }
        }
        out
    }

    /// Run a Sub / Div / Gemm / Relu / MatMul graph on one row
    fn run_dense(d: &Decoded, row: &[f64]) -> Vec<f64> {
        let mut env: BTreeMap<String, Vec<f64>> = d
            .initializers
            .iter()
            .map(|(k, (_, v))| (k.clone(), v.iter().map(|x| f64::from(*x)).collect()))
            .collect();
        env.insert(INPUT_NAME.to_string(), row.iter().map(|x| f64::from(*x as f32)).collect());

        for n in &d.nodes {
            let arg = |i: usize| env[&n.inputs[i]].clone();
            let out: Vec<f64> = match n.op.as_str() {
                "Sub"  => arg(0).iter().zip(arg(1)).map(|(a, b)| a - b).collect(),
                "Div"  => arg(0).iter().zip(arg(1)).map(|(a, b)| a / b).collect(),
                "Relu" => arg(0).iter().map(|v| v.max(0.0)).collect(),
                "Gemm" => {
                    assert_eq!(n.attrs["transB"].int, 1);
                    let (x, w, b) = (arg(0), arg(1), arg(2));
                    let dims = &d.initializers[&n.inputs[1]].0;
                    let (rows, cols) = (dims[0] as usize, dims[1] as usize);
                    (0..rows).map(|o| (0..cols).map(|k| w[o * cols + k] * x[k]).sum::<f64>() + b[o]).collect()
                }
                "MatMul" => {
                    let (x, m) = (arg(0), arg(1));
                    let dims = &d.initializers[&n.inputs[1]].0;
                    let (rows, cols) = (dims[0] as usize, dims[1] as usize);
                    (0..cols).map(|j| (0..rows).map(|k| x[k] * m[k * cols + j]).sum::<f64>()).collect()
                }
                other => panic!("unexpected op {other}"),
            };
            env.insert(n.outputs[0].clone(), out);
        }
        env["variable"].clone()
    }

    fn contains(hay: &[u8], needle: &str) -> bool {
        hay.windows(needle.len()).any(|w| w == needle.as_bytes())
    }

    #[test]
    fn test_classifier_graph_reproduces_predict_proba() {
        let x: Vec<Vec<f64>> = (0..24).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<i32> = (0..24).map(|i| if i < 8 { 0 } else if i < 16 { 1 } else { 3 }).collect();
        let clf = RandomForestClassifier::fit(&x, &y, &ForestParams { n_estimators: 5, ..Default::default() }).unwrap();
        let d = decode(&classifier_to_onnx(&clf));

        assert_eq!(d.nodes.len(), 1);
        let a = &d.nodes[0].attrs;
        assert_eq!(d.nodes[0].op, "TreeEnsembleClassifier");
        assert_eq!(a["classlabels_int64s"].ints, vec![0, 1, 3]);
        assert_eq!(a["post_transform"].string, "NONE");
        let total_nodes: usize = clf.ensemble.trees.iter().map(|t| t.nodes.len()).sum();
        assert_eq!(a["nodes_nodeids"].ints.len(), total_nodes);
        let trees: BTreeSet<i64> = a["nodes_treeids"].ints.iter().copied().collect();
        assert_eq!(trees.len(), 5);

        let expected = clf.predict_proba(&x).unwrap();
        for (row, want) in x.iter().zip(&expected) {
            let row32: Vec<f32> = row.iter().map(|v| *v as f32).collect();
            let leaves = reached_leaves(a, &row32);
            let got = leaf_sums(a, "class", &leaves, 3);
            for (g, w) in got.iter().zip(want) {
                assert!((g - w).abs() < 1e-6, "{got:?} vs {want:?}");
            }
            assert!((got.iter().sum::<f64>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_regressor_graph_reproduces_predict() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i % 4) as f64]).collect();
        let y: Vec<Vec<f64>> = x.iter().map(|r| vec![2.0 * r[0], 10.0 - r[1]]).collect();
        let reg = RandomForestRegressor::fit(&x, &y, &ForestParams { n_estimators: 4, ..Default::default() }).unwrap();
        let d = decode(&regressor_to_onnx(&reg));
        let a = &d.nodes[0].attrs;
        assert_eq!(a["n_targets"].int, 2);
        assert_eq!(a["aggregate_function"].string, "AVERAGE");

        let n_trees = reg.ensemble.trees.len() as f64;
        for (row, want) in x.iter().zip(reg.predict(&x).unwrap()) {
            let row32: Vec<f32> = row.iter().map(|v| *v as f32).collect();
            let leaves = reached_leaves(a, &row32);
            assert_eq!(leaves.len(), 4);
            let got: Vec<f64> = leaf_sums(a, "target", &leaves, 2).into_iter().map(|v| v / n_trees).collect();
            for (g, w) in got.iter().zip(&want) {
                assert!((g - w).abs() < 1e-4 * w.abs().max(1.0), "{got:?} vs {want:?}");
            }
        }
    }

    #[test]
    fn test_encoder_and_pca_graphs_reproduce_projection() {
        use crate::domain::traits::Projector;

        let scaler = StandardScaler { mean: vec![0.25, 0.5], scale: vec![0.5, 2.0] };
        let encoder = DenseEncoder {
            layers: vec![
                DenseLayer { weight: vec![vec![1.0, 2.0], vec![-1.0, -3.0], vec![0.5, -0.5]], bias: vec![0.1, 0.2, -0.3], relu: true },
                DenseLayer { weight: vec![vec![0.7, -1.2, 2.0]], bias: vec![0.05], relu: false },
            ],
        };
        let pca = Pca {
            mean: vec![0.1, -0.2],
            component: vec![0.6, -0.8],
            explained_variance: 1.0,
            explained_variance_ratio: 1.0,
        };
        let enc_graph = decode(&encoder_to_onnx(&encoder, &scaler));
        let pca_graph = decode(&pca_to_onnx(&pca, &scaler));
        let ops: Vec<&str> = enc_graph.nodes.iter().map(|n| n.op.as_str()).collect();
        assert_eq!(ops, vec!["Sub", "Div", "Gemm", "Relu", "Gemm"]);

        for row in [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [3.0, -2.0]] {
            let scaled = scaler.transform_row(&row);
            let want = encoder.forward(&scaled)[0];
            let got  = run_dense(&enc_graph, &row)[0];
            assert!((got - want).abs() < 1e-4, "encoder {row:?}: {got} vs {want}");

            let want = pca.project(&scaled);
            let got  = run_dense(&pca_graph, &row)[0];
            assert!((got - want).abs() < 1e-4, "pca {row:?}: {got} vs {want}");
        }
    }

    #[test]
    fn test_varint_encoding() {
        let mut p = Proto::new();
        p.raw_varint(300);
        assert_eq!(p.buf, vec![0xAC, 0x02]);
        let mut p = Proto::new();
        p.int64(1, -1);
        assert_eq!(p.buf.len(), 1 + 10);
    }

    #[test]
    fn test_classifier_model_layout() {
        let x: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64, 1.0]).collect();
        let y: Vec<i32> = (0..12).map(|i| if i < 6 { 0 } else { 2 }).collect();
        let clf = RandomForestClassifier::fit(&x, &y, &ForestParams { n_estimators: 3, ..Default::default() }).unwrap();
        let bytes = classifier_to_onnx(&clf);

        assert_eq!(&bytes[..2], &[0x08, 0x09]);
        let top = fields(&bytes);
        assert_eq!(top.iter().filter(|f| f.0 == 8).count(), 2);
        let graph = top.iter().find(|f| f.0 == 7).unwrap();
        assert!(contains(&graph.2, "TreeEnsembleClassifier"));
        assert!(contains(&graph.2, "classlabels_int64s"));
        assert!(contains(&graph.2, INPUT_NAME));
        // one node, one input, two outputs
        let g = fields(&graph.2);
        assert_eq!(g.iter().filter(|f| f.0 == 1).count(), 1);
        assert_eq!(g.iter().filter(|f| f.0 == 11).count(), 1);
        assert_eq!(g.iter().filter(|f| f.0 == 12).count(), 2);
    }

    #[test]
    fn test_regressor_model_layout() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 1.0]).collect();
        let reg = RandomForestRegressor::fit(&x, &y, &ForestParams { n_estimators: 2, ..Default::default() }).unwrap();
        let bytes = regressor_to_onnx(&reg);
        assert_eq!(&bytes[..2], &[0x08, 0x09]);
        assert!(contains(&bytes, "TreeEnsembleRegressor"));
        assert!(contains(&bytes, "AVERAGE"));
        assert!(contains(&bytes, ML_DOMAIN));
    }

    #[test]
    fn test_encoder_and_pca_graphs() {
        let scaler = StandardScaler { mean: vec![0.0, 0.5], scale: vec![1.0, 0.5] };
        let encoder = DenseEncoder {
            layers: vec![
                DenseLayer { weight: vec![vec![1.0, 2.0]; 3], bias: vec![0.0; 3], relu: true },
                DenseLayer { weight: vec![vec![1.0, 1.0, 1.0]], bias: vec![0.1], relu: false },
            ],
        };
        let bytes = encoder_to_onnx(&encoder, &scaler);
        let graph = fields(&bytes).into_iter().find(|f| f.0 == 7).unwrap();
        let g = fields(&graph.2);
        // Sub, Div, Gemm, Relu, Gemm
        assert_eq!(g.iter().filter(|f| f.0 == 1).count(), 5);
        // scaler mean/scale + two weight/bias pairs
        assert_eq!(g.iter().filter(|f| f.0 == 5).count(), 6);

        let pca = Pca {
            mean: vec![0.0, 0.0],
            component: vec![0.6, 0.8],
            explained_variance: 1.0,
            explained_variance_ratio: 1.0,
        };
        let bytes = pca_to_onnx(&pca, &scaler);
        assert!(contains(&bytes, "MatMul"));
        assert!(contains(&bytes, "pca_component"));
    }
}
