//! HNSW graph structure and core types.

use crate::RetrieveError;

#[cfg(feature = "hnsw")]
use smallvec::SmallVec;

/// HNSW index for approximate nearest neighbor search.
///
/// Implements the Hierarchical Navigable Small World algorithm (Malkov &
/// Yashunin, 2016) with SIMD-accelerated distance computation.
#[derive(Debug)]
pub struct HNSWIndex {
    /// Vectors stored in Structure of Arrays (SoA) format for cache efficiency.
    /// Layout: `[v0[0..d], v1[0..d], ..., vn[0..d]]`.
    pub(crate) vectors: Vec<f32>,

    /// Vector dimension.
    pub(crate) dimension: usize,

    /// Number of vectors.
    pub(crate) num_vectors: usize,

    /// Graph layers (index 0 = base layer, higher = upper layers).
    pub(crate) layers: Vec<Layer>,

    /// Layer assignment for each vector (max layer where the vector appears).
    pub(crate) layer_assignments: Vec<u8>,

    /// Parameters.
    pub(crate) params: HNSWParams,

    /// Whether the index has been built.
    built: bool,
}

/// Seed selection strategy for HNSW search initialization.
#[derive(Clone, Debug, PartialEq)]
pub enum SeedSelectionStrategy {
    /// Entry point in the highest layer, navigated down layer by layer (default).
    StackedNSW,

    /// K random nodes sampled directly, closest used as entry point.
    KSampledRandom {
        /// Number of random seeds to sample (typically k or ef_search).
        k: usize,
    },
}

impl Default for SeedSelectionStrategy {
    fn default() -> Self {
        SeedSelectionStrategy::StackedNSW
    }
}

/// HNSW parameters controlling graph structure and search behavior.
#[derive(Clone, Debug)]
pub struct HNSWParams {
    /// Maximum number of connections per node.
    pub m: usize,

    /// Maximum connections for newly inserted nodes.
    pub m_max: usize,

    /// Layer assignment probability parameter (typically `1/ln(2) ~= 1.44`).
    pub m_l: f64,

    /// Search width during construction.
    pub ef_construction: usize,

    /// Default search width during query.
    pub ef_search: usize,

    /// Seed selection strategy.
    pub seed_selection: SeedSelectionStrategy,
}

impl Default for HNSWParams {
    fn default() -> Self {
        Self {
            m: 16,
            m_max: 16,
            m_l: 1.0 / 2.0_f64.ln(),
            ef_construction: 200,
            ef_search: 64,
            seed_selection: SeedSelectionStrategy::default(),
        }
    }
}

/// Neighbor list for one node in one layer.
#[derive(Debug)]
pub(crate) struct Layer {
    neighbors: Vec<SmallVec<[u32; 16]>>,
}

impl Layer {
    pub(crate) fn new_uncompressed(neighbors: Vec<SmallVec<[u32; 16]>>) -> Self {
        Self { neighbors }
    }

    pub(crate) fn get_neighbors_mut(&mut self) -> &mut Vec<SmallVec<[u32; 16]>> {
        &mut self.neighbors
    }

    pub(crate) fn get_neighbors(&self, node: u32) -> SmallVec<[u32; 16]> {
        self.neighbors
            .get(node as usize)
            .cloned()
            .unwrap_or_else(SmallVec::new)
    }

    pub(crate) fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub(crate) fn get_all_neighbors(&self) -> &Vec<SmallVec<[u32; 16]>> {
        &self.neighbors
    }
}

impl HNSWIndex {
    /// Create a new HNSW index with `m`/`m_max` connections and otherwise
    /// default parameters (`ef_construction = 200`, `ef_search = 64`).
    ///
    /// # Errors
    ///
    /// Returns an error if `dimension`, `m` or `m_max` is zero.
    pub fn new(dimension: usize, m: usize, m_max: usize) -> Result<Self, RetrieveError> {
        Self::with_params(
            dimension,
            HNSWParams {
                m,
                m_max,
                ..Default::default()
            },
        )
    }

    /// Create an index with fully custom parameters.
    pub fn with_params(dimension: usize, params: HNSWParams) -> Result<Self, RetrieveError> {
        if dimension == 0 {
            return Err(RetrieveError::EmptyQuery);
        }
        if params.m == 0 || params.m_max == 0 {
            return Err(RetrieveError::InvalidParameter(
                "m and m_max must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            vectors: Vec::new(),
            dimension,
            num_vectors: 0,
            layers: Vec::new(),
            layer_assignments: Vec::new(),
            params,
            built: false,
        })
    }

    /// Whether the index has been built and is ready for search.
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Dimension of the vectors the index was created for.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors held by the index.
    pub fn len(&self) -> usize {
        self.num_vectors
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.num_vectors == 0
    }

    /// Reconstruct an index from persisted parts.
    pub(crate) fn from_parts(
        vectors: Vec<f32>,
        dimension: usize,
        num_vectors: usize,
        layers: Vec<Layer>,
        layer_assignments: Vec<u8>,
        params: HNSWParams,
        built: bool,
    ) -> Self {
        Self {
            vectors,
            dimension,
            num_vectors,
            layers,
            layer_assignments,
            params,
            built,
        }
    }

    /// Add a vector to the index. Must be called before [`Self::build`];
    /// vectors should be L2-normalized for cosine similarity.
    pub fn add(&mut self, _id: u32, vector: Vec<f32>) -> Result<(), RetrieveError> {
        if self.built {
            return Err(RetrieveError::Other(
                "cannot add vectors after index is built".to_string(),
            ));
        }
        if vector.len() != self.dimension {
            return Err(RetrieveError::DimensionMismatch {
                query_dim: self.dimension,
                doc_dim: vector.len(),
            });
        }

        self.vectors.extend_from_slice(&vector);
        self.num_vectors += 1;
        let layer = self.assign_layer();
        self.layer_assignments.push(layer);
        Ok(())
    }

    /// Build the multi-layer graph. Required before [`Self::search`].
    pub fn build(&mut self) -> Result<(), RetrieveError> {
        if self.built {
            return Ok(());
        }
        if self.num_vectors == 0 {
            return Err(RetrieveError::EmptyIndex);
        }

        crate::dense::hnsw::construction::construct_graph(self)?;
        self.built = true;
        Ok(())
    }

    /// Search for the k nearest neighbors of `query`.
    ///
    /// `ef` is the search width; higher values trade latency for recall.
    /// Returns `(id, cosine_distance)` pairs sorted by distance ascending
    /// (distance, not similarity -- callers wanting cosine similarity in
    /// `[-1, 1]` should take `1.0 - distance`).
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef: usize,
    ) -> Result<Vec<(u32, f32)>, RetrieveError> {
        if !self.built {
            return Err(RetrieveError::Other(
                "index must be built before search".to_string(),
            ));
        }
        if query.len() != self.dimension {
            return Err(RetrieveError::DimensionMismatch {
                query_dim: self.dimension,
                doc_dim: query.len(),
            });
        }
        if self.num_vectors == 0 {
            return Err(RetrieveError::EmptyIndex);
        }

        let (entry_point, entry_layer, initial_seeds) = match &self.params.seed_selection {
            SeedSelectionStrategy::StackedNSW => {
                let ep = self.get_entry_point().ok_or(RetrieveError::EmptyIndex)?;
                let el = self.layer_assignments[ep as usize] as usize;
                (ep, el, vec![ep])
            }
            SeedSelectionStrategy::KSampledRandom { k } => {
                use rand::thread_rng;
                use rand::Rng;
                let mut rng = thread_rng();
                let num_samples = (*k).min(self.num_vectors);

                let mut seeds: Vec<u32> = Vec::with_capacity(num_samples);
                let mut used = std::collections::HashSet::with_capacity(num_samples);
                while seeds.len() < num_samples {
                    let candidate = rng.gen_range(0..self.num_vectors as u32);
                    if used.insert(candidate) {
                        seeds.push(candidate);
                    }
                }

                let mut best_seed = seeds[0];
                let mut best_dist = f32::INFINITY;
                for &seed_id in &seeds {
                    let seed_vec = self.get_vector(seed_id as usize);
                    let dist = crate::dense::hnsw::distance::cosine_distance(query, seed_vec);
                    if dist < best_dist {
                        best_dist = dist;
                        best_seed = seed_id;
                    }
                }

                let entry_layer = self.layer_assignments[best_seed as usize] as usize;
                (best_seed, entry_layer, seeds)
            }
        };

        let mut current_closest = entry_point;
        let mut current_dist = f32::INFINITY;

        for layer_idx in (1..=entry_layer).rev() {
            if layer_idx >= self.layers.len() {
                continue;
            }

            let layer = &self.layers[layer_idx];
            let mut changed = true;
            let mut visited = std::collections::HashSet::with_capacity(ef.min(100));

            while changed {
                changed = false;
                visited.insert(current_closest);

                let neighbors = layer.get_neighbors(current_closest);
                for &neighbor_id in neighbors.iter() {
                    if visited.contains(&neighbor_id) {
                        continue;
                    }

                    let neighbor_vec = self.get_vector(neighbor_id as usize);
                    let dist = crate::dense::hnsw::distance::cosine_distance(query, neighbor_vec);

                    if dist < current_dist {
                        current_dist = dist;
                        current_closest = neighbor_id;
                        changed = true;
                    }
                }
            }
        }

        if self.layers.is_empty() {
            return Ok(Vec::new());
        }

        let base_results = if let SeedSelectionStrategy::KSampledRandom { .. } =
            &self.params.seed_selection
        {
            use crate::dense::hnsw::search::SearchState;
            let mut state = SearchState::with_capacity(ef.max(k));

            for &seed_id in &initial_seeds {
                let seed_vec = self.get_vector(seed_id as usize);
                let dist = crate::dense::hnsw::distance::cosine_distance(query, seed_vec);
                state.add_candidate(seed_id, dist);
            }

            let neighbors = self.layers[0].get_neighbors(current_closest);
            for &neighbor_id in neighbors.iter() {
                let neighbor_vec = self.get_vector(neighbor_id as usize);
                let dist = crate::dense::hnsw::distance::cosine_distance(query, neighbor_vec);
                state.add_candidate(neighbor_id, dist);
            }

            let mut results = Vec::new();
            while let Some(candidate) = state.pop_candidate() {
                if results.len() >= ef.max(k) {
                    break;
                }

                results.push((candidate.id, candidate.distance));

                let neighbors = self.layers[0].get_neighbors(candidate.id);
                for &neighbor_id in neighbors.iter() {
                    let neighbor_vec = self.get_vector(neighbor_id as usize);
                    let dist = crate::dense::hnsw::distance::cosine_distance(query, neighbor_vec);
                    state.add_candidate(neighbor_id, dist);
                }
            }

            results
        } else {
            crate::dense::hnsw::search::greedy_search_layer(
                query,
                current_closest,
                &self.layers[0],
                &self.vectors,
                self.dimension,
                ef.max(k),
            )
        };

        let mut results: Vec<(u32, f32)> = Vec::with_capacity(k);
        results.extend(base_results.into_iter().take(k));
        results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(results)
    }

    /// Assign a layer for a new vector using the exponential distribution
    /// HNSW requires for its hierarchy.
    fn assign_layer(&self) -> u8 {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        let mut layer = 0u8;
        while rng.gen::<f64>() < 1.0 / self.params.m_l && layer < 255 {
            layer += 1;
        }

        layer
    }

    pub(crate) fn get_vector(&self, idx: usize) -> &[f32] {
        let start = idx * self.dimension;
        let end = start + self.dimension;
        &self.vectors[start..end]
    }

    fn get_entry_point(&self) -> Option<u32> {
        if self.num_vectors == 0 {
            return None;
        }

        let mut entry_point = 0u32;
        let mut entry_layer = 0u8;

        for (idx, &layer) in self.layer_assignments.iter().enumerate() {
            if layer > entry_layer {
                entry_point = idx as u32;
                entry_layer = layer;
            }
        }

        Some(entry_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_index() {
        let index = HNSWIndex::new(128, 16, 16).unwrap();
        assert_eq!(index.dimension, 128);
        assert_eq!(index.num_vectors, 0);
    }

    #[test]
    fn test_add_vectors() {
        let mut index = HNSWIndex::new(3, 16, 16).unwrap();

        index.add(0, vec![1.0, 0.0, 0.0]).unwrap();
        index.add(1, vec![0.0, 1.0, 0.0]).unwrap();

        assert_eq!(index.num_vectors, 2);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = HNSWIndex::new(3, 16, 16).unwrap();

        let result = index.add(0, vec![1.0, 0.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_and_search() {
        let mut index = HNSWIndex::new(2, 4, 4).unwrap();
        index.add(0, vec![1.0, 0.0]).unwrap();
        index.add(1, vec![0.0, 1.0]).unwrap();
        index.add(2, vec![0.9, 0.1]).unwrap();
        index.build().unwrap();

        let results = index.search(&[1.0, 0.0], 2, 10).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].0, 0);
    }
}
