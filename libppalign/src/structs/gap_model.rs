use super::DataError;

/// Position-specific gap statistics for one profile: per-column insertion
/// probability, deletion-open and deletion-extend probabilities, and the
/// (negative) open/extend costs paid by an alignment that places a gap
/// against the column.
#[derive(Clone, Debug)]
pub struct GapModel {
    /// Number of columns; must match the owning profile
    pub length: usize,
    /// Probability of an insertion observed at each column
    insertion: Vec<f64>,
    /// Probability that a deletion opens at each column
    delete_open: Vec<f64>,
    /// Probability that an open deletion extends by one step
    delete_extend: Vec<f64>,
    /// Gap open costs, negative
    open_costs: Vec<f64>,
    /// Gap extend costs, negative
    extend_costs: Vec<f64>,
    /// When set, the probabilities are ignored and the costs apply as-is
    fixed: bool,
}

impl GapModel {
    pub const DEFAULT_OPEN_COST: f64 = -4.0;
    pub const DEFAULT_EXTEND_COST: f64 = -1.0;

    pub fn new(
        insertion: Vec<f64>,
        delete_open: Vec<f64>,
        delete_extend: Vec<f64>,
        open_costs: Vec<f64>,
        extend_costs: Vec<f64>,
    ) -> Result<Self, DataError> {
        let length = insertion.len();

        if length == 0 {
            return Err(DataError::EmptyProfile);
        }

        for (what, len) in [
            ("insertion and deletion-open vectors", delete_open.len()),
            ("insertion and deletion-extend vectors", delete_extend.len()),
            ("insertion and open-cost vectors", open_costs.len()),
            ("insertion and extend-cost vectors", extend_costs.len()),
        ] {
            if len != length {
                return Err(DataError::LengthMismatch {
                    what,
                    left: length,
                    right: len,
                });
            }
        }

        Ok(GapModel {
            length,
            insertion,
            delete_open,
            delete_extend,
            open_costs,
            extend_costs,
            fixed: false,
        })
    }

    /// A gap model with constant costs and no positional statistics.
    pub fn fixed(length: usize, open_cost: f64, extend_cost: f64) -> Self {
        GapModel {
            length,
            insertion: vec![0.0; length],
            delete_open: vec![0.0; length],
            delete_extend: vec![0.0; length],
            open_costs: vec![open_cost; length],
            extend_costs: vec![extend_cost; length],
            fixed: true,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    #[inline]
    pub fn open_at(&self, pos: usize) -> f64 {
        debug_assert!(pos < self.length);
        self.open_costs[pos]
    }

    #[inline]
    pub fn extend_at(&self, pos: usize) -> f64 {
        debug_assert!(pos < self.length);
        self.extend_costs[pos]
    }

    #[inline]
    pub fn insertion_prob_at(&self, pos: usize) -> f64 {
        debug_assert!(pos < self.length);
        self.insertion[pos]
    }

    #[inline]
    pub fn delete_open_prob_at(&self, pos: usize) -> f64 {
        debug_assert!(pos < self.length);
        self.delete_open[pos]
    }

    /// Probability that a deletion covering this column is still extending
    /// after `time` prior extension steps; geometric in the extension time.
    #[inline]
    pub fn delete_extend_prob_at(&self, pos: usize, time: usize) -> f64 {
        debug_assert!(pos < self.length);
        self.delete_extend[pos].powi(time as i32 + 1)
    }
}
