mod alignment;
pub(crate) use alignment::select_middle_character;
pub use alignment::{Alignment, PathStep};

mod direction;
pub use direction::Direction;

mod dp_matrix;
pub use dp_matrix::{DpMatrix, State, NUM_STATES};
