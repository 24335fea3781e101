pub mod model;
pub mod preprocess;

pub use model::{Classifier, Prediction};

/// Output classes of the tumor model, in the order the model emits them.
pub const CLASS_NAMES: [&str; 4] = ["glioma", "meningioma", "notumor", "pituitary"];
