//! Competitive gene set testing on precomputed per-gene statistics.
//!
//! ## Available Methods
//!
//! - **CAMERA-PR** (`camera`): tests whether the statistics of the genes in a set
//!   differ from those of the remaining genes, with a variance inflation factor for
//!   inter-gene correlation. Both a parametric (t) and a rank-sum path are provided.
//!
//! ## Quick Example
//!
//! ```rust
//! use ndarray::array;
//! use single_enrichment::data::StatisticMatrix;
//! use single_enrichment::enrichment::{CameraConfig, camera_pr};
//! use single_enrichment::sets::SetCollection;
//!
//! let genes: Vec<String> = (1..=6).map(|i| format!("g{}", i)).collect();
//! let statistic = StatisticMatrix::new(
//!     array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]],
//!     genes,
//!     vec!["treated".to_string()],
//! ).unwrap();
//! let sets = SetCollection::new(vec![("high", vec!["g5", "g6"])]).unwrap();
//!
//! let result = camera_pr(&statistic, &sets, &CameraConfig::new()).unwrap();
//! assert_eq!(result.records.len(), 1);
//! assert!(result.records[0].statistic > 0.0);
//! ```

pub mod camera;

pub use camera::{
    CameraConfig, CameraRecord, CameraResult, InterGeneCorrelation, SetTestMethod, camera_pr,
};
