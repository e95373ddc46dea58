//! # single-enrichment
//!
//! Competitive gene set testing and gene set redundancy clustering, part of the single-rust ecosystem.
//!
//! This crate scores predefined gene sets against a matrix of precomputed per-gene statistics
//! (for example moderated t-statistics, one column per contrast). Set membership is held in a
//! sparse incidence matrix so that every set of every contrast is summarised by a single sparse
//! product, and contrasts are processed in parallel.
//!
//! ## Core Features
//!
//! - **CAMERA-PR**: correlation-adjusted competitive tests with parametric and rank-sum paths
//! - **Multiple Testing Correction**: Benjamini-Hochberg and other adjustment methods, globally or per contrast
//! - **Set Clustering**: Jaccard, overlap and Otsuka similarity with hierarchical clustering
//! - **Sparse Matrix Support**: `CsrMatrix` from nalgebra-sparse for set membership
//!
//! ## Module Organization
//!
//! - **[`data`]**: The per-gene statistic matrix
//! - **[`sets`]**: Gene set collections, incidence matrices and set similarity
//! - **[`enrichment`]**: The CAMERA-PR engine
//! - **[`cluster`]**: Similarity clustering of gene sets
//! - **[`testing`]**: Set test statistics and multiple testing correction

pub mod cluster;
pub mod data;
pub mod enrichment;
pub mod error;
pub mod sets;
pub mod testing;

pub use cluster::{ClusterConfig, SetCluster, cluster_sets};
pub use data::StatisticMatrix;
pub use enrichment::{CameraConfig, CameraRecord, CameraResult, camera_pr};
pub use error::{EnrichmentError, Result};
pub use sets::SetCollection;
