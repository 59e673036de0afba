//! clinrisk: sepsis-risk classification and local explanations.
//!
//! This crate provides a leakage-safe fit/predict pipeline for a rare
//! binary clinical outcome (median imputation, standard scaling and an
//! imbalance-weighted boosted-tree classifier), imbalance-aware evaluation
//! metrics, and a local surrogate explanation engine that rationalizes
//! individual predictions of the fitted pipeline.
//!
//! The classifier is consumed as an opaque capability (`fit` /
//! `predict_proba`), so any model implementing the trait in
//! `models::classifier_trait` is substitutable.
pub mod config;
pub mod dataset;
pub mod error;
pub mod explain;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
