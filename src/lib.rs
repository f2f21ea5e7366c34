//! Semantic clustering and layout core for reducing redundant Gene Ontology
//! term lists: given a scored, possibly redundant set of GO terms, compute
//! pairwise semantic similarity, greedily retire the more dispensable member
//! of each highly similar pair, lay out what's kept in 2D/3D via MDS, and
//! export a similarity-threshold graph.
//!
//! This crate is a library: it consumes already-parsed ontology/annotation
//! data and produces in-memory results. OBO parsing, GOA/Uniprot/NCBI
//! ingestion, graph serialization, and any CLI/HTTP front end are the
//! caller's responsibility.

pub mod annotation;
pub mod clustering;
pub mod error;
pub mod graph;
pub mod job;
pub mod layout;
pub mod ontology;
pub mod rng;
pub mod similarity;

pub use error::{RevigoError, Result};
