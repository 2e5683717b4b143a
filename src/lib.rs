//! # Netviz
//!
//! A library for turning the output of a graph network query service into
//! display-ready graph visualizations.
//!
//! The service runs SPARQL queries, builds the network and pre-computes metrics such as
//! degree, distance, edge weight and pagerank. Netviz sends the query, then rescales those
//! metrics onto visual attributes (node size, node color, edge width) before handing the
//! elements to Cytoscape.
//!
//! ## Key Features
//!
//! - **Linear Scaling**: Fit a map from an observed range onto a target range
//! - **Color Gradients**: Interpolate channel-encoded colors such as `rgb(R, G, B)`
//! - **Element Styling**: Write `size`, `color` and `weight` into Cytoscape elements
//! - **Query Client**: Talk to the `/query`, `/query_ego`, `/graphml` and `/signature` routes
//!
//! ## Example
//!
//! ```
//! use netviz::{GradientColorScaler, LinearScaler};
//!
//! // Node sizes from out-degrees
//! let mut sizes = LinearScaler::new(10.0, 35.0);
//! assert_eq!(sizes.fit_transform(&[0.0, 1.0, 4.0]).unwrap(), vec![10.0, 16.25, 35.0]);
//!
//! // A constant batch collapses to the low end of the range
//! let mut widths = LinearScaler::new(1.0, 6.0);
//! assert_eq!(widths.fit_transform(&[5.0]).unwrap(), vec![1.0]);
//!
//! // Node colors from distances to the ego node
//! let mut colors = GradientColorScaler::new("rgb(255, 0, 0)", "rgb(0, 0, 255)");
//! let result = colors.fit_transform(&[0.0, 2.0]).unwrap();
//! assert_eq!(result, vec!["rgb(255, 0, 0)", "rgb(0, 0, 255)"]);
//! ```
//!
//! ## Command Line Tool
//!
//! Netviz includes a command-line tool called `netviz` that queries the service and writes
//! a styled Cytoscape document or HTML page. See the binary documentation for more details.
//!

use std::io;
use thiserror::Error;

pub mod client;
pub mod color;
pub mod config;
pub mod scaling;
pub mod ui;
pub mod visualization;

pub use client::{QueryClient, QueryRequest, QueryResponse, Route};
pub use color::{ColorTemplate, GradientColorScaler, Segment};
pub use config::ClientConfig;
pub use scaling::{Coefficients, LinearScaler};
pub use visualization::{
    apply_style, CytoscapeDocument, Element, Elements, Layout, SizeSource, StyleConfig,
};

/// Error types for Netviz operations
#[derive(Error, Debug)]
pub enum NetvizError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Scaler used before fit")]
    NotFitted,

    #[error("Invalid server address: {0}")]
    InvalidServer(String),

    #[error("Query service returned {status}: {body}")]
    ServiceStatus { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for Netviz operations
pub type Result<T> = std::result::Result<T, NetvizError>;
