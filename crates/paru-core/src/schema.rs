use serde::{Deserialize, Serialize};

/// `POST /predict` success body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: u8,
    pub probability: f64,
}

/// `GET /visualisasi-data`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub berisiko: u64,
    pub tidak_berisiko: u64,
}

/// `GET /visualisasi-kategori/{kolom}`: three parallel sequences, one slot per label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub labels: Vec<String>,
    pub berisiko: Vec<u64>,
    pub tidak_berisiko: Vec<u64>,
}

/// Failure payload shared by every JSON endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(err: impl std::fmt::Display) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}
