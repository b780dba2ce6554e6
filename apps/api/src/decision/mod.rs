// Candidate decision engine: heuristic scoring blended with a tabular Q-learner.
// Implements: normalization, quantization, policy banding, safeguards, outcome
// training, bootstrap pre-training, snapshots.
// `engine` owns the Q-table and its locks; `trainer` only updates the table it
// is handed. The remaining modules are pure or I/O.

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod errors;
pub mod handlers;
pub mod heuristic;
pub mod history;
pub mod models;
pub mod normalizer;
pub mod persistence;
pub mod policy;
pub mod q_table;
pub mod quantizer;
pub mod rng;
pub mod safeguards;
pub mod trainer;
pub mod worker;
