pub mod common;
pub mod error;
pub mod evolution;
pub mod factory;
pub mod genome;
pub mod graph;
pub mod innovation;
pub mod mutation;
pub mod network;
pub mod population;
pub mod species;
pub mod vector;
