//! Orchestration of method evaluations.

mod runner;

pub use runner::{
    ClassifierConfig, Evaluation, EvaluationConfig, EvaluationOutcome, MethodConfig,
    MethodFailure, MethodRun,
};
