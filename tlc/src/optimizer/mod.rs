//! IR optimization passes.
//!
//! Grounded on the teacher's pipeline shape: a small `OptimizationPass`
//! trait and a fixed-point `OptimizationPipeline` that reruns every pass
//! until a round makes no further changes, or `max_iterations` is hit.

mod constant_folding;
mod copy_propagation;
mod dce;

pub use constant_folding::ConstantFolding;
pub use copy_propagation::CopyPropagation;
pub use dce::DeadCodeElimination;

use crate::ir::{IRFunction, IRProgram};

pub trait OptimizationPass {
    fn name(&self) -> &str;

    /// Run the pass on one function, returning whether it changed anything.
    fn run_on_function(&self, func: &mut IRFunction) -> bool;

    fn run_on_program(&self, program: &mut IRProgram) -> usize {
        program
            .functions
            .iter_mut()
            .filter(|f| self.run_on_function(f))
            .count()
    }
}

pub struct OptimizationPipeline {
    passes: Vec<Box<dyn OptimizationPass>>,
    max_iterations: usize,
}

impl OptimizationPipeline {
    pub fn new() -> Self {
        Self { passes: Vec::new(), max_iterations: 10 }
    }

    pub fn default_pipeline() -> Self {
        let mut pipeline = Self::new();
        pipeline.add_pass(Box::new(ConstantFolding));
        pipeline.add_pass(Box::new(CopyPropagation));
        pipeline.add_pass(Box::new(DeadCodeElimination));
        pipeline
    }

    pub fn add_pass(&mut self, pass: Box<dyn OptimizationPass>) {
        self.passes.push(pass);
    }

    pub fn set_max_iterations(&mut self, max: usize) {
        self.max_iterations = max;
    }

    /// Runs every pass over every function, repeating until a full round
    /// makes no change. Returns the total number of functions changed
    /// across all rounds (a function touched by two passes in one round
    /// counts twice).
    pub fn run(&self, program: &mut IRProgram) -> usize {
        let mut total = 0;
        for _ in 0..self.max_iterations {
            let mut changed_this_round = 0;
            for pass in &self.passes {
                changed_this_round += pass.run_on_program(program);
            }
            total += changed_this_round;
            if changed_this_round == 0 {
                break;
            }
        }
        total
    }
}

impl Default for OptimizationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_reaches_fixed_point_on_empty_program() {
        let pipeline = OptimizationPipeline::default_pipeline();
        let mut program = IRProgram::new();
        assert_eq!(pipeline.run(&mut program), 0);
    }
}
