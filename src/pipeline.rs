//! Layered validation pipeline.
//!
//! Stages always run in [`PipelineStage`] order and every stage runs
//! regardless of what earlier stages reported, so a single call surfaces the
//! complete defect list.

use crate::location::LocationContext;
use crate::resource::Resource;
use crate::validation::Validation;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineStage {
    Structural,
    BaseProfile,
    OverlayProfile,
    BusinessRules,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Structural => "structural",
            PipelineStage::BaseProfile => "base-profile",
            PipelineStage::OverlayProfile => "overlay-profile",
            PipelineStage::BusinessRules => "business-rules",
        };
        f.write_str(name)
    }
}

/// A pure check over a resource. Implementations append to the returned
/// [`Validation`] and never fail.
pub trait ResourceValidator: Send + Sync {
    fn validate(&self, resource: &Resource, location: &LocationContext) -> Validation;
}

impl<F> ResourceValidator for F
where
    F: Fn(&Resource, &LocationContext) -> Validation + Send + Sync,
{
    fn validate(&self, resource: &Resource, location: &LocationContext) -> Validation {
        self(resource, location)
    }
}

#[derive(Clone)]
pub struct ValidationPipeline {
    stages: Vec<(PipelineStage, Arc<dyn ResourceValidator>)>,
}

impl ValidationPipeline {
    pub fn builder() -> ValidationPipelineBuilder {
        ValidationPipelineBuilder::default()
    }

    /// Runs every stage and concatenates the results: stage order first,
    /// then declaration order within a stage.
    pub fn validate(&self, resource: &Resource, location: &LocationContext) -> Validation {
        let mut validation = Validation::new();
        for (stage, validator) in &self.stages {
            let partial = validator.validate(resource, location);
            tracing::trace!(
                "{} stage reported {} issue(s) for {}",
                stage,
                partial.len(),
                location
            );
            validation.merge(partial);
        }
        validation
    }

    pub fn stages(&self) -> impl Iterator<Item = PipelineStage> + '_ {
        self.stages.iter().map(|(stage, _)| *stage)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Debug for ValidationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("stages", &self.stages().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Default)]
pub struct ValidationPipelineBuilder {
    stages: Vec<(PipelineStage, Arc<dyn ResourceValidator>)>,
}

impl ValidationPipelineBuilder {
    pub fn stage(mut self, stage: PipelineStage, validator: impl ResourceValidator + 'static) -> Self {
        self.stages.push((stage, Arc::new(validator)));
        self
    }

    pub fn build(mut self) -> ValidationPipeline {
        // stable: declaration order survives within a stage
        self.stages.sort_by_key(|(stage, _)| *stage);
        ValidationPipeline {
            stages: self.stages,
        }
    }
}
