use super::{Errors, GenerateForLocationResult, GenerateResult, Generator, Policy};
use crate::dataplane::{MatchRule, PathRule, VirtualServer};
use std::{fmt, sync::Arc};

/// Fans every scope out to a list of generators and merges their results.
///
/// Files are concatenated in registration order. Settings are merged so that
/// the last registered generator wins when two set the same key: register
/// generators in increasing order of priority.
///
/// A failing generator does not stop the others from running; every error is
/// returned once all generators have been invoked.
#[derive(Clone, Default)]
pub struct CompositeGenerator {
    generators: Vec<Arc<dyn Generator + Send + Sync>>,
}

/// Results that can be merged across generators.
trait Merge: Default {
    fn merge(&mut self, other: Self);
}

// === impl CompositeGenerator ===

impl CompositeGenerator {
    pub fn new(generators: impl IntoIterator<Item = Arc<dyn Generator + Send + Sync>>) -> Self {
        Self {
            generators: generators.into_iter().collect(),
        }
    }

    /// Registers a generator after those already registered.
    pub fn with<G>(mut self, generator: G) -> Self
    where
        G: Generator + Send + Sync + 'static,
    {
        self.generators.push(Arc::new(generator));
        self
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    fn fan_out<T, F>(&self, generate: F) -> Result<T, Errors>
    where
        T: Merge,
        F: Fn(&dyn Generator) -> Result<T, Errors>,
    {
        let mut merged = T::default();
        let mut errors = Errors::default();
        for generator in &self.generators {
            match generate(generator.as_ref()) {
                Ok(result) => merged.merge(result),
                Err(e) => errors.extend(e),
            }
        }
        errors.into_result(merged)
    }
}

impl Generator for CompositeGenerator {
    fn generate_for_server(
        &self,
        policies: &[Policy],
        server: &VirtualServer,
    ) -> Result<GenerateResult, Errors> {
        self.fan_out(|g| g.generate_for_server(policies, server))
    }

    fn generate_for_path_rule(
        &self,
        policies: &[Policy],
        rule: &PathRule,
    ) -> Result<GenerateForLocationResult, Errors> {
        self.fan_out(|g| g.generate_for_path_rule(policies, rule))
    }

    fn generate_for_match_rule(
        &self,
        policies: &[Policy],
        rule: &MatchRule,
    ) -> Result<GenerateForLocationResult, Errors> {
        self.fan_out(|g| g.generate_for_match_rule(policies, rule))
    }

    fn generate_for_http(&self, policies: &[Policy]) -> Result<GenerateResult, Errors> {
        self.fan_out(|g| g.generate_for_http(policies))
    }
}

impl fmt::Debug for CompositeGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeGenerator")
            .field("generators", &self.generators.len())
            .finish()
    }
}

impl Merge for GenerateResult {
    fn merge(&mut self, other: Self) {
        self.extend(other);
    }
}

impl Merge for GenerateForLocationResult {
    fn merge(&mut self, other: Self) {
        self.extend(other);
    }
}
