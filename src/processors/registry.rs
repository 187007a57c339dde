//! The set of active processors.

use super::Processor;

/// Active processors, kept in registration order.
///
/// Built once at startup and only read while a pipeline runs.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `processor` when `active`, otherwise remove any processor with
    /// the same name. Registering a name that is already present is a no-op.
    pub fn register(&mut self, processor: Box<dyn Processor>, active: bool) {
        if !active {
            self.unregister(processor.name());
            return;
        }
        if !self.contains(processor.name()) {
            self.processors.push(processor);
        }
    }

    /// Remove the processor called `name`. Returns whether it was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.processors.len();
        self.processors.retain(|p| p.name() != name);
        self.processors.len() != before
    }

    fn contains(&self, name: &str) -> bool {
        self.processors.iter().any(|p| p.name() == name)
    }

    /// Active processors in registration order.
    pub fn active_processors(&self) -> impl Iterator<Item = &dyn Processor> {
        self.processors.iter().map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorConfig;
    use crate::error::Result;
    use crate::model::attachment::Attachment;
    use crate::processors::ProcessorReport;

    struct Named(&'static str);

    impl Processor for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn validate(&self, _config: &ProcessorConfig) -> Result<()> {
            Ok(())
        }

        fn process(
            &self,
            _config: &ProcessorConfig,
            _attachments: &mut [Attachment],
        ) -> Result<ProcessorReport> {
            Ok(ProcessorReport::default())
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = ProcessorRegistry::new();
        registry.register(Box::new(Named("tika")), true);
        registry.register(Box::new(Named("tika")), true);
        assert_eq!(registry.names().len(), 1);
    }

    #[test]
    fn test_register_inactive_removes() {
        let mut registry = ProcessorRegistry::new();
        registry.register(Box::new(Named("thug")), true);
        registry.register(Box::new(Named("virustotal")), true);
        registry.register(Box::new(Named("thug")), false);
        assert_eq!(registry.names(), vec!["virustotal"]);

        // Inactive registration of an absent processor is harmless.
        registry.register(Box::new(Named("tika")), false);
        assert_eq!(registry.names().len(), 1);
    }

    #[test]
    fn test_unregister_absent_is_ok() {
        let mut registry = ProcessorRegistry::new();
        assert!(!registry.unregister("nothing"));
        registry.register(Box::new(Named("tika")), true);
        assert!(registry.unregister("tika"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_active_processors_keep_registration_order() {
        let mut registry = ProcessorRegistry::new();
        for name in ["virustotal", "tika", "thug"] {
            registry.register(Box::new(Named(name)), true);
        }
        let names: Vec<_> = registry.active_processors().map(|p| p.name()).collect();
        assert_eq!(names, vec!["virustotal", "tika", "thug"]);
    }
}
